//! Action handlers, grouped by what they touch

pub mod control;
pub mod effects;
pub mod state;

use serde_json::Value;

use crate::error::Result;
use crate::runtime::RuntimeContext;

/// Strings are interpolated; anything else is used as written
pub(crate) fn evaluate_param(ctx: &RuntimeContext, value: &Value) -> Result<Value> {
    match value {
        Value::String(template) => ctx.interpolate(template),
        other => Ok(other.clone()),
    }
}
