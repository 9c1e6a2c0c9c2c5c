//! Test helpers for VM tests
//!
//! Contexts with recording hooks, and shortcuts for running action lists

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::runtime::{ContextOptions, RuntimeContext};
use crate::vm::{execute, ExecuteOptions};

/// Everything the context's hooks observed
#[derive(Default)]
pub struct Recorded {
    pub events: Mutex<Vec<(String, Value)>>,
    pub changes: Mutex<Vec<String>>,
    pub navigations: Mutex<Vec<Value>>,
}

/// Root context over `state` whose emit, state-change and navigate hooks record into `Recorded`
pub fn recording_context(state: Value) -> (RuntimeContext, Arc<Recorded>) {
    recording_context_with(state, ContextOptions::default())
}

pub fn recording_context_with(
    state: Value,
    options: ContextOptions,
) -> (RuntimeContext, Arc<Recorded>) {
    let recorded = Arc::new(Recorded::default());
    let events = recorded.clone();
    let changes = recorded.clone();
    let navigations = recorded.clone();
    let options = options
        .with_emit(move |event, data| events.events.lock().push((event.to_string(), data)))
        .with_state_change(move |path, _| changes.changes.lock().push(path.to_string()))
        .with_navigator(move |to| {
            navigations.navigations.lock().push(to);
            Ok(())
        });
    let ctx = RuntimeContext::new(state, options).expect("Context creation failed");
    (ctx, recorded)
}

pub fn context(state: Value) -> RuntimeContext {
    RuntimeContext::new(state, ContextOptions::default()).expect("Context creation failed")
}

/// Execute `actions` (a JSON array) with default options
pub async fn run(ctx: &RuntimeContext, actions: Value) -> Result<()> {
    run_with(ctx, actions, ExecuteOptions::default()).await
}

pub async fn run_with(ctx: &RuntimeContext, actions: Value, options: ExecuteOptions) -> Result<()> {
    let Value::Array(actions) = actions else {
        panic!("actions must be a JSON array");
    };
    execute(&actions, ctx, options).await
}

/// Execute and expect failure
pub async fn run_err(ctx: &RuntimeContext, actions: Value) -> Error {
    run(ctx, actions).await.expect_err("Execution should fail")
}
