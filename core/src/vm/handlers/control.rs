//! `if`, `loop` and `batch`
//!
//! Nested action lists run through [`run_actions`] with the caller's budget.

use serde_json::Value;
use tracing::{error, trace};

use crate::error::{BatchError, Error, ErrorCode, FailedAction, Result};
use crate::expression::coerce::truthy;
use crate::path::type_name;
use crate::runtime::{LoopBinding, RuntimeContext};
use crate::vm::executor::{is_budget_error, run_actions, Budget};

/// A condition string is an expression, markers optional
fn condition(ctx: &RuntimeContext, cond: &Value) -> Result<bool> {
    let value = match cond {
        Value::String(source) => ctx.evaluate(source)?,
        other => other.clone(),
    };
    Ok(truthy(&value))
}

pub async fn branch(
    ctx: &RuntimeContext,
    budget: &Budget,
    cond: &Value,
    then: &[Value],
    otherwise: &[Value],
) -> Result<()> {
    let taken = condition(ctx, cond)?;
    trace!(taken, "if");
    let actions = if taken { then } else { otherwise };
    run_actions(actions, ctx, budget).await
}

/// Iteration order: array elements, or object entries with the key as index
fn entries(items: Value) -> Result<Vec<(Value, Value)>> {
    match items {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (item, Value::from(i)))
            .collect()),
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, item)| (item, Value::String(key)))
            .collect()),
        other => Err(Error::action(
            ErrorCode::ActionInvalidParam,
            format!("Loop source must be an array or object, got {}", type_name(&other)),
        )
        .with_metadata("param", "in")),
    }
}

pub async fn each(
    ctx: &RuntimeContext,
    budget: &Budget,
    var: &str,
    index_var: &str,
    items: &Value,
    body: &[Value],
) -> Result<()> {
    let source = match items {
        Value::String(source) => ctx.evaluate(source)?,
        other => other.clone(),
    };
    let binding = LoopBinding { var, index_var };
    let session = ctx.session().clone();

    for (item, index) in entries(source)? {
        let scope = session.loop_pool().create_loop_context(ctx, binding, item, index);
        let result = run_actions(body, &scope, budget).await;
        session.loop_pool().release_loop_context(scope);
        result?;
    }
    Ok(())
}

pub async fn batch(ctx: &RuntimeContext, budget: &Budget, actions: &[Value]) -> Result<()> {
    let mut failed = Vec::new();
    for (index, action) in actions.iter().enumerate() {
        match run_actions(std::slice::from_ref(action), ctx, budget).await {
            Ok(()) => {}
            Err(e) if is_budget_error(&e) => return Err(e),
            Err(e) => failed.push(FailedAction {
                index,
                action: action.clone(),
                error: Box::new(e),
            }),
        }
    }

    if failed.is_empty() {
        return Ok(());
    }
    error!(
        failed = failed.len(),
        total = actions.len(),
        "batched actions failed"
    );
    Err(BatchError::new(failed, actions.len()).into())
}
