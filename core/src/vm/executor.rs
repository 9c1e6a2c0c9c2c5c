//! Action executor
//!
//! Runs an action list in order against one context. One [`Budget`] (step
//! counter and deadline) is shared by every nested list an `execute` call
//! reaches through `if`, `loop` and `batch`, so nesting cannot escape it.

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use super::action::Action;
use super::handlers::{control, effects, state};
use crate::error::{Error, ErrorCode, Result};
use crate::runtime::RuntimeContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub timeout: Duration,
    pub max_steps: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            max_steps: 10_000,
        }
    }
}

impl ExecuteOptions {
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = Duration::from_millis(ms);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/* ===================== Budget ===================== */

/// Step and time budget of one `execute` call
#[derive(Debug)]
pub struct Budget {
    started: Instant,
    timeout: Duration,
    max_steps: usize,
    steps: AtomicUsize,
}

impl Budget {
    pub fn new(options: &ExecuteOptions) -> Self {
        Self {
            started: Instant::now(),
            timeout: options.timeout,
            max_steps: options.max_steps,
            steps: AtomicUsize::new(0),
        }
    }

    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::Relaxed)
    }

    /// Account for one more action; returns its 1-based step number
    fn tick(&self) -> Result<usize> {
        if self.started.elapsed() > self.timeout {
            return Err(timeout_error(self.timeout));
        }
        let steps = self.steps.load(Ordering::Relaxed);
        if steps >= self.max_steps {
            return Err(Error::action(
                ErrorCode::ActionMaxStepsExceeded,
                format!("Action execution exceeded {} steps", self.max_steps),
            )
            .with_metadata("max_steps", self.max_steps));
        }
        Ok(self.steps.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

fn timeout_error(timeout: Duration) -> Error {
    Error::action(
        ErrorCode::ActionTimeout,
        format!("Action execution timed out after {}ms", timeout.as_millis()),
    )
    .with_metadata("timeout_ms", timeout.as_millis() as u64)
}

/// Errors that end the whole `execute` call, even inside `batch`
pub(crate) fn is_budget_error(error: &Error) -> bool {
    matches!(
        error.code(),
        ErrorCode::ActionTimeout | ErrorCode::ActionMaxStepsExceeded
    )
}

/* ===================== Execute ===================== */

/// Execute `actions` in order; the first failure aborts the rest
pub async fn execute(
    actions: &[Value],
    ctx: &RuntimeContext,
    options: ExecuteOptions,
) -> Result<()> {
    if actions.is_empty() {
        return Ok(());
    }

    let budget = Budget::new(&options);
    let result = tokio::time::timeout(options.timeout, run_actions(actions, ctx, &budget)).await;
    debug!(steps = budget.steps(), "action list finished");
    match result {
        Ok(result) => result,
        // The deadline passed while an action was suspended
        Err(_) => Err(timeout_error(options.timeout)),
    }
}

pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Run a nested action list under an existing budget.
///
/// Uses `Box::pin` for async recursion.
pub fn run_actions<'a>(
    actions: &'a [Value],
    ctx: &'a RuntimeContext,
    budget: &'a Budget,
) -> ActionFuture<'a> {
    Box::pin(async move {
        for raw in actions {
            run_action(raw, ctx, budget).await?;
        }
        Ok(())
    })
}

async fn run_action(raw: &Value, ctx: &RuntimeContext, budget: &Budget) -> Result<()> {
    let step = budget.tick().map_err(|e| e.with_action(raw))?;
    let action = Action::decode(raw).map_err(|e| e.with_action(raw))?;
    debug!(action = action.kind(), step, "dispatching action");
    dispatch(&action, raw, ctx, budget)
        .await
        .map_err(|e| e.with_action(raw))
}

async fn dispatch(action: &Action, raw: &Value, ctx: &RuntimeContext, budget: &Budget) -> Result<()> {
    match action {
        Action::Set { path, value } => state::set(ctx, path, value),
        Action::Push { path, insert } => state::push(ctx, path, insert),
        Action::Pop { path } => state::pop(ctx, path),
        Action::Shift { path } => state::shift(ctx, path),
        Action::Unshift { path, insert } => state::unshift(ctx, path, insert),
        Action::Splice {
            path,
            start,
            delete_count,
            items,
        } => state::splice(ctx, path, start, delete_count.as_ref(), items.as_ref()),

        Action::Call {
            method,
            params,
            result_to,
        } => effects::call(ctx, method, params.as_ref(), result_to.as_deref()).await,
        Action::Emit { event, data } => effects::emit(ctx, event, data.as_ref()),
        Action::Navigate { to } => effects::navigate(ctx, to).await,
        Action::Log { level, message } => effects::log(ctx, *level, message),

        Action::If {
            cond,
            then,
            otherwise,
        } => control::branch(ctx, budget, cond, then, otherwise).await,
        Action::Loop {
            var,
            index_var,
            items,
            body,
        } => control::each(ctx, budget, var, index_var, items, body).await,
        Action::Batch { actions } => control::batch(ctx, budget, actions).await,

        Action::Custom { kind } => effects::custom(ctx, kind, raw).await,
    }
}
