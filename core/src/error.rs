//! Error taxonomy for the expression engine and the action VM
//!
//! Every failure is one of four families (action, expression, service, batch),
//! carries an [`ErrorCode`] and an [`ErrorContext`] describing where it
//! happened. Callers catch at the `execute` boundary and render
//! [`Error::detailed_message`] for diagnostics.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/* ===================== Codes ===================== */

/// Stable error codes shared with the renderer and CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ActionUnknownType,
    ActionExecutionError,
    ActionAborted,
    ActionTimeout,
    ActionMaxStepsExceeded,
    ActionMissingParam,
    ActionInvalidParam,
    ExpressionParseError,
    ExpressionValidationError,
    ExpressionEvaluationError,
    ExpressionTimeout,
    ExpressionMaxStepsExceeded,
    ExpressionUnsafeAccess,
    ExpressionFunctionNotWhitelisted,
    ServiceNotFound,
    ServiceCallError,
    BatchError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ActionUnknownType => "ACTION_UNKNOWN_TYPE",
            ErrorCode::ActionExecutionError => "ACTION_EXECUTION_ERROR",
            ErrorCode::ActionAborted => "ACTION_ABORTED",
            ErrorCode::ActionTimeout => "ACTION_TIMEOUT",
            ErrorCode::ActionMaxStepsExceeded => "ACTION_MAX_STEPS_EXCEEDED",
            ErrorCode::ActionMissingParam => "ACTION_MISSING_PARAM",
            ErrorCode::ActionInvalidParam => "ACTION_INVALID_PARAM",
            ErrorCode::ExpressionParseError => "EXPRESSION_PARSE_ERROR",
            ErrorCode::ExpressionValidationError => "EXPRESSION_VALIDATION_ERROR",
            ErrorCode::ExpressionEvaluationError => "EXPRESSION_EVALUATION_ERROR",
            ErrorCode::ExpressionTimeout => "EXPRESSION_TIMEOUT",
            ErrorCode::ExpressionMaxStepsExceeded => "EXPRESSION_MAX_STEPS_EXCEEDED",
            ErrorCode::ExpressionUnsafeAccess => "EXPRESSION_UNSAFE_ACCESS",
            ErrorCode::ExpressionFunctionNotWhitelisted => "EXPRESSION_FUNCTION_NOT_WHITELISTED",
            ErrorCode::ServiceNotFound => "SERVICE_NOT_FOUND",
            ErrorCode::ServiceCallError => "SERVICE_CALL_ERROR",
            ErrorCode::BatchError => "BATCH_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* ===================== Context ===================== */

/// Structured location information attached to every error
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    /// Location of the node in the schema tree (e.g. `root.children.2.events.click`)
    pub schema_path: Option<String>,
    /// Expression source being evaluated
    pub expression: Option<String>,
    /// The offending action, as submitted
    pub action: Option<Value>,
    /// Free-form details (limits, paths, method names)
    pub metadata: Map<String, Value>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema_path(mut self, path: impl Into<String>) -> Self {
        self.schema_path = Some(path.into());
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn with_action(mut self, action: Value) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.schema_path.is_none()
            && self.expression.is_none()
            && self.action.is_none()
            && self.metadata.is_empty()
    }
}

/* ===================== Error Families ===================== */

#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct ActionError {
    pub code: ErrorCode,
    pub message: String,
    pub context: ErrorContext,
}

impl ActionError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
        }
    }
}

#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct ExpressionError {
    pub code: ErrorCode,
    pub message: String,
    pub context: ErrorContext,
}

impl ExpressionError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
        }
    }
}

#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct ServiceError {
    pub code: ErrorCode,
    pub message: String,
    pub context: ErrorContext,
    /// Underlying handler failure, when there is one
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ServiceError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Wrap a method handler failure as `SERVICE_CALL_ERROR`
    pub fn call_failed(method: &str, cause: anyhow::Error) -> Self {
        Self {
            code: ErrorCode::ServiceCallError,
            message: format!("Method '{}' failed: {:#}", method, cause),
            context: ErrorContext::default().with_metadata("method", method),
            source: Some(cause.into()),
        }
    }
}

/// One failed sub-action of a `batch`
#[derive(Debug)]
pub struct FailedAction {
    /// Position of the action in the batch
    pub index: usize,
    pub action: Value,
    pub error: Box<Error>,
}

#[derive(Debug, Error)]
#[error("[BATCH_ERROR] {message}")]
pub struct BatchError {
    pub message: String,
    pub failed_actions: Vec<FailedAction>,
    pub context: ErrorContext,
}

impl BatchError {
    pub fn new(failed_actions: Vec<FailedAction>, total: usize) -> Self {
        Self {
            message: format!(
                "{} of {} batched actions failed",
                failed_actions.len(),
                total
            ),
            failed_actions,
            context: ErrorContext::default(),
        }
    }
}

/* ===================== Unified Error ===================== */

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Batch(#[from] BatchError),
}

impl Error {
    pub fn action(code: ErrorCode, message: impl Into<String>) -> Self {
        Error::Action(ActionError::new(code, message))
    }

    pub fn expression(code: ErrorCode, message: impl Into<String>) -> Self {
        Error::Expression(ExpressionError::new(code, message))
    }

    pub fn service(code: ErrorCode, message: impl Into<String>) -> Self {
        Error::Service(ServiceError::new(code, message))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Action(e) => e.code,
            Error::Expression(e) => e.code,
            Error::Service(e) => e.code,
            Error::Batch(_) => ErrorCode::BatchError,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Action(e) => &e.message,
            Error::Expression(e) => &e.message,
            Error::Service(e) => &e.message,
            Error::Batch(e) => &e.message,
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Error::Action(e) => &e.context,
            Error::Expression(e) => &e.context,
            Error::Service(e) => &e.context,
            Error::Batch(e) => &e.context,
        }
    }

    pub fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Error::Action(e) => &mut e.context,
            Error::Expression(e) => &mut e.context,
            Error::Service(e) => &mut e.context,
            Error::Batch(e) => &mut e.context,
        }
    }

    /// Attach the expression source unless a more specific one is already set
    pub fn with_expression(mut self, expression: &str) -> Self {
        let ctx = self.context_mut();
        if ctx.expression.is_none() {
            ctx.expression = Some(expression.to_string());
        }
        self
    }

    /// Attach the offending action unless an inner action is already recorded
    pub fn with_action(mut self, action: &Value) -> Self {
        let ctx = self.context_mut();
        if ctx.action.is_none() {
            ctx.action = Some(action.clone());
        }
        self
    }

    pub fn with_schema_path(mut self, path: impl Into<String>) -> Self {
        self.context_mut().schema_path = Some(path.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context_mut()
            .metadata
            .insert(key.into(), value.into());
        self
    }

    pub fn is_service_error(&self) -> bool {
        matches!(self, Error::Service(_))
    }

    /// Multi-line report: code and message, then every populated context field
    pub fn detailed_message(&self) -> String {
        let mut out = format!("[{}] {}", self.code(), self.message());
        let ctx = self.context();

        if let Some(path) = &ctx.schema_path {
            out.push_str(&format!("\n  schema path: {}", path));
        }
        if let Some(expression) = &ctx.expression {
            out.push_str(&format!("\n  expression: {}", expression));
        }
        if let Some(action) = &ctx.action {
            out.push_str(&format!("\n  action: {}", action));
        }
        if !ctx.metadata.is_empty() {
            out.push_str(&format!("\n  metadata: {}", Value::Object(ctx.metadata.clone())));
        }

        if let Error::Batch(batch) = self {
            out.push_str("\n  failed actions:");
            for failed in &batch.failed_actions {
                out.push_str(&format!(
                    "\n    #{} {}: {}",
                    failed.index, failed.action, failed.error
                ));
            }
        }

        out
    }
}
