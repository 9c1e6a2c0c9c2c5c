//! Actions that reach outside the state: methods, events, navigation, logging

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use super::evaluate_param;
use crate::error::{Error, ErrorCode, Result, ServiceError};
use crate::expression::coerce::to_display_string;
use crate::runtime::{MethodHandler, RuntimeContext};
use crate::vm::action::LogLevel;

/// Methods that take over `navigate` when registered
pub const NAVIGATE_METHODS: &[&str] = &["navigate", "$navigate"];

/// Keep service errors raised by the handler; wrap everything else
fn service_error(method: &str, err: anyhow::Error) -> Error {
    match err.downcast::<Error>() {
        Ok(err) if err.is_service_error() => err,
        Ok(err) => ServiceError::call_failed(method, err.into()).into(),
        Err(err) => ServiceError::call_failed(method, err).into(),
    }
}

async fn invoke(
    ctx: &RuntimeContext,
    name: &str,
    handler: MethodHandler,
    params: Value,
) -> Result<Value> {
    debug!(method = name, "calling method");
    handler(params, ctx.clone())
        .await
        .map_err(|e| service_error(name, e))
}

/// Params: a template is interpolated, an object has its string values
/// interpolated, anything else is passed as written
fn call_params(ctx: &RuntimeContext, params: Option<&Value>) -> Result<Value> {
    match params {
        None => Ok(Value::Null),
        Some(Value::Object(fields)) => {
            let mut out = Map::new();
            for (key, value) in fields {
                out.insert(key.clone(), evaluate_param(ctx, value)?);
            }
            Ok(Value::Object(out))
        }
        Some(other) => evaluate_param(ctx, other),
    }
}

pub async fn call(
    ctx: &RuntimeContext,
    method: &str,
    params: Option<&Value>,
    result_to: Option<&str>,
) -> Result<()> {
    let Some(handler) = ctx.method(method) else {
        return Err(Error::service(
            ErrorCode::ServiceNotFound,
            format!("Method '{}' is not registered", method),
        )
        .with_metadata("method", method));
    };
    let params = call_params(ctx, params)?;
    let result = invoke(ctx, method, handler, params).await?;
    if let Some(path) = result_to {
        ctx.set_path(path, result)?;
    }
    Ok(())
}

/// An unknown action type handled by a method of the same name
pub async fn custom(ctx: &RuntimeContext, kind: &str, raw: &Value) -> Result<()> {
    match ctx.method(kind) {
        Some(handler) => invoke(ctx, kind, handler, raw.clone()).await.map(|_| ()),
        None => Err(Error::action(
            ErrorCode::ActionUnknownType,
            format!("Unknown action type '{}'", kind),
        )
        .with_metadata("type", kind)),
    }
}

pub fn emit(ctx: &RuntimeContext, event: &str, data: Option<&Value>) -> Result<()> {
    let data = match data {
        Some(data) => evaluate_param(ctx, data)?,
        None => Value::Null,
    };
    ctx.emit(event, data);
    Ok(())
}

pub async fn navigate(ctx: &RuntimeContext, to: &Value) -> Result<()> {
    let to = evaluate_param(ctx, to)?;

    if let Some((name, handler)) = NAVIGATE_METHODS
        .iter()
        .find_map(|name| ctx.method(name).map(|handler| (*name, handler)))
    {
        return invoke(ctx, name, handler, to).await.map(|_| ());
    }

    match ctx.navigator() {
        Some(navigator) => navigator(to).map_err(|e| {
            Error::action(
                ErrorCode::ActionExecutionError,
                format!("Navigation failed: {}", e),
            )
        }),
        None => Err(Error::action(
            ErrorCode::ActionExecutionError,
            "No navigation handler is available",
        )),
    }
}

pub fn log(ctx: &RuntimeContext, level: LogLevel, message: &Value) -> Result<()> {
    let message = to_display_string(&evaluate_param(ctx, message)?);
    match level {
        LogLevel::Debug => debug!(target: "vario::action", "{}", message),
        LogLevel::Info => info!(target: "vario::action", "{}", message),
        LogLevel::Warn => warn!(target: "vario::action", "{}", message),
        LogLevel::Error => error!(target: "vario::action", "{}", message),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ContextOptions;
    use serde_json::json;

    #[test]
    fn test_service_errors_pass_through() {
        let original = Error::service(ErrorCode::ServiceNotFound, "inner lookup failed");
        let err = service_error("outer", anyhow::Error::from(original));
        assert_eq!(err.code(), ErrorCode::ServiceNotFound);
        assert_eq!(err.message(), "inner lookup failed");
    }

    #[test]
    fn test_other_errors_are_wrapped() {
        let err = service_error("save", anyhow::anyhow!("disk full"));
        assert_eq!(err.code(), ErrorCode::ServiceCallError);
        assert_eq!(err.context().metadata["method"], json!("save"));

        let inner = Error::expression(ErrorCode::ExpressionEvaluationError, "bad");
        let err = service_error("save", anyhow::Error::from(inner));
        assert_eq!(err.code(), ErrorCode::ServiceCallError);
    }

    #[test]
    fn test_call_params_interpolate_strings() {
        let ctx = RuntimeContext::new(json!({"id": 7, "name": "Ada"}), ContextOptions::default())
            .unwrap();
        assert_eq!(call_params(&ctx, None).unwrap(), Value::Null);
        assert_eq!(call_params(&ctx, Some(&json!("{{ id }}"))).unwrap(), json!(7));
        assert_eq!(
            call_params(
                &ctx,
                Some(&json!({"id": "{{ id }}", "label": "Hi {{ name }}", "n": 1}))
            )
            .unwrap(),
            json!({"id": 7, "label": "Hi Ada", "n": 1})
        );
        assert_eq!(call_params(&ctx, Some(&json!([1, "{{ id }}"]))).unwrap(), json!([1, "{{ id }}"]));
    }
}
