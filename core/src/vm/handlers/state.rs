//! `set` and the array actions

use serde_json::Value;
use tracing::trace;

use super::evaluate_param;
use crate::error::{Error, ErrorCode, Result};
use crate::expression::coerce::to_number;
use crate::path::type_name;
use crate::runtime::RuntimeContext;
use crate::vm::action::Insert;

pub fn set(ctx: &RuntimeContext, path: &str, value: &Value) -> Result<()> {
    let value = evaluate_param(ctx, value)?;
    trace!(path, "set");
    ctx.set_path(path, value)
}

fn array_at<'v>(target: Option<&'v mut Value>, path: &str) -> Result<&'v mut Vec<Value>> {
    match target {
        Some(Value::Array(items)) => Ok(items),
        other => Err(Error::action(
            ErrorCode::ActionInvalidParam,
            format!(
                "Path '{}' is not an array (found {})",
                path,
                other.map_or("nothing", |v| type_name(v))
            ),
        )
        .with_metadata("path", path)),
    }
}

/// Elements to insert, with markers resolved
fn inserted(ctx: &RuntimeContext, insert: &Insert) -> Result<Vec<Value>> {
    match insert {
        Insert::Value(value) => Ok(vec![ctx.resolve_value(value)?]),
        Insert::Items(items) => resolved_items(ctx, items),
    }
}

fn resolved_items(ctx: &RuntimeContext, items: &Value) -> Result<Vec<Value>> {
    match ctx.resolve_value(items)? {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(Error::action(
            ErrorCode::ActionInvalidParam,
            format!("'items' must be an array, got {}", type_name(&other)),
        )
        .with_metadata("param", "items")),
    }
}

pub fn push(ctx: &RuntimeContext, path: &str, insert: &Insert) -> Result<()> {
    let values = inserted(ctx, insert)?;
    ctx.update_path(path, |target| {
        array_at(target, path)?.extend(values);
        Ok(())
    })
}

pub fn unshift(ctx: &RuntimeContext, path: &str, insert: &Insert) -> Result<()> {
    let values = inserted(ctx, insert)?;
    ctx.update_path(path, |target| {
        array_at(target, path)?.splice(0..0, values);
        Ok(())
    })
}

pub fn pop(ctx: &RuntimeContext, path: &str) -> Result<()> {
    ctx.update_path(path, |target| {
        array_at(target, path)?.pop();
        Ok(())
    })
}

pub fn shift(ctx: &RuntimeContext, path: &str) -> Result<()> {
    ctx.update_path(path, |target| {
        let items = array_at(target, path)?;
        if !items.is_empty() {
            items.remove(0);
        }
        Ok(())
    })
}

/// Negative starts count from the end; everything is clamped to the array
fn splice_start(start: f64, len: usize) -> usize {
    if start.is_nan() {
        return 0;
    }
    let start = start.trunc();
    if start < 0.0 {
        (len as f64 + start).max(0.0) as usize
    } else {
        (start as usize).min(len)
    }
}

pub fn splice(
    ctx: &RuntimeContext,
    path: &str,
    start: &Value,
    delete_count: Option<&Value>,
    items: Option<&Value>,
) -> Result<()> {
    let start = to_number(&evaluate_param(ctx, start)?);
    let delete_count = delete_count
        .map(|count| evaluate_param(ctx, count).map(|v| to_number(&v)))
        .transpose()?;
    let items = match items {
        Some(items) => resolved_items(ctx, items)?,
        None => Vec::new(),
    };

    ctx.update_path(path, |target| {
        let array = array_at(target, path)?;
        let start = splice_start(start, array.len());
        let available = array.len() - start;
        let count = match delete_count {
            None => available,
            Some(n) if n.is_nan() || n <= 0.0 => 0,
            Some(n) => (n as usize).min(available),
        };
        array.splice(start..start + count, items);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splice_start() {
        assert_eq!(splice_start(1.0, 5), 1);
        assert_eq!(splice_start(9.0, 5), 5);
        assert_eq!(splice_start(-2.0, 5), 3);
        assert_eq!(splice_start(-9.0, 5), 0);
        assert_eq!(splice_start(f64::NAN, 5), 0);
        assert_eq!(splice_start(1.7, 5), 1);
    }
}
