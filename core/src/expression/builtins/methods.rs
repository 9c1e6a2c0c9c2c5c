//! Value methods (`s.trim()`, `list.join(', ')`, `n.toFixed(2)`)
//!
//! String positions count characters, not bytes.

use serde_json::Value;

use super::{arg, evaluation_error};
use crate::error::{Error, Result};
use crate::expression::coerce::{format_number, strict_equals, to_js_string, to_number};
use crate::path::type_name;

fn not_a_function(receiver: &Value, name: &str) -> Error {
    evaluation_error(format!("{}.{} is not a function", type_name(receiver), name))
        .with_metadata("method", name)
}

/// Resolve a JS-style relative index (negative counts from the end) into `0..=len`
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_null() {
        return default;
    }
    let n = to_number(value);
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

pub fn call_method(receiver: &Value, name: &str, args: &[Value]) -> Result<Value> {
    match receiver {
        Value::String(s) => string_method(s, name, args),
        Value::Array(items) => array_method(items, name, args),
        Value::Number(n) => number_method(n.as_f64().unwrap_or(f64::NAN), name, args),
        Value::Bool(b) if name == "toString" => Ok(Value::String(b.to_string())),
        Value::Object(_) if name == "toString" => Ok(Value::String(to_js_string(receiver))),
        Value::Null => Err(evaluation_error(format!(
            "Cannot call '{}' on null",
            name
        ))
        .with_metadata("method", name)),
        other => Err(not_a_function(other, name)),
    }
}

/* ===================== Strings ===================== */

fn string_method(s: &str, name: &str, args: &[Value]) -> Result<Value> {
    let text = |i: usize| to_js_string(arg(args, i));
    let value = match name {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "includes" => Value::Bool(s.contains(text(0).as_str())),
        "startsWith" => Value::Bool(s.starts_with(text(0).as_str())),
        "endsWith" => Value::Bool(s.ends_with(text(0).as_str())),
        "indexOf" => {
            let position = s
                .find(text(0).as_str())
                .map(|byte| s[..byte].chars().count() as i64)
                .unwrap_or(-1);
            Value::from(position)
        }
        "slice" => {
            let chars: Vec<char> = s.chars().collect();
            let start = relative_index(arg(args, 0), chars.len(), 0);
            let end = relative_index(arg(args, 1), chars.len(), chars.len());
            let out: String = if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            };
            Value::String(out)
        }
        "split" => {
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Null => vec![Value::String(s.to_string())],
                separator => {
                    let separator = to_js_string(separator);
                    if separator.is_empty() {
                        s.chars().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(separator.as_str())
                            .map(|part| Value::String(part.to_string()))
                            .collect()
                    }
                }
            };
            match arg(args, 1) {
                Value::Null => Value::Array(parts),
                limit => {
                    let limit = to_number(limit).max(0.0) as usize;
                    Value::Array(parts.into_iter().take(limit).collect())
                }
            }
        }
        "concat" => {
            let mut out = s.to_string();
            for value in args {
                out.push_str(&to_js_string(value));
            }
            Value::String(out)
        }
        "replace" => Value::String(s.replacen(text(0).as_str(), text(1).as_str(), 1)),
        "toString" => Value::String(s.to_string()),
        _ => return Err(not_a_function(&Value::String(s.to_string()), name)),
    };
    Ok(value)
}

/* ===================== Arrays ===================== */

fn array_method(items: &[Value], name: &str, args: &[Value]) -> Result<Value> {
    let value = match name {
        "includes" => Value::Bool(items.iter().any(|item| strict_equals(item, arg(args, 0)))),
        "indexOf" => Value::from(
            items
                .iter()
                .position(|item| strict_equals(item, arg(args, 0)))
                .map(|i| i as i64)
                .unwrap_or(-1),
        ),
        "slice" => {
            let start = relative_index(arg(args, 0), items.len(), 0);
            let end = relative_index(arg(args, 1), items.len(), items.len());
            Value::Array(if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            })
        }
        "join" => {
            let separator = match arg(args, 0) {
                Value::Null => ",".to_string(),
                other => to_js_string(other),
            };
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::Null => String::new(),
                    other => to_js_string(other),
                })
                .collect();
            Value::String(parts.join(&separator))
        }
        "concat" => {
            let mut out = items.to_vec();
            for value in args {
                match value {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::Array(out)
        }
        "toString" => Value::String(to_js_string(&Value::Array(items.to_vec()))),
        _ => return Err(not_a_function(&Value::Array(Vec::new()), name)),
    };
    Ok(value)
}

/* ===================== Numbers ===================== */

fn to_radix(n: f64, radix: u32) -> String {
    if n.fract() != 0.0 || !n.is_finite() {
        return format_number(n);
    }
    let negative = n < 0.0;
    let mut magnitude = n.abs() as u64;
    if magnitude == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while magnitude > 0 {
        let digit = (magnitude % radix as u64) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('?'));
        magnitude /= radix as u64;
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

fn number_method(n: f64, name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "toFixed" => {
            let digits = to_number(arg(args, 0));
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
            if !n.is_finite() {
                return Ok(Value::String(format_number(n)));
            }
            Ok(Value::String(format!("{:.*}", digits, n)))
        }
        "toString" => {
            let radix = match arg(args, 0) {
                Value::Null => 10,
                other => to_number(other) as u32,
            };
            if !(2..=36).contains(&radix) {
                return Err(evaluation_error(format!(
                    "toString() radix must be between 2 and 36, got {}",
                    radix
                )));
            }
            if radix == 10 {
                Ok(Value::String(format_number(n)))
            } else {
                Ok(Value::String(to_radix(n, radix)))
            }
        }
        _ => Err(not_a_function(&Value::from(0), name)),
    }
}
