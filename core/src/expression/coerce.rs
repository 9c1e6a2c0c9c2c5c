//! JS-like coercion rules over JSON values
//!
//! `undefined` does not exist in JSON; missing values are `Null` and behave
//! like JS `undefined` where the two differ (`typeof`, string rendering in
//! templates).

use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Largest integer magnitude stored as a JSON integer (2^53)
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            [single] => to_number(single),
            _ => f64::NAN,
        },
        Value::Object(_) => f64::NAN,
    }
}

/// Store a numeric result, preferring integers; non-finite results become null
pub fn number_value(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// `String(value)`
pub fn to_js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Rendering used when a value is spliced into a template string
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
        other => to_js_string(other),
    }
}

pub fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "undefined",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) | Value::Object(_) => "object",
    }
}

/// `a + b`: string concatenation when either side is not a primitive number/bool/null
pub fn add(left: &Value, right: &Value) -> Value {
    let concatenates = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
    if concatenates(left) || concatenates(right) {
        Value::String(format!("{}{}", to_js_string(left), to_js_string(right)))
    } else {
        number_value(to_number(left) + to_number(right))
    }
}

/// `===`
pub fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

/// `==`
pub fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_))
        | (Value::Bool(_), _)
        | (_, Value::Bool(_)) => {
            if matches!(left, Value::Array(_) | Value::Object(_))
                || matches!(right, Value::Array(_) | Value::Object(_))
            {
                return false;
            }
            to_number(left) == to_number(right)
        }
        _ => strict_equals(left, right),
    }
}

/// Relational comparison; `None` when the operands are unordered (NaN)
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => to_number(left).partial_cmp(&to_number(right)),
    }
}
