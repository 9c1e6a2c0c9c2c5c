//! Whitelisted functions callable from expressions
//!
//! Three kinds of call targets exist: bare globals (`parseInt(x)`),
//! namespaced functions (`Math.max(a, b)`) and value methods
//! (`name.toUpperCase()`). Anything else is rejected by the validator.

pub mod math;
pub mod methods;

use serde_json::Value;

use super::coerce::{number_value, to_js_string, to_number, truthy};
use crate::error::{Error, ErrorCode, Result};

/* ===================== Whitelist ===================== */

pub const GLOBAL_FUNCTIONS: &[&str] = &[
    "String",
    "Number",
    "Boolean",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
];

pub const NAMESPACES: &[(&str, &[&str])] = &[
    (
        "Math",
        &[
            "abs", "ceil", "floor", "round", "max", "min", "pow", "sqrt", "sign", "trunc",
        ],
    ),
    ("JSON", &["stringify", "parse"]),
    ("Object", &["keys", "values"]),
    ("Array", &["isArray"]),
];

pub const VALUE_METHODS: &[&str] = &[
    "toUpperCase",
    "toLowerCase",
    "trim",
    "includes",
    "startsWith",
    "endsWith",
    "indexOf",
    "slice",
    "split",
    "join",
    "toFixed",
    "toString",
    "concat",
    "replace",
];

pub fn is_global_function(name: &str) -> bool {
    GLOBAL_FUNCTIONS.contains(&name)
}

pub fn is_namespace(name: &str) -> bool {
    NAMESPACES.iter().any(|(ns, _)| *ns == name)
}

pub fn is_namespaced_function(namespace: &str, name: &str) -> bool {
    NAMESPACES
        .iter()
        .any(|(ns, fns)| *ns == namespace && fns.contains(&name))
}

pub fn is_value_method(name: &str) -> bool {
    VALUE_METHODS.contains(&name)
}

/* ===================== Dispatch ===================== */

static NULL: Value = Value::Null;

/// Positional argument, `null` when absent
pub(crate) fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&NULL)
}

pub(crate) fn evaluation_error(message: impl Into<String>) -> Error {
    Error::expression(ErrorCode::ExpressionEvaluationError, message)
}

fn not_whitelisted_math(name: &str) -> Error {
    not_whitelisted(&format!("Math.{}", name))
}

pub(crate) fn not_whitelisted(name: &str) -> Error {
    Error::expression(
        ErrorCode::ExpressionFunctionNotWhitelisted,
        format!("Function '{}' is not whitelisted", name),
    )
    .with_metadata("function", name)
}

/// Call a bare global function
pub fn call_global(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "String" => Ok(Value::String(match args.first() {
            Some(v) => to_js_string(v),
            None => String::new(),
        })),
        "Number" => Ok(match args.first() {
            Some(v) => number_value(to_number(v)),
            None => Value::from(0),
        }),
        "Boolean" => Ok(Value::Bool(truthy(arg(args, 0)))),
        "parseInt" => Ok(number_value(parse_int(arg(args, 0), arg(args, 1)))),
        "parseFloat" => Ok(number_value(parse_float(&to_js_string(arg(args, 0))))),
        "isNaN" => Ok(Value::Bool(to_number(arg(args, 0)).is_nan())),
        "isFinite" => Ok(Value::Bool(to_number(arg(args, 0)).is_finite())),
        other => Err(not_whitelisted(other)),
    }
}

/// Call `namespace.name(args)`
pub fn call_namespaced(namespace: &str, name: &str, args: &[Value]) -> Result<Value> {
    match namespace {
        "Math" => math::call(name, args),
        "JSON" => match name {
            "stringify" => json_stringify(arg(args, 0), arg(args, 2)),
            "parse" => {
                let source = to_js_string(arg(args, 0));
                serde_json::from_str(&source)
                    .map_err(|e| evaluation_error(format!("JSON.parse failed: {}", e)))
            }
            other => Err(not_whitelisted(&format!("JSON.{}", other))),
        },
        "Object" => match (name, arg(args, 0)) {
            ("keys", Value::Object(map)) => Ok(Value::Array(
                map.keys().cloned().map(Value::String).collect(),
            )),
            ("keys", Value::Array(items)) => Ok(Value::Array(
                (0..items.len()).map(|i| Value::String(i.to_string())).collect(),
            )),
            ("values", Value::Object(map)) => Ok(Value::Array(map.values().cloned().collect())),
            ("values", Value::Array(items)) => Ok(Value::Array(items.clone())),
            ("keys", _) | ("values", _) => Ok(Value::Array(Vec::new())),
            (other, _) => Err(not_whitelisted(&format!("Object.{}", other))),
        },
        "Array" => match name {
            "isArray" => Ok(Value::Bool(arg(args, 0).is_array())),
            other => Err(not_whitelisted(&format!("Array.{}", other))),
        },
        other => Err(not_whitelisted(&format!("{}.{}", other, name))),
    }
}

fn json_stringify(value: &Value, indent: &Value) -> Result<Value> {
    let pretty = to_number(indent) > 0.0;
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered
        .map(Value::String)
        .map_err(|e| evaluation_error(format!("JSON.stringify failed: {}", e)))
}

/* ===================== Number Parsing ===================== */

fn parse_int(input: &Value, radix: &Value) -> f64 {
    let text = to_js_string(input);
    let mut s = text.trim_start();
    let mut sign = 1.0;
    if let Some(rest) = s.strip_prefix('-') {
        sign = -1.0;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    let mut radix = match radix {
        Value::Null => 0,
        other => to_number(other) as u32,
    };
    if radix == 0 || radix == 16 {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }

    let digits: String = s.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * radix as f64 + d as f64)
        * sign
}

/// Longest numeric prefix, `NaN` when there is none
fn parse_float(input: &str) -> f64 {
    let s = input.trim_start();
    if s.starts_with("Infinity") || s.starts_with("+Infinity") {
        return f64::INFINITY;
    }
    if s.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }

    let bytes = s.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let mut valid_end = 0;

    while end < bytes.len() {
        let b = bytes[end];
        match b {
            b'0'..=b'9' => {
                seen_digit = true;
                valid_end = end + 1;
            }
            b'+' | b'-' if end == 0 => {}
            b'+' | b'-' if seen_exp && matches!(bytes[end - 1], b'e' | b'E') => {}
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exp => seen_exp = true,
            _ => break,
        }
        end += 1;
    }

    if !seen_digit {
        return f64::NAN;
    }
    s[..valid_end].parse::<f64>().unwrap_or(f64::NAN)
}
