//! `{{ expr }}` markers inside schema strings
//!
//! - `"{{ count }}"` evaluates to the raw value of `count`
//! - `"Total: {{ count }} items"` renders to a string
//! - `"plain"` is a literal
//!
//! An unterminated `{{` is plain text.

use serde_json::{Map, Value};

use super::coerce::to_display_string;
use super::{ExpressionEngine, ExpressionOptions, Resolver};
use crate::error::Result;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    /// Trimmed expression source between markers
    Expression(&'a str),
}

/// Split a template into text and expression segments
pub fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find(OPEN) {
        let Some(len) = rest[start + OPEN.len()..].find(CLOSE) else {
            break;
        };
        if start > 0 {
            out.push(Segment::Text(&rest[..start]));
        }
        let inner = &rest[start + OPEN.len()..start + OPEN.len() + len];
        out.push(Segment::Expression(inner.trim()));
        rest = &rest[start + OPEN.len() + len + CLOSE.len()..];
    }
    if !rest.is_empty() {
        out.push(Segment::Text(rest));
    }
    out
}

pub fn has_markers(s: &str) -> bool {
    segments(s)
        .iter()
        .any(|segment| matches!(segment, Segment::Expression(_)))
}

/// Every expression embedded in `s`, in order
pub fn extract_expressions(s: &str) -> Vec<&str> {
    segments(s)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Expression(e) => Some(e),
            Segment::Text(_) => None,
        })
        .collect()
}

/// The expression when `s` is exactly one marker (surrounding whitespace allowed)
pub fn single_expression(s: &str) -> Option<&str> {
    match segments(s.trim()).as_slice() {
        [Segment::Expression(e)] => Some(*e),
        _ => None,
    }
}

/// `"{{ a.b }}"` -> `"a.b"`; anything else is returned trimmed
pub fn strip_markers(s: &str) -> &str {
    single_expression(s).unwrap_or_else(|| s.trim())
}

impl ExpressionEngine {
    /// Evaluate a template string
    pub fn interpolate(
        &self,
        template: &str,
        resolver: &dyn Resolver,
        options: &ExpressionOptions,
    ) -> Result<Value> {
        if let Some(expression) = single_expression(template) {
            return self.evaluate(expression, resolver, options);
        }
        let parts = segments(template);
        if !parts.iter().any(|p| matches!(p, Segment::Expression(_))) {
            return Ok(Value::String(template.to_string()));
        }

        let mut out = String::new();
        for part in parts {
            match part {
                Segment::Text(text) => out.push_str(text),
                Segment::Expression(expression) => {
                    let value = self.evaluate(expression, resolver, options)?;
                    out.push_str(&to_display_string(&value));
                }
            }
        }
        Ok(Value::String(out))
    }

    /// Interpolate every string inside `value`, recursively
    pub fn resolve_value(
        &self,
        value: &Value,
        resolver: &dyn Resolver,
        options: &ExpressionOptions,
    ) -> Result<Value> {
        match value {
            Value::String(s) => self.interpolate(s, resolver, options),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_value(item, resolver, options))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, item) in map {
                    out.insert(key.clone(), self.resolve_value(item, resolver, options)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }
}
