//! Tree-walking interpreter for validated expressions
//!
//! Every node costs one step; the step budget and wall-clock deadline come
//! from [`ExpressionOptions`]. Identifier and property reads funnel through
//! [`check_access`] so the denylist applies no matter how a name is reached.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::time::Instant;

use super::ast::{BinaryOp, Expr, LogicalOp, UnaryOp};
use super::builtins::{
    self, call_global, call_namespaced, is_global_function, is_namespace, is_value_method,
    methods::call_method,
};
use super::coerce::{
    add, compare, format_number, loose_equals, number_value, strict_equals, to_js_string,
    to_number, truthy, type_of,
};
use super::validator::is_host_global;
use super::{ExpressionOptions, Resolver};
use crate::error::{Error, ErrorCode, Result};
use crate::path::{is_dangerous_property, PathSegment};

/* ===================== Safe Access ===================== */

/// The one gate every name read passes through.
///
/// `root` names are identifiers looked up in the context; the rest are
/// property keys (static or computed).
pub(crate) fn check_access(name: &str, root: bool, options: &ExpressionOptions) -> Result<()> {
    if is_dangerous_property(name) {
        return Err(Error::expression(
            ErrorCode::ExpressionUnsafeAccess,
            format!("Access to '{}' is not allowed", name),
        )
        .with_metadata("property", name));
    }
    if root && !options.allow_globals && is_host_global(name) {
        return Err(Error::expression(
            ErrorCode::ExpressionUnsafeAccess,
            format!("Access to global '{}' is not allowed", name),
        )
        .with_metadata("property", name));
    }
    Ok(())
}

/* ===================== Value Projection ===================== */

fn child<'v>(value: &'v Value, segment: &PathSegment) -> Option<&'v Value> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Key(k)) => map.get(k),
        (Value::Object(map), PathSegment::Index(i)) => map.get(&i.to_string()),
        (Value::Array(items), PathSegment::Index(i)) => items.get(*i),
        (Value::Array(items), PathSegment::Key(k)) => items.get(k.parse::<usize>().ok()?),
        _ => None,
    }
}

/// Properties that are computed rather than stored (`length`, string indexing)
fn intrinsic(value: &Value, segment: &PathSegment) -> Value {
    match (value, segment) {
        (Value::Array(items), PathSegment::Key(k)) if k == "length" => Value::from(items.len()),
        (Value::String(s), PathSegment::Key(k)) if k == "length" => {
            Value::from(s.chars().count())
        }
        (Value::String(s), PathSegment::Index(i)) => s
            .chars()
            .nth(*i)
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null),
        (Value::String(_), PathSegment::Key(k)) => match k.parse::<usize>() {
            Ok(i) => intrinsic(value, &PathSegment::Index(i)),
            Err(_) => Value::Null,
        },
        _ => Value::Null,
    }
}

/// Read `segments` below `root`; missing links yield `null`
pub(crate) fn project(root: &Value, segments: &[PathSegment]) -> Value {
    let mut current = root;
    for (i, segment) in segments.iter().enumerate() {
        match child(current, segment) {
            Some(next) => current = next,
            None => return project(&intrinsic(current, segment), &segments[i + 1..]),
        }
    }
    current.clone()
}

/// Read `name` from the resolver, then project `segments` without cloning the root
pub(crate) fn read_path(resolver: &dyn Resolver, name: &str, segments: &[PathSegment]) -> Value {
    let mut out = Value::Null;
    resolver.visit(name, &mut |root| {
        if let Some(root) = root {
            out = project(root, segments);
        }
    });
    out
}

/// Identifier root plus literal keys of a member chain (`a.b[0]['c']`)
pub(crate) fn static_path(expr: &Expr) -> Option<(&str, Vec<PathSegment>)> {
    match expr {
        Expr::Ident { name, .. } => Some((name.as_str(), Vec::new())),
        Expr::Member {
            object, property, ..
        } => {
            let (root, mut segments) = static_path(object)?;
            segments.push(PathSegment::Key(property.clone()));
            Some((root, segments))
        }
        Expr::Index { object, index, .. } => {
            let segment = match index.as_ref() {
                Expr::LitStr { v, .. } => PathSegment::Key(v.clone()),
                Expr::LitNum { v, .. } if *v >= 0.0 && v.fract() == 0.0 => {
                    PathSegment::Index(*v as usize)
                }
                _ => return None,
            };
            let (root, mut segments) = static_path(object)?;
            segments.push(segment);
            Some((root, segments))
        }
        _ => None,
    }
}

/// True when some link of a member/call chain is `?.`
fn chain_is_optional(expr: &Expr) -> bool {
    match expr {
        Expr::Member {
            object, optional, ..
        }
        | Expr::Index {
            object, optional, ..
        } => *optional || chain_is_optional(object),
        Expr::Call { callee, .. } => chain_is_optional(callee),
        _ => false,
    }
}

/// Convert a computed key into a path segment
fn property_key(value: &Value, options: &ExpressionOptions) -> Result<PathSegment> {
    match value {
        Value::Number(n) => {
            let n = n.as_f64().unwrap_or(f64::NAN);
            if n >= 0.0 && n.fract() == 0.0 {
                Ok(PathSegment::Index(n as usize))
            } else {
                Ok(PathSegment::Key(format_number(n)))
            }
        }
        other => {
            let key = to_js_string(other);
            check_access(&key, false, options)?;
            Ok(PathSegment::Key(key))
        }
    }
}

fn member_of(value: &Value, segment: &PathSegment) -> Value {
    project(value, std::slice::from_ref(segment))
}

/* ===================== Evaluator ===================== */

pub struct Evaluator<'a> {
    resolver: &'a dyn Resolver,
    options: &'a ExpressionOptions,
    steps: usize,
    deadline: Instant,
}

impl<'a> Evaluator<'a> {
    pub fn new(resolver: &'a dyn Resolver, options: &'a ExpressionOptions) -> Self {
        Self {
            resolver,
            options,
            steps: 0,
            deadline: Instant::now() + options.timeout(),
        }
    }

    /// Steps consumed so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    fn tick(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.options.max_steps {
            return Err(Error::expression(
                ErrorCode::ExpressionMaxStepsExceeded,
                format!(
                    "Expression exceeded the maximum of {} evaluation steps",
                    self.options.max_steps
                ),
            )
            .with_metadata("max_steps", self.options.max_steps));
        }
        if Instant::now() >= self.deadline {
            return Err(Error::expression(
                ErrorCode::ExpressionTimeout,
                format!(
                    "Expression evaluation exceeded {}ms",
                    self.options.timeout_ms
                ),
            )
            .with_metadata("timeout_ms", self.options.timeout_ms));
        }
        Ok(())
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        self.tick()?;
        match expr {
            Expr::LitBool { v, .. } => Ok(Value::Bool(*v)),
            Expr::LitNum { v, .. } => Ok(number_value(*v)),
            Expr::LitStr { v, .. } => Ok(Value::String(v.clone())),
            Expr::LitNull { .. } => Ok(Value::Null),

            Expr::LitList { elements, .. } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.evaluate(element)?);
                }
                Ok(Value::Array(items))
            }

            Expr::LitObj { properties, .. } => {
                let mut map = Map::new();
                for (key, value) in properties {
                    check_access(key, false, self.options)?;
                    map.insert(key.clone(), self.evaluate(value)?);
                }
                Ok(Value::Object(map))
            }

            Expr::Ident { name, .. } => {
                check_access(name, true, self.options)?;
                Ok(read_path(self.resolver, name, &[]))
            }

            Expr::Member {
                object, property, ..
            } => {
                if let Some(value) = self.read_static(expr)? {
                    return Ok(value);
                }
                let target = self.evaluate(object)?;
                check_access(property, false, self.options)?;
                Ok(member_of(&target, &PathSegment::Key(property.clone())))
            }

            Expr::Index { object, index, .. } => {
                if let Some(value) = self.read_static(expr)? {
                    return Ok(value);
                }
                let target = self.evaluate(object)?;
                let key = self.evaluate(index)?;
                let segment = property_key(&key, self.options)?;
                Ok(member_of(&target, &segment))
            }

            Expr::Call { callee, args, .. } => self.call(callee, args),

            Expr::Unary { op, operand, .. } => {
                let value = self.evaluate(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!truthy(&value)),
                    UnaryOp::Neg => number_value(-to_number(&value)),
                    UnaryOp::Plus => number_value(to_number(&value)),
                    UnaryOp::Typeof => Value::String(type_of(&value).to_string()),
                })
            }

            Expr::Binary {
                op, left, right, ..
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(binary(*op, &left, &right))
            }

            Expr::Logical {
                op, left, right, ..
            } => {
                let left = self.evaluate(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !truthy(&left),
                    LogicalOp::Or => truthy(&left),
                    LogicalOp::Nullish => !left.is_null(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Ternary {
                condition,
                consequent,
                alternate,
                ..
            } => {
                if truthy(&self.evaluate(condition)?) {
                    self.evaluate(consequent)
                } else {
                    self.evaluate(alternate)
                }
            }
        }
    }

    /// Fast path for literal-key chains: one resolver visit, no intermediate clones
    fn read_static(&self, expr: &Expr) -> Result<Option<Value>> {
        let Some((root, segments)) = static_path(expr) else {
            return Ok(None);
        };
        check_access(root, true, self.options)?;
        for segment in &segments {
            if let PathSegment::Key(key) = segment {
                check_access(key, false, self.options)?;
            }
        }
        Ok(Some(read_path(self.resolver, root, &segments)))
    }

    fn evaluate_args(&mut self, args: &[Expr]) -> Result<Vec<Value>> {
        args.iter().map(|arg| self.evaluate(arg)).collect()
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value> {
        match callee {
            Expr::Ident { name, .. } if is_global_function(name) => {
                let args = self.evaluate_args(args)?;
                call_global(name, &args)
            }
            Expr::Member {
                object, property, ..
            } => {
                if let Expr::Ident { name, .. } = object.as_ref() {
                    if is_namespace(name) {
                        let args = self.evaluate_args(args)?;
                        return call_namespaced(name, property, &args);
                    }
                }
                if !is_value_method(property) {
                    return Err(builtins::not_whitelisted(&format!(".{}", property)));
                }
                let receiver = self.evaluate(object)?;
                if receiver.is_null() && chain_is_optional(callee) {
                    return Ok(Value::Null);
                }
                let args = self.evaluate_args(args)?;
                call_method(&receiver, property, &args)
            }
            Expr::Ident { name, .. } => Err(builtins::not_whitelisted(name)),
            other => Err(builtins::not_whitelisted(&format!("<{}>", other.kind()))),
        }
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    let numeric = |f: fn(f64, f64) -> f64| number_value(f(to_number(left), to_number(right)));
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => numeric(|a, b| a - b),
        BinaryOp::Mul => numeric(|a, b| a * b),
        BinaryOp::Div => numeric(|a, b| a / b),
        BinaryOp::Mod => numeric(|a, b| a % b),
        BinaryOp::Eq => Value::Bool(loose_equals(left, right)),
        BinaryOp::Ne => Value::Bool(!loose_equals(left, right)),
        BinaryOp::StrictEq => Value::Bool(strict_equals(left, right)),
        BinaryOp::StrictNe => Value::Bool(!strict_equals(left, right)),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::Lte => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::Gte => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
    }
}

/// Interpret `expr` against `resolver` with a fresh budget
pub fn interpret(expr: &Expr, resolver: &dyn Resolver, options: &ExpressionOptions) -> Result<Value> {
    Evaluator::new(resolver, options).evaluate(expr)
}
