//! Direct compilation of simple expressions
//!
//! Literals, identifiers and literal-key member chains (`user.items[0].name`)
//! become closures that do a single path read. Everything else is left to
//! the interpreter.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use super::ast::Expr;
use super::coerce::number_value;
use super::evaluator::{read_path, static_path};
use super::validator::is_host_global;
use super::Resolver;
use crate::path::{is_dangerous_property, PathSegment};

pub type CompiledFn = Arc<dyn Fn(&dyn Resolver) -> Value + Send + Sync>;

#[derive(Clone)]
pub enum Compiled {
    Direct(CompiledFn),
    /// Known not to compile; use the interpreter
    NotCompilable,
}

impl Compiled {
    pub fn is_direct(&self) -> bool {
        matches!(self, Compiled::Direct(_))
    }

    /// Run the closure, `None` when not compilable
    pub fn call(&self, resolver: &dyn Resolver) -> Option<Value> {
        match self {
            Compiled::Direct(f) => Some(f(resolver)),
            Compiled::NotCompilable => None,
        }
    }
}

impl fmt::Debug for Compiled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compiled::Direct(_) => f.write_str("Compiled::Direct(..)"),
            Compiled::NotCompilable => f.write_str("Compiled::NotCompilable"),
        }
    }
}

fn constant(value: Value) -> Compiled {
    Compiled::Direct(Arc::new(move |_: &dyn Resolver| value.clone()))
}

/// Compile `expr` when it is a literal or a safe literal-key path
pub fn compile(expr: &Expr) -> Compiled {
    match expr {
        Expr::LitBool { v, .. } => constant(Value::Bool(*v)),
        Expr::LitNum { v, .. } => constant(number_value(*v)),
        Expr::LitStr { v, .. } => constant(Value::String(v.clone())),
        Expr::LitNull { .. } => constant(Value::Null),
        Expr::Ident { .. } | Expr::Member { .. } | Expr::Index { .. } => {
            let Some((root, segments)) = static_path(expr) else {
                return Compiled::NotCompilable;
            };
            let unsafe_segment = segments
                .iter()
                .any(|s| matches!(s, PathSegment::Key(k) if is_dangerous_property(k)));
            if is_host_global(root) || is_dangerous_property(root) || unsafe_segment {
                return Compiled::NotCompilable;
            }
            let root = root.to_string();
            Compiled::Direct(Arc::new(move |resolver: &dyn Resolver| {
                read_path(resolver, &root, &segments)
            }))
        }
        _ => Compiled::NotCompilable,
    }
}

/* ===================== Cache ===================== */

/// Compiled closures keyed by expression source
#[derive(Default)]
pub struct CompiledCache {
    entries: Mutex<HashMap<String, Arc<Compiled>>>,
}

impl CompiledCache {
    pub fn get(&self, source: &str) -> Option<Arc<Compiled>> {
        self.entries.lock().get(source).cloned()
    }

    /// Cached entry for `source`, compiling on a miss (misses store `NotCompilable` too)
    pub fn get_or_compile(&self, source: &str, compile: impl FnOnce() -> Compiled) -> Arc<Compiled> {
        if let Some(hit) = self.get(source) {
            return hit;
        }
        let compiled = Arc::new(compile());
        trace!(expression = source, direct = compiled.is_direct(), "compiled expression");
        self.entries
            .lock()
            .entry(source.to_string())
            .or_insert(compiled)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
