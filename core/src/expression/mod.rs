//! Expression engine
//!
//! `{{ expr }}` sources go through one pipeline:
//!
//! 1. markers are stripped ([`interpolation::strip_markers`])
//! 2. the source is parsed once and memoized ([`ExpressionEngine::parse`])
//! 3. the AST is validated against the security rules ([`validator`])
//! 4. the result cache is consulted under the resolver's cache scope (when
//!    `cache_results` is on and [`Resolver::cache_scope`] allows it)
//! 5. a compiled closure runs if the AST is a simple path, otherwise the
//!    interpreter walks it ([`compiler`], [`evaluator`])
//! 6. the value is cached together with its dependency paths
//!    ([`dependencies`], [`cache`])

pub mod ast;
pub mod builtins;
pub mod cache;
pub mod coerce;
pub mod compiler;
pub mod dependencies;
pub mod evaluator;
pub mod interpolation;
pub mod parser;
pub mod validator;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::trace;

pub use ast::Expr;
pub use cache::{CacheEntry, ExpressionCache, ScopeId};
pub use compiler::{compile, Compiled, CompiledCache, CompiledFn};
pub use dependencies::{dependency_roots, extract_dependencies};
pub use evaluator::{interpret, Evaluator};
pub use interpolation::{extract_expressions, has_markers, strip_markers};
pub use parser::parse_expression;
pub use validator::{ValidationOptions, Validator, Violation};

use crate::error::Result;

/* ===================== Options ===================== */

/// Per-evaluation limits and switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionOptions {
    /// Allow `window`, `document`, `global`, `globalThis`, `self`
    pub allow_globals: bool,
    /// AST nodes one evaluation may visit
    pub max_steps: usize,
    /// Wall-clock budget of one evaluation
    pub timeout_ms: u64,
    pub max_nesting_depth: usize,
    /// Memoize results until a dependency path changes
    pub cache_results: bool,
}

impl Default for ExpressionOptions {
    fn default() -> Self {
        Self {
            allow_globals: false,
            max_steps: 10_000,
            timeout_ms: 100,
            max_nesting_depth: 50,
            cache_results: true,
        }
    }
}

impl ExpressionOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validation(&self) -> ValidationOptions {
        ValidationOptions {
            allow_globals: self.allow_globals,
            max_nesting_depth: self.max_nesting_depth,
        }
    }
}

/* ===================== Resolver ===================== */

/// Where identifiers are looked up.
///
/// `visit` lends the bound value to `f` instead of returning a clone, so
/// `items.length` never copies `items`.
pub trait Resolver {
    fn visit(&self, name: &str, f: &mut dyn FnMut(Option<&Value>));

    /// Scope under which results reading `roots` may be cached and reused.
    ///
    /// `None` disables the result cache for this evaluation. A resolver
    /// must return the same id only while `roots` resolve to the same
    /// bindings, invalidation aside.
    fn cache_scope(&self, roots: &BTreeSet<String>) -> Option<ScopeId> {
        let _ = roots;
        None
    }
}

impl Resolver for Map<String, Value> {
    fn visit(&self, name: &str, f: &mut dyn FnMut(Option<&Value>)) {
        f(self.get(name))
    }
}

/// A JSON object acts as a flat scope; anything else binds nothing
impl Resolver for Value {
    fn visit(&self, name: &str, f: &mut dyn FnMut(Option<&Value>)) {
        match self {
            Value::Object(map) => map.visit(name, f),
            _ => f(None),
        }
    }
}

/* ===================== Parsed Expressions ===================== */

/// A parsed expression shared between evaluations
#[derive(Debug)]
pub struct ParsedExpression {
    pub source: String,
    pub ast: Expr,
    /// Option sets this AST already passed validation under
    validated: Mutex<HashSet<ValidationOptions>>,
    dependencies: OnceLock<Arc<BTreeSet<String>>>,
    roots: OnceLock<BTreeSet<String>>,
}

impl ParsedExpression {
    fn new(source: &str, ast: Expr) -> Self {
        Self {
            source: source.to_string(),
            ast,
            validated: Mutex::new(HashSet::new()),
            dependencies: OnceLock::new(),
            roots: OnceLock::new(),
        }
    }

    /// State paths this expression may read (computed once)
    pub fn dependencies(&self) -> Arc<BTreeSet<String>> {
        self.dependencies
            .get_or_init(|| Arc::new(extract_dependencies(&self.ast)))
            .clone()
    }

    /// Top-level names among the dependencies
    pub fn roots(&self) -> &BTreeSet<String> {
        self.roots.get_or_init(|| dependency_roots(&self.dependencies()))
    }
}

/* ===================== Engine ===================== */

/// Parser, validator and caches for one session
pub struct ExpressionEngine {
    validator: Validator,
    asts: Mutex<HashMap<String, Arc<ParsedExpression>>>,
    compiled: CompiledCache,
    results: ExpressionCache,
}

impl ExpressionEngine {
    pub fn new() -> Self {
        Self {
            validator: Validator::new(),
            asts: Mutex::new(HashMap::new()),
            compiled: CompiledCache::default(),
            results: ExpressionCache::default(),
        }
    }

    /// Parse `source`, reusing the AST of an identical earlier source
    pub fn parse(&self, source: &str) -> Result<Arc<ParsedExpression>> {
        if let Some(hit) = self.asts.lock().get(source) {
            return Ok(hit.clone());
        }
        let ast = parse_expression(source)?;
        let parsed = Arc::new(ParsedExpression::new(source, ast));
        trace!(expression = source, "parsed expression");
        Ok(self
            .asts
            .lock()
            .entry(source.to_string())
            .or_insert(parsed)
            .clone())
    }

    /// Parse and validate; validation is remembered per option set
    pub fn prepare(&self, source: &str, options: &ExpressionOptions) -> Result<Arc<ParsedExpression>> {
        let source = strip_markers(source);
        let parsed = self.parse(source)?;
        let validation = options.validation();
        if !parsed.validated.lock().contains(&validation) {
            self.validator
                .check(&parsed.ast, &validation)
                .map_err(|e| e.with_expression(source))?;
            parsed.validated.lock().insert(validation);
        }
        Ok(parsed)
    }

    /// The compiled form of `source`; repeated calls return the same `Arc`
    pub fn compiled(&self, source: &str) -> Arc<Compiled> {
        let source = strip_markers(source);
        self.compiled.get_or_compile(source, || {
            match self.parse(source) {
                Ok(parsed)
                    if self
                        .validator
                        .validate(&parsed.ast, &ValidationOptions::default())
                        .is_empty() =>
                {
                    compile(&parsed.ast)
                }
                _ => Compiled::NotCompilable,
            }
        })
    }

    /// Evaluate `source` (with or without `{{ }}`) against `resolver`
    pub fn evaluate(
        &self,
        source: &str,
        resolver: &dyn Resolver,
        options: &ExpressionOptions,
    ) -> Result<Value> {
        let source = strip_markers(source);
        let parsed = self.prepare(source, options)?;

        let scope = if options.cache_results {
            resolver.cache_scope(parsed.roots())
        } else {
            None
        };
        if let Some(scope) = scope {
            if let Some(value) = self.results.get(scope, source) {
                return Ok(value);
            }
        }

        let value = match self.compiled(source).as_ref() {
            Compiled::Direct(f) => f(resolver),
            Compiled::NotCompilable => interpret(&parsed.ast, resolver, options)
                .map_err(|e| e.with_expression(source))?,
        };

        if let Some(scope) = scope {
            self.results
                .insert(scope, source, value.clone(), parsed.dependencies());
        }
        Ok(value)
    }

    /// Evaluate through the interpreter only, bypassing compiled closures and the result cache
    pub fn interpret(
        &self,
        source: &str,
        resolver: &dyn Resolver,
        options: &ExpressionOptions,
    ) -> Result<Value> {
        let parsed = self.prepare(source, options)?;
        interpret(&parsed.ast, resolver, options).map_err(|e| e.with_expression(&parsed.source))
    }

    /// Dependency paths of a validated expression
    pub fn dependencies(
        &self,
        source: &str,
        options: &ExpressionOptions,
    ) -> Result<Arc<BTreeSet<String>>> {
        Ok(self.prepare(source, options)?.dependencies())
    }

    /// Drop cached results that depend on `path`
    pub fn invalidate(&self, path: &str) -> usize {
        self.results.invalidate(path)
    }

    pub fn results(&self) -> &ExpressionCache {
        &self.results
    }

    /// Drop every cached result
    pub fn clear_cache(&self) {
        self.results.clear();
    }

    /// Forget compiled closures (e.g. after a hot reload)
    pub fn clear_compiled(&self) {
        self.compiled.clear();
    }

    /// Drop every cache, parsed ASTs included
    pub fn clear(&self) {
        self.asts.lock().clear();
        self.compiled.clear();
        self.results.clear();
    }
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new()
    }
}
