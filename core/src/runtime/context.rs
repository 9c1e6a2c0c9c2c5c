//! Runtime context
//!
//! A context is a stack of scopes. The root scope holds application state;
//! loop iterations and event handlers push child scopes that read through to
//! their parent and write locally. Every scope of one tree shares a
//! [`Session`] (caches and the loop-context pool) and the host hooks.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::pool::LoopContextPool;
use crate::error::{Error, ErrorCode, Result};
use crate::expression::{ExpressionEngine, ExpressionOptions, Resolver, ScopeId};
use crate::path::{
    get_path_value, get_path_value_mut, is_dangerous_property, set_path_value, wildcard_of,
    PathCache, PathSegment,
};

/// Keys starting with this prefix belong to the runtime
pub const RESERVED_PREFIX: &str = "$";

/// Reserved keys that scopes may still bind
pub const WRITABLE_RESERVED_KEYS: &[&str] = &[
    "$event",
    "$item",
    "$index",
    "$self",
    "$parent",
    "$siblings",
    "$children",
];

pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX)
}

fn check_writable_key(key: &str) -> Result<()> {
    if is_dangerous_property(key)
        || (is_reserved_key(key) && !WRITABLE_RESERVED_KEYS.contains(&key))
    {
        return Err(Error::expression(
            ErrorCode::ExpressionUnsafeAccess,
            format!("Cannot write reserved key '{}'", key),
        )
        .with_metadata("key", key));
    }
    Ok(())
}

/* ===================== Hooks ===================== */

pub type MethodFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// Host method callable from `call` actions
pub type MethodHandler = Arc<dyn Fn(Value, RuntimeContext) -> MethodFuture + Send + Sync>;

pub type EmitFn = Arc<dyn Fn(&str, Value) + Send + Sync>;

/// Invoked after a write lands in the root state, with the written path and value
pub type StateChangeFn = Arc<dyn Fn(&str, &Value) + Send + Sync>;

pub type NavigateFn = Arc<dyn Fn(Value) -> anyhow::Result<()> + Send + Sync>;

/// Wrap an async closure as a [`MethodHandler`]
pub fn method<F, Fut>(f: F) -> MethodHandler
where
    F: Fn(Value, RuntimeContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(move |params, ctx| Box::pin(f(params, ctx)))
}

/* ===================== Session ===================== */

/// Caches and pools shared by every scope created from one root context
pub struct Session {
    engine: ExpressionEngine,
    paths: PathCache,
    loop_pool: LoopContextPool,
}

impl Session {
    pub fn new(loop_pool_capacity: usize, path_cache_capacity: usize) -> Self {
        Self {
            engine: ExpressionEngine::new(),
            paths: PathCache::new(path_cache_capacity),
            loop_pool: LoopContextPool::new(loop_pool_capacity),
        }
    }

    pub fn engine(&self) -> &ExpressionEngine {
        &self.engine
    }

    pub fn paths(&self) -> &PathCache {
        &self.paths
    }

    pub fn loop_pool(&self) -> &LoopContextPool {
        &self.loop_pool
    }

    /// Drop every cached AST, compiled closure, result, path and pooled scope
    pub fn clear_caches(&self) {
        self.engine.clear();
        self.paths.clear();
        self.loop_pool.clear();
        debug!("session caches cleared");
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(LoopContextPool::DEFAULT_CAPACITY, 1024)
    }
}

/* ===================== Options ===================== */

#[derive(Clone)]
pub struct ContextOptions {
    pub emit: Option<EmitFn>,
    pub methods: HashMap<String, MethodHandler>,
    pub on_state_change: Option<StateChangeFn>,
    pub navigator: Option<NavigateFn>,
    pub expression: ExpressionOptions,
    /// Reuse an existing session instead of creating one
    pub session: Option<Arc<Session>>,
    pub loop_pool_capacity: usize,
    pub path_cache_capacity: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            emit: None,
            methods: HashMap::new(),
            on_state_change: None,
            navigator: None,
            expression: ExpressionOptions::default(),
            session: None,
            loop_pool_capacity: LoopContextPool::DEFAULT_CAPACITY,
            path_cache_capacity: 1024,
        }
    }
}

impl ContextOptions {
    pub fn with_method(mut self, name: impl Into<String>, handler: MethodHandler) -> Self {
        self.methods.insert(name.into(), handler);
        self
    }

    pub fn with_emit(mut self, emit: impl Fn(&str, Value) + Send + Sync + 'static) -> Self {
        self.emit = Some(Arc::new(emit));
        self
    }

    pub fn with_state_change(
        mut self,
        hook: impl Fn(&str, &Value) + Send + Sync + 'static,
    ) -> Self {
        self.on_state_change = Some(Arc::new(hook));
        self
    }

    pub fn with_navigator(
        mut self,
        navigator: impl Fn(Value) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.navigator = Some(Arc::new(navigator));
        self
    }
}

impl fmt::Debug for ContextOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&String> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("ContextOptions")
            .field("emit", &self.emit.is_some())
            .field("methods", &methods)
            .field("on_state_change", &self.on_state_change.is_some())
            .field("navigator", &self.navigator.is_some())
            .field("expression", &self.expression)
            .field("loop_pool_capacity", &self.loop_pool_capacity)
            .field("path_cache_capacity", &self.path_cache_capacity)
            .finish()
    }
}

/* ===================== Context ===================== */

/// Ids of context trees; never reused, so stale cache entries cannot match
static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

struct Shared {
    tree_id: ScopeId,
    session: Arc<Session>,
    methods: Mutex<HashMap<String, MethodHandler>>,
    emit: Option<EmitFn>,
    on_state_change: Option<StateChangeFn>,
    navigator: Option<NavigateFn>,
    expression: ExpressionOptions,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.session.engine().results().remove_scope(self.tree_id);
    }
}

struct Scope {
    vars: Mutex<Map<String, Value>>,
    parent: Option<RuntimeContext>,
    shared: Arc<Shared>,
}

/// Handle to one scope; cloning shares the scope
#[derive(Clone)]
pub struct RuntimeContext(Arc<Scope>);

/// Build a root context; `null` starts from empty state
pub fn create_runtime_context(initial_state: Value, options: ContextOptions) -> Result<RuntimeContext> {
    RuntimeContext::new(initial_state, options)
}

impl RuntimeContext {
    pub fn new(initial_state: Value, options: ContextOptions) -> Result<Self> {
        let vars = match initial_state {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(Error::action(
                    ErrorCode::ActionInvalidParam,
                    format!(
                        "Initial state must be an object, got {}",
                        crate::path::type_name(&other)
                    ),
                ))
            }
        };

        let session = options.session.unwrap_or_else(|| {
            Arc::new(Session::new(
                options.loop_pool_capacity,
                options.path_cache_capacity,
            ))
        });

        Ok(Self(Arc::new(Scope {
            vars: Mutex::new(vars),
            parent: None,
            shared: Arc::new(Shared {
                tree_id: NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed),
                session,
                methods: Mutex::new(options.methods),
                emit: options.emit,
                on_state_change: options.on_state_change,
                navigator: options.navigator,
                expression: options.expression,
            }),
        })))
    }

    /* ===================== Scopes ===================== */

    /// An empty scope delegating reads to `self`
    pub fn child(&self) -> RuntimeContext {
        self.child_with(Map::new())
    }

    pub(crate) fn child_with(&self, vars: Map<String, Value>) -> RuntimeContext {
        RuntimeContext(Arc::new(Scope {
            vars: Mutex::new(vars),
            parent: Some(self.clone()),
            shared: self.0.shared.clone(),
        }))
    }

    /// A scope for an event handler with `$event` bound
    pub fn event_scope(&self, event: Value) -> RuntimeContext {
        let mut vars = Map::new();
        vars.insert("$event".to_string(), event);
        self.child_with(vars)
    }

    pub fn parent(&self) -> Option<&RuntimeContext> {
        self.0.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.0.parent.is_none()
    }

    pub fn root(&self) -> RuntimeContext {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current.clone()
    }

    /// Nesting depth, 0 for the root
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self;
        while let Some(parent) = current.parent() {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Names bound directly in this scope
    pub fn local_keys(&self) -> Vec<String> {
        self.0.vars.lock().keys().cloned().collect()
    }

    /// Take this scope's bindings back, if no other handle to the scope exists
    pub(crate) fn into_vars(self) -> std::result::Result<Map<String, Value>, RuntimeContext> {
        match Arc::try_unwrap(self.0) {
            Ok(scope) => Ok(scope.vars.into_inner()),
            Err(scope) => Err(RuntimeContext(scope)),
        }
    }

    /* ===================== Reads ===================== */

    /// Value bound to `key` in this scope or the nearest ancestor
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut out = None;
        self.visit(key, &mut |value| out = value.cloned());
        out
    }

    /// Value at `path`; missing paths read as null
    pub fn get_path(&self, path: &str) -> Result<Value> {
        let segments = self.session().paths().parse(path)?;
        let Some((first, rest)) = segments.split_first() else {
            return Ok(Value::Null);
        };
        let mut out = Value::Null;
        self.visit(&first.to_string(), &mut |value| {
            if let Some(found) = value.and_then(|v| get_path_value(v, rest)) {
                out = found.clone();
            }
        });
        Ok(out)
    }

    /// Snapshot of the root state
    pub fn state(&self) -> Value {
        Value::Object(self.root().0.vars.lock().clone())
    }

    /* ===================== Writes ===================== */

    /// Bind `key` in this scope
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        check_writable_key(key)?;
        let hook_value = self.hook().map(|_| value.clone());
        self.0.vars.lock().insert(key.to_string(), value);
        self.engine().invalidate(key);
        trace!(key, depth = self.depth(), "scope binding set");
        if self.is_root() {
            self.notify(key, hook_value);
        }
        Ok(())
    }

    /// Write `value` at `path` in the scope that owns the path's first key
    pub fn set_path(&self, path: &str, value: Value) -> Result<()> {
        let segments = self.session().paths().parse(path)?;
        let first = first_key(&segments, path)?;
        check_writable_key(&first)?;

        let owner = self.owner_of(&first);
        let hook_value = owner.hook().filter(|_| owner.is_root()).map(|_| value.clone());
        {
            let mut vars = owner.0.vars.lock();
            let existed = vars.contains_key(&first);
            let slot = vars.entry(first.clone()).or_insert(Value::Null);
            if let Err(e) = set_path_value(slot, &segments[1..], value) {
                if !existed {
                    vars.remove(&first);
                }
                return Err(e.with_metadata("path", path));
            }
        }

        self.engine().invalidate(path);
        if owner.is_root() {
            owner.notify(path, hook_value);
        }
        Ok(())
    }

    /// Mutate the value at `path` in place.
    ///
    /// `f` receives `None` when the path does not exist. It runs under the
    /// owning scope's lock, so it must not touch the context. Cached results
    /// depending on the path or anything below it are invalidated afterwards.
    pub fn update_path<R>(
        &self,
        path: &str,
        f: impl FnOnce(Option<&mut Value>) -> Result<R>,
    ) -> Result<R> {
        let segments = self.session().paths().parse(path)?;
        let first = first_key(&segments, path)?;
        check_writable_key(&first)?;

        let owner = self.owner_of(&first);
        let (out, after) = {
            let mut vars = owner.0.vars.lock();
            let target = vars
                .get_mut(&first)
                .and_then(|slot| get_path_value_mut(slot, &segments[1..]));
            let out = f(target)?;
            let after = match owner.hook() {
                Some(_) if owner.is_root() => vars
                    .get(&first)
                    .and_then(|slot| get_path_value(slot, &segments[1..]))
                    .cloned(),
                _ => None,
            };
            (out, after)
        };

        let engine = self.engine();
        engine.invalidate(path);
        engine.invalidate(&wildcard_of(path));
        if owner.is_root() {
            owner.notify(path, after);
        }
        Ok(out)
    }

    /// The nearest scope binding `key`, or the root
    fn owner_of(&self, key: &str) -> RuntimeContext {
        let mut current = self;
        loop {
            if current.0.vars.lock().contains_key(key) {
                return current.clone();
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return current.clone(),
            }
        }
    }

    fn hook(&self) -> Option<&StateChangeFn> {
        self.0.shared.on_state_change.as_ref()
    }

    fn notify(&self, path: &str, value: Option<Value>) {
        if let (Some(hook), Some(value)) = (self.hook(), value) {
            hook(path, &value);
        }
    }

    /* ===================== Host API ===================== */

    /// Fire an event through the host's emit callback
    pub fn emit(&self, event: &str, data: Value) {
        match &self.0.shared.emit {
            Some(emit) => emit(event, data),
            None => debug!(event, "no emit handler registered; event dropped"),
        }
    }

    pub fn method(&self, name: &str) -> Option<MethodHandler> {
        self.0.shared.methods.lock().get(name).cloned()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.0.shared.methods.lock().contains_key(name)
    }

    /// Register (or replace) a method for every scope of this tree
    pub fn register_method(&self, name: impl Into<String>, handler: MethodHandler) {
        self.0.shared.methods.lock().insert(name.into(), handler);
    }

    pub fn navigator(&self) -> Option<NavigateFn> {
        self.0.shared.navigator.clone()
    }

    pub fn options(&self) -> &ExpressionOptions {
        &self.0.shared.expression
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.0.shared.session
    }

    pub fn engine(&self) -> &ExpressionEngine {
        self.0.shared.session.engine()
    }

    /* ===================== Expressions ===================== */

    /// Evaluate an expression (markers optional) in this scope
    pub fn evaluate(&self, source: &str) -> Result<Value> {
        self.engine().evaluate(source, self, self.options())
    }

    pub fn interpolate(&self, template: &str) -> Result<Value> {
        self.engine().interpolate(template, self, self.options())
    }

    pub fn resolve_value(&self, value: &Value) -> Result<Value> {
        self.engine().resolve_value(value, self, self.options())
    }
}

fn first_key(segments: &[PathSegment], path: &str) -> Result<String> {
    match segments.first() {
        Some(PathSegment::Wildcard) | None => Err(Error::action(
            ErrorCode::ActionInvalidParam,
            format!("Invalid path '{}'", path),
        )),
        Some(segment) => Ok(segment.to_string()),
    }
}

impl Resolver for RuntimeContext {
    fn visit(&self, name: &str, f: &mut dyn FnMut(Option<&Value>)) {
        let mut current = self;
        loop {
            {
                let vars = current.0.vars.lock();
                if let Some(value) = vars.get(name) {
                    f(Some(value));
                    return;
                }
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return f(None),
            }
        }
    }

    /// Results are shared by every scope of one tree as long as the names
    /// they read resolve in the root; a child binding one of them opts out
    fn cache_scope(&self, roots: &BTreeSet<String>) -> Option<ScopeId> {
        let mut current = self;
        while let Some(parent) = current.parent() {
            let shadowed = {
                let vars = current.0.vars.lock();
                roots.iter().any(|root| vars.contains_key(root))
            };
            if shadowed {
                return None;
            }
            current = parent;
        }
        Some(self.0.shared.tree_id)
    }
}

impl fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("depth", &self.depth())
            .field("keys", &self.local_keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context(state: Value) -> RuntimeContext {
        RuntimeContext::new(state, ContextOptions::default()).unwrap()
    }

    #[test]
    fn test_initial_state_must_be_an_object() {
        assert!(RuntimeContext::new(json!(null), ContextOptions::default()).is_ok());
        let err = RuntimeContext::new(json!([1]), ContextOptions::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ActionInvalidParam);
    }

    #[test]
    fn test_child_reads_through_and_writes_locally() {
        let root = context(json!({"count": 1}));
        let child = root.child();
        assert_eq!(child.get("count"), Some(json!(1)));

        child.set("count", json!(2)).unwrap();
        assert_eq!(child.get("count"), Some(json!(2)));
        assert_eq!(root.get("count"), Some(json!(1)));
        assert_eq!(child.depth(), 1);
        assert!(child.root().is_root());
    }

    #[test]
    fn test_set_path_writes_to_owner_scope() {
        let root = context(json!({"user": {"name": "Ada"}}));
        let child = root.child_with(Map::from_iter([("item".to_string(), json!({"n": 1}))]));

        child.set_path("user.name", json!("Grace")).unwrap();
        child.set_path("item.n", json!(2)).unwrap();
        child.set_path("fresh.value", json!(true)).unwrap();

        assert_eq!(root.get_path("user.name").unwrap(), json!("Grace"));
        assert_eq!(child.get_path("item.n").unwrap(), json!(2));
        assert_eq!(root.get("item"), None);
        assert_eq!(root.get_path("fresh.value").unwrap(), json!(true));
    }

    #[test]
    fn test_get_path_missing_is_null() {
        let root = context(json!({"a": {"b": [1, 2]}}));
        assert_eq!(root.get_path("a.b[1]").unwrap(), json!(2));
        assert_eq!(root.get_path("a.c.d").unwrap(), json!(null));
        assert_eq!(root.get_path("nope").unwrap(), json!(null));
    }

    #[test]
    fn test_reserved_keys_are_guarded() {
        let root = context(json!({}));
        let err = root.set("$methods", json!({})).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ExpressionUnsafeAccess);
        assert!(root.set_path("$session.x", json!(1)).is_err());
        assert!(root.set("__proto__", json!({})).is_err());

        for key in WRITABLE_RESERVED_KEYS {
            root.set(key, json!(1)).unwrap();
        }
    }

    #[test]
    fn test_failed_write_leaves_no_binding() {
        let root = context(json!({}));
        assert!(root.set_path("fresh.constructor", json!(1)).is_err());
        assert_eq!(root.get("fresh"), None);
    }

    #[test]
    fn test_writes_invalidate_cached_results() {
        let root = context(json!({"count": 2}));
        assert_eq!(root.evaluate("{{ count * 2 }}").unwrap(), json!(4));
        root.set("count", json!(3)).unwrap();
        assert_eq!(root.evaluate("{{ count * 2 }}").unwrap(), json!(6));
        root.set_path("count", json!(4)).unwrap();
        assert_eq!(root.evaluate("{{ count * 2 }}").unwrap(), json!(8));
    }

    #[test]
    fn test_update_path_invalidates_wildcard() {
        let root = context(json!({"items": [1, 2]}));
        assert_eq!(root.evaluate("items.length").unwrap(), json!(2));
        root.update_path("items", |target| {
            if let Some(Value::Array(items)) = target {
                items.push(json!(3));
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(root.evaluate("items.length").unwrap(), json!(3));
    }

    #[test]
    fn test_state_change_hook_fires_for_root_writes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let options = ContextOptions::default().with_state_change(move |path, value| {
            assert_eq!(path, "user.name");
            assert_eq!(value, &json!("Grace"));
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let root = RuntimeContext::new(json!({"user": {}}), options).unwrap();

        root.child().set_path("user.name", json!("Grace")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Local bindings of child scopes are not state
        root.child().set("scratch", json!(1)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_scopes_do_not_share_results() {
        let root = context(json!({}));
        let first = root.event_scope(json!({"value": "a"}));
        let second = root.event_scope(json!({"value": "b"}));

        assert_eq!(first.evaluate("$event.value").unwrap(), json!("a"));
        assert_eq!(second.evaluate("$event.value").unwrap(), json!("b"));
        assert_eq!(first.evaluate("$event.value").unwrap(), json!("a"));
        assert_eq!(root.evaluate("$event.value").unwrap(), json!(null));
        assert!(root.engine().results().contains(root.0.shared.tree_id, "$event.value"));
    }

    #[test]
    fn test_shadowing_child_does_not_share_results() {
        let root = context(json!({"count": 1}));
        let child = root.child();
        child.set("count", json!(2)).unwrap();

        assert_eq!(child.evaluate("count").unwrap(), json!(2));
        assert_eq!(root.evaluate("count").unwrap(), json!(1));
        assert_eq!(child.evaluate("count * 10").unwrap(), json!(20));
        assert_eq!(root.evaluate("count * 10").unwrap(), json!(10));
        assert_eq!(child.evaluate("count").unwrap(), json!(2));

        // Names the child does not bind still share the root's results
        let plain = root.child();
        assert_eq!(plain.evaluate("count * 10").unwrap(), json!(10));
        assert_eq!(root.engine().results().len(), 2);
    }

    #[test]
    fn test_methods_are_shared_by_scopes() {
        let root = context(json!({}));
        let child = root.child();
        child.register_method("ping", method(|_, _| async { Ok(json!("pong")) }));
        assert!(root.has_method("ping"));
        let handler = root.method("ping").unwrap();
        let result = tokio_test::block_on(handler(Value::Null, root.clone())).unwrap();
        assert_eq!(result, json!("pong"));
    }

    #[test]
    fn test_emit_uses_callback() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let options = ContextOptions::default()
            .with_emit(move |event, data| sink.lock().push((event.to_string(), data)));
        let root = RuntimeContext::new(json!({}), options).unwrap();
        root.emit("saved", json!({"id": 1}));
        root.emit("closed", Value::Null);
        assert_eq!(
            *events.lock(),
            vec![
                ("saved".to_string(), json!({"id": 1})),
                ("closed".to_string(), Value::Null)
            ]
        );
    }

    #[test]
    fn test_shared_session() {
        let session = Arc::new(Session::default());
        let options = ContextOptions {
            session: Some(session.clone()),
            ..ContextOptions::default()
        };
        let a = RuntimeContext::new(json!({"x": 1}), options.clone()).unwrap();
        let b = RuntimeContext::new(json!({"x": 2}), options).unwrap();

        assert_eq!(a.evaluate("x").unwrap(), json!(1));
        assert_eq!(b.evaluate("x").unwrap(), json!(2));
        assert_eq!(a.evaluate("x + 1").unwrap(), json!(2));
        assert_eq!(b.evaluate("x + 1").unwrap(), json!(3));
        assert_eq!(a.evaluate("x").unwrap(), json!(1));
        assert_eq!(session.engine().results().len(), 4);

        // Writes in one tree leave the other tree's values intact
        b.set("x", json!(5)).unwrap();
        assert_eq!(b.evaluate("x").unwrap(), json!(5));
        assert_eq!(a.evaluate("x").unwrap(), json!(1));

        assert_eq!(session.engine().results().len(), 2);

        // Dropping a tree forgets its results
        drop(b);
        assert_eq!(session.engine().results().len(), 1);
        session.clear_caches();
        assert!(session.engine().results().is_empty());
    }
}
