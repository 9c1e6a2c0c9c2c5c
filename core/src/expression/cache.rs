//! Expression result cache
//!
//! Results are kept per resolving scope until a write touches one of their
//! dependency paths. A write to `items.3.done` invalidates entries depending
//! on `items`, `items.*` or `items.3.done`; array actions additionally
//! invalidate the wildcard `items.*`.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

use crate::path::paths_intersect;

/// Identity of the scope a result was computed against
pub type ScopeId = u64;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub cached_at: Instant,
    pub dependencies: Arc<BTreeSet<String>>,
}

#[derive(Debug, Default)]
pub struct ExpressionCache {
    scopes: Mutex<HashMap<ScopeId, HashMap<String, CacheEntry>>>,
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, scope: ScopeId, expression: &str) -> Option<Value> {
        let scopes = self.scopes.lock();
        match scopes.get(&scope).and_then(|entries| entries.get(expression)) {
            Some(entry) => {
                trace!(scope, expression, "expression cache hit");
                Some(entry.value.clone())
            }
            None => {
                trace!(scope, expression, "expression cache miss");
                None
            }
        }
    }

    pub fn entry(&self, scope: ScopeId, expression: &str) -> Option<CacheEntry> {
        self.scopes
            .lock()
            .get(&scope)
            .and_then(|entries| entries.get(expression))
            .cloned()
    }

    pub fn contains(&self, scope: ScopeId, expression: &str) -> bool {
        self.entry(scope, expression).is_some()
    }

    pub fn insert(
        &self,
        scope: ScopeId,
        expression: &str,
        value: Value,
        dependencies: Arc<BTreeSet<String>>,
    ) {
        self.scopes.lock().entry(scope).or_default().insert(
            expression.to_string(),
            CacheEntry {
                value,
                cached_at: Instant::now(),
                dependencies,
            },
        );
    }

    /// Remove every entry with a dependency intersecting `path`; returns how many
    pub fn invalidate(&self, path: &str) -> usize {
        let mut scopes = self.scopes.lock();
        let mut removed = 0;
        for entries in scopes.values_mut() {
            let before = entries.len();
            entries.retain(|_, entry| {
                !entry
                    .dependencies
                    .iter()
                    .any(|dependency| paths_intersect(dependency, path))
            });
            removed += before - entries.len();
        }
        scopes.retain(|_, entries| !entries.is_empty());
        if removed > 0 {
            trace!(path, removed, "invalidated cached expressions");
        }
        removed
    }

    /// Forget everything cached for `scope`
    pub fn remove_scope(&self, scope: ScopeId) {
        self.scopes.lock().remove(&scope);
    }

    pub fn clear(&self) {
        self.scopes.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.scopes.lock().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
