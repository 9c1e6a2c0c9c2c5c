//! Loop context pool
//!
//! Every loop iteration needs a fresh scope holding the item and index.
//! Binding maps are recycled through a bounded LIFO stack; maps released
//! while the stack is full are dropped.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{trace, warn};

use super::context::RuntimeContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub acquired: usize,
    pub released: usize,
    /// Acquisitions served from the stack
    pub reused: usize,
    /// Releases that did not return a map to the stack
    pub discarded: usize,
    pub available: usize,
}

#[derive(Default)]
struct PoolInner {
    free: Vec<Map<String, Value>>,
    stats: PoolStats,
}

pub struct LoopContextPool {
    inner: Mutex<PoolInner>,
    capacity: usize,
}

/// Names bound by one loop iteration
#[derive(Debug, Clone, Copy)]
pub struct LoopBinding<'a> {
    pub var: &'a str,
    pub index_var: &'a str,
}

impl Default for LoopBinding<'_> {
    fn default() -> Self {
        Self {
            var: "item",
            index_var: "index",
        }
    }
}

impl LoopContextPool {
    pub const DEFAULT_CAPACITY: usize = 10;

    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner::default()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock();
        PoolStats {
            available: inner.free.len(),
            ..inner.stats
        }
    }

    fn acquire(&self) -> Map<String, Value> {
        let mut inner = self.inner.lock();
        inner.stats.acquired += 1;
        match inner.free.pop() {
            Some(map) => {
                inner.stats.reused += 1;
                map
            }
            None => Map::new(),
        }
    }

    /// A child scope of `parent` binding the loop item and index.
    ///
    /// Besides the named variables, `$item` and `$index` are bound too.
    pub fn create_loop_context(
        &self,
        parent: &RuntimeContext,
        binding: LoopBinding<'_>,
        item: Value,
        index: Value,
    ) -> RuntimeContext {
        let mut vars = self.acquire();
        vars.insert(binding.var.to_string(), item.clone());
        vars.insert(binding.index_var.to_string(), index.clone());
        vars.insert("$item".to_string(), item);
        vars.insert("$index".to_string(), index);

        trace!(var = binding.var, "loop context acquired");
        parent.child_with(vars)
    }

    /// Return a loop scope's bindings to the pool.
    ///
    /// Scopes still referenced elsewhere cannot be recycled and count as
    /// discarded.
    pub fn release_loop_context(&self, ctx: RuntimeContext) {
        let recycled = match ctx.into_vars() {
            Ok(mut vars) => {
                vars.clear();
                Some(vars)
            }
            Err(ctx) => {
                warn!(?ctx, "loop context still referenced; not returned to pool");
                None
            }
        };

        let mut inner = self.inner.lock();
        inner.stats.released += 1;
        match recycled {
            Some(vars) if inner.free.len() < self.capacity => inner.free.push(vars),
            _ => inner.stats.discarded += 1,
        }
    }

    /// Drop every pooled map; counters are kept
    pub fn clear(&self) {
        self.inner.lock().free.clear();
    }
}

impl Default for LoopContextPool {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for LoopContextPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopContextPool")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Loop scope drawn from `parent`'s session pool
pub fn create_loop_context(
    parent: &RuntimeContext,
    binding: LoopBinding<'_>,
    item: Value,
    index: Value,
) -> RuntimeContext {
    parent
        .session()
        .loop_pool()
        .create_loop_context(parent, binding, item, index)
}

pub fn release_loop_context(ctx: RuntimeContext) {
    let session = ctx.session().clone();
    session.loop_pool().release_loop_context(ctx);
}
