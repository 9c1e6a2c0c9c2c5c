//! Runtime contexts and loop scopes

pub mod context;
pub mod pool;

pub use context::{
    create_runtime_context, is_reserved_key, method, ContextOptions, EmitFn, MethodFuture,
    MethodHandler, NavigateFn, RuntimeContext, Session, StateChangeFn, RESERVED_PREFIX,
    WRITABLE_RESERVED_KEYS,
};
pub use pool::{create_loop_context, release_loop_context, LoopBinding, LoopContextPool, PoolStats};

#[cfg(test)]
mod tests;
