pub mod cli;
pub mod config;
pub mod error;
pub mod expression;
pub mod path;
pub mod runtime;
pub mod vm;

// Re-export the API renderers call directly
pub use config::Config;
pub use error::{Error, ErrorCode, ErrorContext, Result};
pub use expression::{ExpressionEngine, ExpressionOptions, Resolver};
pub use path::{get_path_value, parse_path, set_path_value, PathSegment};
pub use runtime::{
    create_loop_context, create_runtime_context, method, release_loop_context, ContextOptions,
    LoopBinding, RuntimeContext, Session,
};
pub use vm::{execute, Action, ExecuteOptions};

/// Evaluate an expression (markers optional) in `ctx`
pub fn evaluate_expression(source: &str, ctx: &RuntimeContext) -> Result<serde_json::Value> {
    ctx.evaluate(source)
}

/// Drop cached results that depend on `path`
pub fn invalidate_cache(ctx: &RuntimeContext, path: &str) -> usize {
    ctx.engine().invalidate(path)
}

/// Drop every cached result of `ctx`'s session
pub fn clear_cache(ctx: &RuntimeContext) {
    ctx.engine().clear_cache();
}
