//! Validation Rules
//!
//! Each file in this module contains one validation rule:
//!
//! - `nesting_depth.rs` - Trees deeper than the configured maximum
//! - `dangerous_property.rs` - `constructor` / `prototype` / `__proto__`
//! - `host_global.rs` - `window`, `document` and friends
//! - `function_whitelist.rs` - Call targets outside the builtin whitelist

mod dangerous_property;
mod function_whitelist;
mod host_global;
mod nesting_depth;

pub use dangerous_property::DangerousPropertyRule;
pub use function_whitelist::FunctionWhitelistRule;
pub use host_global::HostGlobalRule;
pub use nesting_depth::NestingDepthRule;
