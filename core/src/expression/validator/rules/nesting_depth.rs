//! Rule: Nesting Depth
//!
//! Rejects expressions whose AST is deeper than `max_nesting_depth`
//! (default 50). A lone literal or identifier has depth 1.

use crate::error::ErrorCode;
use crate::expression::ast::Expr;

use super::super::{ValidationOptions, ValidationRule, Violation};

pub struct NestingDepthRule;

impl ValidationRule for NestingDepthRule {
    fn id(&self) -> &'static str {
        "nesting-depth"
    }

    fn description(&self) -> &'static str {
        "expression trees may not exceed the configured nesting depth"
    }

    fn is_fatal(&self) -> bool {
        true
    }

    fn validate(&self, expr: &Expr, options: &ValidationOptions) -> Vec<Violation> {
        if !expr.exceeds_depth(options.max_nesting_depth) {
            return Vec::new();
        }
        vec![Violation::new(
            expr.span(),
            ErrorCode::ExpressionValidationError,
            format!(
                "Expression exceeds maximum nesting depth of {}",
                options.max_nesting_depth
            ),
            self.id(),
        )]
    }
}
