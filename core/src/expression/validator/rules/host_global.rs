//! Rule: Host Global
//!
//! Reports identifiers naming a host environment global (`window`,
//! `document`, `global`, `globalThis`, `self`) unless `allow_globals` is set.

use crate::error::ErrorCode;
use crate::expression::ast::Expr;

use super::super::{is_host_global, walk, ValidationOptions, ValidationRule, Violation};

pub struct HostGlobalRule;

impl ValidationRule for HostGlobalRule {
    fn id(&self) -> &'static str {
        "host-global"
    }

    fn description(&self) -> &'static str {
        "host globals are unreachable unless allow_globals is set"
    }

    fn validate(&self, expr: &Expr, options: &ValidationOptions) -> Vec<Violation> {
        if options.allow_globals {
            return Vec::new();
        }
        let mut violations = Vec::new();
        walk(expr, &mut |node| {
            if let Expr::Ident { name, span } = node {
                if is_host_global(name) {
                    violations.push(Violation::new(
                        *span,
                        ErrorCode::ExpressionUnsafeAccess,
                        format!("Access to global '{}' is not allowed", name),
                        "host-global",
                    ));
                }
            }
        });
        violations
    }
}
