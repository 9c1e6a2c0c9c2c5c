//! Rule: Function Whitelist
//!
//! Every call must target a whitelisted global (`parseInt(x)`), a whitelisted
//! namespaced function (`Math.max(a, b)`) or a whitelisted value method
//! (`name.trim()`). Computed callees (`fns[0]()`, `(a || b)()`) are rejected.

use crate::error::ErrorCode;
use crate::expression::ast::Expr;
use crate::expression::builtins::{
    is_global_function, is_namespace, is_namespaced_function, is_value_method,
};

use super::super::{walk, ValidationOptions, ValidationRule, Violation};

pub struct FunctionWhitelistRule;

/// Name of the call target when it is not whitelisted
fn rejected_target(callee: &Expr) -> Option<String> {
    match callee {
        Expr::Ident { name, .. } if is_global_function(name) => None,
        Expr::Ident { name, .. } => Some(name.clone()),
        Expr::Member {
            object, property, ..
        } => match object.as_ref() {
            Expr::Ident { name, .. } if is_namespace(name) => {
                if is_namespaced_function(name, property) {
                    None
                } else {
                    Some(format!("{}.{}", name, property))
                }
            }
            _ if is_value_method(property) => None,
            _ => Some(format!(".{}", property)),
        },
        other => Some(format!("<{}>", other.kind())),
    }
}

impl ValidationRule for FunctionWhitelistRule {
    fn id(&self) -> &'static str {
        "function-whitelist"
    }

    fn description(&self) -> &'static str {
        "only whitelisted functions and methods may be called"
    }

    fn validate(&self, expr: &Expr, _options: &ValidationOptions) -> Vec<Violation> {
        let mut violations = Vec::new();
        walk(expr, &mut |node| {
            if let Expr::Call { callee, span, .. } = node {
                if let Some(target) = rejected_target(callee) {
                    violations.push(Violation::new(
                        *span,
                        ErrorCode::ExpressionFunctionNotWhitelisted,
                        format!("Function '{}' is not whitelisted", target),
                        "function-whitelist",
                    ));
                }
            }
        });
        violations
    }
}
