//! Rule: Dangerous Property
//!
//! Reports `constructor`, `prototype` and `__proto__` wherever they can name
//! a property: static members, literal bracket keys, bare identifiers and
//! object literal keys.
//!
//! # Invalid
//!
//! ```text
//! user.constructor
//! items['__proto__']
//! { prototype: 1 }
//! ```

use crate::error::ErrorCode;
use crate::expression::ast::Expr;
use crate::path::is_dangerous_property;

use super::super::{walk, ValidationOptions, ValidationRule, Violation};

pub struct DangerousPropertyRule;

impl ValidationRule for DangerousPropertyRule {
    fn id(&self) -> &'static str {
        "dangerous-property"
    }

    fn description(&self) -> &'static str {
        "constructor, prototype and __proto__ are never accessible"
    }

    fn validate(&self, expr: &Expr, _options: &ValidationOptions) -> Vec<Violation> {
        let mut violations = Vec::new();
        walk(expr, &mut |node| {
            let names: Vec<&str> = match node {
                Expr::Member { property, .. } => vec![property.as_str()],
                Expr::Index { index, .. } => match index.as_ref() {
                    Expr::LitStr { v, .. } => vec![v.as_str()],
                    _ => Vec::new(),
                },
                Expr::Ident { name, .. } => vec![name.as_str()],
                Expr::LitObj { properties, .. } => {
                    properties.iter().map(|(key, _)| key.as_str()).collect()
                }
                _ => Vec::new(),
            };
            for name in names.into_iter().filter(|n| is_dangerous_property(n)) {
                violations.push(Violation::new(
                    node.span(),
                    ErrorCode::ExpressionUnsafeAccess,
                    format!("Access to '{}' is not allowed", name),
                    "dangerous-property",
                ));
            }
        });
        violations
    }
}
