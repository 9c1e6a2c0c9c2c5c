//! Dependency extraction for cache invalidation
//!
//! Produces an over-approximation of the state paths an expression reads:
//!
//! - `count` -> `count`
//! - `user.name` -> `user.name`, `user.*`
//! - `items[i].id` -> `items.*`, `i`
//!
//! Stale reads are worse than extra recomputation, so anything below a root
//! identifier that is reached dynamically depends on the whole root.

use std::collections::BTreeSet;

use super::ast::Expr;
use super::builtins::is_namespace;
use super::evaluator::static_path;
use crate::path::{parse_path, stringify_path, wildcard_of, PathSegment};

/// Identifiers that name builtins rather than state
pub const NON_STATE_IDENTIFIERS: &[&str] = &[
    "Math",
    "JSON",
    "Object",
    "Array",
    "String",
    "Number",
    "Boolean",
    "Date",
    "console",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "NaN",
    "Infinity",
    "undefined",
];

fn is_state_identifier(name: &str) -> bool {
    !NON_STATE_IDENTIFIERS.contains(&name)
}

pub fn extract_dependencies(expr: &Expr) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect(expr, &mut out);
    out
}

fn collect(expr: &Expr, out: &mut BTreeSet<String>) {
    match expr {
        Expr::Ident { name, .. } => {
            if is_state_identifier(name) {
                out.insert(name.clone());
            }
        }

        Expr::Member { .. } | Expr::Index { .. } => {
            if let Some((root, segments)) = static_path(expr) {
                if is_state_identifier(root) {
                    let mut full = vec![PathSegment::Key(root.to_string())];
                    full.extend(segments);
                    out.insert(stringify_path(&full));
                    out.insert(wildcard_of(root));
                }
                return;
            }
            if let Some(root) = chain_root(expr) {
                if is_state_identifier(root) {
                    out.insert(wildcard_of(root));
                }
            }
            collect_chain(expr, out);
        }

        Expr::Call { callee, args, .. } => {
            match callee.as_ref() {
                Expr::Ident { .. } => {}
                Expr::Member { object, .. } => match object.as_ref() {
                    Expr::Ident { name, .. } if is_namespace(name) => {}
                    // The method name is not state; its receiver is
                    receiver => collect(receiver, out),
                },
                other => collect(other, out),
            }
            for arg in args {
                collect(arg, out);
            }
        }

        _ => {
            for child in expr.children() {
                collect(child, out);
            }
        }
    }
}

/// The top-level names a dependency set reads: `user` for `user.name`
pub fn dependency_roots(dependencies: &BTreeSet<String>) -> BTreeSet<String> {
    dependencies
        .iter()
        .map(|dependency| {
            parse_path(dependency)
                .ok()
                .and_then(|segments| segments.first().map(ToString::to_string))
                .unwrap_or_else(|| dependency.clone())
        })
        .collect()
}

/// The identifier a member chain starts from, if any
fn chain_root(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Ident { name, .. } => Some(name.as_str()),
        Expr::Member { object, .. } | Expr::Index { object, .. } => chain_root(object),
        _ => None,
    }
}

/// Dependencies of the computed parts of a dynamic chain; the root is already covered
fn collect_chain(expr: &Expr, out: &mut BTreeSet<String>) {
    match expr {
        Expr::Ident { .. } => {}
        Expr::Member { object, .. } => collect_chain(object, out),
        Expr::Index { object, index, .. } => {
            collect(index, out);
            collect_chain(object, out);
        }
        other => collect(other, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parser::parse_expression;

    fn deps(source: &str) -> Vec<String> {
        extract_dependencies(&parse_expression(source).unwrap())
            .into_iter()
            .collect()
    }

    #[test]
    fn test_identifier() {
        assert_eq!(deps("count"), vec!["count"]);
        assert_eq!(deps("sum + item"), vec!["item", "sum"]);
    }

    #[test]
    fn test_static_member_adds_wildcard() {
        assert_eq!(deps("user.name"), vec!["user.*", "user.name"]);
        assert_eq!(deps("a['b'][0]"), vec!["a.*", "a.b.0"]);
    }

    #[test]
    fn test_computed_index_depends_on_whole_root() {
        assert_eq!(deps("items[i].id"), vec!["i", "items.*"]);
        assert_eq!(deps("rows[sel.row][sel.col]"), vec!["rows.*", "sel.*", "sel.col", "sel.row"]);
    }

    #[test]
    fn test_roots() {
        let parsed = parse_expression("rows[sel.row].id + $event.value").unwrap();
        let roots = dependency_roots(&extract_dependencies(&parsed));
        assert_eq!(
            roots.into_iter().collect::<Vec<_>>(),
            vec!["$event", "rows", "sel"]
        );
    }

    #[test]
    fn test_builtins_are_not_state() {
        assert_eq!(deps("Math.max(a, 1)"), vec!["a"]);
        assert_eq!(deps("parseInt(raw)"), vec!["raw"]);
        assert!(deps("JSON.stringify(null)").is_empty());
    }

    #[test]
    fn test_method_receiver_is_a_dependency() {
        assert_eq!(deps("user.name.trim()"), vec!["user.*", "user.name"]);
        assert_eq!(deps("tags.join(sep)"), vec!["sep", "tags"]);
    }

    #[test]
    fn test_literals_have_no_dependencies() {
        assert!(deps("1 + 2").is_empty());
        assert!(deps("'text'").is_empty());
    }

    #[test]
    fn test_loop_variables_are_included() {
        assert_eq!(deps("item.price * $index"), vec!["$index", "item.*", "item.price"]);
    }
}
