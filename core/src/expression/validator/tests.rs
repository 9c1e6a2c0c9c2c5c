//! Tests for the expression security validator

use super::*;
use crate::expression::parser::parse_expression;

// ============================================================================
// Helper Functions
// ============================================================================

fn validate_with(source: &str, options: ValidationOptions) -> Vec<Violation> {
    let expr = parse_expression(source).expect("Parse should succeed");
    validate_expression(&expr, &options)
}

fn validate(source: &str) -> Vec<Violation> {
    validate_with(source, ValidationOptions::default())
}

fn has_rule(violations: &[Violation], rule_id: &str) -> bool {
    violations.iter().any(|v| v.rule_id == rule_id)
}

// ============================================================================
// Dangerous Properties
// ============================================================================

#[test]
fn test_dangerous_static_member() {
    for source in ["user.constructor", "a.b.prototype", "x.__proto__.y"] {
        let violations = validate(source);
        assert!(has_rule(&violations, "dangerous-property"), "{}", source);
        assert_eq!(violations[0].code, ErrorCode::ExpressionUnsafeAccess);
    }
}

#[test]
fn test_dangerous_literal_bracket_key() {
    let violations = validate("items['__proto__']");
    assert!(has_rule(&violations, "dangerous-property"));
}

#[test]
fn test_dangerous_identifier_and_object_key() {
    assert!(has_rule(&validate("constructor"), "dangerous-property"));
    assert!(has_rule(&validate("{ prototype: 1 }"), "dangerous-property"));
}

#[test]
fn test_dynamic_bracket_key_passes_validation() {
    // Checked at evaluation time instead
    assert!(validate("items[key]").is_empty());
}

// ============================================================================
// Host Globals
// ============================================================================

#[test]
fn test_host_globals_rejected() {
    for source in ["window", "document.cookie", "globalThis.x", "self", "global.process"] {
        let violations = validate(source);
        assert!(has_rule(&violations, "host-global"), "{}", source);
    }
}

#[test]
fn test_host_globals_allowed_with_option() {
    let options = ValidationOptions {
        allow_globals: true,
        ..ValidationOptions::default()
    };
    assert!(validate_with("window.innerWidth", options).is_empty());
}

#[test]
fn test_globals_as_property_names_are_fine() {
    assert!(validate("page.window").is_empty());
    assert!(validate("node.self.id").is_empty());
}

// ============================================================================
// Function Whitelist
// ============================================================================

#[test]
fn test_whitelisted_calls_pass() {
    for source in [
        "Math.max(a, b)",
        "parseInt(value, 10)",
        "name.trim().toUpperCase()",
        "JSON.stringify(form)",
        "Object.keys(row).join(', ')",
        "Array.isArray(items)",
    ] {
        assert!(validate(source).is_empty(), "{}", source);
    }
}

#[test]
fn test_unknown_calls_rejected() {
    for source in ["eval('1')", "Math.random()", "fetch(url)", "items.map(x)", "handlers[0]()"] {
        let violations = validate(source);
        assert!(has_rule(&violations, "function-whitelist"), "{}", source);
        assert_eq!(violations[0].code, ErrorCode::ExpressionFunctionNotWhitelisted);
    }
}

#[test]
fn test_call_message_names_target() {
    let violations = validate("Math.random()");
    assert!(violations[0].message.contains("'Math.random'"));
}

// ============================================================================
// Nesting Depth
// ============================================================================

#[test]
fn test_nesting_depth_limit() {
    let options = ValidationOptions {
        max_nesting_depth: 3,
        ..ValidationOptions::default()
    };
    // Binary(Binary(a, b), c): depth 3
    assert!(validate_with("a + b + c", options).is_empty());
    // Binary(Binary(Binary(a, b), c), d): depth 4
    let violations = validate_with("a + b + c + d", options);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].rule_id, "nesting-depth");
    assert_eq!(violations[0].code, ErrorCode::ExpressionValidationError);
}

#[test]
fn test_nesting_depth_stops_other_rules() {
    let options = ValidationOptions {
        max_nesting_depth: 1,
        ..ValidationOptions::default()
    };
    let violations = validate_with("window.constructor", options);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].rule_id, "nesting-depth");
}

#[test]
fn test_default_depth_is_fifty() {
    let deep = format!("{}1", "-".repeat(60));
    let violations = validate(&deep);
    assert!(has_rule(&violations, "nesting-depth"));
    assert!(validate(&format!("{}1", "-".repeat(40))).is_empty());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_check_converts_first_violation() {
    let expr = parse_expression("a.constructor").unwrap();
    let err = Validator::new()
        .check(&expr, &ValidationOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ExpressionUnsafeAccess);
    assert_eq!(err.context().metadata["rule"], "dangerous-property");
    assert_eq!(err.context().metadata["column"], 1);
}

#[test]
fn test_rules_are_listed() {
    let ids: Vec<&str> = Validator::new().rules().map(|(id, _)| id).collect();
    assert_eq!(
        ids,
        vec!["nesting-depth", "dangerous-property", "host-global", "function-whitelist"]
    );
}
