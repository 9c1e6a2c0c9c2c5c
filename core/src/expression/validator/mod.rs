//! Security Validation for Expressions
//!
//! Rule-based checks that run on every parsed expression before it is
//! evaluated, compiled or mined for dependencies.
//!
//! # Architecture
//!
//! 1. **ValidationRule trait** - Each rule implements this trait
//! 2. **Validator** - Collects and runs all rules
//! 3. **Violation** - The output of a rule, convertible into an [`Error`]
//!
//! # Adding a New Rule
//!
//! 1. Create a new file in `validator/rules/`
//! 2. Implement `ValidationRule` for your struct
//! 3. Add it to the `Validator::new()` constructor

pub mod rules;

use super::ast::{Expr, Span};
use crate::error::{Error, ErrorCode, Result};

/// Host environment globals that expressions may only name with `allow_globals`
pub const HOST_GLOBALS: &[&str] = &["window", "document", "global", "globalThis", "self"];

pub fn is_host_global(name: &str) -> bool {
    HOST_GLOBALS.contains(&name)
}

// ============================================================================
// Options & Violations
// ============================================================================

/// The subset of expression options that affect validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidationOptions {
    pub allow_globals: bool,
    pub max_nesting_depth: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            allow_globals: false,
            max_nesting_depth: 50,
        }
    }
}

/// A rejected construct found by one rule
#[derive(Debug, Clone)]
pub struct Violation {
    /// Where the offending node starts
    pub span: Span,
    pub code: ErrorCode,
    pub message: String,
    /// Which rule produced this violation
    pub rule_id: &'static str,
}

impl Violation {
    pub fn new(span: Span, code: ErrorCode, message: impl Into<String>, rule_id: &'static str) -> Self {
        Self {
            span,
            code,
            message: message.into(),
            rule_id,
        }
    }

    pub fn into_error(self) -> Error {
        Error::expression(self.code, self.message)
            .with_metadata("rule", self.rule_id)
            .with_metadata("line", self.span.start_line + 1)
            .with_metadata("column", self.span.start_col + 1)
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at line {}, col {}: {} [{}]",
            self.code,
            self.span.start_line + 1,
            self.span.start_col + 1,
            self.message,
            self.rule_id
        )
    }
}

// ============================================================================
// ValidationRule Trait
// ============================================================================

/// Trait that all validation rules must implement.
pub trait ValidationRule: Send + Sync {
    /// Unique identifier for this rule (e.g., "dangerous-property")
    fn id(&self) -> &'static str;

    /// Human-readable description of what this rule checks
    fn description(&self) -> &'static str;

    /// When this rule reports, later rules are skipped
    fn is_fatal(&self) -> bool {
        false
    }

    fn validate(&self, expr: &Expr, options: &ValidationOptions) -> Vec<Violation>;
}

/// Pre-order walk over every node
pub(crate) fn walk<'a>(expr: &'a Expr, visit: &mut dyn FnMut(&'a Expr)) {
    visit(expr);
    for child in expr.children() {
        walk(child, visit);
    }
}

// ============================================================================
// Validator - Runs All Rules
// ============================================================================

pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    /// Create a new validator with all built-in rules.
    pub fn new() -> Self {
        Self {
            rules: vec![
                // Structural limit first: it bounds the recursion of the rest
                Box::new(rules::NestingDepthRule),
                Box::new(rules::DangerousPropertyRule),
                Box::new(rules::HostGlobalRule),
                Box::new(rules::FunctionWhitelistRule),
            ],
        }
    }

    pub fn validate(&self, expr: &Expr, options: &ValidationOptions) -> Vec<Violation> {
        let mut violations = Vec::new();
        for rule in &self.rules {
            let found = rule.validate(expr, options);
            let stop = rule.is_fatal() && !found.is_empty();
            violations.extend(found);
            if stop {
                break;
            }
        }
        violations
    }

    /// Fail with the first violation, if any
    pub fn check(&self, expr: &Expr, options: &ValidationOptions) -> Result<()> {
        match self.validate(expr, options).into_iter().next() {
            Some(violation) => Err(violation.into_error()),
            None => Ok(()),
        }
    }

    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate an expression with the built-in rules.
pub fn validate_expression(expr: &Expr, options: &ValidationOptions) -> Vec<Violation> {
    Validator::new().validate(expr, options)
}

#[cfg(test)]
mod tests;
