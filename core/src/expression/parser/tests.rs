//! Tests for the expression parser

use super::*;

fn parse(source: &str) -> Expr {
    parse_expression(source).expect("Parse should succeed")
}

fn ident(name: &str) -> Expr {
    Expr::Ident {
        name: name.to_string(),
        span: Span::default(),
    }
}

/// Strip spans so trees can be compared structurally
fn strip(expr: Expr) -> Expr {
    let json = serde_json::to_value(&expr).unwrap();
    let stripped = strip_spans(json);
    serde_json::from_value(stripped).unwrap()
}

fn strip_spans(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .filter(|(k, _)| k != "span")
                .map(|(k, v)| (k, strip_spans(v)))
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(strip_spans).collect())
        }
        other => other,
    }
}

/* ===================== Literals ===================== */

#[test]
fn test_parse_literals() {
    assert!(matches!(parse("42"), Expr::LitNum { v, .. } if v == 42.0));
    assert!(matches!(parse("3.5e2"), Expr::LitNum { v, .. } if v == 350.0));
    assert!(matches!(parse("'it\\'s'"), Expr::LitStr { ref v, .. } if v == "it's"));
    assert!(matches!(parse("\"a\\nb\""), Expr::LitStr { ref v, .. } if v == "a\nb"));
    assert!(matches!(parse("true"), Expr::LitBool { v: true, .. }));
    assert!(matches!(parse("null"), Expr::LitNull { .. }));
    assert!(matches!(parse("undefined"), Expr::LitNull { .. }));
}

#[test]
fn test_parse_collection_literals() {
    match parse("[1, 'two', [3]]") {
        Expr::LitList { elements, .. } => assert_eq!(elements.len(), 3),
        other => panic!("Expected list, got {:?}", other),
    }
    match parse("{ a: 1, 'b c': x }") {
        Expr::LitObj { properties, .. } => {
            assert_eq!(properties[0].0, "a");
            assert_eq!(properties[1].0, "b c");
            assert_eq!(strip(properties[1].1.clone()), ident("x"));
        }
        other => panic!("Expected object, got {:?}", other),
    }
}

/* ===================== Member Access ===================== */

#[test]
fn test_parse_member_chain() {
    let expr = strip(parse("user.profile['name'][0]"));
    let expected = Expr::Index {
        object: Box::new(Expr::Index {
            object: Box::new(Expr::Member {
                object: Box::new(ident("user")),
                property: "profile".to_string(),
                optional: false,
                span: Span::default(),
            }),
            index: Box::new(Expr::LitStr {
                v: "name".to_string(),
                span: Span::default(),
            }),
            optional: false,
            span: Span::default(),
        }),
        index: Box::new(Expr::LitNum {
            v: 0.0,
            span: Span::default(),
        }),
        optional: false,
        span: Span::default(),
    };
    assert_eq!(expr, expected);
}

#[test]
fn test_parse_numeric_member_and_optional_chaining() {
    match parse("items.0") {
        Expr::Member { property, .. } => assert_eq!(property, "0"),
        other => panic!("Expected member, got {:?}", other),
    }
    match parse("user?.name") {
        Expr::Member { optional, .. } => assert!(optional),
        other => panic!("Expected member, got {:?}", other),
    }
    match parse("list?.[1]") {
        Expr::Index { optional, .. } => assert!(optional),
        other => panic!("Expected index, got {:?}", other),
    }
}

#[test]
fn test_keywords_allowed_as_property_names() {
    match parse("row.null") {
        Expr::Member { property, .. } => assert_eq!(property, "null"),
        other => panic!("Expected member, got {:?}", other),
    }
}

/* ===================== Operators ===================== */

#[test]
fn test_arithmetic_precedence() {
    // 2 + 3 * 4 should be 2 + (3 * 4)
    match parse("2 + 3 * 4") {
        Expr::Binary {
            op: BinaryOp::Add,
            right,
            ..
        } => assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. })),
        other => panic!("Expected addition at root, got {:?}", other),
    }
}

#[test]
fn test_left_associativity() {
    // 10 - 4 - 3 is (10 - 4) - 3
    match parse("10 - 4 - 3") {
        Expr::Binary {
            op: BinaryOp::Sub,
            left,
            ..
        } => assert!(matches!(*left, Expr::Binary { op: BinaryOp::Sub, .. })),
        other => panic!("Expected subtraction, got {:?}", other),
    }
}

#[test]
fn test_equality_operators() {
    assert!(matches!(parse("a === b"), Expr::Binary { op: BinaryOp::StrictEq, .. }));
    assert!(matches!(parse("a !== b"), Expr::Binary { op: BinaryOp::StrictNe, .. }));
    assert!(matches!(parse("a == b"), Expr::Binary { op: BinaryOp::Eq, .. }));
    assert!(matches!(parse("a != b"), Expr::Binary { op: BinaryOp::Ne, .. }));
    assert!(matches!(parse("a <= b"), Expr::Binary { op: BinaryOp::Lte, .. }));
}

#[test]
fn test_logical_operators() {
    // && binds tighter than ||
    match parse("a || b && c") {
        Expr::Logical {
            op: LogicalOp::Or,
            right,
            ..
        } => assert!(matches!(*right, Expr::Logical { op: LogicalOp::And, .. })),
        other => panic!("Expected ||, got {:?}", other),
    }
    assert!(matches!(parse("a ?? 'x'"), Expr::Logical { op: LogicalOp::Nullish, .. }));
}

#[test]
fn test_unary_operators() {
    match parse("!-a") {
        Expr::Unary {
            op: UnaryOp::Not,
            operand,
            ..
        } => assert!(matches!(*operand, Expr::Unary { op: UnaryOp::Neg, .. })),
        other => panic!("Expected !, got {:?}", other),
    }
    assert!(matches!(parse("typeof x"), Expr::Unary { op: UnaryOp::Typeof, .. }));
}

#[test]
fn test_ternary() {
    match parse("ok ? 'yes' : n > 1 ? 'many' : 'one'") {
        Expr::Ternary { alternate, .. } => {
            assert!(matches!(*alternate, Expr::Ternary { .. }))
        }
        other => panic!("Expected ternary, got {:?}", other),
    }
}

#[test]
fn test_call_expressions() {
    match parse("Math.max(a, 2)") {
        Expr::Call { callee, args, .. } => {
            assert!(matches!(*callee, Expr::Member { ref property, .. } if property == "max"));
            assert_eq!(args.len(), 2);
        }
        other => panic!("Expected call, got {:?}", other),
    }
    assert!(matches!(parse("name.trim()"), Expr::Call { ref args, .. } if args.is_empty()));
}

/* ===================== Errors ===================== */

#[test]
fn test_parse_errors() {
    for bad in ["", "a +", "a = 1", "(a", "a b", "let x = 1", "'open"] {
        let err = parse_expression(bad).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ExpressionParseError, "source {:?}", bad);
    }
}

#[test]
fn test_parse_error_carries_expression() {
    let err = parse_expression("a +* b").unwrap_err();
    assert_eq!(err.context().expression.as_deref(), Some("a +* b"));
    assert!(err.context().metadata.contains_key("column"));
}

#[test]
fn test_excessive_source_nesting_rejected() {
    let source = format!("{}1{}", "(".repeat(MAX_SOURCE_NESTING + 1), ")".repeat(MAX_SOURCE_NESTING + 1));
    let err = parse_expression(&source).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ExpressionValidationError);
}

#[test]
fn test_deep_operator_chains_rejected() {
    let sources = [
        format!("{}a", "!".repeat(300_000)),
        format!("a{}", "+a".repeat(300_000)),
        format!("a{}", ".b".repeat(300_000)),
        format!("{}1", "-".repeat(MAX_AST_DEPTH + 1)),
        format!("{}1", "c ? 1 : ".repeat(MAX_SOURCE_NESTING + 1)),
    ];
    for source in &sources {
        let err = parse_expression(source).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ExpressionValidationError);
    }
}

#[test]
fn test_operator_chains_within_limit_parse() {
    let source = format!("{}a", "!".repeat(MAX_AST_DEPTH));
    assert!(matches!(parse(&source), Expr::Unary { .. }));
    assert!(matches!(parse("a ?? b ? c?.d : e"), Expr::Ternary { .. }));
}

#[test]
fn test_spans_point_into_source() {
    let expr = parse("a + bb");
    let span = expr.span();
    assert_eq!(span.start, 0);
    assert_eq!(span.end, 6);
}
