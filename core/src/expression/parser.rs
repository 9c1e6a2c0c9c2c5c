//! PEST-based expression parser
//!
//! Turns a trimmed expression source (the text inside `{{ }}`, or a bare
//! path) into an [`Expr`]. Parsing is pure; callers cache the result.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use super::ast::{BinaryOp, Expr, LogicalOp, Span, UnaryOp};
use crate::error::{Error, ErrorCode, Result};

/// Hard cap on bracket and ternary nesting in raw source, checked before the
/// grammar recurses. The configurable AST depth limit is enforced by the validator.
pub const MAX_SOURCE_NESTING: usize = 256;

/// Hard cap on the depth of a built AST. Operator chains (`!!!a`, `a+a+a`,
/// `a.b.c`) nest without brackets, so the builder stops at this depth.
pub const MAX_AST_DEPTH: usize = 256;

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "expression/expression.pest"]
struct ExpressionParser;

/* ===================== Span Helpers ===================== */

/// Convert a PEST pair's span to our Span type
fn pair_to_span(pair: &Pair<Rule>, source: &str) -> Span {
    let pest_span = pair.as_span();
    let start = pest_span.start();
    let (start_line, start_col) = offset_to_line_col(source, start);
    Span::new(start, pest_span.end(), start_line, start_col)
}

/// Convert byte offset to (line, column) - 0-indexed
fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 0;
    let mut col = 0;
    let mut current_offset = 0;

    for ch in source.chars() {
        if current_offset >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
        current_offset += ch.len_utf8();
    }

    (line, col)
}

fn parse_error(source: &str, message: impl Into<String>) -> Error {
    Error::expression(ErrorCode::ExpressionParseError, message).with_expression(source)
}

fn build_error(pair: &Pair<Rule>, source: &str, message: &str) -> Error {
    let span = pair_to_span(pair, source);
    parse_error(source, message)
        .with_metadata("line", span.start_line + 1)
        .with_metadata("column", span.start_col + 1)
}

fn nesting_error(source: &str, depth: usize, max: usize) -> Error {
    Error::expression(
        ErrorCode::ExpressionValidationError,
        format!(
            "Expression nesting depth {} exceeds the maximum of {}",
            depth, max
        ),
    )
    .with_expression(source)
}

/// Reject sources whose bracket or ternary nesting would recurse the grammar
/// too deeply. Every ternary `?` counts, since alternates nest to the right.
fn check_source_nesting(source: &str) -> Result<()> {
    let mut depth = 0usize;
    let mut max_depth = 0usize;
    let mut ternaries = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = source.chars().peekable();
    let mut prev = None;

    while let Some(ch) = chars.next() {
        let before = prev.replace(ch);
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' | '[' | '{' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            // `?.` and `??` are not ternaries
            '?' if before != Some('?') && !matches!(chars.peek(), Some('.' | '?')) => {
                ternaries += 1;
            }
            _ => {}
        }
    }

    let nesting = max_depth + ternaries;
    if nesting > MAX_SOURCE_NESTING {
        return Err(nesting_error(source, nesting, MAX_SOURCE_NESTING));
    }
    Ok(())
}

/// Depth of a node `levels` below one at `depth`, bounded by [`MAX_AST_DEPTH`]
fn nested(source: &str, depth: usize, levels: usize) -> Result<usize> {
    let depth = depth.saturating_add(levels);
    if depth > MAX_AST_DEPTH {
        return Err(nesting_error(source, depth, MAX_AST_DEPTH));
    }
    Ok(depth)
}

/* ===================== Public API ===================== */

/// Parse a single expression
pub fn parse_expression(source: &str) -> Result<Expr> {
    let source = source.trim();
    if source.is_empty() {
        return Err(parse_error(source, "Expression is empty"));
    }
    check_source_nesting(source)?;

    let mut pairs = ExpressionParser::parse(Rule::expression_root, source).map_err(|err| {
        let (line, col) = match err.line_col {
            pest::error::LineColLocation::Pos(pos) => pos,
            pest::error::LineColLocation::Span(start, _) => start,
        };
        parse_error(source, format!("Unexpected token at column {}: {}", col, err.variant.message()))
            .with_metadata("line", line)
            .with_metadata("column", col)
    })?;

    let root = pairs
        .next()
        .ok_or_else(|| parse_error(source, "Empty parse tree"))?;
    let expression = root
        .into_inner()
        .find(|p| p.as_rule() == Rule::expression)
        .ok_or_else(|| parse_error(source, "Missing expression"))?;

    build_expression(expression, source, 0)
}

/* ===================== AST Builder ===================== */

fn next_pair<'i>(
    inner: &mut pest::iterators::Pairs<'i, Rule>,
    parent: &Pair<'i, Rule>,
    source: &str,
) -> Result<Pair<'i, Rule>> {
    inner
        .next()
        .ok_or_else(|| build_error(parent, source, "Incomplete expression"))
}

/// Build the node for `pair`, which sits `depth` levels below the root
fn build_expression(pair: Pair<Rule>, source: &str, depth: usize) -> Result<Expr> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::expression => {
            let mut inner = pair.clone().into_inner();
            // Without `? :` this is a pass-through wrapper
            let child_depth = if inner.clone().count() > 1 {
                nested(source, depth, 1)?
            } else {
                depth
            };
            let test =
                build_expression(next_pair(&mut inner, &pair, source)?, source, child_depth)?;
            match inner.next() {
                None => Ok(test),
                Some(consequent_pair) => {
                    let consequent = build_expression(consequent_pair, source, child_depth)?;
                    let alternate = build_expression(
                        next_pair(&mut inner, &pair, source)?,
                        source,
                        child_depth,
                    )?;
                    Ok(Expr::Ternary {
                        condition: Box::new(test),
                        consequent: Box::new(consequent),
                        alternate: Box::new(alternate),
                        span,
                    })
                }
            }
        }

        Rule::logical_or
        | Rule::logical_and
        | Rule::equality
        | Rule::comparison
        | Rule::additive
        | Rule::multiplicative => build_binary_expr(pair, source, depth),

        Rule::unary => build_unary_expr(pair, source, depth),

        Rule::postfix => build_postfix_expr(pair, source, depth),

        Rule::number => {
            let v = pair
                .as_str()
                .parse::<f64>()
                .map_err(|_| build_error(&pair, source, "Invalid number literal"))?;
            Ok(Expr::LitNum { v, span })
        }

        Rule::string => Ok(Expr::LitStr {
            v: build_string(pair, source)?,
            span,
        }),

        Rule::boolean => Ok(Expr::LitBool {
            v: pair.as_str() == "true",
            span,
        }),

        Rule::null_lit | Rule::undefined_lit => Ok(Expr::LitNull { span }),

        Rule::identifier => Ok(Expr::Ident {
            name: pair.as_str().to_string(),
            span,
        }),

        Rule::array_lit => {
            let element_depth = nested(source, depth, 1)?;
            let elements: Result<Vec<Expr>> = pair
                .into_inner()
                .map(|element| build_expression(element, source, element_depth))
                .collect();
            Ok(Expr::LitList {
                elements: elements?,
                span,
            })
        }

        Rule::object_lit => {
            let value_depth = nested(source, depth, 1)?;
            let mut properties = Vec::new();
            for prop in pair.into_inner() {
                let mut inner = prop.clone().into_inner();
                let key_pair = next_pair(&mut inner, &prop, source)?;
                let key = match key_pair.as_rule() {
                    Rule::string => build_string(key_pair, source)?,
                    _ => key_pair.as_str().to_string(),
                };
                let value =
                    build_expression(next_pair(&mut inner, &prop, source)?, source, value_depth)?;
                properties.push((key, value));
            }
            Ok(Expr::LitObj { properties, span })
        }

        _ => Err(build_error(
            &pair,
            source,
            &format!("Unexpected expression rule: {:?}", pair.as_rule()),
        )),
    }
}

/// Left-associative chain; `n` operators put the leftmost operand `n` levels down
fn build_binary_expr(pair: Pair<Rule>, source: &str, depth: usize) -> Result<Expr> {
    let inner_pairs: Vec<_> = pair.clone().into_inner().collect();

    if inner_pairs.is_empty() {
        return Err(build_error(&pair, source, "Empty binary expression"));
    }

    let operand_depth = nested(source, depth, inner_pairs.len() / 2)?;
    let mut left = build_expression(inner_pairs[0].clone(), source, operand_depth)?;

    let mut i = 1;
    while i < inner_pairs.len() {
        let op_rule = inner_pairs[i].as_rule();

        i += 1;
        if i >= inner_pairs.len() {
            return Err(build_error(&pair, source, "Missing right operand after operator"));
        }

        let right = build_expression(inner_pairs[i].clone(), source, operand_depth)?;
        let span = left.span().merge(&right.span());

        let logical = match op_rule {
            Rule::op_and => Some(LogicalOp::And),
            Rule::op_or => Some(LogicalOp::Or),
            Rule::op_nullish => Some(LogicalOp::Nullish),
            _ => None,
        };

        left = if let Some(op) = logical {
            Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            }
        } else {
            let op = match op_rule {
                Rule::op_add => BinaryOp::Add,
                Rule::op_sub => BinaryOp::Sub,
                Rule::op_mul => BinaryOp::Mul,
                Rule::op_div => BinaryOp::Div,
                Rule::op_mod => BinaryOp::Mod,
                Rule::op_eq => BinaryOp::Eq,
                Rule::op_ne => BinaryOp::Ne,
                Rule::op_strict_eq => BinaryOp::StrictEq,
                Rule::op_strict_ne => BinaryOp::StrictNe,
                Rule::op_lt => BinaryOp::Lt,
                Rule::op_lte => BinaryOp::Lte,
                Rule::op_gt => BinaryOp::Gt,
                Rule::op_gte => BinaryOp::Gte,
                _ => {
                    return Err(build_error(
                        &inner_pairs[i - 1],
                        source,
                        &format!("Expected operator, got {:?}", op_rule),
                    ))
                }
            };
            Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            }
        };

        i += 1;
    }

    Ok(left)
}

fn build_unary_expr(pair: Pair<Rule>, source: &str, depth: usize) -> Result<Expr> {
    let mut inner: Vec<_> = pair.clone().into_inner().collect();
    let operand = inner
        .pop()
        .ok_or_else(|| build_error(&pair, source, "Missing operand"))?;
    let operand_depth = nested(source, depth, inner.len())?;
    let mut expr = build_expression(operand, source, operand_depth)?;

    // Operators apply innermost first: `!-a` is `!(-a)`
    for op_pair in inner.into_iter().rev() {
        let op = match op_pair.as_rule() {
            Rule::op_not => UnaryOp::Not,
            Rule::op_neg => UnaryOp::Neg,
            Rule::op_plus => UnaryOp::Plus,
            Rule::op_typeof => UnaryOp::Typeof,
            rule => {
                return Err(build_error(
                    &op_pair,
                    source,
                    &format!("Expected unary operator, got {:?}", rule),
                ))
            }
        };
        let span = pair_to_span(&op_pair, source).merge(&expr.span());
        expr = Expr::Unary {
            op,
            operand: Box::new(expr),
            span,
        };
    }
    Ok(expr)
}

fn build_postfix_expr(pair: Pair<Rule>, source: &str, depth: usize) -> Result<Expr> {
    let mut inner = pair.clone().into_inner();
    let base = next_pair(&mut inner, &pair, source)?;
    let ops: Vec<_> = inner.collect();
    let operand_depth = nested(source, depth, ops.len())?;
    let mut expr = build_expression(base, source, operand_depth)?;

    for op in ops {
        let span = expr.span().merge(&pair_to_span(&op, source));
        let rule = op.as_rule();
        let mut parts = op.clone().into_inner();

        expr = match rule {
            Rule::member_op | Rule::optional_member_op => {
                let name = next_pair(&mut parts, &op, source)?;
                Expr::Member {
                    object: Box::new(expr),
                    property: name.as_str().to_string(),
                    optional: rule == Rule::optional_member_op,
                    span,
                }
            }
            Rule::index_op | Rule::optional_index_op => {
                let index =
                    build_expression(next_pair(&mut parts, &op, source)?, source, operand_depth)?;
                Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    optional: rule == Rule::optional_index_op,
                    span,
                }
            }
            Rule::call_op => {
                let args: Result<Vec<Expr>> = parts
                    .map(|arg| build_expression(arg, source, operand_depth))
                    .collect();
                Expr::Call {
                    callee: Box::new(expr),
                    args: args?,
                    span,
                }
            }
            _ => {
                return Err(build_error(
                    &op,
                    source,
                    &format!("Unexpected postfix rule: {:?}", rule),
                ))
            }
        };
    }

    Ok(expr)
}

fn build_string(pair: Pair<Rule>, source: &str) -> Result<String> {
    let raw = pair
        .clone()
        .into_inner()
        .next()
        .map(|p| p.as_str())
        .unwrap_or("");
    unescape(raw).ok_or_else(|| build_error(&pair, source, "Invalid escape sequence"))
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return None;
                }
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            other => out.push(other),
        }
    }

    Some(out)
}

#[cfg(test)]
mod tests;
