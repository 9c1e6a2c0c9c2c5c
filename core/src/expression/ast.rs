//! Abstract Syntax Tree node types for expressions

use serde::{Deserialize, Serialize};

/// Source location span for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    /// Start byte offset
    pub start: usize,
    /// End byte offset
    pub end: usize,
    /// Start line (0-indexed)
    pub start_line: usize,
    /// Start column (0-indexed)
    pub start_col: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, start_line: usize, start_col: usize) -> Self {
        Self {
            start,
            end,
            start_line,
            start_col,
        }
    }

    /// Create a span that covers both self and other
    pub fn merge(&self, other: &Span) -> Span {
        let first = if self.start <= other.start { self } else { other };
        Span {
            start: first.start,
            end: self.end.max(other.end),
            start_line: first.start_line,
            start_col: first.start_col,
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,    // !
    Neg,    // -
    Plus,   // +
    Typeof, // typeof
}

/// Eagerly evaluated binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,       // ==
    Ne,       // !=
    StrictEq, // ===
    StrictNe, // !==
    Lt,
    Lte,
    Gt,
    Gte,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
        }
    }
}

/// Binary operator for short-circuit evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,     // &&
    Or,      // ||
    Nullish, // ??
}

/// Expression AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Expr {
    LitBool {
        v: bool,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitNum {
        v: f64,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitStr {
        v: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitNull {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitList {
        elements: Vec<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitObj {
        /// Properties as (key, value) pairs in source order
        properties: Vec<(String, Expr)>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Ident {
        name: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// Static member access: `object.property`
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// Computed member access: `object[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Ternary {
        condition: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
}

impl Expr {
    /// Get the span of this expression
    pub fn span(&self) -> Span {
        match self {
            Expr::LitBool { span, .. } => *span,
            Expr::LitNum { span, .. } => *span,
            Expr::LitStr { span, .. } => *span,
            Expr::LitNull { span } => *span,
            Expr::LitList { span, .. } => *span,
            Expr::LitObj { span, .. } => *span,
            Expr::Ident { span, .. } => *span,
            Expr::Member { span, .. } => *span,
            Expr::Index { span, .. } => *span,
            Expr::Call { span, .. } => *span,
            Expr::Unary { span, .. } => *span,
            Expr::Binary { span, .. } => *span,
            Expr::Logical { span, .. } => *span,
            Expr::Ternary { span, .. } => *span,
        }
    }

    /// Node kind name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::LitBool { .. }
            | Expr::LitNum { .. }
            | Expr::LitStr { .. }
            | Expr::LitNull { .. } => "Literal",
            Expr::LitList { .. } => "ArrayExpression",
            Expr::LitObj { .. } => "ObjectExpression",
            Expr::Ident { .. } => "Identifier",
            Expr::Member { .. } | Expr::Index { .. } => "MemberExpression",
            Expr::Call { .. } => "CallExpression",
            Expr::Unary { .. } => "UnaryExpression",
            Expr::Binary { .. } => "BinaryExpression",
            Expr::Logical { .. } => "LogicalExpression",
            Expr::Ternary { .. } => "ConditionalExpression",
        }
    }

    /// Direct children, in evaluation order
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::LitBool { .. }
            | Expr::LitNum { .. }
            | Expr::LitStr { .. }
            | Expr::LitNull { .. }
            | Expr::Ident { .. } => Vec::new(),
            Expr::LitList { elements, .. } => elements.iter().collect(),
            Expr::LitObj { properties, .. } => properties.iter().map(|(_, v)| v).collect(),
            Expr::Member { object, .. } => vec![object.as_ref()],
            Expr::Index { object, index, .. } => vec![object.as_ref(), index.as_ref()],
            Expr::Call { callee, args, .. } => {
                let mut out = vec![callee.as_ref()];
                out.extend(args.iter());
                out
            }
            Expr::Unary { operand, .. } => vec![operand.as_ref()],
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
            Expr::Ternary {
                condition,
                consequent,
                alternate,
                ..
            } => vec![condition.as_ref(), consequent.as_ref(), alternate.as_ref()],
        }
    }

    /// True when the tree is deeper than `limit` (stops descending once it is)
    pub fn exceeds_depth(&self, limit: usize) -> bool {
        if limit == 0 {
            return true;
        }
        self.children()
            .into_iter()
            .any(|child| child.exceeds_depth(limit - 1))
    }
}

/// Helper function for serde to skip serializing default spans
fn is_default_span(span: &Span) -> bool {
    *span == Span::default()
}
