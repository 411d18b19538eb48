use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

use crate::lexer::lr::Literal;
use crate::parser::pr::ops::{ArithmeticOp, ComparisonOp, LogicalOp, SortDirection};
use crate::span::Span;

impl Expr {
    pub fn new<K: Into<ExprKind>>(kind: K) -> Self {
        Expr {
            kind: kind.into(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: Option<Span>) -> Self {
        self.span = span;
        self
    }
}

/// A parsed OData expression. The variant set is closed: every variant has a
/// lowering into the IR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(flatten)]
    pub kind: ExprKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

#[derive(Debug, EnumAsInner, PartialEq, Clone, Serialize, Deserialize, strum::AsRefStr)]
pub enum ExprKind {
    /// Dotted member path, such as `customer.address.city`.
    Member(String),

    #[cfg_attr(
        feature = "serde_yaml",
        serde(with = "serde_yaml::with::singleton_map")
    )]
    Literal(Literal),

    Arithmetic(ArithmeticExpr),
    Comparison(ComparisonExpr),
    Logical(LogicalExpr),
    MethodCall(MethodCall),

    /// Comma separated expressions, such as the right side of `in`.
    Sequence(Vec<Expr>),

    /// Named expressions, each producing one aliased field.
    Object(Vec<ObjectField>),

    SelectAlias(SelectAlias),
    OrderDirection(OrderDirection),
    Switch(Switch),
}

/// Expression with two operands and an arithmetic operator, such as
/// `price mul 2`.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ArithmeticExpr {
    pub left: Box<Expr>,
    pub op: ArithmeticOp,
    pub right: Box<Expr>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ComparisonExpr {
    pub left: Box<Expr>,
    pub op: ComparisonOp,
    pub right: Box<Expr>,
}

/// N-ary boolean expression. Runs of the same operator are kept in one node.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LogicalExpr {
    pub op: LogicalOp,
    pub args: Vec<Expr>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MethodCall {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ObjectField {
    pub name: String,
    pub expr: Expr,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SelectAlias {
    pub expr: Box<Expr>,
    pub alias: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OrderDirection {
    pub expr: Box<Expr>,
    pub direction: SortDirection,
}

/// `case(cond: value, ..., true: default)`
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Switch {
    pub branches: Vec<SwitchCase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Box<Expr>>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    pub case: Expr,
    pub then: Expr,
}

impl From<Literal> for ExprKind {
    fn from(value: Literal) -> Self {
        ExprKind::Literal(value)
    }
}

impl From<ArithmeticExpr> for ExprKind {
    fn from(value: ArithmeticExpr) -> Self {
        ExprKind::Arithmetic(value)
    }
}

impl From<ComparisonExpr> for ExprKind {
    fn from(value: ComparisonExpr) -> Self {
        ExprKind::Comparison(value)
    }
}

impl From<LogicalExpr> for ExprKind {
    fn from(value: LogicalExpr) -> Self {
        ExprKind::Logical(value)
    }
}

impl From<MethodCall> for ExprKind {
    fn from(value: MethodCall) -> Self {
        ExprKind::MethodCall(value)
    }
}

impl From<Switch> for ExprKind {
    fn from(value: Switch) -> Self {
        ExprKind::Switch(value)
    }
}

impl Expr {
    pub fn member<S: ToString>(name: S) -> Self {
        Expr::new(ExprKind::Member(name.to_string()))
    }

    pub fn literal<L: Into<Literal>>(value: L) -> Self {
        Expr::new(ExprKind::Literal(value.into()))
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Boolean(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}
