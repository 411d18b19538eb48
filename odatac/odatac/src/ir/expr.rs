use enum_as_inner::EnumAsInner;
use odatac_parser::lexer::lr::Literal;

use super::Query;

/// An IR expression. Every variant has one `$`-keyed JSON spelling, see
/// [super::json].
#[derive(Debug, Clone, PartialEq, EnumAsInner)]
pub enum Expr {
    /// A constant, written raw or as `{$value: x}`.
    Literal(Literal),

    Array(Vec<Expr>),

    /// A field or table reference, `{$name: "entity.field"}`.
    Name(String),

    /// Comparison in expression form, `{$gt: [left, right]}`.
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// `{$and: [..]}` or `{$or: [..]}`. Never empty.
    Logical { op: LogicalOp, args: Vec<Expr> },

    Not(Box<Expr>),

    /// `{$toLower: [x]}`, `{$add: [a, b]}`, ...
    Function { func: Func, args: Vec<Expr> },

    Switch(Switch),

    /// Field-keyed predicate, `{price: {$gt: 100}}`.
    Filter(FieldFilter),

    /// A nested select, detected in JSON by its `$select` key.
    Query(Box<Query>),
}

#[derive(
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
}

impl CompareOp {
    /// The operator that holds exactly when `self` does not.
    pub fn negate(self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Gt => CompareOp::Lte,
            CompareOp::Gte => CompareOp::Lt,
            CompareOp::Lt => CompareOp::Gte,
            CompareOp::Lte => CompareOp::Gt,
            CompareOp::In => CompareOp::Nin,
            CompareOp::Nin => CompareOp::In,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
}

/// Every `$`-method the formatters know how to render. The JSON tag is the
/// camel-cased name with a `$` prefix.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "camelCase")]
pub enum Func {
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Bit,

    Round,
    Floor,
    Ceiling,

    Substring,
    IndexOf,
    Concat,
    Trim,
    Length,
    ToLower,
    ToUpper,
    Contains,
    StartsWith,
    EndsWith,

    Date,
    Day,
    Month,
    Year,
    Hour,
    Minute,
    Second,
    Now,

    Count,
    Min,
    Max,
    Sum,
    Avg,
}

impl Func {
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Func::Count | Func::Min | Func::Max | Func::Sum | Func::Avg
        )
    }

    pub fn is_predicate(&self) -> bool {
        matches!(self, Func::Contains | Func::StartsWith | Func::EndsWith)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    pub branches: Vec<SwitchCase>,
    pub default: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub case: Expr,
    pub then: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub cond: FieldCond,
}

/// The condition half of a [FieldFilter].
#[derive(Debug, Clone, PartialEq, EnumAsInner)]
pub enum FieldCond {
    /// `{$gt: 100}`, or the bare value for equality with a literal.
    Compare { op: CompareOp, value: Box<Expr> },

    /// `{$regex: "^abc"}`
    Regex(String),

    /// `{$text: "words"}`
    Text(String),

    /// A transform of the field, checked by the inner condition:
    /// `{$floor: {$gt: 100}}` or `{$add: [5, {$gt: 100}]}`.
    Apply {
        func: Func,
        args: Vec<Expr>,
        cond: Box<FieldCond>,
    },
}

impl FieldCond {
    pub fn compare(op: CompareOp, value: Expr) -> Self {
        FieldCond::Compare {
            op,
            value: Box::new(value),
        }
    }
}

/// A field filter still missing its condition. Transforms are recorded in
/// the order they were applied to the field.
#[derive(Debug, Clone, PartialEq)]
pub struct Partial {
    pub field: String,
    pub transforms: Vec<(Func, Vec<Expr>)>,
}

impl Partial {
    pub fn new<S: ToString>(field: S) -> Self {
        Partial {
            field: field.to_string(),
            transforms: Vec::new(),
        }
    }

    pub fn apply(mut self, func: Func, args: Vec<Expr>) -> Self {
        self.transforms.push((func, args));
        self
    }

    /// Fills the hole. The first transform applied ends up outermost, so
    /// formatters unwrap transforms in application order.
    pub fn complete(self, cond: FieldCond) -> FieldFilter {
        let cond = self
            .transforms
            .into_iter()
            .rev()
            .fold(cond, |cond, (func, args)| FieldCond::Apply {
                func,
                args,
                cond: Box::new(cond),
            });

        FieldFilter {
            field: self.field,
            cond,
        }
    }
}

impl Expr {
    pub fn name<S: ToString>(name: S) -> Self {
        Expr::Name(name.to_string())
    }

    pub fn null() -> Self {
        Expr::Literal(Literal::Null)
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn function(func: Func, args: Vec<Expr>) -> Self {
        Expr::Function { func, args }
    }

    pub fn filter<S: ToString>(field: S, op: CompareOp, value: Expr) -> Self {
        Expr::Filter(FieldFilter {
            field: field.to_string(),
            cond: FieldCond::compare(op, value),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Expr::Literal(Literal::Null))
    }
}

impl From<Literal> for Expr {
    fn from(value: Literal) -> Self {
        Expr::Literal(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Literal(Literal::Integer(value))
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::Literal(Literal::Integer(value.into()))
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Literal(Literal::Float(value))
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Literal(Literal::Boolean(value))
    }
}

/// Strings are constants; use [Expr::name] for references.
impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Literal(Literal::String(value.to_string()))
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Literal(Literal::String(value))
    }
}

impl From<FieldFilter> for Expr {
    fn from(value: FieldFilter) -> Self {
        Expr::Filter(value)
    }
}

impl From<Query> for Expr {
    fn from(value: Query) -> Self {
        Expr::Query(Box::new(value))
    }
}

impl<T: Into<Expr>> From<Vec<T>> for Expr {
    fn from(values: Vec<T>) -> Self {
        Expr::Array(values.into_iter().map(Into::into).collect())
    }
}

/// A `$regex` pattern that is a plain literal, optionally anchored at
/// either end. Such patterns can be rendered with `LIKE` or the OData string
/// methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainPattern {
    pub text: String,
    pub anchored_start: bool,
    pub anchored_end: bool,
}

const REGEX_META: &str = r".^$*+?()[]{}|\";

impl PlainPattern {
    pub fn parse(pattern: &str) -> Option<Self> {
        let anchored_start = pattern.starts_with('^');
        let body = pattern.strip_prefix('^').unwrap_or(pattern);

        // `\$` at the end is an escaped dollar, not an anchor
        let anchored_end = body.ends_with('$') && !body.ends_with(r"\$");
        let body = if anchored_end {
            &body[..body.len() - 1]
        } else {
            body
        };

        let mut text = String::new();
        let mut chars = body.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped) if REGEX_META.contains(escaped) => text.push(escaped),
                    _ => return None,
                },
                c if REGEX_META.contains(c) => return None,
                c => text.push(c),
            }
        }

        Some(PlainPattern {
            text,
            anchored_start,
            anchored_end,
        })
    }
}
