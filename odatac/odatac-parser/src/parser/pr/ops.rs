use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
}

#[derive(
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
    /// Takes exactly one argument.
    Not,
}

#[derive(
    Debug,
    Default,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Any operator that may appear between two operands.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum InfixOp {
    Arithmetic(ArithmeticOp),
    Comparison(ComparisonOp),
}

impl InfixOp {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        use std::str::FromStr;

        ArithmeticOp::from_str(keyword)
            .map(InfixOp::Arithmetic)
            .or_else(|_| ComparisonOp::from_str(keyword).map(InfixOp::Comparison))
            .ok()
    }

    /// Higher binds tighter. Logical operators are handled separately.
    pub fn binding_strength(&self) -> u8 {
        match self {
            InfixOp::Arithmetic(ArithmeticOp::Mul | ArithmeticOp::Div | ArithmeticOp::Mod) => 30,
            InfixOp::Arithmetic(ArithmeticOp::Add | ArithmeticOp::Sub) => 20,
            InfixOp::Comparison(_) => 10,
        }
    }
}
