//! PR, or "Parser Representation" is the AST of a parsed OData expression. It
//! takes LR tokens and converts them into a structured form which understands
//! operators, method calls and the select / order-by / expand sub-grammars.

pub use expand::*;
pub use expr::*;
pub use ops::*;

// re-export Literal from LR, since it's encapsulated in ExprKind
pub use crate::lexer::lr::Literal;
pub use crate::span::Span;

mod expand;
mod expr;
mod ops;
