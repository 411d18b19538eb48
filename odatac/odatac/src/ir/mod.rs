//! The intermediate representation shared by every front end and back end.
//!
//! Text queries are lowered into it by [crate::semantic], the
//! [crate::builder::QueryBuilder] produces it directly, and the formatters in
//! [crate::sql] and [crate::odata] render it. Its serde form is the `$`-keyed
//! JSON described in [json].

pub use expr::*;
pub use query::*;

pub use odatac_parser::lexer::lr::Literal;

mod expr;
pub mod json;
mod query;
