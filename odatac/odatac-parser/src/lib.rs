//! Lexer and parser for OData query expressions.
//!
//! The lexer turns a query string into [lexer::lr::Tokens]; the parser turns
//! tokens into the AST in [parser::pr]. Both report failures as
//! [error::Error] with character-offset spans into the source.

pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;

pub use self::lexer::lex_source;
pub use self::parser::{
    parse_expand, parse_filter, parse_group_by, parse_order_by, parse_select, DefaultResolver,
    Parser, Resolver,
};
