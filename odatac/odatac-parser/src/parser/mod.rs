use self::pr::{Expr, ExprKind, MethodCall};
use crate::error::{Error, ErrorSource, Reason, WithErrorInfo};
use crate::lexer::lex_source;
use crate::lexer::lr::{Token, TokenKind};
use crate::span::Span;

mod expr;
pub mod pr;
mod sequence;
#[cfg(test)]
mod test;

/// Hooks letting the host remap what a member path or method call resolves
/// to. The defaults build plain [ExprKind::Member] and
/// [ExprKind::MethodCall] nodes.
pub trait Resolver {
    fn resolve_member(&mut self, name: String, span: Span) -> Result<Expr, Error> {
        Ok(Expr::new(ExprKind::Member(name)).with_span(Some(span)))
    }

    fn resolve_method(&mut self, name: String, args: Vec<Expr>, span: Span) -> Result<Expr, Error> {
        Ok(Expr::new(MethodCall { name, args }).with_span(Some(span)))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultResolver;

impl Resolver for DefaultResolver {}

/// Recursive-descent parser over a lexed OData expression.
///
/// A parser holds its cursor, so one parse must finish before the next one
/// starts; the `&mut self` receivers make that a compile-time guarantee.
pub struct Parser<R: Resolver = DefaultResolver> {
    source: Vec<char>,
    tokens: Vec<Token>,
    position: usize,
    resolver: R,
}

impl Parser<DefaultResolver> {
    pub fn new(source: &str) -> Result<Self, Error> {
        Parser::with_resolver(source, DefaultResolver)
    }
}

impl<R: Resolver> Parser<R> {
    pub fn with_resolver(source: &str, resolver: R) -> Result<Self, Error> {
        let tokens = lex_source(source)?;
        Ok(Parser {
            source: source.chars().collect(),
            tokens: tokens.0,
            position: 0,
            resolver,
        })
    }

    pub fn into_resolver(self) -> R {
        self.resolver
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.position + n)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn peek_is_syntax(&self, c: char) -> bool {
        self.peek().is_some_and(|t| t.is_syntax(c))
    }

    fn peek_is_ident(&self, name: &str) -> bool {
        self.peek().is_some_and(|t| t.is_ident(name))
    }

    /// Span of the current token, or an empty span at the end of input.
    fn current_span(&self) -> Span {
        match self.peek() {
            Some(token) => Span::from(token.span.clone()),
            None => Span::at(self.source.len()),
        }
    }

    /// Span of the previously consumed token.
    fn last_span(&self) -> Span {
        self.position
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| Span::from(t.span.clone()))
            .unwrap_or_default()
    }

    fn expected(&self, who: Option<&str>, expected: &str) -> Error {
        let found = match self.peek() {
            Some(token) => format!("`{}`", token.kind),
            None => "end of input".to_string(),
        };
        Error::new(Reason::Expected {
            who: who.map(str::to_string),
            expected: expected.to_string(),
            found,
        })
        .with_span(Some(self.current_span()))
        .with_source(ErrorSource::Parser)
    }

    fn expect_syntax(&mut self, c: char, who: &str) -> Result<Span, Error> {
        if self.peek_is_syntax(c) {
            self.next();
            Ok(self.last_span())
        } else {
            Err(self.expected(Some(who), &format!("`{c}`")))
        }
    }

    fn expect_ident(&mut self, who: &str) -> Result<(String, Span), Error> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) => {
                let name = name.clone();
                self.next();
                Ok((name, self.last_span()))
            }
            _ => Err(self.expected(Some(who), "an identifier")),
        }
    }

    fn expect_end(&self) -> Result<(), Error> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.expected(None, "end of input"))
        }
    }

    /// Text of the source between two character offsets.
    fn source_text(&self, span: Span) -> String {
        self.source[span.start..span.end].iter().collect()
    }
}

/// Parse a `$filter` expression.
pub fn parse_filter(source: &str) -> Result<Expr, Error> {
    let expr = Parser::new(source)?.parse_expression()?;
    log::debug!("parsed filter: {expr:?}");
    Ok(expr)
}

/// Parse a `$select` list.
pub fn parse_select(source: &str) -> Result<Vec<Expr>, Error> {
    Parser::new(source)?.parse_select_sequence()
}

/// Parse a `$groupby` list.
pub fn parse_group_by(source: &str) -> Result<Vec<Expr>, Error> {
    Parser::new(source)?.parse_group_by_sequence()
}

/// Parse an `$orderby` list.
pub fn parse_order_by(source: &str) -> Result<Vec<Expr>, Error> {
    Parser::new(source)?.parse_order_by_sequence()
}

/// Parse an `$expand` list.
pub fn parse_expand(source: &str) -> Result<Vec<pr::ExpandItem>, Error> {
    Parser::new(source)?.parse_expand_sequence()
}
