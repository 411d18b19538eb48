//! Comma separated sub-grammars: `$select`, `$groupby`, `$orderby` and
//! `$expand` lists.

use super::pr::*;
use super::{Parser, Resolver};
use crate::error::{Error, ErrorSource, Reason, WithErrorInfo};
use crate::span::Span;

const EXPAND_OPTIONS: [&str; 9] = [
    "$filter", "$select", "$orderby", "$groupby", "$expand", "$top", "$skip", "$levels", "$count",
];

impl<R: Resolver> Parser<R> {
    /// Items optionally followed by `as <alias>`.
    pub fn parse_select_sequence(&mut self) -> Result<Vec<Expr>, Error> {
        self.parse_sequence(|p| {
            let expr = p.parse_common()?;
            if !p.peek_is_ident("as") {
                return Ok(expr);
            }
            p.next();
            let (alias, alias_span) = p.expect_ident("select alias")?;
            let span = Span::merge_opt(expr.span, Some(alias_span));

            Ok(Expr::new(ExprKind::SelectAlias(SelectAlias {
                expr: Box::new(expr),
                alias,
            }))
            .with_span(span))
        })
    }

    pub fn parse_group_by_sequence(&mut self) -> Result<Vec<Expr>, Error> {
        self.parse_sequence(|p| p.parse_common())
    }

    /// Items optionally followed by `asc` or `desc`; ascending by default.
    pub fn parse_order_by_sequence(&mut self) -> Result<Vec<Expr>, Error> {
        self.parse_sequence(|p| {
            let expr = p.parse_common()?;
            let direction = if p.peek_is_ident("desc") {
                p.next();
                SortDirection::Desc
            } else {
                if p.peek_is_ident("asc") {
                    p.next();
                }
                SortDirection::Asc
            };
            let span = Span::merge_opt(expr.span, Some(p.last_span()));

            Ok(Expr::new(ExprKind::OrderDirection(OrderDirection {
                expr: Box::new(expr),
                direction,
            }))
            .with_span(span))
        })
    }

    /// Items of the form `name` or `name($key=value;...)`.
    pub fn parse_expand_sequence(&mut self) -> Result<Vec<ExpandItem>, Error> {
        self.parse_sequence(|p| p.parse_expand_item())
    }

    fn parse_sequence<T, F>(&mut self, mut item: F) -> Result<Vec<T>, Error>
    where
        F: FnMut(&mut Self) -> Result<T, Error>,
    {
        let mut items = vec![item(self)?];
        while self.peek_is_syntax(',') {
            self.next();
            items.push(item(self)?);
        }
        self.expect_end()?;
        Ok(items)
    }

    fn parse_expand_item(&mut self) -> Result<ExpandItem, Error> {
        let (name, start) = self.expect_ident("expand")?;
        let mut options = ExpandOptions::default();

        if self.peek_is_syntax('(') {
            self.next();
            loop {
                let (key, key_span) = self.expect_ident("expand option")?;
                self.expect_syntax('=', "expand option")?;
                let value = self.capture_option_value(&key)?;
                set_expand_option(&mut options, &key, value).with_span(Some(key_span))?;

                if self.peek_is_syntax(';') {
                    self.next();
                    continue;
                }
                self.expect_syntax(')', "expand options")?;
                break;
            }
        }

        Ok(ExpandItem {
            name,
            options,
            span: Some(Span::merge(start, self.last_span())),
        })
    }

    /// Consumes tokens up to the next `;` or unmatched `)` at this nesting
    /// level and returns the source text they cover.
    fn capture_option_value(&mut self, key: &str) -> Result<String, Error> {
        let start = self.current_span();
        let mut depth = 0_usize;
        let mut consumed = false;

        while let Some(token) = self.peek() {
            if token.is_syntax('(') {
                depth += 1;
            } else if token.is_syntax(')') {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            } else if token.is_syntax(';') && depth == 0 {
                break;
            }
            self.next();
            consumed = true;
        }

        if !consumed {
            return Err(self.expected(Some(key), "a value"));
        }
        if depth > 0 {
            return Err(self.expected(Some(key), "`)`"));
        }
        Ok(self.source_text(Span::merge(start, self.last_span())))
    }
}

fn set_expand_option(options: &mut ExpandOptions, key: &str, value: String) -> Result<(), Error> {
    match key {
        "$filter" => options.filter = Some(value),
        "$select" => options.select = Some(value),
        "$orderby" => options.orderby = Some(value),
        "$groupby" => options.groupby = Some(value),
        "$expand" => options.expand = Some(value),
        "$top" => options.top = Some(coerce_int(&value)),
        "$skip" => options.skip = Some(coerce_int(&value)),
        "$levels" => options.levels = Some(coerce_int(&value)),
        "$count" => options.count = Some(coerce_bool(&value)),
        _ => {
            return Err(Error::new(Reason::Expected {
                who: Some("expand option".to_string()),
                expected: format!("one of {}", EXPAND_OPTIONS.join(", ")),
                found: format!("`{key}`"),
            })
            .with_source(ErrorSource::Parser))
        }
    }
    Ok(())
}
