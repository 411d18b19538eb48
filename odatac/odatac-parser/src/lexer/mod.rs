//! Hand-written scanner turning OData expression text into [lr::Tokens].
//!
//! Spans are character offsets into the source, which is what our error
//! reporting expects.

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use regex::Regex;

use self::lr::{Literal, Token, TokenKind, Tokens, SYNTAX_CHARS};
use crate::error::{Error, ErrorSource, Reason, WithErrorInfo};
use crate::span::Span;

pub mod lr;

/// Lex OData source into tokens. There is no recovery: the first bad
/// character ends lexing.
pub fn lex_source(source: &str) -> Result<Tokens, Error> {
    let tokens = Lexer::new(source).lex()?;
    log::trace!("lexed {} tokens", tokens.0.len());
    Ok(tokens)
}

/// Prefixes of quoted literals such as `guid'...'`.
const TYPED_PREFIXES: [&str; 6] = [
    "guid",
    "datetime",
    "datetimeoffset",
    "time",
    "duration",
    "binary",
];

struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Lexer {
            input: source.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn lex(mut self) -> Result<Tokens, Error> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            let Some(c) = self.current_char() else {
                break;
            };
            let start = self.position;

            let kind = match c {
                '\'' => TokenKind::Literal(Literal::String(self.read_quoted()?)),
                c if SYNTAX_CHARS.contains(&c) => {
                    self.advance();
                    TokenKind::Syntax(c)
                }
                '-' => match self.peek_char(1) {
                    Some(next) if next.is_ascii_digit() => self.read_number()?,
                    Some(next) if is_ident_start(next) => self.read_word()?,
                    _ => return Err(self.unexpected_char(c)),
                },
                c if c.is_ascii_digit() => self.read_number()?,
                c if is_ident_start(c) => self.read_word()?,
                c => return Err(self.unexpected_char(c)),
            };

            tokens.push(Token {
                kind,
                span: start..self.position,
            });
        }

        Ok(Tokens(tokens))
    }

    fn unexpected_char(&self, c: char) -> Error {
        Error::new(Reason::Unexpected {
            found: format!("character `{c}`"),
        })
        .with_span(Some(Span::new(self.position, self.position + 1)))
        .with_source(ErrorSource::Lexer)
    }

    fn slice(&self, start: usize) -> String {
        self.input[start..self.position].iter().collect()
    }

    /// Reads a single-quoted string where `''` stands for one quote.
    fn read_quoted(&mut self) -> Result<String, Error> {
        let start = self.position;
        let mut result = String::new();
        self.advance();

        while let Some(ch) = self.current_char() {
            self.advance();
            if ch != '\'' {
                result.push(ch);
                continue;
            }
            if self.current_char() == Some('\'') {
                result.push('\'');
                self.advance();
                continue;
            }
            return Ok(result);
        }

        Err(Error::new_simple("unterminated string")
            .with_span(Some(Span::new(start, self.position)))
            .push_hint("strings are closed with `'`; a literal quote is written as `''`")
            .with_source(ErrorSource::Lexer))
    }

    fn read_number(&mut self) -> Result<TokenKind, Error> {
        let start = self.position;
        if self.current_char() == Some('-') {
            self.advance();
        }

        let mut is_float = false;
        self.read_digits();

        if self.current_char() == Some('.') && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            self.read_digits();
        }

        if matches!(self.current_char(), Some('e' | 'E')) {
            is_float = true;
            self.advance();
            if matches!(self.current_char(), Some('+' | '-')) {
                self.advance();
            }
            if self.read_digits() == 0 {
                return Err(Error::new_simple("malformed numeric exponent")
                    .with_span(Some(Span::new(start, self.position)))
                    .with_source(ErrorSource::Lexer));
            }
        }

        let text = self.slice(start);

        let suffix = self.current_char().filter(|c| c.is_alphanumeric() || *c == '_');
        let literal = match suffix {
            None => {
                if is_float {
                    parse_float(&text)
                } else {
                    // out of i64 range still makes a valid decimal
                    text.parse::<i64>()
                        .ok()
                        .map(Literal::Integer)
                        .or_else(|| parse_float(&text))
                }
            }
            Some('L' | 'l') if !is_float => text.parse::<i64>().map(Literal::Integer).ok(),
            Some('M' | 'm' | 'D' | 'd' | 'F' | 'f') => parse_float(&text),
            Some(_) => None,
        };
        if suffix.is_some() {
            self.advance();
        }

        literal.map(TokenKind::Literal).ok_or_else(|| {
            Error::new(Reason::Simple(format!(
                "bad numeric suffix in `{}`",
                self.slice(start)
            )))
            .with_span(Some(Span::new(start, self.position)))
            .push_hint("numbers may end with `L` (integer) or `M`, `D`, `F` (decimal)")
            .with_source(ErrorSource::Lexer)
        })
    }

    fn read_digits(&mut self) -> usize {
        let mut count = 0;
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            count += 1;
        }
        count
    }

    /// Reads an identifier, which may turn out to be a reserved literal or the
    /// prefix of a typed literal.
    fn read_word(&mut self) -> Result<TokenKind, Error> {
        let start = self.position;
        if self.current_char() == Some('-') {
            self.advance();
        }
        while self.current_char().is_some_and(is_ident_continue) {
            self.advance();
        }
        let word = self.slice(start);

        if self.current_char() == Some('\'') && TYPED_PREFIXES.contains(&word.as_str()) {
            let value = self.read_quoted()?;
            return typed_literal(&word, value)
                .map(TokenKind::Literal)
                .with_span(Some(Span::new(start, self.position)))
                .with_source(ErrorSource::Lexer);
        }

        Ok(match word.as_str() {
            "true" => TokenKind::Literal(Literal::Boolean(true)),
            "false" => TokenKind::Literal(Literal::Boolean(false)),
            "null" => TokenKind::Literal(Literal::Null),
            "INF" => TokenKind::Literal(Literal::Float(f64::INFINITY)),
            "-INF" => TokenKind::Literal(Literal::Float(f64::NEG_INFINITY)),
            "NaN" | "Nan" => TokenKind::Literal(Literal::Float(f64::NAN)),
            _ => TokenKind::Ident(word),
        })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '.'
}

fn parse_float(text: &str) -> Option<Literal> {
    text.parse::<f64>().ok().map(Literal::Float)
}

fn typed_literal(prefix: &str, value: String) -> Result<Literal, Error> {
    let (pattern, kind) = match prefix {
        "guid" => (guid_pattern(), "GUID"),
        "datetime" | "datetimeoffset" => (date_pattern(), "ISO-8601 date"),
        "time" | "duration" => (duration_pattern(), "ISO-8601 duration"),
        "binary" => (binary_pattern(), "hex encoded binary"),
        _ => return Err(Error::new_assert(format!("unknown literal prefix {prefix}"))),
    };

    let literal = if pattern.is_match(&value) {
        match prefix {
            "guid" => Some(Literal::Guid(value.clone())),
            "time" | "duration" => Some(Literal::Duration(value.clone())),
            "binary" => Some(Literal::Binary(value.clone())),
            _ => parse_datetime(&value).map(Literal::DateTime),
        }
    } else {
        None
    };

    literal.ok_or_else(|| {
        Error::new(Reason::Expected {
            who: Some(format!("{prefix} literal")),
            expected: format!("a valid {kind}"),
            found: format!("`{value}`"),
        })
    })
}

/// Dates without an offset are taken to be UTC.
fn parse_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date);
    }

    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    Some(naive.and_utc().fixed_offset())
}

fn guid_pattern() -> &'static Regex {
    static GUID: OnceLock<Regex> = OnceLock::new();
    GUID.get_or_init(|| {
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
            .unwrap()
    })
}

fn date_pattern() -> &'static Regex {
    static DATE: OnceLock<Regex> = OnceLock::new();
    DATE.get_or_init(|| {
        Regex::new(
            r"^\d{4}-\d{2}-\d{2}(T\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:\d{2})?)?$",
        )
        .unwrap()
    })
}

fn duration_pattern() -> &'static Regex {
    static DURATION: OnceLock<Regex> = OnceLock::new();
    DURATION.get_or_init(|| {
        Regex::new(
            r"^-?P(\d+Y)?(\d+M)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$",
        )
        .unwrap()
    })
}

fn binary_pattern() -> &'static Regex {
    static BINARY: OnceLock<Regex> = OnceLock::new();
    BINARY.get_or_init(|| Regex::new(r"^([0-9a-fA-F]{2})*$").unwrap())
}
