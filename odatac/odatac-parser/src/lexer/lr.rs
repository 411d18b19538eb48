use chrono::{DateTime, FixedOffset, SecondsFormat};
use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Tokens(pub Vec<Token>);

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: std::ops::Range<usize>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, EnumAsInner)]
pub enum TokenKind {
    #[cfg_attr(
        feature = "serde_yaml",
        serde(with = "serde_yaml::with::singleton_map")
    )]
    Literal(Literal),

    /// Any identifier, including operator keywords such as `eq` or `and`.
    Ident(String),

    /// single-char punctuation: `( ) , / = ; :`
    Syntax(char),
}

/// Punctuation recognized by the lexer.
pub const SYNTAX_CHARS: [char; 7] = ['(', ')', ',', '/', '=', ';', ':'];

#[derive(Debug, EnumAsInner, PartialEq, Clone, Serialize, Deserialize, strum::AsRefStr)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Guid(String),
    DateTime(DateTime<FixedOffset>),
    /// An ISO-8601 duration such as `PT12H30M`.
    Duration(String),
    /// Hex encoded bytes.
    Binary(String),
}

impl Literal {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Literal::Integer(_) | Literal::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Integer(i) => Some(*i as f64),
            Literal::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Renders the literal in OData syntax.
impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Float(x) if x.is_nan() => f.write_str("NaN"),
            Literal::Float(x) if x.is_infinite() => {
                f.write_str(if *x > 0.0 { "INF" } else { "-INF" })
            }
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Guid(g) => write!(f, "guid'{g}'"),
            Literal::DateTime(d) => {
                write!(
                    f,
                    "datetime'{}'",
                    d.to_rfc3339_opts(SecondsFormat::AutoSi, true)
                )
            }
            Literal::Duration(d) => write!(f, "time'{d}'"),
            Literal::Binary(b) => write!(f, "binary'{b}'"),
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Literal(lit) => write!(f, "{lit}"),
            TokenKind::Ident(s) => {
                if s.is_empty() {
                    // FYI this shows up in errors
                    write!(f, "an identifier")
                } else {
                    write!(f, "{s}")
                }
            }
            TokenKind::Syntax(c) => write!(f, "{c}"),
        }
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}: {:?}", self.span.start, self.span.end, self.kind)
    }
}

impl Token {
    pub fn is_syntax(&self, c: char) -> bool {
        matches!(self.kind, TokenKind::Syntax(x) if x == c)
    }

    /// Identifier tokens compare case-sensitively, as OData keywords are lower
    /// case.
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(x) if x == name)
    }
}
