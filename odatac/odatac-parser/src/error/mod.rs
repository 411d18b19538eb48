use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use crate::span::Span;


/// A compile error. Used internally, exposed as `odatac::ErrorMessage`.
#[derive(Debug, Clone)]
pub struct Error {
    /// Message kind. Currently only Error is implemented.
    pub kind: MessageKind,
    pub span: Option<Span>,
    pub reason: Reason,
    pub hints: Vec<String>,
    /// Machine readable identifier, such as "E0001"
    pub code: Option<&'static str>,
    pub source: ErrorSource,
}

/// Many compile errors. Used internally, exposed as `odatac::ErrorMessages`.
#[derive(Debug, Clone)]
pub struct Errors(pub Vec<Error>);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    Error,
}

/// The compiler stage which raised an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, strum::AsRefStr)]
pub enum ErrorSource {
    /// Bad character, unterminated string, malformed number or typed literal.
    Lexer,
    /// Unexpected or missing token, unmatched parenthesis, wrong arity.
    Parser,
    /// Invalid operator for a node, empty logical list, incomplete builder.
    Semantic,
    /// Unresolved operator or a statement a target cannot express.
    Format,
    #[default]
    Unknown,
}

/// Error code of [Reason::Unsupported], regardless of the stage.
pub const UNSUPPORTED_CODE: &str = "E0005";

impl ErrorSource {
    const CODES: [(ErrorSource, &'static str); 4] = [
        (ErrorSource::Lexer, "E0001"),
        (ErrorSource::Parser, "E0002"),
        (ErrorSource::Semantic, "E0003"),
        (ErrorSource::Format, "E0004"),
    ];

    pub fn code(&self) -> Option<&'static str> {
        Self::CODES
            .iter()
            .find(|(source, _)| source == self)
            .map(|(_, code)| *code)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    Simple(String),
    Expected {
        who: Option<String>,
        expected: String,
        found: String,
    },
    Unexpected {
        found: String,
    },
    NotFound {
        name: String,
        namespace: String,
    },
    /// A construct the selected output target cannot express.
    Unsupported {
        what: String,
        target: String,
    },
    /// Something that should have been ruled out by an earlier stage.
    Bug {
        details: Option<String>,
    },
}

impl Display for Reason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Simple(text) => f.write_str(text),
            Reason::Expected {
                who: Some(who),
                expected,
                found,
            } => write!(f, "{who} expected {expected}, but found {found}"),
            Reason::Expected {
                who: None,
                expected,
                found,
            } => write!(f, "expected {expected}, but found {found}"),
            Reason::Unexpected { found } => write!(f, "unexpected {found}"),
            Reason::NotFound { name, namespace } => write!(f, "{namespace} `{name}` not found"),
            Reason::Unsupported { what, target } => {
                write!(f, "{what} is not supported by {target}")
            }
            Reason::Bug { details: None } => f.write_str("internal compiler error"),
            Reason::Bug {
                details: Some(details),
            } => write!(f, "internal compiler error; {details}"),
        }
    }
}

impl Error {
    pub fn new(reason: Reason) -> Self {
        Error {
            kind: MessageKind::Error,
            span: None,
            reason,
            hints: Vec::new(),
            code: None,
            source: ErrorSource::Unknown,
        }
    }

    pub fn new_simple<S: ToString>(reason: S) -> Self {
        Error::new(Reason::Simple(reason.to_string()))
    }

    /// A statement or operator that `target` has no way to express.
    pub fn new_unsupported<W: ToString, T: ToString>(what: W, target: T) -> Self {
        let reason = Reason::Unsupported {
            what: what.to_string(),
            target: target.to_string(),
        };
        Error::new(reason)
            .with_code(UNSUPPORTED_CODE)
            .with_source(ErrorSource::Format)
    }

    /// An invariant an earlier stage should have upheld.
    pub fn new_assert<S: ToString>(details: S) -> Self {
        Error::new(Reason::Bug {
            details: Some(details.to_string()),
        })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[{code}] ")?;
        }
        write!(f, "{}", self.reason)?;
        if let Some(span) = self.span {
            write!(f, " at {span}")?;
        }
        Ok(())
    }
}

impl Display for Errors {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let lines: Vec<_> = self.0.iter().map(Error::to_string).collect();
        f.write_str(&lines.join("\n"))
    }
}

impl std::error::Error for Error {}

impl std::error::Error for Errors {}

impl From<Error> for Errors {
    fn from(error: Error) -> Self {
        Errors(vec![error])
    }
}

/// Decorates an error, or the error of a result, on its way up.
pub trait WithErrorInfo: Sized {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self;

    fn with_span(self, span: Option<Span>) -> Self;

    /// Sets the span only if there is none yet.
    fn with_span_fallback(self, span: Option<Span>) -> Self;

    fn with_code(self, code: &'static str) -> Self;

    /// Tags the error with the stage that raised it. A missing code is filled
    /// in from the stage.
    fn with_source(self, source: ErrorSource) -> Self;
}

impl WithErrorInfo for Error {
    fn push_hint<S: Into<String>>(mut self, hint: S) -> Self {
        self.hints.push(hint.into());
        self
    }

    fn with_span(self, span: Option<Span>) -> Self {
        Error { span, ..self }
    }

    fn with_span_fallback(self, span: Option<Span>) -> Self {
        let span = self.span.or(span);
        Error { span, ..self }
    }

    fn with_code(self, code: &'static str) -> Self {
        Error {
            code: Some(code),
            ..self
        }
    }

    fn with_source(mut self, source: ErrorSource) -> Self {
        if self.source == ErrorSource::Unknown {
            self.source = source;
        }
        if self.code.is_none() {
            self.code = self.source.code();
        }
        self
    }
}

impl<T, E: WithErrorInfo> WithErrorInfo for Result<T, E> {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self {
        self.map_err(|e| e.push_hint(hint))
    }

    fn with_span(self, span: Option<Span>) -> Self {
        self.map_err(|e| e.with_span(span))
    }

    fn with_span_fallback(self, span: Option<Span>) -> Self {
        self.map_err(|e| e.with_span_fallback(span))
    }

    fn with_code(self, code: &'static str) -> Self {
        self.map_err(|e| e.with_code(code))
    }

    fn with_source(self, source: ErrorSource) -> Self {
        self.map_err(|e| e.with_source(source))
    }
}
