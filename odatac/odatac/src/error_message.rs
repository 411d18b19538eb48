use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::ops::Range;

use anstream::adapter::strip_str;
use anstream::ColorChoice;
use ariadne::{Config, Label, Report, ReportKind, Source};
use serde::Serialize;

use crate::Span;
use crate::{Error, Errors, MessageKind};

/// Id of the query in rendered reports.
const SOURCE_ID: &str = "query";

/// An error prepared for people: the reason as text plus, once
/// [composed](ErrorMessages::composed), where in the query it happened.
#[derive(Clone, Serialize)]
pub struct ErrorMessage {
    /// Message kind. Currently only Error is implemented.
    pub kind: MessageKind,
    /// Stable identifier, `E0001` to `E0005`
    pub code: Option<String>,
    /// Plain text of the error
    pub reason: String,
    /// Suggestions of how to fix the query
    pub hints: Vec<String>,
    /// Character offsets into the query
    pub span: Option<Span>,
    /// The system query option the span falls in, such as `$filter`
    pub option: Option<String>,
    /// Report with the query excerpt, the reason and hints.
    pub display: Option<String>,
    /// Line and column of the span
    pub location: Option<SourceLocation>,
}

/// Zero-based `(line, column)` pairs, in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub start: (usize, usize),

    pub end: (usize, usize),
}

impl From<Error> for ErrorMessage {
    fn from(e: Error) -> Self {
        log::debug!("{:#?}", e);
        ErrorMessage {
            kind: e.kind,
            code: e.code.map(str::to_string),
            reason: e.reason.to_string(),
            hints: e.hints,
            span: e.span,
            option: None,
            display: None,
            location: None,
        }
    }
}

impl Display for ErrorMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Some(display) = &self.display else {
            if let Some(code) = &self.code {
                write!(f, "[{code}] ")?;
            }
            writeln!(f, "Error: {}", self.reason)?;
            return self.hints.iter().try_for_each(|h| writeln!(f, "↳ Hint: {h}"));
        };

        // ariadne pads lines with trailing spaces
        let lines: Vec<_> = display.split('\n').map(str::trim_end).collect();
        f.write_str(&lines.join("\n"))
    }
}

impl Debug for ErrorMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessages {
    pub inner: Vec<ErrorMessage>,
}

impl StdError for ErrorMessages {}

impl Display for ErrorMessages {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.inner.iter().try_for_each(|e| Display::fmt(e, f))
    }
}

impl From<ErrorMessage> for ErrorMessages {
    fn from(e: ErrorMessage) -> Self {
        vec![e].into()
    }
}

impl From<Vec<ErrorMessage>> for ErrorMessages {
    fn from(inner: Vec<ErrorMessage>) -> Self {
        ErrorMessages { inner }
    }
}

impl From<Error> for ErrorMessages {
    fn from(e: Error) -> Self {
        ErrorMessage::from(e).into()
    }
}

impl From<Errors> for ErrorMessages {
    fn from(errs: Errors) -> Self {
        errs.0
            .into_iter()
            .map(ErrorMessage::from)
            .collect::<Vec<_>>()
            .into()
    }
}

impl ErrorMessages {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }

    /// Points every message with a span into `query`: the query option it
    /// falls in, its location and a rendered report.
    pub fn composed(mut self, query: &str) -> Self {
        let composer = Composer::new(query);
        for message in &mut self.inner {
            composer.compose(message);
        }
        self
    }

    /// Removes ANSI colors from the rendered reports.
    pub fn plain(mut self) -> Self {
        for message in &mut self.inner {
            if let Some(display) = &mut message.display {
                *display = strip_str(display).to_string();
            }
        }
        self
    }
}

/// Renders messages against one query.
struct Composer<'a> {
    query: &'a str,
    len: usize,
    source: Source<&'a str>,
}

impl<'a> Composer<'a> {
    fn new(query: &'a str) -> Self {
        Composer {
            query,
            len: query.chars().count(),
            source: Source::from(query),
        }
    }

    fn compose(&self, message: &mut ErrorMessage) {
        let Some(span) = message.span else {
            return;
        };
        if span.end > self.len {
            log::warn!("span {span:?} is out of bounds of the query (len = {})", self.len);
            return;
        }

        message.option = self.option_at(span.start);
        message.location = self.locate(span);
        message.display = self.render(message, span.into());
    }

    fn locate(&self, span: Span) -> Option<SourceLocation> {
        let (_, start_line, start_col) = self.source.get_offset_line(span.start)?;
        let (_, end_line, end_col) = self.source.get_offset_line(span.end)?;
        Some(SourceLocation {
            start: (start_line, start_col),
            end: (end_line, end_col),
        })
    }

    /// Key of the `$key=value` segment containing `offset`, if the query is
    /// a set of system query options.
    fn option_at(&self, offset: usize) -> Option<String> {
        let before: String = self.query.chars().take(offset).collect();
        let start = before
            .rmatch_indices('&')
            .map(|(i, _)| i + 1)
            .find(|&i| before[i..].starts_with('$'))
            .unwrap_or(0);

        let (key, _) = self.query[start..].split_once('=')?;
        let name = key.strip_prefix('$')?;
        let is_option = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic());
        is_option.then(|| key.to_string())
    }

    fn render(&self, message: &ErrorMessage, range: Range<usize>) -> Option<String> {
        // Always rendered in color, stripped afterwards when not wanted.
        let mut report = Report::build(ReportKind::Error, (SOURCE_ID, range.clone()))
            .with_config(Config::default().with_color(true))
            .with_label(Label::new((SOURCE_ID, range)).with_message(&message.reason));

        if let Some(code) = &message.code {
            report = report.with_code(code);
        }
        if let Some(option) = &message.option {
            report = report.with_message(format!("invalid `{option}`"));
        }
        let mut hints = message.hints.iter();
        if let Some(help) = hints.next() {
            report = report.with_help(help);
        }
        if let Some(note) = hints.next() {
            report = report.with_note(note);
        }

        let mut out = Vec::new();
        report
            .finish()
            .write((SOURCE_ID, Source::from(self.query)), &mut out)
            .ok()?;
        let rendered = String::from_utf8(out).ok()?;
        Some(maybe_strip_colors(&rendered))
    }
}

/// Strips colors unless stderr takes them. Responds to variables such as
/// `CLICOLOR`, which keeps snapshot tests plain.
fn maybe_strip_colors(s: &str) -> String {
    match anstream::AutoStream::choice(&std::io::stderr()) {
        ColorChoice::Never => strip_str(s).to_string(),
        ColorChoice::Auto | ColorChoice::Always | ColorChoice::AlwaysAnsi => s.to_string(),
    }
}

#[cfg(test)]
mod test {
    use insta::assert_snapshot;

    use super::*;
    use crate::WithErrorInfo;

    fn composed(error: Error, query: &str) -> ErrorMessage {
        let mut messages = ErrorMessages::from(error).composed(query).plain();
        messages.inner.remove(0)
    }

    #[test]
    fn test_compose() {
        let error = Error::new_simple("bad operand")
            .with_span(Some(Span::new(15, 20)))
            .push_hint("compare with a constant");
        let message = composed(error, "$top=5&$filter=price gt x");

        assert_eq!(message.option.as_deref(), Some("$filter"));
        assert_eq!(
            message.location,
            Some(SourceLocation {
                start: (0, 15),
                end: (0, 20),
            })
        );
        let display = message.display.unwrap();
        assert!(display.contains("invalid `$filter`"), "{display}");
        assert!(display.contains("bad operand"), "{display}");
        assert!(display.contains("compare with a constant"), "{display}");
    }

    #[test]
    fn test_option_at() {
        let composer = Composer::new("$filter=name eq 'A&B'&$top=5");
        assert_eq!(composer.option_at(10).as_deref(), Some("$filter"));
        assert_eq!(composer.option_at(19).as_deref(), Some("$filter"));
        assert_eq!(composer.option_at(27).as_deref(), Some("$top"));

        // a bare expression isn't a set of options
        assert_eq!(Composer::new("price gt 5").option_at(3), None);
        assert_eq!(Composer::new("name eq 'a=b'").option_at(3), None);
    }

    #[test]
    fn test_out_of_bounds() {
        let error = Error::new_simple("bad").with_span(Some(Span::new(30, 40)));
        let message = composed(error, "$top=5");
        assert!(message.location.is_none());
        assert!(message.display.is_none());
    }

    #[test]
    fn test_display_without_span() {
        let error = Error::new_simple("query has no statement")
            .push_hint("call `select` or `delete` first")
            .with_code("E0004");
        let messages = ErrorMessages::from(error);
        assert_snapshot!(messages.to_string(), @r"
        [E0004] Error: query has no statement
        ↳ Hint: call `select` or `delete` first
        ");

        let json = messages.to_json();
        assert!(json.contains(r#""reason":"query has no statement""#), "{json}");
    }
}
