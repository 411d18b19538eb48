use serde::{Deserialize, Serialize};

use crate::span::Span;

/// One item of an `$expand` list, such as `customer($select=name;$top=1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandItem {
    pub name: String,

    #[serde(default, skip_serializing_if = "ExpandOptions::is_empty")]
    pub options: ExpandOptions,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// Expand options. Expression-valued options hold the source text verbatim so
/// they can be parsed later with the grammar of their own option.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpandOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orderby: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groupby: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<bool>,
}

impl ExpandOptions {
    pub fn is_empty(&self) -> bool {
        self == &ExpandOptions::default()
    }
}

/// Leading-integer coercion used for paging values: `"5abc"` is 5, and
/// anything without leading digits is 0.
pub fn coerce_int(text: &str) -> i64 {
    let text = text.trim();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    digits[..end].parse::<i64>().map(|n| sign * n).unwrap_or(0)
}

/// `$count` is true only when spelled `true`.
pub fn coerce_bool(text: &str) -> bool {
    text.trim() == "true"
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_coerce_int() {
        assert_eq!(coerce_int("25"), 25);
        assert_eq!(coerce_int(" 7 "), 7);
        assert_eq!(coerce_int("5abc"), 5);
        assert_eq!(coerce_int("-3"), -3);
        assert_eq!(coerce_int("abc"), 0);
        assert_eq!(coerce_int(""), 0);
    }

    #[test]
    fn test_coerce_bool() {
        assert!(coerce_bool("true"));
        assert!(!coerce_bool("1"));
        assert!(!coerce_bool("TRUE"));
    }
}
