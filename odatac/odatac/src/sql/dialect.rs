//! Feature map for SQL dialects.
//!
//! The generic dialect is the baseline. A dialect overrides a handler method
//! only where its syntax differs, such as paging in MS SQL or string
//! concatenation in SQLite.
use core::fmt::Debug;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::ir::Func;

/// SQL dialect.
///
/// This only changes the output for a relatively small subset of features:
/// identifier quoting, literals, paging and a handful of functions.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Serialize,
    Default,
    Deserialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
    strum::VariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum Dialect {
    #[default]
    Generic,
    MsSql,
    MySql,
    Postgres,
    SQLite,
}

impl Dialect {
    pub(super) fn handler(&self) -> Box<dyn DialectHandler> {
        match self {
            Dialect::MsSql => Box::new(MsSqlDialect),
            Dialect::MySql => Box::new(MySqlDialect),
            Dialect::SQLite => Box::new(SQLiteDialect),
            Dialect::Postgres => Box::new(PostgresDialect),
            Dialect::Generic => Box::new(GenericDialect),
        }
    }
}

#[derive(Debug)]
pub struct GenericDialect;
#[derive(Debug)]
pub struct SQLiteDialect;
#[derive(Debug)]
pub struct MySqlDialect;
#[derive(Debug)]
pub struct MsSqlDialect;
#[derive(Debug)]
pub struct PostgresDialect;

pub(super) trait DialectHandler: Debug {
    /// Quoting template for one identifier segment; `$1` is the segment.
    fn ident_format(&self) -> &'static str {
        "$1"
    }

    /// Paging with `OFFSET .. ROWS FETCH NEXT .. ROWS ONLY`, which needs an
    /// ORDER BY clause.
    fn use_fetch(&self) -> bool {
        false
    }

    /// Support for CONCAT function.
    /// When not supported we fallback to use `||` as concat operator.
    fn has_concat_function(&self) -> bool {
        true
    }

    /// Operator matching a column against a regular expression, if any.
    fn regex_operator(&self) -> Option<&'static str> {
        Some("REGEXP")
    }

    fn translate_boolean(&self, value: bool) -> &'static str {
        if value {
            "true"
        } else {
            "false"
        }
    }

    /// Quotes are doubled, control characters and the backslash are
    /// backslash escaped.
    fn translate_string(&self, value: &str) -> String {
        let mut escaped = String::with_capacity(value.len() + 2);
        escaped.push('\'');
        for c in value.chars() {
            match c {
                '\'' => escaped.push_str("''"),
                c => push_backslash_escaped(&mut escaped, c),
            }
        }
        escaped.push('\'');
        escaped
    }

    fn translate_datetime(&self, value: &DateTime<FixedOffset>) -> String {
        format!("'{}'", value.format("%Y-%m-%d %H:%M:%S%.3f%:z"))
    }

    /// `hex` holds the digits only.
    fn translate_binary(&self, hex: &str) -> String {
        format!("X'{hex}'")
    }

    fn length_function(&self) -> &'static str {
        "LENGTH"
    }

    fn ceiling_function(&self) -> &'static str {
        "CEIL"
    }

    fn substring_function(&self) -> &'static str {
        "SUBSTRING"
    }

    /// Substring calls in this dialect must carry a length.
    fn substring_requires_length(&self) -> bool {
        false
    }

    /// One-based position of `search` in `text`, 0 when missing.
    fn translate_position(&self, text: &str, search: &str) -> String {
        format!("POSITION({search} IN {text})")
    }

    fn translate_date(&self, arg: &str) -> String {
        format!("CAST({arg} AS DATE)")
    }

    /// `part` is one of the date part functions, such as [Func::Year].
    fn translate_date_part(&self, part: Func, arg: &str) -> String {
        format!("EXTRACT({} FROM {arg})", date_part_name(part))
    }

    fn translate_paging(&self, skip: Option<i64>, take: Option<i64>) -> Option<String> {
        match (skip, take) {
            (None, None) => None,
            (None, Some(take)) => Some(format!("LIMIT {take}")),
            (Some(skip), None) => Some(format!("OFFSET {skip}")),
            (Some(skip), Some(take)) => Some(format!("LIMIT {take} OFFSET {skip}")),
        }
    }
}

fn push_backslash_escaped(out: &mut String, c: char) {
    match c {
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\0' => out.push_str("\\0"),
        c if c.is_ascii_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
        c => out.push(c),
    }
}

/// Literal without escape sequences, where only quotes need doubling.
fn quote_doubled(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(super) fn date_part_name(part: Func) -> &'static str {
    match part {
        Func::Year => "YEAR",
        Func::Month => "MONTH",
        Func::Day => "DAY",
        Func::Hour => "HOUR",
        Func::Minute => "MINUTE",
        _ => "SECOND",
    }
}

impl DialectHandler for GenericDialect {}

impl DialectHandler for PostgresDialect {
    fn ident_format(&self) -> &'static str {
        "\"$1\""
    }

    fn regex_operator(&self) -> Option<&'static str> {
        Some("~")
    }

    fn translate_datetime(&self, value: &DateTime<FixedOffset>) -> String {
        format!("'{}'::timestamptz", value.format("%Y-%m-%d %H:%M:%S%.3f%:z"))
    }

    fn translate_binary(&self, hex: &str) -> String {
        format!("'\\x{hex}'::bytea")
    }

    /// Backslashes only escape inside `E'...'` strings, which are used
    /// when the value holds control characters.
    fn translate_string(&self, value: &str) -> String {
        if value.chars().any(|c| c.is_ascii_control()) {
            format!("E{}", GenericDialect.translate_string(value))
        } else {
            quote_doubled(value)
        }
    }
}

impl DialectHandler for SQLiteDialect {
    fn ident_format(&self) -> &'static str {
        "\"$1\""
    }

    fn has_concat_function(&self) -> bool {
        false
    }

    fn translate_datetime(&self, value: &DateTime<FixedOffset>) -> String {
        format!("'{}'", value.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }

    /// SQLite has no escape sequences; control characters stay raw.
    fn translate_string(&self, value: &str) -> String {
        quote_doubled(value)
    }

    fn substring_function(&self) -> &'static str {
        "SUBSTR"
    }

    fn translate_position(&self, text: &str, search: &str) -> String {
        format!("INSTR({text}, {search})")
    }

    fn translate_date(&self, arg: &str) -> String {
        format!("DATE({arg})")
    }

    // https://www.sqlite.org/lang_datefunc.html
    fn translate_date_part(&self, part: Func, arg: &str) -> String {
        let format = match part {
            Func::Year => "%Y",
            Func::Month => "%m",
            Func::Day => "%d",
            Func::Hour => "%H",
            Func::Minute => "%M",
            _ => "%S",
        };
        format!("CAST(strftime('{format}', {arg}) AS INTEGER)")
    }

    fn translate_paging(&self, skip: Option<i64>, take: Option<i64>) -> Option<String> {
        match (skip, take) {
            // OFFSET is only valid after LIMIT
            (Some(skip), None) => Some(format!("LIMIT -1 OFFSET {skip}")),
            (skip, take) => GenericDialect.translate_paging(skip, take),
        }
    }
}

impl DialectHandler for MsSqlDialect {
    fn translate_string(&self, value: &str) -> String {
        quote_doubled(value)
    }

    fn ident_format(&self) -> &'static str {
        "[$1]"
    }

    fn use_fetch(&self) -> bool {
        true
    }

    fn regex_operator(&self) -> Option<&'static str> {
        None
    }

    fn translate_boolean(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn translate_datetime(&self, value: &DateTime<FixedOffset>) -> String {
        format!("'{}'", value.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }

    fn translate_binary(&self, hex: &str) -> String {
        format!("0x{hex}")
    }

    fn length_function(&self) -> &'static str {
        "LEN"
    }

    fn ceiling_function(&self) -> &'static str {
        "CEILING"
    }

    fn substring_requires_length(&self) -> bool {
        true
    }

    fn translate_position(&self, text: &str, search: &str) -> String {
        format!("CHARINDEX({search}, {text})")
    }

    // https://learn.microsoft.com/en-us/sql/t-sql/functions/datepart-transact-sql
    fn translate_date_part(&self, part: Func, arg: &str) -> String {
        format!("DATEPART({}, {arg})", date_part_name(part).to_lowercase())
    }

    fn translate_paging(&self, skip: Option<i64>, take: Option<i64>) -> Option<String> {
        match (skip, take) {
            (None, None) => None,
            (skip, None) => Some(format!("OFFSET {} ROWS", skip.unwrap_or(0))),
            (skip, Some(take)) => Some(format!(
                "OFFSET {} ROWS FETCH NEXT {take} ROWS ONLY",
                skip.unwrap_or(0)
            )),
        }
    }
}

impl DialectHandler for MySqlDialect {
    fn ident_format(&self) -> &'static str {
        "`$1`"
    }

    // https://dev.mysql.com/doc/refman/8.0/en/string-literals.html
    fn translate_string(&self, value: &str) -> String {
        let mut escaped = String::with_capacity(value.len() + 2);
        escaped.push('\'');
        for c in value.chars() {
            match c {
                '\\' => escaped.push_str("\\\\"),
                '\'' => escaped.push_str("\\'"),
                '\0' => escaped.push_str("\\0"),
                '\n' => escaped.push_str("\\n"),
                '\r' => escaped.push_str("\\r"),
                '\x1a' => escaped.push_str("\\Z"),
                c => escaped.push(c),
            }
        }
        escaped.push('\'');
        escaped
    }

    fn translate_datetime(&self, value: &DateTime<FixedOffset>) -> String {
        format!("'{}'", value.format("%Y-%m-%d %H:%M:%S%.3f"))
    }

    fn translate_position(&self, text: &str, search: &str) -> String {
        format!("LOCATE({search}, {text})")
    }

    fn translate_date(&self, arg: &str) -> String {
        format!("DATE({arg})")
    }

    fn translate_paging(&self, skip: Option<i64>, take: Option<i64>) -> Option<String> {
        match (skip, take) {
            (None, None) => None,
            (None, Some(take)) => Some(format!("LIMIT {take}")),
            // https://dev.mysql.com/doc/refman/8.0/en/select.html, "to retrieve all
            // rows from a certain offset up to the end of the result set"
            (Some(skip), None) => Some(format!("LIMIT {skip}, 18446744073709551615")),
            (Some(skip), Some(take)) => Some(format!("LIMIT {skip}, {take}")),
        }
    }
}
