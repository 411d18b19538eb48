use std::str::FromStr;

use odatac_parser::parser::pr::{self, coerce_bool, coerce_int};
use odatac_parser::{lex_source, parse_expand, parse_filter, parse_group_by, parse_order_by, parse_select};
use url::form_urlencoded;

use super::{lower_fields, lower_order, Lower};
use crate::debug;
use crate::ir::{self, Entity, Join, JoinDirection};
use crate::{Error, ErrorSource, Reason, Result, WithErrorInfo};

const SYSTEM_OPTIONS: [&str; 8] = [
    "$filter", "$select", "$orderby", "$groupby", "$expand", "$top", "$skip", "$count",
];

/// The system query options of one OData request, decoded.
///
/// Options are also joined back into a single `key=value&...` source string,
/// which error messages point into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    options: Vec<QueryOption>,
    source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOption {
    pub key: String,
    pub value: String,

    /// Offset of `value` in [QueryOptions::source].
    offset: usize,
}

impl QueryOptions {
    pub fn parse(query: &str) -> Result<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);

        let mut options = QueryOptions::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            // custom query options are the host's business
            if !key.starts_with('$') {
                continue;
            }
            options.push(key.into_owned(), value.into_owned())?;
        }
        Ok(options)
    }

    /// Adds an option. Keys must be known system options and appear once.
    pub fn push(&mut self, key: String, value: String) -> Result<()> {
        if !SYSTEM_OPTIONS.contains(&key.as_str()) {
            return Err(Error::new(Reason::Expected {
                who: Some("query option".to_string()),
                expected: format!("one of {}", SYSTEM_OPTIONS.join(", ")),
                found: format!("`{key}`"),
            })
            .with_source(ErrorSource::Parser));
        }
        if self.get(&key).is_some() {
            return Err(Error::new_simple(format!("duplicate query option `{key}`"))
                .with_source(ErrorSource::Parser));
        }

        if !self.source.is_empty() {
            self.source.push('&');
        }
        self.source.push_str(&key);
        self.source.push('=');
        let offset = self.source.chars().count();
        self.source.push_str(&value);

        self.options.push(QueryOption { key, value, offset });
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.key == key)
            .map(|o| o.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryOption> {
        self.options.iter()
    }

    /// The decoded options joined as `key=value&...`.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

impl FromStr for QueryOptions {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        QueryOptions::parse(s)
    }
}

/// Builds a select over `collection` from OData query options.
///
/// Field names stay unqualified, as OData names them relative to the
/// collection. Expand items become left joins without a condition.
pub fn resolve_options(collection: &str, options: &QueryOptions) -> Result<ir::Query> {
    let mut select = ir::Select {
        entity: Some(Entity::table(collection)),
        fields: Vec::new(),
        fixed: false,
    };
    let mut query = ir::Query::default();

    for option in options.iter() {
        debug::log_stage(debug::Stage::Options);
        debug::log_option(Some(&option.key));
        log::debug!("resolving {}={}", option.key, option.value);

        resolve_option(option, &mut select, &mut query)
            .map_err(|e| shift_span(e, option.offset))?;
    }

    debug::log_option(None);
    query.statement = Some(ir::Statement::Select(select));
    debug::log_entry(|| debug::DebugEntryKind::ReprIr(query.clone()));
    Ok(query)
}

fn resolve_option(option: &QueryOption, select: &mut ir::Select, query: &mut ir::Query) -> Result<()> {
    let value = option.value.as_str();
    match option.key.as_str() {
        "$filter" => {
            if debug::log_is_enabled() {
                debug::log_stage(debug::Stage::Lexer);
                if let Ok(tokens) = lex_source(value) {
                    debug::log_entry(|| debug::DebugEntryKind::ReprLr(tokens));
                }
            }
            let ast = parse(|| parse_filter(value))?;
            debug::log_entry(|| debug::DebugEntryKind::ReprPr(vec![ast.clone()]));

            debug::log_stage(debug::Stage::Lowering);
            query.filter = Some(ast.lower()?);
        }
        "$select" => {
            let items = parse(|| parse_select(value))?;
            debug::log_entry(|| debug::DebugEntryKind::ReprPr(items.clone()));
            select.fields = lower_fields(&items)?;
        }
        "$groupby" => {
            let items = parse(|| parse_group_by(value))?;
            debug::log_entry(|| debug::DebugEntryKind::ReprPr(items.clone()));
            query.group = lower_fields(&items)?;
        }
        "$orderby" => {
            let items = parse(|| parse_order_by(value))?;
            debug::log_entry(|| debug::DebugEntryKind::ReprPr(items.clone()));
            query.order = lower_order(&items)?;
        }
        "$expand" => {
            let items = parse(|| parse_expand(value))?;
            query.joins = items.into_iter().map(expand_join).collect();
        }
        "$top" => query.take = Some(coerce_int(value)),
        "$skip" => query.skip = Some(coerce_int(value)),
        "$count" => query.count = coerce_bool(value),
        key => return Err(Error::new_assert(format!("unchecked query option {key}"))),
    }
    Ok(())
}

fn parse<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    debug::log_stage(debug::Stage::Parser);
    f()
}

fn expand_join(item: pr::ExpandItem) -> Join {
    Join {
        entity: Entity::table(item.name),
        direction: JoinDirection::Left,
        condition: None,
        options: (!item.options.is_empty()).then_some(item.options),
    }
}

/// Moves a span from option-value coordinates into the joined source.
fn shift_span(mut error: Error, offset: usize) -> Error {
    error.span = error.span.map(|span| span + offset);
    error
}
