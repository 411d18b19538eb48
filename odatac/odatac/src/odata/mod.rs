//! Backend rendering the IR back into OData system query options.
//!
//! Only reads can be expressed: statements other than a plain select, as
//! well as counts, distinct selects and sub-selects, fail with
//! [Reason::Unsupported](crate::Reason::Unsupported).

mod gen_expr;
#[cfg(test)]
mod test;

use std::fmt;

use itertools::Itertools;
use serde::Serialize;

use crate::ir::{EntitySource, Field, Join, Order, Query, SortDirection, Statement};
use crate::pr::ExpandOptions;
use crate::{debug, Error, ErrorSource, Options, Result, Target, WithErrorInfo};

/// Name of this backend in unsupported-operation errors.
pub const TARGET_NAME: &str = "odata";

/// System query options of one request, without the resource path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ODataQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groupby: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orderby: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,
}

impl ODataQuery {
    /// Options that are set, in the order they are written.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let mut push = |key, value: Option<String>| {
            if let Some(value) = value {
                pairs.push((key, value));
            }
        };
        push("$select", self.select.clone());
        push("$filter", self.filter.clone());
        push("$groupby", self.groupby.clone());
        push("$orderby", self.orderby.clone());
        push("$expand", self.expand.clone());
        push("$top", self.top.map(|n| n.to_string()));
        push("$skip", self.skip.map(|n| n.to_string()));
        pairs
    }

    /// The query string with values percent-encoded, ready for a URL.
    pub fn encoded(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.pairs() {
            serializer.append_pair(key, &value);
        }
        serializer.finish()
    }

    pub fn is_empty(&self) -> bool {
        self == &ODataQuery::default()
    }
}

/// Writes the query string unencoded, as people read it.
impl fmt::Display for ODataQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs = self.pairs();
        let query = pairs
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .join("&");
        f.write_str(&query)
    }
}

/// Renders IR as OData. Names are written relative to the collection the
/// query reads from.
#[derive(Debug, Clone, Default)]
pub struct ODataFormatter {
    collection: Option<String>,
}

impl ODataFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the collection that names are made relative to. By default
    /// it is the entity of the formatted select.
    pub fn with_collection<S: ToString>(mut self, collection: S) -> Self {
        self.collection = Some(collection.to_string());
        self
    }

    pub fn format(&self, query: &Query) -> Result<ODataQuery> {
        debug::log_stage(debug::Stage::OData);
        let res = self.translate_query(query).with_source(ErrorSource::Format)?;

        log::debug!("rendered OData: {res}");
        debug::log_entry(|| debug::DebugEntryKind::ReprOData(res.to_string()));
        Ok(res)
    }

    /// Renders a where clause on its own, as a `$filter` value.
    pub fn format_filter(&self, expr: &crate::ir::Expr) -> Result<String> {
        let ctx = gen_expr::Context {
            collection: self.collection.as_deref(),
        };
        gen_expr::translate_expr(expr, &ctx).with_source(ErrorSource::Format)
    }

    fn translate_query(&self, query: &Query) -> Result<ODataQuery> {
        let select = match &query.statement {
            Some(Statement::Select(select)) => select,
            Some(Statement::Insert(_)) => return Err(unsupported("insert statement")),
            Some(Statement::Update(_)) => return Err(unsupported("update statement")),
            Some(Statement::Delete(_)) => return Err(unsupported("delete statement")),
            None => return Err(Error::new_simple("query has no statement")),
        };
        if select.fixed {
            return Err(unsupported("fixed select"));
        }
        if query.count {
            return Err(unsupported("count")
                .push_hint("request the `$count` segment of the collection instead"));
        }
        if query.distinct {
            return Err(unsupported("distinct select"));
        }

        let collection = match (&self.collection, &select.entity) {
            (Some(collection), _) => Some(collection.as_str()),
            (None, Some(entity)) => match &entity.source {
                EntitySource::Table(_) => entity.reference_name(),
                EntitySource::Query(_) => return Err(unsupported("sub-select entity")),
            },
            (None, None) => None,
        };
        let ctx = gen_expr::Context { collection };

        let fields: Vec<_> = select
            .fields
            .iter()
            .map(|field| translate_field(field, &ctx))
            .try_collect()?;
        let group: Vec<_> = query
            .group
            .iter()
            .map(|field| translate_field(field, &ctx))
            .try_collect()?;
        let order: Vec<_> = query
            .order
            .iter()
            .map(|order| translate_order(order, &ctx))
            .try_collect()?;
        let expand: Vec<_> = query
            .joins
            .iter()
            .map(|join| translate_expand(join, &ctx))
            .try_collect()?;

        let filter = match query.effective_filter() {
            Some(filter) => Some(gen_expr::translate_expr(&filter, &ctx)?),
            None => None,
        };

        Ok(ODataQuery {
            select: non_empty(fields),
            filter,
            groupby: non_empty(group),
            orderby: non_empty(order),
            expand: non_empty(expand),
            top: query.take.filter(|take| *take >= 0),
            skip: query.skip.filter(|skip| *skip > 0),
        })
    }
}

fn non_empty(items: Vec<String>) -> Option<String> {
    if items.is_empty() {
        None
    } else {
        Some(items.join(","))
    }
}

fn unsupported(what: &str) -> Error {
    Error::new_unsupported(what, TARGET_NAME)
}

fn translate_field(field: &Field, ctx: &gen_expr::Context) -> Result<String> {
    let expr = gen_expr::translate_expr(&field.expr, ctx)?;
    Ok(match &field.alias {
        Some(alias) => format!("{expr} as {alias}"),
        None => expr,
    })
}

fn translate_order(order: &Order, ctx: &gen_expr::Context) -> Result<String> {
    let expr = gen_expr::translate_expr(&order.expr, ctx)?;
    Ok(match order.direction {
        SortDirection::Asc => expr,
        SortDirection::Desc => format!("{expr} desc"),
    })
}

/// Expands can only follow navigation properties, so joins built with an
/// explicit condition have no OData form.
fn translate_expand(join: &Join, ctx: &gen_expr::Context) -> Result<String> {
    if join.condition.is_some() {
        return Err(unsupported("join with a condition")
            .push_hint("joins from `$expand` carry no condition"));
    }
    let name = match &join.entity.source {
        EntitySource::Table(table) => ctx.relative(table),
        EntitySource::Query(_) => return Err(unsupported("sub-select join")),
    };

    Ok(match &join.options {
        Some(options) if !options.is_empty() => {
            format!("{name}({})", translate_expand_options(options))
        }
        _ => name,
    })
}

fn translate_expand_options(options: &ExpandOptions) -> String {
    let mut parts = Vec::new();
    let mut push = |key: &str, value: Option<String>| {
        if let Some(value) = value {
            parts.push(format!("{key}={value}"));
        }
    };
    push("$select", options.select.clone());
    push("$filter", options.filter.clone());
    push("$groupby", options.groupby.clone());
    push("$orderby", options.orderby.clone());
    push("$expand", options.expand.clone());
    push("$top", options.top.map(|n| n.to_string()));
    push("$skip", options.skip.map(|n| n.to_string()));
    push("$count", options.count.map(|b| b.to_string()));
    push("$levels", options.levels.map(|n| n.to_string()));
    parts.join(";")
}

/// Renders a query as an OData query string, unencoded.
pub fn compile(query: &Query, options: &Options) -> Result<String> {
    if !matches!(options.target, Target::OData) {
        return Err(Error::new_assert("SQL target reached the OData backend"));
    }
    let res = ODataFormatter::new().format(query)?;
    Ok(res.to_string())
}
