//! Translation of whole IR queries into SQL statements.
//!
//! Clauses are rendered one by one and joined with single spaces, so the
//! output is always a single line. Multi-line layout is left to `sqlformat`.
use itertools::Itertools;

use super::gen_expr::{translate_expr, translate_ident};
use super::Context;
use crate::ir::{
    Delete, Entity, EntitySource, Expr, Field, Insert, Join, JoinDirection, Order, Query, Select,
    SortDirection, Statement, Update,
};
use crate::{Error, Result, WithErrorInfo};

/// Alias given to the derived table wrapped by a count.
const COUNT_ALIAS: &str = "c0";

/// Alias given to a sub-select entity that has none.
const SUBQUERY_ALIAS: &str = "t0";

pub(super) fn translate_query(query: &Query, ctx: &Context) -> Result<String> {
    let Some(statement) = &query.statement else {
        return Err(Error::new_simple("query has no statement")
            .push_hint("start it with `select`, `insert`, `update` or `delete`"));
    };

    match statement {
        Statement::Select(select) if query.count => translate_count(select, query, ctx),
        Statement::Select(select) => translate_select(select, query, ctx),
        Statement::Insert(insert) => translate_insert(insert, ctx),
        Statement::Update(update) => translate_update(update, query, ctx),
        Statement::Delete(delete) => translate_delete(delete, query, ctx),
    }
}

fn translate_select(select: &Select, query: &Query, ctx: &Context) -> Result<String> {
    log::debug!(
        "translating select with {} fields and {} joins",
        select.fields.len(),
        query.joins.len()
    );
    let mut clauses = vec![translate_projection(select, query.distinct, ctx)?];

    if !select.fixed {
        let Some(entity) = &select.entity else {
            return Err(Error::new_simple("select has no entity")
                .push_hint("set one with `from`, or mark the select as fixed"));
        };
        clauses.push(format!("FROM {}", translate_entity(entity, ctx)?));

        for join in &query.joins {
            clauses.push(translate_join(join, ctx)?);
        }
    }

    if let Some(filter) = query.effective_filter() {
        clauses.push(format!("WHERE {}", translate_expr(&filter, ctx)?));
    }

    if !query.group.is_empty() {
        let group: Vec<_> = query
            .group
            .iter()
            .map(|field| translate_expr(&field.expr, ctx))
            .try_collect()?;
        clauses.push(format!("GROUP BY {}", group.join(", ")));
    }

    // non-positive skips and negative takes are no paging at all
    let skip = query.skip.filter(|skip| *skip > 0);
    let take = query.take.filter(|take| *take >= 0);
    let paging = ctx.dialect_handler.translate_paging(skip, take);

    if !query.order.is_empty() {
        clauses.push(translate_order(&query.order, ctx)?);
    } else if paging.is_some() && ctx.dialect_handler.use_fetch() {
        // OFFSET .. FETCH needs an ORDER BY clause
        clauses.push("ORDER BY (SELECT NULL)".to_string());
    }

    clauses.extend(paging);
    Ok(clauses.join(" "))
}

/// Wraps the select in a row count. Ordering and paging of the inner query
/// would not change the count, so they are dropped.
fn translate_count(select: &Select, query: &Query, ctx: &Context) -> Result<String> {
    let inner = Query {
        order: Vec::new(),
        skip: None,
        take: None,
        count: false,
        ..query.clone()
    };
    let inner = translate_select(select, &inner, ctx)?;
    Ok(format!(
        "SELECT COUNT(*) AS __count FROM ({inner}) AS {COUNT_ALIAS}"
    ))
}

fn translate_projection(select: &Select, distinct: bool, ctx: &Context) -> Result<String> {
    let fields = if select.fields.is_empty() {
        if select.fixed {
            return Err(Error::new_simple("a fixed select needs at least one field"));
        }
        "*".to_string()
    } else {
        select
            .fields
            .iter()
            .map(|field| translate_field(field, ctx))
            .collect::<Result<Vec<_>>>()?
            .join(", ")
    };

    let distinct = if distinct { "DISTINCT " } else { "" };
    Ok(format!("SELECT {distinct}{fields}"))
}

fn translate_field(field: &Field, ctx: &Context) -> Result<String> {
    let expr = translate_expr(&field.expr, ctx)?;

    let alias = match (&field.alias, &field.expr) {
        (Some(alias), _) => Some(alias.as_str()),
        (None, Expr::Name(name)) if ctx.settings.force_alias => name
            .rsplit_once('.')
            .map(|(_, last)| last)
            .filter(|last| *last != "*"),
        _ => None,
    };

    Ok(match alias {
        Some(alias) => format!("{expr} AS {}", translate_ident(alias, ctx)?),
        None => expr,
    })
}

fn translate_entity(entity: &Entity, ctx: &Context) -> Result<String> {
    Ok(match &entity.source {
        EntitySource::Table(table) => {
            let table = translate_ident(table, ctx)?;
            match &entity.alias {
                Some(alias) => format!("{table} AS {}", translate_ident(alias, ctx)?),
                None => table,
            }
        }
        EntitySource::Query(query) => {
            let alias = entity.alias.as_deref().unwrap_or(SUBQUERY_ALIAS);
            format!(
                "({}) AS {}",
                translate_query(query, ctx)?,
                translate_ident(alias, ctx)?
            )
        }
    })
}

fn translate_join(join: &Join, ctx: &Context) -> Result<String> {
    let entity = translate_entity(&join.entity, ctx)?;

    let Some(condition) = &join.condition else {
        let name = join.entity.reference_name().unwrap_or("sub-query");
        return Err(
            Error::new_simple(format!("join of `{name}` has no condition"))
                .push_hint("set a condition with `with`"),
        );
    };

    let direction = match join.direction {
        JoinDirection::Inner => "INNER",
        JoinDirection::Left => "LEFT",
        JoinDirection::Right => "RIGHT",
    };
    Ok(format!(
        "{direction} JOIN {entity} ON {}",
        translate_expr(condition, ctx)?
    ))
}

fn translate_order(order: &[Order], ctx: &Context) -> Result<String> {
    let order: Vec<_> = order
        .iter()
        .map(|order| {
            let direction = match order.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            Ok(format!("{} {direction}", translate_expr(&order.expr, ctx)?))
        })
        .collect::<Result<_>>()?;
    Ok(format!("ORDER BY {}", order.join(", ")))
}

fn translate_insert(insert: &Insert, ctx: &Context) -> Result<String> {
    let Some(into) = &insert.into else {
        return Err(
            Error::new_simple("insert has no target table").push_hint("set it with `into`")
        );
    };
    if insert.values.is_empty() {
        return Err(Error::new_simple("insert has no values"));
    }

    let mut columns = Vec::with_capacity(insert.values.len());
    let mut values = Vec::with_capacity(insert.values.len());
    for (column, value) in &insert.values {
        columns.push(translate_ident(column, ctx)?);
        values.push(translate_expr(value, ctx)?);
    }

    Ok(format!(
        "INSERT INTO {}({}) VALUES ({})",
        translate_ident(into, ctx)?,
        columns.join(", "),
        values.join(", ")
    ))
}

fn translate_update(update: &Update, query: &Query, ctx: &Context) -> Result<String> {
    if update.values.is_empty() {
        return Err(Error::new_simple(format!(
            "update of `{}` has no values",
            update.table
        ))
        .push_hint("set them with `set`"));
    }

    let assignments: Vec<_> = update
        .values
        .iter()
        .map(|(column, value)| {
            Ok(format!(
                "{}={}",
                translate_ident(column, ctx)?,
                translate_expr(value, ctx)?
            ))
        })
        .collect::<Result<_>>()?;

    let mut sql = format!(
        "UPDATE {} SET {}",
        translate_ident(&update.table, ctx)?,
        assignments.join(", ")
    );
    if let Some(filter) = query.effective_filter() {
        sql += &format!(" WHERE {}", translate_expr(&filter, ctx)?);
    }
    Ok(sql)
}

fn translate_delete(delete: &Delete, query: &Query, ctx: &Context) -> Result<String> {
    let mut sql = format!("DELETE FROM {}", translate_ident(&delete.table, ctx)?);
    if let Some(filter) = query.effective_filter() {
        sql += &format!(" WHERE {}", translate_expr(&filter, ctx)?);
    }
    Ok(sql)
}
