//! Backend for translating the IR into SQL text.
//!
//! Expressions and statements are rendered straight to strings; the
//! [Dialect] decides quoting, literals, paging and the spelling of a few
//! functions.

mod dialect;
mod gen_expr;
mod gen_query;
mod validator;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use dialect::Dialect;
pub use validator::{NameValidator, ObjectNameValidator};

use self::dialect::DialectHandler;
use crate::ir::{Expr, Query};
use crate::{debug, ErrorSource, Options, Result, Target, WithErrorInfo};

/// Formatter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Alias every projected qualified name by its last segment, so
    /// `User.name` is selected as `User.name AS name`.
    pub force_alias: bool,
}

/// Renders IR as SQL of one dialect.
#[derive(Debug)]
pub struct SqlFormatter {
    ctx: Context,
}

#[derive(Debug)]
struct Context {
    dialect: Dialect,
    dialect_handler: Box<dyn DialectHandler>,
    settings: Settings,
    validator: Arc<dyn NameValidator>,
}

impl SqlFormatter {
    pub fn new(dialect: Dialect) -> Self {
        SqlFormatter {
            ctx: Context {
                dialect,
                dialect_handler: dialect.handler(),
                settings: Settings::default(),
                validator: Arc::new(ObjectNameValidator),
            },
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.ctx.settings = settings;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn NameValidator>) -> Self {
        self.ctx.validator = validator;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.ctx.dialect
    }

    /// Renders a whole statement on one line.
    pub fn format(&self, query: &Query) -> Result<String> {
        debug::log_stage(debug::Stage::Sql);
        let sql = gen_query::translate_query(query, &self.ctx).with_source(ErrorSource::Format)?;

        log::debug!("rendered {} SQL: {sql}", self.ctx.dialect);
        debug::log_entry(|| debug::DebugEntryKind::ReprSql(sql.clone()));
        Ok(sql)
    }

    /// Renders a where clause on its own.
    pub fn format_where(&self, expr: &Expr) -> Result<String> {
        gen_expr::translate_expr(expr, &self.ctx).with_source(ErrorSource::Format)
    }

    /// Renders any expression: names are escaped, constants quoted and
    /// methods translated for the dialect.
    pub fn escape(&self, expr: &Expr) -> Result<String> {
        self.format_where(expr)
    }

    /// Quotes a name through the validator.
    pub fn escape_name(&self, name: &str) -> Result<String> {
        gen_expr::translate_ident(name, &self.ctx).with_source(ErrorSource::Format)
    }
}

/// Compiles a query into SQL for the dialect in `options.target`, then
/// optionally formats it and appends the signature comment.
pub fn compile(query: &Query, options: &Options) -> Result<String> {
    let dialect = match &options.target {
        Target::Sql(dialect) => dialect.unwrap_or_default(),
        Target::OData => {
            return Err(crate::Error::new_assert("odata target reached the SQL backend"))
        }
    };

    let formatter = SqlFormatter::new(dialect).with_settings(options.sql.clone());
    let sql = formatter.format(query)?;

    // formatting
    let sql = if options.format {
        let formatted = sqlformat::format(
            &sql,
            &sqlformat::QueryParams::None,
            &sqlformat::FormatOptions::default(),
        );

        formatted + "\n"
    } else {
        sql
    };

    // signature
    let sql = if options.signature_comment {
        let pre = if options.format { "\n" } else { " " };
        let post = if options.format { "\n" } else { "" };
        let target = match &options.target {
            Target::Sql(Some(dialect)) => format!(" target:sql.{dialect}"),
            _ => String::new(),
        };
        let signature = format!(
            "{pre}-- Generated by odatac version {}{target}{post}",
            crate::compiler_version(),
        );
        sql + &signature
    } else {
        sql
    };

    Ok(sql)
}
