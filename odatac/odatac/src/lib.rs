//! # odatac
//!
//! Compiler for OData queries. Parses OData system query options, or takes a
//! query built with the fluent [builder::QueryBuilder], and renders it as
//! SQL of several dialects or back as OData.
//!
//! You probably want to start with [compile] wrapper function.
//!
//! For more granular access, refer to this diagram:
//! ```ascii
//!          OData query options            QueryBuilder
//!
//!   (lex)    │ odata_to_tokens                │
//!            ▼                                │
//!          Tokens                             │
//!            │                                │
//!  (parse)   │ odata_to_ast                   │
//!            ▼                                │
//!           AST                               │
//!            │                                │
//!  (lower)   │ ast_to_ir, odata_to_ir         │ build
//!            ▼                                ▼      json::from_ir
//!                                                  ────────►
//!                          IR                            IR JSON
//!                                                  ◄────────
//!            │                         │             json::to_ir
//!  ir_to_sql │                         │ ir_to_odata
//!            ▼                         ▼
//!
//!           SQL                      OData
//! ```
//!
#![doc = include_str!("../../ARCHITECTURE.md")]
//!
//! ## Common use-cases
//!
//! - Compile an OData request into SQL at run time.
//!
//!   ```
//!   # fn main() -> Result<(), odatac::ErrorMessages> {
//!   let sql = odatac::compile(
//!       "Product",
//!       "$select=id,name&$filter=price gt 5",
//!       &odatac::Options::default().no_format().no_signature(),
//!   )?;
//!   assert_eq!(sql, "SELECT id, name FROM Product WHERE (price>5)");
//!   # Ok(())
//!   # }
//!   ```
//!
//! - Build a query in code and render it for a dialect.
//!
//!   ```
//!   # fn main() -> Result<(), Box<dyn std::error::Error>> {
//!   use odatac::{builder::QueryBuilder, sql::Dialect, Options, Target};
//!
//!   let query = QueryBuilder::new()
//!       .from("User")
//!       .select(["name"])
//!       .filter("id")
//!       .equal(1)?
//!       .build()?;
//!   let options = Options::default()
//!       .no_format()
//!       .no_signature()
//!       .with_target(Target::Sql(Some(Dialect::Postgres)));
//!   let sql = odatac::ir_to_sql(query, &options)?;
//!   assert_eq!(sql, r#"SELECT "User"."name" FROM "User" WHERE ("id"=1)"#);
//!   # Ok(())
//!   # }
//!   ```
//!
//! - Compile, format & debug OData from command line.
//!
//!   ```sh
//!   $ cargo install --locked odatac
//!   $ echo '$filter=price gt 5' | odatac compile --collection Product
//!   ```
//!
//! ## Feature flags
//!
//! The following feature flags are available:
//!
//! * `cli`: enables the `odatac` CLI binary. This is enabled by default. When
//!   consuming this crate from another rust library, it can be disabled.
//! * `serde_yaml`: Enables serialization of tokens and ASTs to YAML.

#![forbid(unsafe_code)]
// Our error type carries several strings and an enum, which is above the
// default warning level. We're not that performance sensitive.
#![allow(clippy::result_large_err)]

use std::str::FromStr;
use std::sync::OnceLock;

use semver::Version;
use serde::{Deserialize, Serialize};
use strum::VariantNames;

pub use error_message::{ErrorMessage, ErrorMessages, SourceLocation};
pub use odatac_parser::error::{Error, ErrorSource, Errors, MessageKind, Reason, WithErrorInfo};
pub use odatac_parser::lexer::lr;
pub use odatac_parser::parser::pr;
pub use odatac_parser::span::Span;

pub mod builder;
pub mod debug;
mod error_message;
pub mod ir;
pub mod odata;
pub mod semantic;
pub mod sql;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Get the version of the compiler. This is determined by, in order:
/// - An optional environment variable `ODATAC_VERSION_OVERRIDE`. Note that
///   this needs to be set the first time this function is called, since it's
///   stored in a static.
/// - The version in the cargo manifest
pub fn compiler_version() -> &'static Version {
    static COMPILER_VERSION: OnceLock<Version> = OnceLock::new();
    COMPILER_VERSION.get_or_init(|| {
        let cargo_version = Version::new(
            env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or_default(),
            env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or_default(),
            env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or_default(),
        );
        match std::env::var("ODATAC_VERSION_OVERRIDE") {
            Ok(version_override) => Version::parse(&version_override).unwrap_or_else(|e| {
                log::warn!("Could not parse version override {version_override}: {e}");
                cargo_version
            }),
            Err(_) => cargo_version,
        }
    })
}

/// Compile the system query options of an OData request into SQL or OData.
///
/// This is a wrapper for:
/// - [odata_to_ir] — Parse the options and lower them into the IR
/// - [ir_to_sql] or [ir_to_odata] — Render the IR for `options.target`
/// # Example
/// Use the compiler to convert an OData request to SQLite dialect
///
/// ```
/// use odatac::{compile, Options, Target, sql::Dialect};
///
/// let query = "$select=name,age&$orderby=age desc&$top=10";
/// let opts = Options::default().with_target(Target::Sql(Some(Dialect::SQLite))).with_signature_comment(false).with_format(false);
/// let sql = compile("employees", query, &opts).unwrap();
/// println!("OData: {}\nSQLite: {}", query, &sql);
/// assert_eq!(r#"SELECT "name", "age" FROM "employees" ORDER BY "age" DESC LIMIT 10"#, sql)
///
/// ```
/// See [`sql::Settings`](sql/struct.Settings.html) and
/// [`sql::Dialect`](sql/enum.Dialect.html) for options and supported SQL
/// dialects.
pub fn compile(collection: &str, query: &str, options: &Options) -> Result<String, ErrorMessages> {
    let parsed = semantic::QueryOptions::parse(query)
        .map_err(|e| compose(e, query, options))?;
    debug::log_entry(|| debug::DebugEntryKind::ReprSource(parsed.source().to_string()));

    semantic::resolve_options(collection, &parsed)
        .and_then(|ir| render(&ir, options))
        .map_err(|e| compose(e, parsed.source(), options))
}

fn render(query: &ir::Query, options: &Options) -> Result<String> {
    match options.target {
        Target::Sql(_) => sql::compile(query, options),
        Target::OData => odata::compile(query, options),
    }
}

fn compose(error: Error, source: &str, options: &Options) -> ErrorMessages {
    let error_messages = ErrorMessages::from(error).composed(source);
    match options.display {
        DisplayOptions::AnsiColor => error_messages,
        DisplayOptions::Plain => error_messages.plain(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Target {
    /// If `None` is used, the generic dialect is used.
    Sql(Option<sql::Dialect>),

    /// OData system query options.
    OData,
}

impl Default for Target {
    fn default() -> Self {
        Self::Sql(None)
    }
}

impl Target {
    pub fn names() -> Vec<String> {
        let mut names = vec!["sql.any".to_string()];

        let dialects = sql::Dialect::VARIANTS;
        names.extend(dialects.iter().map(|d| format!("sql.{d}")));

        names.push(odata::TARGET_NAME.to_string());
        names
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Target, Self::Err> {
        if s == odata::TARGET_NAME {
            return Ok(Target::OData);
        }

        if let Some(dialect) = s.strip_prefix("sql.") {
            if dialect == "any" {
                return Ok(Target::Sql(None));
            }

            if let Ok(dialect) = sql::Dialect::from_str(dialect) {
                return Ok(Target::Sql(Some(dialect)));
            }
        }

        Err(Error::new(Reason::NotFound {
            name: format!("{s:?}"),
            namespace: "target".to_string(),
        }))
    }
}

/// Compilation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    /// Pass generated SQL string trough a formatter that splits it
    /// into multiple lines and prettifies indentation and spacing.
    ///
    /// Defaults to true. Has no effect on OData output.
    pub format: bool,

    /// Target and dialect to compile to.
    pub target: Target,

    /// Emits the compiler signature as a comment after generated SQL
    ///
    /// Defaults to true. Has no effect on OData output.
    pub signature_comment: bool,

    /// Whether to use ANSI colors in error messages.
    ///
    /// Note that we don't generally recommend threading a `color` option
    /// through an entire application. Instead, in order of preferences:
    /// - Use a library such as `anstream` to encapsulate presentation logic and
    ///   automatically disable colors when not connected to a TTY.
    /// - Set an environment variable such as `CLI_COLOR=0` to disable any
    ///   colors coming back from this library.
    /// - Strip colors from the output (possibly also with a library such as
    ///   `anstream`).
    pub display: DisplayOptions,

    /// Settings of the SQL formatter.
    pub sql: sql::Settings,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            format: true,
            target: Target::Sql(None),
            signature_comment: true,
            display: DisplayOptions::AnsiColor,
            sql: sql::Settings::default(),
        }
    }
}

impl Options {
    pub fn with_format(mut self, format: bool) -> Self {
        self.format = format;
        self
    }

    pub fn no_format(self) -> Self {
        self.with_format(false)
    }

    pub fn with_signature_comment(mut self, signature_comment: bool) -> Self {
        self.signature_comment = signature_comment;
        self
    }

    pub fn no_signature(self) -> Self {
        self.with_signature_comment(false)
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn with_display(mut self, display: DisplayOptions) -> Self {
        self.display = display;
        self
    }

    pub fn with_sql_settings(mut self, settings: sql::Settings) -> Self {
        self.sql = settings;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[non_exhaustive]
pub enum DisplayOptions {
    /// Plain text
    Plain,
    /// With ANSI colors
    AnsiColor,
}

#[doc = include_str!("../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;

/// Lex an OData expression into tokens.
pub fn odata_to_tokens(source: &str) -> Result<lr::Tokens, ErrorMessages> {
    odatac_parser::lex_source(source)
        .map_err(|e| ErrorMessages::from(e.with_source(ErrorSource::Lexer)).composed(source))
}

/// Parse an OData `$filter` expression into an AST.
pub fn odata_to_ast(source: &str) -> Result<pr::Expr, ErrorMessages> {
    odatac_parser::parse_filter(source).map_err(|e| ErrorMessages::from(e).composed(source))
}

/// Lower a `$filter` AST into an IR expression.
pub fn ast_to_ir(ast: &pr::Expr) -> Result<ir::Expr, ErrorMessages> {
    use semantic::Lower;

    ast.lower().map_err(ErrorMessages::from)
}

/// Parse the system query options of a request for `collection` and lower
/// them into an IR query.
pub fn odata_to_ir(collection: &str, query: &str) -> Result<ir::Query, ErrorMessages> {
    let parsed = semantic::QueryOptions::parse(query)
        .map_err(|e| ErrorMessages::from(e).composed(query))?;
    semantic::resolve_options(collection, &parsed)
        .map_err(|e| ErrorMessages::from(e).composed(parsed.source()))
}

/// Generate SQL from IR.
pub fn ir_to_sql(query: ir::Query, options: &Options) -> Result<String, ErrorMessages> {
    sql::compile(&query, options).map_err(ErrorMessages::from)
}

/// Generate OData system query options from IR.
pub fn ir_to_odata(query: ir::Query) -> Result<String, ErrorMessages> {
    let res = odata::ODataFormatter::new()
        .format(&query)
        .map_err(ErrorMessages::from)?;
    Ok(res.to_string())
}

/// JSON serialization and deserialization functions
pub mod json {
    use super::*;

    /// JSON serialization
    pub fn from_ir(query: &ir::Query) -> Result<String, ErrorMessages> {
        serde_json::to_string(query).map_err(convert_json_err)
    }

    /// JSON deserialization
    pub fn to_ir(json: &str) -> Result<ir::Query, ErrorMessages> {
        serde_json::from_str(json).map_err(convert_json_err)
    }

    fn convert_json_err(err: serde_json::Error) -> ErrorMessages {
        ErrorMessages::from(Error::new_simple(err.to_string()))
    }
}
