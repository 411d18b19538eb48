use enum_as_inner::EnumAsInner;
use odatac_parser::parser::pr::ExpandOptions;

use super::{Expr, LogicalOp};

/// Root of the IR. Holds at most one statement plus the clauses that apply
/// to it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub statement: Option<Statement>,

    /// `$where`
    pub filter: Option<Expr>,

    /// A where clause set aside by `prepare`, ANDed with `filter` on render.
    pub prepared: Option<Expr>,

    pub order: Vec<Order>,
    pub group: Vec<Field>,

    /// `$expand`
    pub joins: Vec<Join>,

    pub skip: Option<i64>,
    pub take: Option<i64>,
    pub distinct: bool,

    /// Render as a row count of the query instead of its rows.
    pub count: bool,
}

#[derive(Debug, Clone, PartialEq, EnumAsInner)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    /// `None` only for fixed selects.
    pub entity: Option<Entity>,
    pub fields: Vec<Field>,

    /// A select of constants, without a FROM clause.
    pub fixed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub into: Option<String>,
    pub values: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub values: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub source: EntitySource,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, EnumAsInner)]
pub enum EntitySource {
    Table(String),
    Query(Box<Query>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum JoinDirection {
    #[default]
    Inner,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub entity: Entity,
    pub direction: JoinDirection,

    /// Missing when the join came from an OData `$expand` item, which needs a
    /// data model to find its condition.
    pub condition: Option<Expr>,

    /// Options of an OData `$expand` item, kept for rendering back to OData.
    pub options: Option<ExpandOptions>,
}

/// A projected expression, optionally aliased: `{alias: expr}` in JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub expr: Expr,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl Query {
    pub fn select(&self) -> Option<&Select> {
        self.statement.as_ref().and_then(|s| s.as_select())
    }

    /// `$where` merged with the prepared clause.
    pub fn effective_filter(&self) -> Option<Expr> {
        match (&self.prepared, &self.filter) {
            (Some(prepared), Some(filter)) => Some(Expr::Logical {
                op: LogicalOp::And,
                args: vec![prepared.clone(), filter.clone()],
            }),
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (None, None) => None,
        }
    }
}

impl Entity {
    pub fn table<S: ToString>(name: S) -> Self {
        Entity {
            source: EntitySource::Table(name.to_string()),
            alias: None,
        }
    }

    pub fn with_alias<S: ToString>(mut self, alias: S) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// The name other clauses use to refer to this entity.
    pub fn reference_name(&self) -> Option<&str> {
        match (&self.alias, &self.source) {
            (Some(alias), _) => Some(alias),
            (None, EntitySource::Table(name)) => Some(name),
            (None, EntitySource::Query(_)) => None,
        }
    }
}

impl From<&str> for Entity {
    fn from(value: &str) -> Self {
        Entity::table(value)
    }
}

impl From<String> for Entity {
    fn from(value: String) -> Self {
        Entity::table(value)
    }
}

impl Field {
    pub fn name<S: ToString>(name: S) -> Self {
        Field {
            expr: Expr::name(name),
            alias: None,
        }
    }

    pub fn with_alias<S: ToString>(mut self, alias: S) -> Self {
        self.alias = Some(alias.to_string());
        self
    }
}

/// Strings are field names.
impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::name(value)
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::name(value)
    }
}

impl From<Expr> for Field {
    fn from(expr: Expr) -> Self {
        Field { expr, alias: None }
    }
}
