//! Fluent construction of IR queries.
//!
//! ```
//! use odatac::builder::QueryBuilder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let query = QueryBuilder::new()
//!     .from("User")
//!     .select(["name"])
//!     .filter("id")
//!     .equal(1)?
//!     .build()?;
//!
//! let options = odatac::Options::default().no_format().no_signature();
//! let sql = odatac::ir_to_sql(query, &options)?;
//! assert_eq!(sql, "SELECT User.name FROM User WHERE (id=1)");
//! # Ok(())
//! # }
//! ```
//!
//! Comparisons complete the field staged by [QueryBuilder::filter],
//! [QueryBuilder::and] or [QueryBuilder::or]. Transforms such as
//! [QueryBuilder::floor] apply to the staged field before it is compared:
//! `.filter("price").floor()?.greater_than(100)?` builds
//! `{price: {$floor: {$gt: 100}}}`.

mod events;

use std::fmt;

use odatac_parser::parser::pr::coerce_int;

pub use self::events::{qualify_member, Events, MemberEvent, MethodEvent, Subscribers};
use crate::ir::{
    CompareOp, Delete, Entity, Expr, Field, FieldCond, Func, Insert, Join,
    JoinDirection, LogicalOp, Order, Partial, Query, Select, SortDirection, Statement, Update,
};
use crate::semantic::resolve_method;
use crate::{Error, ErrorSource, Result, WithErrorInfo};

/// Imperative producer of an IR [Query].
#[derive(Clone, Default)]
pub struct QueryBuilder {
    query: Query,
    collection: Option<String>,

    /// Field staged by `filter`, `and` or `or`, waiting for a comparison.
    pending: Option<PendingFilter>,

    /// Join waiting for its `with` condition.
    pending_join: Option<Join>,

    events: Events,
}

#[derive(Debug, Clone)]
struct PendingFilter {
    partial: Partial,

    /// `None` replaces the current where clause.
    op: Option<LogicalOp>,
}

/// Names available to a join condition built by [QueryBuilder::with_fn].
pub struct JoinScope<'a> {
    builder: &'a QueryBuilder,
    join: &'a Join,
}

/// Paging input. Text coerces like `parseInt`: leading digits or 0.
pub trait IntoPage {
    fn into_page(self) -> i64;
}

impl IntoPage for i64 {
    fn into_page(self) -> i64 {
        self
    }
}

impl IntoPage for i32 {
    fn into_page(self) -> i64 {
        self.into()
    }
}

impl IntoPage for u32 {
    fn into_page(self) -> i64 {
        self.into()
    }
}

impl IntoPage for usize {
    fn into_page(self) -> i64 {
        i64::try_from(self).unwrap_or(i64::MAX)
    }
}

impl IntoPage for &str {
    fn into_page(self) -> i64 {
        coerce_int(self)
    }
}

impl IntoPage for String {
    fn into_page(self) -> i64 {
        coerce_int(&self)
    }
}

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder::default()
    }

    /// Starts from an existing query.
    pub fn from_query(query: Query) -> Self {
        let collection = query
            .select()
            .and_then(|s| s.entity.as_ref())
            .and_then(|e| e.reference_name())
            .map(str::to_string);

        QueryBuilder {
            query,
            collection,
            ..Default::default()
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn on_member(mut self, handler: impl Fn(&mut MemberEvent) + 'static) -> Self {
        self.events.member.subscribe(handler);
        self
    }

    pub fn on_join_member(mut self, handler: impl Fn(&mut MemberEvent) + 'static) -> Self {
        self.events.join_member.subscribe(handler);
        self
    }

    pub fn on_method(mut self, handler: impl Fn(&mut MethodEvent) + 'static) -> Self {
        self.events.method.subscribe(handler);
        self
    }

    /// Runs the member chain for a name of this query's collection.
    pub fn resolve_member(&self, name: &str) -> String {
        let mut event = MemberEvent {
            name: name.to_string(),
            collection: self.collection.clone(),
        };
        self.events.member.emit(&mut event);
        event.name
    }

    fn resolve_join_member(&self, join: &Join, name: &str) -> String {
        let mut event = MemberEvent {
            name: name.to_string(),
            collection: join.entity.reference_name().map(str::to_string),
        };
        self.events.join_member.emit(&mut event);
        event.name
    }

    /// Runs the method chain, falling back to the OData methods.
    pub fn resolve_method(&self, name: &str, args: Vec<Expr>) -> Result<Expr> {
        let mut event = MethodEvent {
            name: name.to_string(),
            args,
            resolved: None,
        };
        self.events.method.emit(&mut event);
        match event.resolved {
            Some(resolved) => Ok(resolved),
            None => resolve_method(&event.name, event.args),
        }
    }

    fn resolve_field(&self, field: Field) -> Field {
        match field.expr {
            Expr::Name(name) => Field {
                expr: Expr::Name(self.resolve_member(&name)),
                alias: field.alias,
            },
            _ => field,
        }
    }

    // statements

    pub fn select<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        let fields: Vec<Field> = fields.into_iter().map(Into::into).collect();
        let fields = if self.collection.is_some() {
            fields.into_iter().map(|f| self.resolve_field(f)).collect()
        } else {
            fields
        };

        match &mut self.query.statement {
            Some(Statement::Select(select)) => select.fields = fields,
            statement => {
                *statement = Some(Statement::Select(Select {
                    entity: self.collection.clone().map(Entity::table),
                    fields,
                    fixed: false,
                }))
            }
        }
        self
    }

    /// Sets the collection the query reads from or writes to.
    pub fn from<E: Into<Entity>>(mut self, entity: E) -> Self {
        let entity = entity.into();
        self.collection = entity.reference_name().map(str::to_string);

        match self.query.statement.take() {
            Some(Statement::Select(mut select)) => {
                select.entity = Some(entity);
                select.fixed = false;
                let fields = std::mem::take(&mut select.fields);
                select.fields = fields.into_iter().map(|f| self.resolve_field(f)).collect();
                self.query.statement = Some(Statement::Select(select));
            }
            Some(Statement::Insert(mut insert)) => {
                insert.into = self.collection.clone();
                self.query.statement = Some(Statement::Insert(insert));
            }
            Some(Statement::Update(mut update)) => {
                update.table = self.collection.clone().unwrap_or(update.table);
                self.query.statement = Some(Statement::Update(update));
            }
            Some(Statement::Delete(mut delete)) => {
                delete.table = self.collection.clone().unwrap_or(delete.table);
                self.query.statement = Some(Statement::Delete(delete));
            }
            None => {
                self.query.statement = Some(Statement::Select(Select {
                    entity: Some(entity),
                    fields: Vec::new(),
                    fixed: false,
                }))
            }
        }
        self
    }

    /// A select of constants, rendered without a FROM clause.
    pub fn fixed(mut self) -> Self {
        match &mut self.query.statement {
            Some(Statement::Select(select)) => {
                select.fixed = true;
                select.entity = None;
            }
            statement => {
                *statement = Some(Statement::Select(Select {
                    entity: None,
                    fields: Vec::new(),
                    fixed: true,
                }))
            }
        }
        self
    }

    pub fn insert<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: ToString,
        V: Into<Expr>,
    {
        self.query.statement = Some(Statement::Insert(Insert {
            into: self.collection.clone(),
            values: collect_values(values),
        }));
        self
    }

    /// Target table of an insert.
    pub fn into<S: ToString>(mut self, table: S) -> Result<Self> {
        let Some(Statement::Insert(insert)) = &mut self.query.statement else {
            return Err(semantic_error("`into` requires an insert statement"));
        };
        insert.into = Some(table.to_string());
        self.collection = Some(table.to_string());
        Ok(self)
    }

    pub fn update<S: ToString>(mut self, table: S) -> Self {
        self.collection = Some(table.to_string());
        self.query.statement = Some(Statement::Update(Update {
            table: table.to_string(),
            values: Vec::new(),
        }));
        self
    }

    /// Values of an update.
    pub fn set<I, K, V>(mut self, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: ToString,
        V: Into<Expr>,
    {
        let Some(Statement::Update(update)) = &mut self.query.statement else {
            return Err(semantic_error("`set` requires an update statement"));
        };
        update.values = collect_values(values);
        Ok(self)
    }

    pub fn delete<S: ToString>(mut self, table: S) -> Self {
        self.collection = Some(table.to_string());
        self.query.statement = Some(Statement::Delete(Delete {
            table: table.to_string(),
        }));
        self
    }

    // where clause

    /// Starts a new where clause on `field`, replacing the current one.
    pub fn filter<S: ToString>(mut self, field: S) -> Self {
        self.pending = Some(PendingFilter {
            partial: Partial::new(field),
            op: None,
        });
        self
    }

    /// Stages `field` to be ANDed onto the where clause.
    pub fn and<S: ToString>(self, field: S) -> Self {
        self.stage(field, LogicalOp::And)
    }

    /// Stages `field` to be ORed onto the where clause.
    pub fn or<S: ToString>(self, field: S) -> Self {
        self.stage(field, LogicalOp::Or)
    }

    fn stage<S: ToString>(mut self, field: S, op: LogicalOp) -> Self {
        // and/or without a clause to combine with start one
        let op = self.query.filter.is_some().then_some(op);
        self.pending = Some(PendingFilter {
            partial: Partial::new(field),
            op,
        });
        self
    }

    /// Sets a whole where clause.
    pub fn filter_expr(mut self, expr: Expr) -> Self {
        self.query.filter = Some(expr);
        self
    }

    fn take_pending(&mut self, operation: &str) -> Result<PendingFilter> {
        self.pending.take().ok_or_else(|| {
            semantic_error(format!("`{operation}` requires a field"))
                .push_hint("start with `filter`, `and` or `or`")
        })
    }

    fn push_clause(&mut self, op: Option<LogicalOp>, clause: Expr) {
        self.query.filter = match (op, self.query.filter.take()) {
            (Some(op), Some(existing)) => Some(append_logical(existing, op, clause)),
            _ => Some(clause),
        };
    }

    fn compare(self, operation: &str, op: CompareOp, value: Expr) -> Result<Self> {
        self.complete(operation, FieldCond::compare(op, value))
    }

    fn complete(mut self, operation: &str, cond: FieldCond) -> Result<Self> {
        let pending = self.take_pending(operation)?;
        let clause = Expr::Filter(pending.partial.complete(cond));
        self.push_clause(pending.op, clause);
        Ok(self)
    }

    pub fn equal<V: Into<Expr>>(self, value: V) -> Result<Self> {
        self.compare("equal", CompareOp::Eq, value.into())
    }

    pub fn not_equal<V: Into<Expr>>(self, value: V) -> Result<Self> {
        self.compare("not_equal", CompareOp::Ne, value.into())
    }

    pub fn greater_than<V: Into<Expr>>(self, value: V) -> Result<Self> {
        self.compare("greater_than", CompareOp::Gt, value.into())
    }

    pub fn greater_or_equal<V: Into<Expr>>(self, value: V) -> Result<Self> {
        self.compare("greater_or_equal", CompareOp::Gte, value.into())
    }

    pub fn lower_than<V: Into<Expr>>(self, value: V) -> Result<Self> {
        self.compare("lower_than", CompareOp::Lt, value.into())
    }

    pub fn lower_or_equal<V: Into<Expr>>(self, value: V) -> Result<Self> {
        self.compare("lower_or_equal", CompareOp::Lte, value.into())
    }

    /// Membership in a list of values or in the rows of a sub-query.
    pub fn is_in<V: Into<Expr>>(self, values: V) -> Result<Self> {
        self.compare("is_in", CompareOp::In, values.into())
    }

    pub fn not_in<V: Into<Expr>>(self, values: V) -> Result<Self> {
        self.compare("not_in", CompareOp::Nin, values.into())
    }

    pub fn starts_with(self, text: &str) -> Result<Self> {
        let pattern = format!("^{}", regex::escape(text));
        self.complete("starts_with", FieldCond::Regex(pattern))
    }

    pub fn ends_with(self, text: &str) -> Result<Self> {
        let pattern = format!("{}$", regex::escape(text));
        self.complete("ends_with", FieldCond::Regex(pattern))
    }

    pub fn contains(self, text: &str) -> Result<Self> {
        self.complete("contains", FieldCond::Regex(regex::escape(text)))
    }

    pub fn not_contains(mut self, text: &str) -> Result<Self> {
        let pending = self.take_pending("not_contains")?;
        let clause = Expr::Filter(
            pending
                .partial
                .complete(FieldCond::Regex(regex::escape(text))),
        );
        self.push_clause(pending.op, Expr::Not(Box::new(clause)));
        Ok(self)
    }

    /// Inclusive range, as `field >= low AND field <= high`.
    pub fn between<L: Into<Expr>, H: Into<Expr>>(mut self, low: L, high: H) -> Result<Self> {
        let pending = self.take_pending("between")?;
        let lower = pending
            .partial
            .clone()
            .complete(FieldCond::compare(CompareOp::Gte, low.into()));
        let upper = pending
            .partial
            .complete(FieldCond::compare(CompareOp::Lte, high.into()));
        let clause = Expr::Logical {
            op: LogicalOp::And,
            args: vec![Expr::Filter(lower), Expr::Filter(upper)],
        };
        self.push_clause(pending.op, clause);
        Ok(self)
    }

    /// `field & mask = result`
    pub fn bit<M: Into<Expr>, R: Into<Expr>>(self, mask: M, result: R) -> Result<Self> {
        self.transform(Func::Bit, vec![mask.into()])?
            .compare("bit", CompareOp::Eq, result.into())
    }

    /// `field % divisor = result`
    pub fn modulo<D: Into<Expr>, R: Into<Expr>>(self, divisor: D, result: R) -> Result<Self> {
        self.transform(Func::Mod, vec![divisor.into()])?
            .compare("modulo", CompareOp::Eq, result.into())
    }

    // transforms of the staged field

    fn transform(mut self, func: Func, args: Vec<Expr>) -> Result<Self> {
        let mut pending = self.take_pending(func.as_ref())?;
        pending.partial = pending.partial.apply(func, args);
        self.pending = Some(pending);
        Ok(self)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add<V: Into<Expr>>(self, value: V) -> Result<Self> {
        self.transform(Func::Add, vec![value.into()])
    }

    pub fn subtract<V: Into<Expr>>(self, value: V) -> Result<Self> {
        self.transform(Func::Subtract, vec![value.into()])
    }

    pub fn multiply<V: Into<Expr>>(self, value: V) -> Result<Self> {
        self.transform(Func::Multiply, vec![value.into()])
    }

    pub fn divide<V: Into<Expr>>(self, value: V) -> Result<Self> {
        self.transform(Func::Divide, vec![value.into()])
    }

    pub fn round(self, digits: i64) -> Result<Self> {
        self.transform(Func::Round, vec![digits.into()])
    }

    /// Zero-based `start`, like the OData `substring` method.
    pub fn substr(self, start: i64, length: Option<i64>) -> Result<Self> {
        let mut args = vec![Expr::from(start)];
        args.extend(length.map(Expr::from));
        self.transform(Func::Substring, args)
    }

    pub fn index_of(self, text: &str) -> Result<Self> {
        self.transform(Func::IndexOf, vec![text.into()])
    }

    pub fn concat<V: Into<Expr>>(self, value: V) -> Result<Self> {
        self.transform(Func::Concat, vec![value.into()])
    }

    pub fn trim(self) -> Result<Self> {
        self.transform(Func::Trim, vec![])
    }

    pub fn get_date(self) -> Result<Self> {
        self.transform(Func::Date, vec![])
    }

    pub fn get_day(self) -> Result<Self> {
        self.transform(Func::Day, vec![])
    }

    pub fn get_month(self) -> Result<Self> {
        self.transform(Func::Month, vec![])
    }

    pub fn get_year(self) -> Result<Self> {
        self.transform(Func::Year, vec![])
    }

    pub fn get_full_year(self) -> Result<Self> {
        self.transform(Func::Year, vec![])
    }

    pub fn get_hours(self) -> Result<Self> {
        self.transform(Func::Hour, vec![])
    }

    pub fn get_minutes(self) -> Result<Self> {
        self.transform(Func::Minute, vec![])
    }

    pub fn get_seconds(self) -> Result<Self> {
        self.transform(Func::Second, vec![])
    }

    pub fn floor(self) -> Result<Self> {
        self.transform(Func::Floor, vec![])
    }

    pub fn ceil(self) -> Result<Self> {
        self.transform(Func::Ceiling, vec![])
    }

    pub fn to_lower_case(self) -> Result<Self> {
        self.transform(Func::ToLower, vec![])
    }

    pub fn to_upper_case(self) -> Result<Self> {
        self.transform(Func::ToUpper, vec![])
    }

    pub fn length(self) -> Result<Self> {
        self.transform(Func::Length, vec![])
    }

    /// Sets the current where clause aside. It is still applied, ANDed with
    /// whatever where clause follows; successive prepared clauses combine
    /// with AND, or OR when `use_or` is set.
    pub fn prepare(mut self, use_or: bool) -> Self {
        let Some(filter) = self.query.filter.take() else {
            return self;
        };
        let op = if use_or { LogicalOp::Or } else { LogicalOp::And };
        self.query.prepared = Some(match self.query.prepared.take() {
            Some(prepared) => append_logical(prepared, op, filter),
            None => filter,
        });
        self
    }

    // joins

    pub fn join<E: Into<Entity>>(self, entity: E) -> Result<Self> {
        self.stage_join(entity.into(), JoinDirection::Inner)
    }

    pub fn left_join<E: Into<Entity>>(self, entity: E) -> Result<Self> {
        self.stage_join(entity.into(), JoinDirection::Left)
    }

    pub fn right_join<E: Into<Entity>>(self, entity: E) -> Result<Self> {
        self.stage_join(entity.into(), JoinDirection::Right)
    }

    fn stage_join(mut self, entity: Entity, direction: JoinDirection) -> Result<Self> {
        if let Some(pending) = &self.pending_join {
            return Err(semantic_error(format!(
                "join of `{}` is missing its condition",
                pending.entity.reference_name().unwrap_or("sub-query")
            ))
            .push_hint("call `with` before starting another join"));
        }
        self.pending_join = Some(Join {
            entity,
            direction,
            condition: None,
            options: None,
        });
        Ok(self)
    }

    fn take_pending_join(&mut self, operation: &str) -> Result<Join> {
        self.pending_join.take().ok_or_else(|| {
            semantic_error(format!("`{operation}` requires a join"))
                .push_hint("start with `join`, `left_join` or `right_join`")
        })
    }

    fn commit_join(mut self, mut join: Join, condition: Expr) -> Self {
        join.condition = Some(condition);
        self.query.joins.push(join);
        self
    }

    /// Commits the pending join with a condition.
    pub fn with(mut self, condition: Expr) -> Result<Self> {
        let join = self.take_pending_join("with")?;
        Ok(self.commit_join(join, condition))
    }

    /// Commits the pending join with the where clause of another query.
    pub fn with_query(mut self, query: Query) -> Result<Self> {
        let join = self.take_pending_join("with_query")?;
        let condition = query
            .effective_filter()
            .ok_or_else(|| semantic_error("join query has no where clause"))?;
        Ok(self.commit_join(join, condition))
    }

    /// Commits the pending join on `local = foreign`, where `local` is a
    /// member of the collection and `foreign` one of the joined entity.
    pub fn with_fields(mut self, local: &str, foreign: &str) -> Result<Self> {
        let join = self.take_pending_join("with_fields")?;
        let condition = Expr::compare(
            CompareOp::Eq,
            Expr::Name(self.resolve_member(local)),
            Expr::Name(self.resolve_join_member(&join, foreign)),
        );
        Ok(self.commit_join(join, condition))
    }

    /// Commits the pending join with a condition built from a [JoinScope].
    pub fn with_fn<F>(mut self, f: F) -> Result<Self>
    where
        F: FnOnce(&JoinScope) -> Result<Expr>,
    {
        let join = self.take_pending_join("with_fn")?;
        let condition = f(&JoinScope {
            builder: &self,
            join: &join,
        })?;
        Ok(self.commit_join(join, condition))
    }

    // ordering, grouping and paging

    pub fn order_by<F: Into<Field>>(self, field: F) -> Self {
        self.push_order(field.into().expr, SortDirection::Asc)
    }

    pub fn order_by_descending<F: Into<Field>>(self, field: F) -> Self {
        self.push_order(field.into().expr, SortDirection::Desc)
    }

    pub fn then_by<F: Into<Field>>(self, field: F) -> Result<Self> {
        self.push_then(field.into().expr, SortDirection::Asc)
    }

    pub fn then_by_descending<F: Into<Field>>(self, field: F) -> Result<Self> {
        self.push_then(field.into().expr, SortDirection::Desc)
    }

    fn push_order(mut self, expr: Expr, direction: SortDirection) -> Self {
        self.query.order.push(Order { expr, direction });
        self
    }

    fn push_then(self, expr: Expr, direction: SortDirection) -> Result<Self> {
        if self.query.order.is_empty() {
            return Err(semantic_error("`then_by` requires an existing order")
                .push_hint("start with `order_by` or `order_by_descending`"));
        }
        Ok(self.push_order(expr, direction))
    }

    pub fn group_by<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.query.group = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn skip<P: IntoPage>(mut self, n: P) -> Self {
        self.query.skip = Some(n.into_page());
        self
    }

    pub fn take<P: IntoPage>(mut self, n: P) -> Self {
        self.query.take = Some(n.into_page());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.query.distinct = true;
        self
    }

    /// Renders as the number of rows instead of the rows.
    pub fn count(mut self) -> Self {
        self.query.count = true;
        self
    }

    /// Finishes the query. Fails if a field or a join is still staged.
    pub fn build(self) -> Result<Query> {
        if let Some(pending) = &self.pending {
            return Err(semantic_error(format!(
                "field `{}` is missing a comparison",
                pending.partial.field
            )));
        }
        if let Some(join) = &self.pending_join {
            return Err(semantic_error(format!(
                "join of `{}` is missing its condition",
                join.entity.reference_name().unwrap_or("sub-query")
            ))
            .push_hint("call `with` to commit the join"));
        }
        log::debug!("built query: {:?}", self.query);
        Ok(self.query)
    }
}

impl JoinScope<'_> {
    /// A member of the query's collection.
    pub fn member(&self, name: &str) -> Expr {
        Expr::Name(self.builder.resolve_member(name))
    }

    /// A member of the joined entity.
    pub fn join_member(&self, name: &str) -> Expr {
        Expr::Name(self.builder.resolve_join_member(self.join, name))
    }

    pub fn method(&self, name: &str, args: Vec<Expr>) -> Result<Expr> {
        self.builder.resolve_method(name, args)
    }

    /// `member = join_member`
    pub fn equal(&self, local: &str, foreign: &str) -> Expr {
        Expr::compare(CompareOp::Eq, self.member(local), self.join_member(foreign))
    }
}

impl fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("query", &self.query)
            .field("collection", &self.collection)
            .field("pending", &self.pending)
            .field("pending_join", &self.pending_join)
            .finish_non_exhaustive()
    }
}

/// Adds `clause` to a logical node of the same operator, or wraps both in a
/// new node when the operator changes.
fn append_logical(existing: Expr, op: LogicalOp, clause: Expr) -> Expr {
    match existing {
        Expr::Logical {
            op: existing_op,
            mut args,
        } if existing_op == op => {
            args.push(clause);
            Expr::Logical { op, args }
        }
        existing => Expr::Logical {
            op,
            args: vec![existing, clause],
        },
    }
}

fn collect_values<I, K, V>(values: I) -> Vec<(String, Expr)>
where
    I: IntoIterator<Item = (K, V)>,
    K: ToString,
    V: Into<Expr>,
{
    values
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.into()))
        .collect()
}

fn semantic_error<S: ToString>(reason: S) -> Error {
    Error::new_simple(reason).with_source(ErrorSource::Semantic)
}
