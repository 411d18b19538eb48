//! The `$`-keyed JSON form of the IR.
//!
//! A node's first key is its operator: `{$eq: [a, b]}`, `{$name: "a.b"}`,
//! `{$and: [..]}`. Objects keyed by a plain name are field filters
//! (`{price: {$gt: 100}}`, or `{id: 1}` for equality with a constant), and
//! objects carrying `$select` are nested queries.
//!
//! Method calls are always written as `{$func: [args]}`. The single-argument
//! shorthand `{$func: arg}` is accepted on input and normalized.

use std::str::FromStr;

use odatac_parser::lexer::lr::Literal;
use odatac_parser::parser::pr::{coerce_int, ExpandOptions};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

use super::*;

type DecodeResult<T> = Result<T, String>;

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        expr_to_value(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        expr_from_value(&value).map_err(D::Error::custom)
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        query_to_value(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Query {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        query_from_value(&value).map_err(D::Error::custom)
    }
}

fn tag<T: std::fmt::Display>(op: T) -> String {
    format!("${op}")
}

fn single<K: Into<String>>(key: K, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.into(), value);
    Value::Object(map)
}

pub(crate) fn literal_to_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Integer(i) => Value::Number((*i).into()),
        // JSON has no spelling for NaN and infinities
        Literal::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(literal.to_string())),
        Literal::String(s) | Literal::Guid(s) | Literal::Duration(s) | Literal::Binary(s) => {
            Value::String(s.clone())
        }
        Literal::DateTime(dt) => Value::String(dt.to_rfc3339()),
    }
}

fn expr_to_value(expr: &Expr) -> Value {
    match expr {
        Expr::Literal(literal) => literal_to_value(literal),
        Expr::Array(items) => Value::Array(items.iter().map(expr_to_value).collect()),
        Expr::Name(name) => single("$name", Value::String(name.clone())),
        Expr::Compare { op, left, right } => single(
            tag(op),
            Value::Array(vec![expr_to_value(left), expr_to_value(right)]),
        ),
        Expr::Logical { op, args } => {
            single(tag(op), Value::Array(args.iter().map(expr_to_value).collect()))
        }
        Expr::Not(inner) => single("$not", expr_to_value(inner)),
        Expr::Function { func, args } => {
            single(tag(func), Value::Array(args.iter().map(expr_to_value).collect()))
        }
        Expr::Switch(switch) => {
            let mut body = Map::new();
            let branches = switch
                .branches
                .iter()
                .map(|b| {
                    let mut branch = Map::new();
                    branch.insert("case".into(), expr_to_value(&b.case));
                    branch.insert("then".into(), expr_to_value(&b.then));
                    Value::Object(branch)
                })
                .collect();
            body.insert("branches".into(), Value::Array(branches));
            if let Some(default) = &switch.default {
                body.insert("default".into(), expr_to_value(default));
            }
            single("$switch", Value::Object(body))
        }
        Expr::Filter(filter) => single(filter.field.clone(), cond_to_value(&filter.cond)),
        Expr::Query(query) => query_to_value(query),
    }
}

fn cond_to_value(cond: &FieldCond) -> Value {
    match cond {
        FieldCond::Compare { op, value } => match (op, value.as_ref()) {
            (CompareOp::Eq, Expr::Literal(literal)) => literal_to_value(literal),
            _ => single(tag(op), expr_to_value(value)),
        },
        FieldCond::Regex(pattern) => single("$regex", Value::String(pattern.clone())),
        FieldCond::Text(text) => single("$text", Value::String(text.clone())),
        FieldCond::Apply { func, args, cond } => {
            if args.is_empty() {
                single(tag(func), cond_to_value(cond))
            } else {
                let mut items: Vec<_> = args.iter().map(expr_to_value).collect();
                items.push(cond_to_value(cond));
                single(tag(func), Value::Array(items))
            }
        }
    }
}

fn literal_from_value(value: &Value) -> DecodeResult<Literal> {
    Ok(match value {
        Value::Null => Literal::Null,
        Value::Bool(b) => Literal::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Literal::Integer(i),
            None => Literal::Float(n.as_f64().ok_or_else(|| format!("bad number {n}"))?),
        },
        Value::String(s) => Literal::String(s.clone()),
        _ => return Err(format!("expected a constant, found {value}")),
    })
}

fn as_single(map: &Map<String, Value>) -> DecodeResult<(&str, &Value)> {
    let mut iter = map.iter();
    match (iter.next(), iter.next()) {
        (Some((key, value)), None) => Ok((key.as_str(), value)),
        _ => Err(format!(
            "expected an object with exactly one key, found {}",
            Value::Object(map.clone())
        )),
    }
}

fn as_str<'a>(value: &'a Value, what: &str) -> DecodeResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| format!("{what} must be a string, found {value}"))
}

fn as_array<'a>(value: &'a Value, what: &str) -> DecodeResult<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| format!("{what} must be an array, found {value}"))
}

fn exprs_from_values(values: &[Value]) -> DecodeResult<Vec<Expr>> {
    values.iter().map(expr_from_value).collect()
}

pub(crate) fn expr_from_value(value: &Value) -> DecodeResult<Expr> {
    let map = match value {
        Value::Array(items) => return exprs_from_values(items).map(Expr::Array),
        Value::Object(map) => map,
        _ => return literal_from_value(value).map(Expr::Literal),
    };
    if map.contains_key("$select") {
        return query_from_value(value).map(|q| Expr::Query(Box::new(q)));
    }

    let (key, value) = as_single(map)?;
    let Some(op) = key.strip_prefix('$') else {
        return Ok(Expr::Filter(FieldFilter {
            field: key.to_string(),
            cond: cond_from_value(value)?,
        }));
    };

    if op == "name" {
        return Ok(Expr::Name(as_str(value, "$name")?.to_string()));
    }
    if op == "value" || op == "literal" {
        return literal_from_value(value).map(Expr::Literal);
    }
    if op == "not" {
        return Ok(Expr::Not(Box::new(expr_from_value(value)?)));
    }
    if op == "switch" {
        return switch_from_value(value).map(Expr::Switch);
    }
    if let Ok(logical) = LogicalOp::from_str(op) {
        let args = exprs_from_values(as_array(value, key)?)?;
        if args.is_empty() {
            return Err(format!("{key} requires at least one argument"));
        }
        return Ok(Expr::Logical { op: logical, args });
    }
    if let Ok(compare) = CompareOp::from_str(op) {
        let args = as_array(value, key)?;
        let [left, right] = args.as_slice() else {
            return Err(format!("{key} takes two operands, found {}", args.len()));
        };
        return Ok(Expr::compare(
            compare,
            expr_from_value(left)?,
            expr_from_value(right)?,
        ));
    }
    if let Ok(func) = Func::from_str(op) {
        let args = match value {
            Value::Array(items) => exprs_from_values(items)?,
            single => vec![expr_from_value(single)?],
        };
        return Ok(Expr::Function { func, args });
    }
    Err(format!("unknown operator `{key}`"))
}

fn cond_from_value(value: &Value) -> DecodeResult<FieldCond> {
    let map = match value {
        Value::Object(map) => map,
        Value::Array(_) => return Err(format!("expected a condition, found {value}")),
        _ => {
            let literal = literal_from_value(value)?;
            return Ok(FieldCond::compare(CompareOp::Eq, Expr::Literal(literal)));
        }
    };

    let (key, inner) = as_single(map)?;
    let op = key.strip_prefix('$').unwrap_or(key);

    if matches!(op, "name" | "value" | "literal") {
        return Ok(FieldCond::compare(CompareOp::Eq, expr_from_value(value)?));
    }
    if op == "regex" {
        return Ok(FieldCond::Regex(as_str(inner, key)?.to_string()));
    }
    if op == "text" {
        return Ok(FieldCond::Text(as_str(inner, key)?.to_string()));
    }
    if let Ok(compare) = CompareOp::from_str(op) {
        return Ok(FieldCond::compare(compare, expr_from_value(inner)?));
    }
    if let Ok(func) = Func::from_str(op) {
        let (args, cond) = match inner {
            Value::Array(items) => match items.split_last() {
                Some((cond, args)) => (exprs_from_values(args)?, cond),
                None => return Err(format!("{key} is missing its condition")),
            },
            cond => (Vec::new(), cond),
        };
        return Ok(FieldCond::Apply {
            func,
            args,
            cond: Box::new(cond_from_value(cond)?),
        });
    }
    Err(format!("unknown operator `{key}`"))
}

fn switch_from_value(value: &Value) -> DecodeResult<Switch> {
    let body = value
        .as_object()
        .ok_or_else(|| format!("$switch must be an object, found {value}"))?;

    let branches = match body.get("branches") {
        Some(branches) => as_array(branches, "branches")?
            .iter()
            .map(|b| -> DecodeResult<SwitchCase> {
                let case = b.get("case").ok_or("branch is missing `case`")?;
                let then = b.get("then").ok_or("branch is missing `then`")?;
                Ok(SwitchCase {
                    case: expr_from_value(case)?,
                    then: expr_from_value(then)?,
                })
            })
            .collect::<DecodeResult<Vec<_>>>()?,
        None => Vec::new(),
    };
    let default = match body.get("default") {
        Some(default) => Some(Box::new(expr_from_value(default)?)),
        None => None,
    };
    Ok(Switch { branches, default })
}

fn query_to_value(query: &Query) -> Value {
    let mut map = Map::new();

    match &query.statement {
        Some(Statement::Select(select)) => {
            let mut body = Map::new();
            if let Some(entity) = &select.entity {
                body.insert("$entity".into(), entity_to_value(entity));
            }
            body.insert(
                "$fields".into(),
                Value::Array(select.fields.iter().map(field_to_value).collect()),
            );
            if select.fixed {
                body.insert("$fixed".into(), Value::Bool(true));
            }
            map.insert("$select".into(), Value::Object(body));
        }
        Some(Statement::Insert(insert)) => {
            let mut body = Map::new();
            if let Some(into) = &insert.into {
                body.insert("$into".into(), Value::String(into.clone()));
            }
            body.insert("$values".into(), values_to_value(&insert.values));
            map.insert("$insert".into(), Value::Object(body));
        }
        Some(Statement::Update(update)) => {
            let mut body = Map::new();
            body.insert("$entity".into(), Value::String(update.table.clone()));
            body.insert("$set".into(), values_to_value(&update.values));
            map.insert("$update".into(), Value::Object(body));
        }
        Some(Statement::Delete(delete)) => {
            map.insert("$delete".into(), Value::String(delete.table.clone()));
        }
        None => {}
    }

    if let Some(filter) = &query.filter {
        map.insert("$where".into(), expr_to_value(filter));
    }
    if let Some(prepared) = &query.prepared {
        map.insert("$prepared".into(), expr_to_value(prepared));
    }
    if !query.order.is_empty() {
        let order = query.order.iter().map(order_to_value).collect();
        map.insert("$order".into(), Value::Array(order));
    }
    if !query.group.is_empty() {
        let group = query.group.iter().map(field_to_value).collect();
        map.insert("$group".into(), Value::Array(group));
    }
    match query.joins.as_slice() {
        [] => {}
        [join] => {
            map.insert("$expand".into(), join_to_value(join));
        }
        joins => {
            let joins = joins.iter().map(join_to_value).collect();
            map.insert("$expand".into(), Value::Array(joins));
        }
    }
    if let Some(skip) = query.skip {
        map.insert("$skip".into(), skip.into());
    }
    if let Some(take) = query.take {
        map.insert("$take".into(), take.into());
    }
    if query.distinct {
        map.insert("$distinct".into(), Value::Bool(true));
    }
    if query.count {
        map.insert("$count".into(), Value::Bool(true));
    }
    Value::Object(map)
}

fn values_to_value(values: &[(String, Expr)]) -> Value {
    Value::Object(
        values
            .iter()
            .map(|(k, v)| (k.clone(), expr_to_value(v)))
            .collect(),
    )
}

fn entity_to_value(entity: &Entity) -> Value {
    match (&entity.source, &entity.alias) {
        (EntitySource::Table(name), None) => Value::String(name.clone()),
        (EntitySource::Table(name), Some(alias)) => {
            let mut map = Map::new();
            map.insert("$name".into(), Value::String(name.clone()));
            map.insert("$as".into(), Value::String(alias.clone()));
            Value::Object(map)
        }
        (EntitySource::Query(query), alias) => {
            let mut map = Map::new();
            map.insert("$query".into(), query_to_value(query));
            if let Some(alias) = alias {
                map.insert("$as".into(), Value::String(alias.clone()));
            }
            Value::Object(map)
        }
    }
}

fn field_to_value(field: &Field) -> Value {
    match &field.alias {
        Some(alias) => single(alias.clone(), expr_to_value(&field.expr)),
        None => expr_to_value(&field.expr),
    }
}

fn order_to_value(order: &Order) -> Value {
    single(tag(order.direction), expr_to_value(&order.expr))
}

fn join_to_value(join: &Join) -> Value {
    let mut map = Map::new();
    map.insert("$entity".into(), entity_to_value(&join.entity));
    map.insert("$join".into(), Value::String(join.direction.to_string()));
    if let Some(condition) = &join.condition {
        map.insert("$with".into(), expr_to_value(condition));
    }
    if let Some(options) = &join.options {
        map.insert("$options".into(), expand_options_to_value(options));
    }
    Value::Object(map)
}

fn expand_options_to_value(options: &ExpandOptions) -> Value {
    let mut map = Map::new();
    let texts = [
        ("$filter", &options.filter),
        ("$select", &options.select),
        ("$orderby", &options.orderby),
        ("$groupby", &options.groupby),
        ("$expand", &options.expand),
    ];
    for (key, text) in texts {
        if let Some(text) = text {
            map.insert(key.into(), Value::String(text.clone()));
        }
    }
    let numbers = [
        ("$top", options.top),
        ("$skip", options.skip),
        ("$levels", options.levels),
    ];
    for (key, number) in numbers {
        if let Some(number) = number {
            map.insert(key.into(), number.into());
        }
    }
    if let Some(count) = options.count {
        map.insert("$count".into(), Value::Bool(count));
    }
    Value::Object(map)
}

pub(crate) fn query_from_value(value: &Value) -> DecodeResult<Query> {
    let map = value
        .as_object()
        .ok_or_else(|| format!("expected a query object, found {value}"))?;
    let mut query = Query::default();

    for (key, value) in map {
        match key.as_str() {
            "$select" => {
                let body = value
                    .as_object()
                    .ok_or_else(|| format!("$select must be an object, found {value}"))?;
                let entity = match body.get("$entity") {
                    Some(entity) => Some(entity_from_value(entity)?),
                    None => None,
                };
                let fields = match body.get("$fields") {
                    Some(fields) => as_array(fields, "$fields")?
                        .iter()
                        .map(field_from_value)
                        .collect::<DecodeResult<_>>()?,
                    None => Vec::new(),
                };
                let fixed = body.get("$fixed").and_then(Value::as_bool).unwrap_or(false);
                query.statement = Some(Statement::Select(Select {
                    entity,
                    fields,
                    fixed,
                }));
            }
            "$insert" => {
                let into = match value.get("$into") {
                    Some(into) => Some(as_str(into, "$into")?.to_string()),
                    None => None,
                };
                let values = values_from_value(value.get("$values"))?;
                query.statement = Some(Statement::Insert(Insert { into, values }));
            }
            "$update" => {
                let table = value
                    .get("$entity")
                    .ok_or("$update is missing `$entity`")?;
                let table = as_str(table, "$entity")?.to_string();
                let values = values_from_value(value.get("$set"))?;
                query.statement = Some(Statement::Update(Update { table, values }));
            }
            "$delete" => {
                let table = as_str(value, "$delete")?.to_string();
                query.statement = Some(Statement::Delete(Delete { table }));
            }
            "$where" => query.filter = Some(expr_from_value(value)?),
            "$prepared" => query.prepared = Some(expr_from_value(value)?),
            "$order" => {
                query.order = as_array(value, key)?
                    .iter()
                    .map(order_from_value)
                    .collect::<DecodeResult<_>>()?;
            }
            "$group" => {
                query.group = as_array(value, key)?
                    .iter()
                    .map(field_from_value)
                    .collect::<DecodeResult<_>>()?;
            }
            "$expand" => {
                query.joins = match value {
                    Value::Array(joins) => joins
                        .iter()
                        .map(join_from_value)
                        .collect::<DecodeResult<_>>()?,
                    join => vec![join_from_value(join)?],
                };
            }
            "$skip" => query.skip = Some(paging_from_value(value)),
            "$take" => query.take = Some(paging_from_value(value)),
            "$distinct" => query.distinct = value.as_bool().unwrap_or(false),
            "$count" => query.count = value.as_bool().unwrap_or(false),
            _ => return Err(format!("unknown query key `{key}`")),
        }
    }
    Ok(query)
}

fn paging_from_value(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => coerce_int(s),
        _ => 0,
    }
}

fn values_from_value(value: Option<&Value>) -> DecodeResult<Vec<(String, Expr)>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let map = value
        .as_object()
        .ok_or_else(|| format!("expected an object of values, found {value}"))?;
    map.iter()
        .map(|(k, v)| -> DecodeResult<_> { Ok((k.clone(), expr_from_value(v)?)) })
        .collect()
}

fn entity_from_value(value: &Value) -> DecodeResult<Entity> {
    let map = match value {
        Value::String(name) => return Ok(Entity::table(name)),
        Value::Object(map) => map,
        _ => return Err(format!("expected an entity, found {value}")),
    };
    let alias = match map.get("$as") {
        Some(alias) => Some(as_str(alias, "$as")?.to_string()),
        None => None,
    };
    let source = if let Some(query) = map.get("$query") {
        EntitySource::Query(Box::new(query_from_value(query)?))
    } else if let Some(name) = map.get("$name") {
        EntitySource::Table(as_str(name, "$name")?.to_string())
    } else {
        return Err(format!("entity needs `$name` or `$query`, found {value}"));
    };
    Ok(Entity { source, alias })
}

fn field_from_value(value: &Value) -> DecodeResult<Field> {
    if let Value::String(name) = value {
        return Ok(Field::name(name));
    }
    if let Value::Object(map) = value {
        if let Ok((key, inner)) = as_single(map) {
            if !key.starts_with('$') {
                return Ok(Field::from(expr_from_value(inner)?).with_alias(key));
            }
        }
    }
    expr_from_value(value).map(Field::from)
}

fn order_from_value(value: &Value) -> DecodeResult<Order> {
    let map = value
        .as_object()
        .ok_or_else(|| format!("expected an order object, found {value}"))?;
    let (key, inner) = as_single(map)?;
    let direction = key
        .strip_prefix('$')
        .and_then(|d| SortDirection::from_str(d).ok())
        .ok_or_else(|| format!("expected `$asc` or `$desc`, found `{key}`"))?;
    Ok(Order {
        expr: expr_from_value(inner)?,
        direction,
    })
}

fn join_from_value(value: &Value) -> DecodeResult<Join> {
    let entity = value.get("$entity").ok_or("join is missing `$entity`")?;
    let direction = match value.get("$join") {
        Some(direction) => {
            let direction = as_str(direction, "$join")?;
            JoinDirection::from_str(direction)
                .map_err(|_| format!("unknown join direction `{direction}`"))?
        }
        None => JoinDirection::default(),
    };
    let condition = match value.get("$with") {
        Some(condition) => Some(expr_from_value(condition)?),
        None => None,
    };
    let options = match value.get("$options") {
        Some(options) => Some(expand_options_from_value(options)?),
        None => None,
    };
    Ok(Join {
        entity: entity_from_value(entity)?,
        direction,
        condition,
        options,
    })
}

fn expand_options_from_value(value: &Value) -> DecodeResult<ExpandOptions> {
    let map = value
        .as_object()
        .ok_or_else(|| format!("expected expand options, found {value}"))?;
    let mut options = ExpandOptions::default();

    for (key, value) in map {
        let text = || as_str(value, key).map(str::to_string);
        match key.as_str() {
            "$filter" => options.filter = Some(text()?),
            "$select" => options.select = Some(text()?),
            "$orderby" => options.orderby = Some(text()?),
            "$groupby" => options.groupby = Some(text()?),
            "$expand" => options.expand = Some(text()?),
            "$top" => options.top = Some(paging_from_value(value)),
            "$skip" => options.skip = Some(paging_from_value(value)),
            "$levels" => options.levels = Some(paging_from_value(value)),
            "$count" => options.count = value.as_bool(),
            _ => return Err(format!("unknown expand option `{key}`")),
        }
    }
    Ok(options)
}
