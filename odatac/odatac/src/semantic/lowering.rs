use std::ops::RangeInclusive;

use odatac_parser::parser::pr::{self, ArithmeticOp, ComparisonOp, ExprKind, LogicalOp};

use crate::ir::{self, CompareOp, Func, Literal};
use crate::{Error, ErrorSource, Reason, Result, WithErrorInfo};

/// Conversion of an AST node into the IR. Lowering never mutates the node, so
/// lowering the same node twice gives equal results.
pub trait Lower {
    type Output;

    fn lower(&self) -> Result<Self::Output>;
}

impl Lower for pr::Expr {
    type Output = ir::Expr;

    fn lower(&self) -> Result<ir::Expr> {
        lower_kind(&self.kind)
            .with_span_fallback(self.span)
            .with_source(ErrorSource::Semantic)
    }
}

impl Lower for [pr::Expr] {
    type Output = Vec<ir::Expr>;

    fn lower(&self) -> Result<Vec<ir::Expr>> {
        self.iter().map(Lower::lower).collect()
    }
}

fn lower_kind(kind: &ExprKind) -> Result<ir::Expr> {
    Ok(match kind {
        ExprKind::Member(name) => ir::Expr::Name(name.clone()),
        ExprKind::Literal(literal) => ir::Expr::Literal(literal.clone()),
        ExprKind::Arithmetic(arithmetic) => ir::Expr::Function {
            func: arithmetic_func(arithmetic.op),
            args: vec![arithmetic.left.lower()?, arithmetic.right.lower()?],
        },
        ExprKind::Comparison(comparison) => lower_comparison(comparison)?,
        ExprKind::Logical(logical) => lower_logical(logical)?,
        ExprKind::MethodCall(call) => resolve_method(&call.name, call.args.lower()?)?,
        ExprKind::Sequence(items) => ir::Expr::Array(items.lower()?),
        ExprKind::Switch(switch) => ir::Expr::Switch(ir::Switch {
            branches: switch
                .branches
                .iter()
                .map(|b| -> Result<_> {
                    Ok(ir::SwitchCase {
                        case: b.case.lower()?,
                        then: b.then.lower()?,
                    })
                })
                .collect::<Result<_>>()?,
            default: match &switch.default {
                Some(default) => Some(Box::new(default.lower()?)),
                None => None,
            },
        }),
        ExprKind::SelectAlias(_) | ExprKind::Object(_) => {
            return Err(Error::new_simple("aliases are only allowed in $select"))
        }
        ExprKind::OrderDirection(_) => {
            return Err(Error::new_simple(
                "sort directions are only allowed in $orderby",
            ))
        }
    })
}

fn arithmetic_func(op: ArithmeticOp) -> Func {
    match op {
        ArithmeticOp::Add => Func::Add,
        ArithmeticOp::Sub => Func::Subtract,
        ArithmeticOp::Mul => Func::Multiply,
        ArithmeticOp::Div => Func::Divide,
        ArithmeticOp::Mod => Func::Mod,
    }
}

fn compare_op(op: ComparisonOp) -> CompareOp {
    match op {
        ComparisonOp::Eq => CompareOp::Eq,
        ComparisonOp::Ne => CompareOp::Ne,
        ComparisonOp::Gt => CompareOp::Gt,
        ComparisonOp::Ge => CompareOp::Gte,
        ComparisonOp::Lt => CompareOp::Lt,
        ComparisonOp::Le => CompareOp::Lte,
        ComparisonOp::In => CompareOp::In,
    }
}

/// A member on the left gives the field-keyed form; anything else is an
/// expression comparison.
fn lower_comparison(comparison: &pr::ComparisonExpr) -> Result<ir::Expr> {
    let op = compare_op(comparison.op);
    let left = comparison.left.lower()?;
    let right = comparison.right.lower()?;

    // `startswith(name, 'a') eq true` is just the predicate
    if let (ir::Expr::Function { func, .. }, ir::Expr::Literal(Literal::Boolean(b))) =
        (&left, &right)
    {
        if func.is_predicate() && matches!(op, CompareOp::Eq | CompareOp::Ne) {
            let holds = (op == CompareOp::Eq) == *b;
            return Ok(if holds {
                left
            } else {
                ir::Expr::Not(Box::new(left))
            });
        }
    }

    Ok(match left {
        ir::Expr::Name(field) => ir::Expr::Filter(ir::FieldFilter {
            field,
            cond: ir::FieldCond::compare(op, right),
        }),
        left => ir::Expr::compare(op, left, right),
    })
}

fn lower_logical(logical: &pr::LogicalExpr) -> Result<ir::Expr> {
    if logical.args.is_empty() {
        return Err(Error::new_simple(format!(
            "`{}` requires at least one argument",
            logical.op
        )));
    }
    let mut args = logical.args.lower()?;

    let op = match logical.op {
        LogicalOp::And => ir::LogicalOp::And,
        LogicalOp::Or => ir::LogicalOp::Or,
        LogicalOp::Not => {
            if args.len() != 1 {
                return Err(Error::new(Reason::Expected {
                    who: Some("`not`".to_string()),
                    expected: "one argument".to_string(),
                    found: args.len().to_string(),
                }));
            }
            return Ok(ir::Expr::Not(Box::new(args.remove(0))));
        }
    };
    Ok(ir::Expr::Logical { op, args })
}

/// Maps an OData method onto a [Func], checking its arity.
pub fn resolve_method(name: &str, mut args: Vec<ir::Expr>) -> Result<ir::Expr> {
    let (func, arity): (Func, RangeInclusive<usize>) = match name {
        "tolower" => (Func::ToLower, 1..=1),
        "toupper" => (Func::ToUpper, 1..=1),
        "trim" => (Func::Trim, 1..=1),
        "length" => (Func::Length, 1..=1),
        "concat" => (Func::Concat, 2..=usize::MAX),
        "substring" => (Func::Substring, 2..=3),
        "indexof" => (Func::IndexOf, 2..=2),
        "contains" => (Func::Contains, 2..=2),
        "startswith" => (Func::StartsWith, 2..=2),
        "endswith" => (Func::EndsWith, 2..=2),
        // OData v2 spelling, with the arguments the other way around
        "substringof" => (Func::Contains, 2..=2),
        "round" => (Func::Round, 1..=2),
        "floor" => (Func::Floor, 1..=1),
        "ceiling" => (Func::Ceiling, 1..=1),
        "date" => (Func::Date, 1..=1),
        "year" => (Func::Year, 1..=1),
        "month" => (Func::Month, 1..=1),
        "day" => (Func::Day, 1..=1),
        "hour" => (Func::Hour, 1..=1),
        "minute" => (Func::Minute, 1..=1),
        "second" => (Func::Second, 1..=1),
        "now" => (Func::Now, 0..=0),
        "count" => (Func::Count, 1..=1),
        "min" => (Func::Min, 1..=1),
        "max" => (Func::Max, 1..=1),
        "sum" => (Func::Sum, 1..=1),
        "avg" => (Func::Avg, 1..=1),
        _ => {
            return Err(Error::new(Reason::NotFound {
                name: name.to_string(),
                namespace: "method".to_string(),
            })
            .with_source(ErrorSource::Semantic))
        }
    };

    if !arity.contains(&args.len()) {
        let expected = match (arity.start(), arity.end()) {
            (min, &usize::MAX) => format!("at least {min} arguments"),
            (min, max) if min == max => format!("{min} arguments"),
            (min, max) => format!("{min} to {max} arguments"),
        };
        return Err(Error::new(Reason::Expected {
            who: Some(format!("method `{name}`")),
            expected,
            found: args.len().to_string(),
        })
        .with_source(ErrorSource::Parser));
    }

    if name == "substringof" {
        args.swap(0, 1);
    }
    Ok(ir::Expr::Function { func, args })
}

/// `$select` and `$groupby` items. Aliased items keep their alias.
pub fn lower_fields(items: &[pr::Expr]) -> Result<Vec<ir::Field>> {
    let mut fields = Vec::with_capacity(items.len());
    for item in items {
        match &item.kind {
            ExprKind::SelectAlias(aliased) => fields.push(ir::Field {
                expr: aliased.expr.lower()?,
                alias: Some(aliased.alias.clone()),
            }),
            ExprKind::Object(object) => {
                for field in object {
                    fields.push(ir::Field {
                        expr: field.expr.lower()?,
                        alias: Some(field.name.clone()),
                    });
                }
            }
            _ => fields.push(ir::Field::from(item.lower()?)),
        }
    }
    Ok(fields)
}

/// `$orderby` items; items without a direction sort ascending.
pub fn lower_order(items: &[pr::Expr]) -> Result<Vec<ir::Order>> {
    items
        .iter()
        .map(|item| {
            Ok(match &item.kind {
                ExprKind::OrderDirection(order) => ir::Order {
                    expr: order.expr.lower()?,
                    direction: match order.direction {
                        pr::SortDirection::Asc => ir::SortDirection::Asc,
                        pr::SortDirection::Desc => ir::SortDirection::Desc,
                    },
                },
                _ => ir::Order {
                    expr: item.lower()?,
                    direction: ir::SortDirection::Asc,
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use insta::assert_snapshot;
    use odatac_parser::{parse_filter, parse_order_by, parse_select};

    use super::*;

    fn lower(source: &str) -> String {
        let expr = parse_filter(source).unwrap().lower().unwrap();
        serde_json::to_string(&expr).unwrap()
    }

    fn lower_err(source: &str) -> Error {
        parse_filter(source).unwrap().lower().unwrap_err()
    }

    #[test]
    fn test_field_filters() {
        assert_snapshot!(lower("id eq 100"), @r#"{"id":100}"#);
        assert_snapshot!(
            lower("active eq true and category eq 'Laptops'"),
            @r#"{"$and":[{"active":true},{"category":"Laptops"}]}"#
        );
        assert_snapshot!(lower("price ge 10.5"), @r#"{"price":{"$gte":10.5}}"#);
        assert_snapshot!(lower("id in (1, 2)"), @r#"{"id":{"$in":[1,2]}}"#);
        assert_snapshot!(lower("price gt cost"), @r#"{"price":{"$gt":{"$name":"cost"}}}"#);
    }

    #[test]
    fn test_expressions() {
        assert_snapshot!(
            lower("price mul 2 gt 100"),
            @r#"{"$gt":[{"$multiply":[{"$name":"price"},2]},100]}"#
        );
        assert_snapshot!(
            lower("tolower(name) eq 'anna'"),
            @r#"{"$eq":[{"$toLower":[{"$name":"name"}]},"anna"]}"#
        );
        assert_snapshot!(
            lower("not (a eq 1 or b eq 2)"),
            @r#"{"$not":{"$or":[{"a":1},{"b":2}]}}"#
        );
        assert_snapshot!(
            lower("case(price gt 100: 'high', true: 'low') eq 'high'"),
            @r#"{"$eq":[{"$switch":{"branches":[{"case":{"price":{"$gt":100}},"then":"high"}],"default":"low"}},"high"]}"#
        );
    }

    #[test]
    fn test_predicates() {
        assert_snapshot!(
            lower("startswith(name, 'A') eq true"),
            @r#"{"$startsWith":[{"$name":"name"},"A"]}"#
        );
        assert_snapshot!(
            lower("endswith(name, 'z') eq false"),
            @r#"{"$not":{"$endsWith":[{"$name":"name"},"z"]}}"#
        );
        assert_snapshot!(
            lower("substringof('an', name)"),
            @r#"{"$contains":[{"$name":"name"},"an"]}"#
        );
    }

    #[test]
    fn test_idempotent() {
        let ast = parse_filter("price add 5 gt 10 and tolower(name) eq 'x'").unwrap();
        assert_eq!(ast.lower().unwrap(), ast.lower().unwrap());
    }

    #[test]
    fn test_logical_arity() {
        let empty = pr::Expr::new(pr::LogicalExpr {
            op: LogicalOp::And,
            args: vec![],
        });
        let err = empty.lower().unwrap_err();
        assert_snapshot!(err.reason, @"`and` requires at least one argument");
        assert_eq!(err.code, Some("E0003"));

        let one = pr::Expr::new(pr::LogicalExpr {
            op: LogicalOp::Or,
            args: vec![parse_filter("a eq 1").unwrap()],
        });
        assert_snapshot!(
            serde_json::to_string(&one.lower().unwrap()).unwrap(),
            @r#"{"$or":[{"a":1}]}"#
        );
    }

    #[test]
    fn test_method_errors() {
        let err = lower_err("frobnicate(name) eq 1");
        assert_snapshot!(err.reason, @"method `frobnicate` not found");
        assert_eq!(err.code, Some("E0003"));
        assert!(err.span.is_some());

        let err = lower_err("tolower(name, 1) eq 'a'");
        assert_snapshot!(err.reason, @"method `tolower` expected 1 arguments, but found 2");
        assert_eq!(err.code, Some("E0002"));
    }

    #[test]
    fn test_fields_and_order() {
        let fields = lower_fields(&parse_select("id, tolower(name) as lower").unwrap()).unwrap();
        assert_eq!(fields[0], ir::Field::name("id"));
        assert_eq!(fields[1].alias.as_deref(), Some("lower"));

        let order = lower_order(&parse_order_by("name desc, id").unwrap()).unwrap();
        assert_eq!(order[0].direction, ir::SortDirection::Desc);
        assert_eq!(order[1].direction, ir::SortDirection::Asc);
        assert_eq!(order[1].expr, ir::Expr::name("id"));
    }
}
