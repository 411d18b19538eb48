use insta::assert_snapshot;
use itertools::Itertools;

use super::pr::*;
use super::{parse_expand, parse_filter, parse_group_by, parse_order_by, parse_select};
use super::{Parser, Resolver};
use crate::error::Error;
use crate::span::Span;

/// Compact rendering of an expression tree, so snapshots stay readable.
fn sexp(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Member(name) => name.clone(),
        ExprKind::Literal(literal) => literal.to_string(),
        ExprKind::Arithmetic(e) => format!("({} {} {})", e.op, sexp(&e.left), sexp(&e.right)),
        ExprKind::Comparison(e) => format!("({} {} {})", e.op, sexp(&e.left), sexp(&e.right)),
        ExprKind::Logical(e) => format!("({} {})", e.op, e.args.iter().map(sexp).join(" ")),
        ExprKind::MethodCall(call) => {
            format!("{}({})", call.name, call.args.iter().map(sexp).join(", "))
        }
        ExprKind::Sequence(items) => format!("[{}]", items.iter().map(sexp).join(", ")),
        ExprKind::Object(fields) => format!(
            "{{{}}}",
            fields
                .iter()
                .map(|f| format!("{}: {}", f.name, sexp(&f.expr)))
                .join(", ")
        ),
        ExprKind::SelectAlias(a) => format!("(as {} {})", sexp(&a.expr), a.alias),
        ExprKind::OrderDirection(o) => format!("({} {})", o.direction, sexp(&o.expr)),
        ExprKind::Switch(s) => {
            let mut parts = s
                .branches
                .iter()
                .map(|b| format!("({} {})", sexp(&b.case), sexp(&b.then)))
                .collect_vec();
            if let Some(default) = &s.default {
                parts.push(format!("(default {})", sexp(default)));
            }
            format!("(case {})", parts.join(" "))
        }
    }
}

fn parse(source: &str) -> String {
    sexp(&parse_filter(source).unwrap())
}

fn parse_err(source: &str) -> Error {
    parse_filter(source).unwrap_err()
}

#[test]
fn test_comparison() {
    assert_snapshot!(parse("id eq 100"), @"(eq id 100)");
    assert_snapshot!(parse("name ne null"), @"(ne name null)");
    assert_snapshot!(
        parse("active eq true and category eq 'Laptops'"),
        @"(and (eq active true) (eq category 'Laptops'))"
    );
}

#[test]
fn test_logical_flatten() {
    assert_snapshot!(
        parse("a eq 1 and b eq 2 and c eq 3"),
        @"(and (eq a 1) (eq b 2) (eq c 3))"
    );

    // `and` binds tighter than `or`
    assert_snapshot!(
        parse("a eq 1 or b eq 2 and c eq 3"),
        @"(or (eq a 1) (and (eq b 2) (eq c 3)))"
    );
    assert_snapshot!(
        parse("a eq 1 and b eq 2 or c eq 3"),
        @"(or (and (eq a 1) (eq b 2)) (eq c 3))"
    );

    // A parenthesized run of the same operator is extended
    assert_snapshot!(
        parse("(a eq 1 or b eq 2) or c eq 3"),
        @"(or (eq a 1) (eq b 2) (eq c 3))"
    );
    assert_snapshot!(
        parse("(a eq 1 or b eq 2) and c eq 3"),
        @"(and (or (eq a 1) (eq b 2)) (eq c 3))"
    );
}

#[test]
fn test_arithmetic() {
    assert_snapshot!(
        parse("price add 5 mul qty gt 100"),
        @"(gt (add price (mul 5 qty)) 100)"
    );
    assert_snapshot!(
        parse("(price add 5) mul qty gt 100"),
        @"(gt (mul (add price 5) qty) 100)"
    );
    assert_snapshot!(parse("-price lt 0"), @"(lt (sub 0 price) 0)");
}

#[test]
fn test_constant_folding() {
    assert_snapshot!(parse("price gt 2 add 3"), @"(gt price 5)");
    assert_snapshot!(parse("x eq 8 div 2"), @"(eq x 4)");
    assert_snapshot!(parse("x eq 7 div 2"), @"(eq x 3.5)");
    assert_snapshot!(parse("x eq 1.5 mul 2"), @"(eq x 3.0)");
    assert_snapshot!(parse("x eq 10 mod 4"), @"(eq x 2)");

    // Division by zero is left for the database
    assert_snapshot!(parse("x eq 1 div 0"), @"(eq x (div 1 0))");
}

#[test]
fn test_members() {
    assert_snapshot!(
        parse("$it/customer/address/city eq 'Athens'"),
        @"(eq customer.address.city 'Athens')"
    );
    assert_snapshot!(parse("$it eq 1"), @"(eq $it 1)");
}

#[test]
fn test_methods() {
    assert_snapshot!(
        parse("startswith(tolower(name), 'a') eq true"),
        @"(eq startswith(tolower(name), 'a') true)"
    );
    assert_snapshot!(parse("not endswith(name, 'x')"), @"(not endswith(name, 'x'))");
    assert_snapshot!(
        parse("not (a eq 1 or b eq 2)"),
        @"(not (or (eq a 1) (eq b 2)))"
    );
    assert_snapshot!(parse("now() gt dateCreated"), @"(gt now() dateCreated)");
}

#[test]
fn test_in() {
    assert_snapshot!(parse("id in (1, 2, 3)"), @"(in id [1, 2, 3])");
    assert_snapshot!(parse("id in ()"), @"(in id [])");
}

#[test]
fn test_case() {
    assert_snapshot!(
        parse("case(price gt 100: 'high', price gt 10: 'mid', true: 'low')"),
        @"(case ((gt price 100) 'high') ((gt price 10) 'mid') (default 'low'))"
    );
    assert_snapshot!(
        parse("case(status eq 1: 'open')"),
        @"(case ((eq status 1) 'open'))"
    );
}

#[test]
fn test_spans() {
    let expr = parse_filter("id eq 100").unwrap();
    assert_eq!(expr.span, Some(Span::new(0, 9)));

    let comparison = expr.kind.into_comparison().unwrap();
    assert_eq!(comparison.left.span, Some(Span::new(0, 2)));
    assert_eq!(comparison.right.span, Some(Span::new(6, 9)));
}

#[derive(Default)]
struct Prefixing {
    seen: Vec<String>,
}

impl Resolver for Prefixing {
    fn resolve_member(&mut self, name: String, span: Span) -> Result<Expr, Error> {
        self.seen.push(name.clone());
        Ok(Expr::member(format!("Orders.{name}")).with_span(Some(span)))
    }

    fn resolve_method(&mut self, name: String, args: Vec<Expr>, span: Span) -> Result<Expr, Error> {
        if name == "pi" {
            return Ok(Expr::literal(2.5).with_span(Some(span)));
        }
        Ok(Expr::new(MethodCall { name, args }).with_span(Some(span)))
    }
}

#[test]
fn test_resolver_hooks() {
    let mut parser = Parser::with_resolver(
        "total gt pi() and customer/name eq tolower('X')",
        Prefixing::default(),
    )
    .unwrap();
    let expr = parser.parse_expression().unwrap();

    assert_snapshot!(
        sexp(&expr),
        @"(and (gt Orders.total 2.5) (eq Orders.customer.name tolower('X')))"
    );
    assert_eq!(parser.into_resolver().seen, vec!["total", "customer.name"]);
}

#[test]
fn test_select() {
    let items = parse_select("id, name as title, year(dateCreated) as y").unwrap();
    assert_snapshot!(
        items.iter().map(sexp).join(" | "),
        @"id | (as name title) | (as year(dateCreated) y)"
    );

    let items = parse_group_by("category, year(createdAt)").unwrap();
    assert_snapshot!(items.iter().map(sexp).join(" | "), @"category | year(createdAt)");
}

#[test]
fn test_order_by() {
    let items = parse_order_by("name, price desc, customer/id asc").unwrap();
    assert_snapshot!(
        items.iter().map(sexp).join(" | "),
        @"(asc name) | (desc price) | (asc customer.id)"
    );
}

#[test]
fn test_expand() {
    let items = parse_expand("customer($expand=address($expand=location)),orderedItem").unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].name, "customer");
    assert_eq!(
        items[0].options.expand.as_deref(),
        Some("address($expand=location)")
    );
    assert_eq!(items[1].name, "orderedItem");
    assert!(items[1].options.is_empty());

    let items = parse_expand(
        "orders($filter=total gt 5 and (status eq 1);$orderby=total desc;$top=5;$skip=x;$count=true)",
    )
    .unwrap();
    let options = &items[0].options;
    assert_eq!(options.filter.as_deref(), Some("total gt 5 and (status eq 1)"));
    assert_eq!(options.orderby.as_deref(), Some("total desc"));
    assert_eq!(options.top, Some(5));
    assert_eq!(options.skip, Some(0));
    assert_eq!(options.count, Some(true));
}

#[test]
fn test_errors() {
    let err = parse_err("id eq");
    assert_snapshot!(err.reason, @"expected an expression, but found end of input");
    assert_eq!(err.span, Some(Span::new(5, 5)));
    assert_eq!(err.code, Some("E0002"));

    assert_snapshot!(
        parse_err("(id eq 1").reason,
        @"parenthesized expression expected `)`, but found end of input"
    );
    assert_snapshot!(
        parse_err("id eq 1 2").reason,
        @"expected end of input, but found `2`"
    );
    assert_snapshot!(
        parse_err("contains(name, 'a'").reason,
        @"arguments of `contains` expected `)`, but found end of input"
    );
    assert_snapshot!(
        parse_err("case()").reason,
        @"`case` requires at least one branch"
    );
    assert_snapshot!(
        parse_err("customer/1 eq 1").reason,
        @"member path expected an identifier, but found `1`"
    );

    // lexer errors come through unchanged
    assert_eq!(parse_err("name eq 'x").code, Some("E0001"));

    let err = parse_expand("a($foo=1)").unwrap_err();
    assert_snapshot!(
        err.reason,
        @"expand option expected one of $filter, $select, $orderby, $groupby, $expand, $top, $skip, $levels, $count, but found `$foo`"
    );
    let err = parse_expand("a($top=)").unwrap_err();
    assert_snapshot!(err.reason, @"$top expected a value, but found `)`");
}
