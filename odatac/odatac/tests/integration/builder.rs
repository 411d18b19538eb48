//! Queries built in code, rendered through the public API.
use insta::assert_snapshot;
use odatac::builder::QueryBuilder;
use odatac::ir::{Expr, Query};
use odatac::{sql, Options, Target};

fn to_sql(query: Query) -> String {
    odatac::ir_to_sql(query, &Options::default().no_format().no_signature()).unwrap()
}

#[test]
fn test_select_where() -> Result<(), odatac::Error> {
    let query = QueryBuilder::new()
        .from("User")
        .select(["name"])
        .filter("id")
        .equal(1)?
        .build()?;
    assert_snapshot!(to_sql(query), @"SELECT User.name FROM User WHERE (id=1)");
    Ok(())
}

#[test]
fn test_delete() -> Result<(), odatac::Error> {
    let query = QueryBuilder::new()
        .delete("ProductBase")
        .filter("id")
        .equal(7)?
        .build()?;
    assert_snapshot!(to_sql(query), @"DELETE FROM ProductBase WHERE (id=7)");
    Ok(())
}

#[test]
fn test_empty_in() -> Result<(), odatac::Error> {
    let query = QueryBuilder::new()
        .from("User")
        .filter("id")
        .is_in(Vec::<i64>::new())?
        .build()?;
    assert_snapshot!(to_sql(query), @"SELECT * FROM User WHERE (id IN (NULL))");
    Ok(())
}

#[test]
fn test_json_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let query = QueryBuilder::new()
        .from("Order")
        .select(["id"])
        .filter("total")
        .greater_than(100)?
        .order_by_descending("total")
        .take(3)
        .build()?;

    let json = odatac::json::from_ir(&query)?;
    let decoded = odatac::json::to_ir(&json)?;
    assert_eq!(decoded, query);
    similar_asserts::assert_eq!(odatac::json::from_ir(&decoded)?, json);

    let options = Options::default()
        .no_format()
        .no_signature()
        .with_target(Target::Sql(Some(sql::Dialect::Postgres)));
    assert_snapshot!(
        odatac::ir_to_sql(decoded, &options)?,
        @r#"SELECT "Order"."id" FROM "Order" WHERE ("total">100) ORDER BY "total" DESC LIMIT 3"#
    );
    Ok(())
}

#[test]
fn test_json_input() -> Result<(), Box<dyn std::error::Error>> {
    let query = odatac::json::to_ir(
        r#"{"$select":{"$entity":"User","$fields":[]},"$where":{"$and":[{"active":true},{"category":"Laptops"}]}}"#,
    )?;
    assert_snapshot!(
        to_sql(query),
        @"SELECT * FROM User WHERE ((active=true) AND (category='Laptops'))"
    );

    assert!(odatac::json::to_ir(r#"{"$where":{"$and":[]}}"#).is_err());
    Ok(())
}

#[test]
fn test_same_ir_from_both_front_ends() -> Result<(), Box<dyn std::error::Error>> {
    let built = QueryBuilder::new()
        .from("User")
        .filter("age")
        .greater_or_equal(18)?
        .build()?;
    let parsed = odatac::odata_to_ir("User", "$filter=age ge 18")?;
    assert_eq!(built.filter, parsed.filter);

    let expr = odatac::ast_to_ir(&odatac::odata_to_ast("age ge 18")?)?;
    assert_eq!(Some(expr), parsed.filter);
    assert_eq!(
        parsed.filter,
        Some(Expr::filter("age", odatac::ir::CompareOp::Gte, 18.into()))
    );
    Ok(())
}
