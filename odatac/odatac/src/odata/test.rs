use insta::assert_snapshot;

use super::*;
use crate::builder::QueryBuilder;
use crate::semantic::{resolve_options, QueryOptions};

fn round_trip(collection: &str, query: &str) -> String {
    let options = QueryOptions::parse(query).unwrap();
    let ir = resolve_options(collection, &options).unwrap();
    ODataFormatter::new().format(&ir).unwrap().to_string()
}

fn rejection(query: QueryBuilder) -> Error {
    ODataFormatter::new()
        .format(&query.build().unwrap())
        .unwrap_err()
}

#[test]
fn test_round_trip() {
    assert_snapshot!(
        round_trip(
            "Product",
            "$select=id,name&$filter=price gt 5&$orderby=name desc&$top=10&$skip=20"
        ),
        @"$select=id,name&$filter=price gt 5&$orderby=name desc&$top=10&$skip=20"
    );

    assert_snapshot!(
        round_trip(
            "Order",
            "$expand=customer($expand=address($expand=location)),orderedItem"
        ),
        @"$expand=customer($expand=address($expand=location)),orderedItem"
    );

    assert_snapshot!(
        round_trip("Order", "$filter=customer/name eq 'Anna' and total mul 2 gt 100"),
        @"$filter=customer/name eq 'Anna' and total mul 2 gt 100"
    );
}

#[test]
fn test_builder() -> Result<()> {
    let query = QueryBuilder::new()
        .from("Product")
        .select(["name"])
        .filter("name")
        .starts_with("A")?
        .and("id")
        .is_in(vec![1, 2])?
        .order_by_descending("price")
        .take(5)
        .build()?;
    let res = ODataFormatter::new().format(&query)?;
    assert_snapshot!(
        res.to_string(),
        @"$select=name&$filter=startswith(name,'A') and (id eq 1 or id eq 2)&$orderby=price desc&$top=5"
    );
    Ok(())
}

#[test]
fn test_encoded() {
    let res = ODataQuery {
        filter: Some("name eq 'a b'".to_string()),
        top: Some(3),
        ..Default::default()
    };
    assert_eq!(res.encoded(), "%24filter=name+eq+%27a+b%27&%24top=3");
    assert_eq!(res.to_string(), "$filter=name eq 'a b'&$top=3");
    assert!(ODataQuery::default().is_empty());
}

#[test]
fn test_rejections() -> Result<()> {
    let err = rejection(QueryBuilder::new().delete("ProductBase").filter("id").equal(7)?);
    assert_snapshot!(err.reason, @"delete statement is not supported by odata");
    assert_eq!(err.code, Some("E0005"));
    assert_eq!(err.source, ErrorSource::Format);

    let err = rejection(QueryBuilder::new().insert([("name", "Anna")]).into("User")?);
    assert_snapshot!(err.reason, @"insert statement is not supported by odata");

    let err = rejection(QueryBuilder::new().update("User").set([("active", true)])?);
    assert_snapshot!(err.reason, @"update statement is not supported by odata");

    let err = rejection(QueryBuilder::new().from("User").count());
    assert_snapshot!(err.reason, @"count is not supported by odata");

    let err = rejection(QueryBuilder::new().fixed().select([crate::ir::Expr::from(1)]));
    assert_snapshot!(err.reason, @"fixed select is not supported by odata");

    let err = rejection(
        QueryBuilder::new()
            .from("Order")
            .join("Customer")?
            .with_fields("customer", "id")?,
    );
    assert_snapshot!(err.reason, @"join with a condition is not supported by odata");
    Ok(())
}

#[test]
fn test_compile() -> Result<()> {
    let query = QueryBuilder::new().from("User").select(["name"]).build()?;
    let options = Options::default().with_target(Target::OData);
    assert_eq!(compile(&query, &options)?, "$select=name");

    let err = compile(&query, &Options::default()).unwrap_err();
    assert!(matches!(err.reason, crate::Reason::Bug { .. }));
    Ok(())
}
