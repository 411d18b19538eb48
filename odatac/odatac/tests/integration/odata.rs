//! Rendering back into OData system query options.
use insta::assert_snapshot;
use odatac::builder::QueryBuilder;
use odatac::{DisplayOptions, ErrorMessages, Options, Target};

fn compile(collection: &str, query: &str) -> Result<String, ErrorMessages> {
    odatac::compile(
        collection,
        query,
        &Options::default()
            .with_target(Target::OData)
            .with_display(DisplayOptions::Plain),
    )
}

#[test]
fn test_round_trip() {
    assert_snapshot!(
        compile("Product", "$select=id,name&$filter=price gt 5 and not (stock le 0)&$orderby=name desc&$top=10").unwrap(),
        @"$select=id,name&$filter=price gt 5 and not (stock le 0)&$orderby=name desc&$top=10"
    );

    assert_snapshot!(
        compile("Order", "$expand=customer($expand=address($expand=location)),orderedItem").unwrap(),
        @"$expand=customer($expand=address($expand=location)),orderedItem"
    );
}

#[test]
fn test_negative_top() {
    assert_snapshot!(compile("Product", "$filter=id eq 1&$top=-5").unwrap(), @"$filter=id eq 1");
}

#[test]
fn test_from_builder() -> Result<(), Box<dyn std::error::Error>> {
    let query = QueryBuilder::new()
        .from("Product")
        .filter("name")
        .contains("phone")?
        .skip(20)
        .take(10)
        .build()?;
    assert_snapshot!(
        odatac::ir_to_odata(query)?,
        @"$filter=contains(name,'phone')&$top=10&$skip=20"
    );
    Ok(())
}

#[test]
fn test_rejects_writes() -> Result<(), odatac::Error> {
    let query = QueryBuilder::new()
        .update("User")
        .set([("active", false)])?
        .build()?;
    let err = odatac::ir_to_odata(query).unwrap_err();
    assert_eq!(err.inner[0].code.as_deref(), Some("E0005"));
    assert_snapshot!(err.inner[0].reason, @"update statement is not supported by odata");
    Ok(())
}
