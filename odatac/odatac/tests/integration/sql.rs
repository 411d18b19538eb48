//! Simple tests for "these query options create this SQL" go here.
use insta::assert_snapshot;
use odatac::{sql, DisplayOptions, ErrorMessages, Options, Target};
use rstest::rstest;

pub(crate) fn compile(collection: &str, query: &str) -> Result<String, ErrorMessages> {
    odatac::compile(
        collection,
        query,
        &Options::default()
            .no_signature()
            .no_format()
            .with_display(DisplayOptions::Plain),
    )
}

fn compile_with_sql_dialect(
    collection: &str,
    query: &str,
    dialect: sql::Dialect,
) -> Result<String, ErrorMessages> {
    odatac::compile(
        collection,
        query,
        &Options::default()
            .no_signature()
            .no_format()
            .with_target(Target::Sql(Some(dialect)))
            .with_display(DisplayOptions::Plain),
    )
}

#[test]
fn test_select_filter_order() {
    assert_snapshot!(compile(
        "Product",
        "$select=id,name&$filter=price gt 5&$orderby=name desc&$top=10&$skip=20",
    ).unwrap(), @"SELECT id, name FROM Product WHERE (price>5) ORDER BY name DESC LIMIT 10 OFFSET 20");

    assert_snapshot!(compile("Product", "").unwrap(), @"SELECT * FROM Product");

    // the leading `?` of a URL query is accepted
    assert_snapshot!(compile("Product", "?$top=1").unwrap(), @"SELECT * FROM Product LIMIT 1");
}

#[test]
fn test_logical() {
    assert_snapshot!(compile(
        "User",
        "$filter=active eq true and category eq 'Laptops'",
    ).unwrap(), @"SELECT * FROM User WHERE ((active=true) AND (category='Laptops'))");

    assert_snapshot!(compile(
        "User",
        "$filter=(a eq 1 or b eq 2) and c eq 3",
    ).unwrap(), @"SELECT * FROM User WHERE (((a=1) OR (b=2)) AND (c=3))");

    assert_snapshot!(compile(
        "User",
        "$filter=deleted eq null",
    ).unwrap(), @"SELECT * FROM User WHERE (deleted IS NULL)");
}

#[test]
fn test_url_encoded() {
    assert_snapshot!(compile(
        "User",
        "$filter=name%20eq%20%27O%27%27Brien%27",
    ).unwrap(), @"SELECT * FROM User WHERE (name='O''Brien')");
}

#[test]
fn test_methods() {
    assert_snapshot!(compile(
        "User",
        "$filter=startswith(name,'A')",
    ).unwrap(), @"SELECT * FROM User WHERE (name LIKE 'A%')");

    assert_snapshot!(compile(
        "User",
        "$filter=tolower(name) eq 'anna'",
    ).unwrap(), @"SELECT * FROM User WHERE (LOWER(name)='anna')");
}

#[test]
fn test_methods_with_edge_arguments() {
    // `%25` is an encoded `%`, which has to match literally
    assert_snapshot!(compile_with_sql_dialect(
        "Product",
        "$filter=contains(name,'50%25')",
        sql::Dialect::SQLite,
    ).unwrap(), @r#"SELECT * FROM "Product" WHERE ("name" LIKE '%50\%%' ESCAPE '\')"#);

    let sql = compile("Product", "$filter=substring(name, 9223372036854775807) eq 'a'").unwrap();
    assert!(sql.contains("SUBSTRING(name, 9223372036854775807 + 1)"), "{sql}");
}

#[test]
fn test_negative_paging() {
    assert_snapshot!(compile("Product", "$top=-5&$skip=-1").unwrap(), @"SELECT * FROM Product");
    assert_snapshot!(compile("Product", "$top=0").unwrap(), @"SELECT * FROM Product LIMIT 0");
}

#[test]
fn test_count() {
    assert_snapshot!(compile(
        "User",
        "$filter=active eq true&$count=true&$top=5",
    ).unwrap(), @"SELECT COUNT(*) AS __count FROM (SELECT * FROM User WHERE (active=true)) AS c0");
}

#[rstest]
#[case::generic(sql::Dialect::Generic, "SELECT name FROM User WHERE (id=1) LIMIT 10 OFFSET 5")]
#[case::postgres(sql::Dialect::Postgres, r#"SELECT "name" FROM "User" WHERE ("id"=1) LIMIT 10 OFFSET 5"#)]
#[case::mysql(sql::Dialect::MySql, "SELECT `name` FROM `User` WHERE (`id`=1) LIMIT 5, 10")]
#[case::mssql(sql::Dialect::MsSql, "SELECT [name] FROM [User] WHERE ([id]=1) ORDER BY (SELECT NULL) OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY")]
fn test_dialects(#[case] dialect: sql::Dialect, #[case] expected: &str) {
    let sql = compile_with_sql_dialect(
        "User",
        "$select=name&$filter=id eq 1&$top=10&$skip=5",
        dialect,
    )
    .unwrap();
    assert_eq!(sql, expected);
}

#[test]
fn test_signature_and_format() {
    let sql = odatac::compile(
        "Product",
        "$select=id",
        &Options::default().with_target(Target::Sql(Some(sql::Dialect::SQLite))),
    )
    .unwrap();
    assert!(sql.contains('\n'), "{sql}");
    assert!(sql.trim_end().ends_with(&format!(
        "-- Generated by odatac version {} target:sql.sqlite",
        odatac::compiler_version()
    )));

    let sql = odatac::compile("Product", "$select=id", &Options::default().no_format()).unwrap();
    assert!(sql.starts_with("SELECT id FROM Product -- Generated by odatac version"));
}
