//! Test error messages: codes, reasons and where they point in the query.
use insta::assert_snapshot;

use super::sql::compile;

#[test]
fn test_parser_errors() {
    let err = compile("Product", "$top=5&$filter=price gt").unwrap_err();
    let message = &err.inner[0];
    assert_eq!(message.code.as_deref(), Some("E0002"));
    assert!(message.reason.ends_with("but found end of input"), "{}", message.reason);
    assert_eq!(message.span, Some(odatac::Span::new(23, 23)));

    let err = compile("Product", "$filter=name eq 'open").unwrap_err();
    assert_eq!(err.inner[0].code.as_deref(), Some("E0001"));
    assert_snapshot!(err.inner[0].reason, @"unterminated string");
    assert_eq!(err.inner[0].span, Some(odatac::Span::new(16, 21)));
}

#[test]
fn test_query_option_errors() {
    let err = compile("Product", "$foo=1").unwrap_err();
    assert_snapshot!(
        err.inner[0].reason,
        @"query option expected one of $filter, $select, $orderby, $groupby, $expand, $top, $skip, $count, but found `$foo`"
    );
    // nothing to point at
    assert!(err.inner[0].display.is_none());
    assert_snapshot!(err.to_string(), @r"
    [E0002] Error: query option expected one of $filter, $select, $orderby, $groupby, $expand, $top, $skip, $count, but found `$foo`
    ");

    let err = compile("Product", "$top=1&$top=2").unwrap_err();
    assert_snapshot!(err.inner[0].reason, @"duplicate query option `$top`");
}

#[test]
fn test_semantic_errors() {
    let err = compile("Product", "$filter=frobnicate(name) eq 1").unwrap_err();
    let message = &err.inner[0];
    assert_eq!(message.code.as_deref(), Some("E0003"));
    assert_snapshot!(message.reason, @"method `frobnicate` not found");

    // the span is in the coordinates of the whole query
    let span = message.span.unwrap();
    assert!(span.start >= "$filter=".len(), "{span:?}");
    let location = message.location.as_ref().unwrap();
    assert_eq!(location.start.0, 0);
    assert_eq!(message.option.as_deref(), Some("$filter"));

    let display = message.display.as_ref().unwrap();
    assert!(display.contains("frobnicate"), "{display}");
    assert!(display.contains("method `frobnicate` not found"), "{display}");
    assert!(display.contains("invalid `$filter`"), "{display}");
}

#[test]
fn test_format_errors() {
    let err = odatac::compile(
        "Product",
        "$count=true",
        &odatac::Options::default()
            .with_target(odatac::Target::OData)
            .with_display(odatac::DisplayOptions::Plain),
    )
    .unwrap_err();
    let message = &err.inner[0];
    assert_eq!(message.code.as_deref(), Some("E0005"));
    assert_snapshot!(message.reason, @"count is not supported by odata");
    assert_eq!(message.hints.len(), 1);

    let err = "sql.poostgres".parse::<odatac::Target>().unwrap_err();
    assert_snapshot!(err.reason, @r#"target `"sql.poostgres"` not found"#);
}

#[test]
fn test_to_json() {
    let err = compile("Product", "$filter=price gt").unwrap_err();
    let json: serde_json::Value = serde_json::from_str(&err.to_json()).unwrap();
    assert_eq!(json["inner"][0]["code"], "E0002");
    assert_eq!(json["inner"][0]["kind"], "Error");
}
