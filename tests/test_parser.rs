//! Record parser tests: listing pages, positional rows, and error policy.

mod common;

use common::{body, date, row};
use produce_prices::models::{PageRequest, RawPage};
use produce_prices::parser::{parse_fields, parse_page};
use produce_prices::PriceError;
use rust_decimal::prelude::*;
use serde_json::json;

fn page(body: String) -> RawPage {
    RawPage {
        request: PageRequest {
            limit: 40,
            current: Some(1),
            ..Default::default()
        },
        body,
    }
}

// ---------------------------------------------------------------------------
// Reference scenario
// ---------------------------------------------------------------------------

#[test]
fn scenario_rows_parse_with_null_prices() {
    let a = parse_fields(&["ProductA", "Vegetables", "kg", "3.5", "4.0", "4.5", "2024-01-01"]).unwrap();
    let b = parse_fields(&["ProductB", "Fruits", "kg", "", "6.0", "", "2024-01-01"]).unwrap();

    assert_eq!(a.name, "ProductA");
    assert_eq!(a.category, "Vegetables");
    assert_eq!(a.low_price, Some(dec!(3.5)));
    assert_eq!(a.avg_price, Some(dec!(4.0)));
    assert_eq!(a.high_price, Some(dec!(4.5)));
    assert_eq!(a.date, date("2024-01-01"));

    assert_eq!(b.low_price, None);
    assert_eq!(b.avg_price, Some(dec!(6.0)));
    assert_eq!(b.high_price, None);
}

#[test]
fn scenario_page_parses_two_records() {
    let rows = vec![
        row("ProductA", "Vegetables", "3.5", "4.0", "4.5", "2024-01-01"),
        row("ProductB", "Fruits", "", "6.0", "", "2024-01-01"),
    ];
    let parsed = parse_page(&page(body(&rows, 2, 1))).unwrap();
    assert_eq!(parsed.records.len(), 2);
    assert_eq!(parsed.dropped, 0);
    assert_eq!(parsed.total_count, 2);
    assert_eq!(parsed.records[1].high_price, None);
    assert_eq!(parsed.records[1].unit, "kg");
}

// ---------------------------------------------------------------------------
// Wire quirks
// ---------------------------------------------------------------------------

#[test]
fn numeric_and_null_prices_accepted() {
    let rows = vec![json!({
        "prodName": "Cabbage",
        "prodCat": "Vegetables",
        "unitInfo": "jin",
        "lowPrice": 0.2,
        "avgPrice": "0.35",
        "highPrice": null,
        "place": "Hebei",
        "specInfo": " ",
        "pubDate": "2023-03-18 00:00:00"
    })];
    let parsed = parse_page(&page(body(&rows, 1, 1))).unwrap();
    let r = &parsed.records[0];
    assert_eq!(r.low_price, Some(dec!(0.2)));
    assert_eq!(r.avg_price, Some(dec!(0.35)));
    assert_eq!(r.high_price, None);
    assert_eq!(r.place.as_deref(), Some("Hebei"));
    assert_eq!(r.spec, None);
}

#[test]
fn missing_optional_fields_do_not_fail() {
    let rows = vec![json!({"prodName": "Leek", "pubDate": "2024-02-02"})];
    let parsed = parse_page(&page(body(&rows, 1, 1))).unwrap();
    let r = &parsed.records[0];
    assert_eq!(r.category, "");
    assert_eq!(r.unit, "");
    assert_eq!(r.avg_price, None);
}

// ---------------------------------------------------------------------------
// Error policy
// ---------------------------------------------------------------------------

#[test]
fn bad_rows_are_dropped_not_fatal() {
    let rows = vec![
        row("", "Vegetables", "1", "2", "3", "2024-01-01"),
        row("Garlic", "Vegetables", "1", "2", "3", "not-a-date"),
        row("Ginger", "Vegetables", "x1", "2", "3", "2024-01-01"),
        row("Onion", "Vegetables", "1", "2", "3", "2024-01-01"),
    ];
    let parsed = parse_page(&page(body(&rows, 4, 1))).unwrap();
    assert_eq!(parsed.records.len(), 1);
    assert_eq!(parsed.records[0].name, "Onion");
    assert_eq!(parsed.dropped, 3);
}

#[test]
fn unparseable_field_is_named() {
    let err = parse_fields(&["Onion", "Vegetables", "kg", "1", "abc", "3", "2024-01-01"]).unwrap_err();
    match err {
        PriceError::Parse { field, .. } => assert_eq!(field, "avgPrice"),
        other => panic!("expected parse error, got {:?}", other),
    }

    let err = parse_fields(&["Onion", "Vegetables", "kg", "1", "2", "3", ""]).unwrap_err();
    match err {
        PriceError::Parse { field, .. } => assert_eq!(field, "pubDate"),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn non_envelope_body_fails_the_batch() {
    let err = parse_page(&page("<html>maintenance</html>".to_string())).unwrap_err();
    assert!(matches!(err, PriceError::Parse { ref field, .. } if field == "body"));

    let err = parse_page(&page(r#"{"count": 3}"#.to_string())).unwrap_err();
    assert!(matches!(err, PriceError::Parse { .. }));
}

#[test]
fn positional_row_with_place_and_spec() {
    let r = parse_fields(&[
        "Tomato", "Vegetables", "kg", "2", "2.5", "3", "2024-05-05", "Shandong", "large",
    ])
    .unwrap();
    assert_eq!(r.place.as_deref(), Some("Shandong"));
    assert_eq!(r.spec.as_deref(), Some("large"));

    assert!(parse_fields(&["Tomato", "Vegetables"]).is_err());
}
