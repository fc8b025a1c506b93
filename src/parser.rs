//! Turns raw listing pages into typed [`PriceRecord`]s.
//!
//! Mandatory fields are the product name and the observation date. Prices,
//! unit and category may be missing; an absent price becomes `None`. A row
//! that fails on any field is dropped and logged, never fatal to its page.
//! Only a body that is not a listing envelope fails the whole page.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{PriceError, Result};
use crate::models::{PageEnvelope, PriceRecord, RawPage, RawRow, REQUIRED_COLUMNS, STORE_COLUMNS};

/// Records extracted from one page, plus how many rows were rejected.
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub records: Vec<PriceRecord>,
    pub dropped: usize,
    /// Total row count the source reported for the whole query.
    pub total_count: u64,
}

/// Decode a response body into its listing envelope.
pub fn parse_envelope(body: &str) -> Result<PageEnvelope> {
    serde_json::from_str(body).map_err(|e| PriceError::parse("body", e.to_string()))
}

/// Parse every row of a page, dropping rows that fail.
pub fn parse_page(page: &RawPage) -> Result<ParsedPage> {
    let envelope = parse_envelope(&page.body)?;
    let mut parsed = ParsedPage {
        records: Vec::with_capacity(envelope.list.len()),
        dropped: 0,
        total_count: envelope.count,
    };

    for (index, row) in envelope.list.iter().enumerate() {
        match parse_row(row) {
            Ok(record) => parsed.records.push(record),
            Err(e) => {
                warn!(
                    "Dropping row {} of page {}: {}",
                    index,
                    page.request.page_index(),
                    e
                );
                parsed.dropped += 1;
            }
        }
    }

    debug!(
        "Parsed page {}: {} record(s), {} dropped",
        page.request.page_index(),
        parsed.records.len(),
        parsed.dropped
    );
    Ok(parsed)
}

/// Convert one listing entry into a record.
pub fn parse_row(row: &RawRow) -> Result<PriceRecord> {
    let name = json_text("prodName", &row.prod_name)?;
    let date = json_text("pubDate", &row.pub_date)?;

    Ok(PriceRecord {
        name: parse_name("prodName", name.as_deref())?,
        category: trimmed(json_text("prodCat", &row.prod_cat)?),
        unit: trimmed(json_text("unitInfo", &row.unit_info)?),
        low_price: parse_price("lowPrice", json_text("lowPrice", &row.low_price)?.as_deref())?,
        avg_price: parse_price("avgPrice", json_text("avgPrice", &row.avg_price)?.as_deref())?,
        high_price: parse_price("highPrice", json_text("highPrice", &row.high_price)?.as_deref())?,
        date: parse_date("pubDate", date.as_deref())?,
        place: non_blank(json_text("place", &row.place)?),
        spec: non_blank(json_text("specInfo", &row.spec_info)?),
    })
}

/// Parse a positional row laid out in store column order.
///
/// Accepts the seven required columns, optionally followed by `place` and
/// `specInfo`.
pub fn parse_fields(fields: &[&str]) -> Result<PriceRecord> {
    if fields.len() < REQUIRED_COLUMNS.len() || fields.len() > STORE_COLUMNS.len() {
        return Err(PriceError::parse(
            "row",
            format!(
                "expected {} to {} fields, got {}",
                REQUIRED_COLUMNS.len(),
                STORE_COLUMNS.len(),
                fields.len()
            ),
        ));
    }
    let optional = |i: usize| {
        fields
            .get(i)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Ok(PriceRecord {
        name: parse_name("prodName", Some(fields[0]))?,
        category: fields[1].trim().to_string(),
        unit: fields[2].trim().to_string(),
        low_price: parse_price("lowPrice", Some(fields[3]))?,
        avg_price: parse_price("avgPrice", Some(fields[4]))?,
        high_price: parse_price("highPrice", Some(fields[5]))?,
        date: parse_date("pubDate", Some(fields[6]))?,
        place: optional(7),
        spec: optional(8),
    })
}

// ---------------------------------------------------------------------------
// Field parsers
// ---------------------------------------------------------------------------

pub(crate) fn parse_name(field: &str, raw: Option<&str>) -> Result<String> {
    match raw.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(PriceError::parse(field, "missing mandatory value")),
    }
}

/// Parse a price with exact decimal semantics. Blank means absent.
pub(crate) fn parse_price(field: &str, raw: Option<&str>) -> Result<Option<Decimal>> {
    let s = match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return Ok(None),
    };
    let value = Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|_| PriceError::parse(field, format!("'{}' is not a decimal number", s)))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(PriceError::parse(field, format!("negative price {}", value)));
    }
    Ok(Some(value))
}

/// Parse an observation date, ignoring any time-of-day suffix.
pub(crate) fn parse_date(field: &str, raw: Option<&str>) -> Result<NaiveDate> {
    let s = match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return Err(PriceError::parse(field, "missing mandatory value")),
    };
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.date());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .map_err(|_| PriceError::parse(field, format!("'{}' is not a date", s)))
}

/// Read a JSON scalar as text. Null and absent both map to `None`.
fn json_text(field: &str, value: &Option<Value>) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(PriceError::parse(
            field,
            format!("unexpected value {}", other),
        )),
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::*;

    #[test]
    fn price_keeps_exact_scale() {
        let p = parse_price("lowPrice", Some("3.50")).unwrap().unwrap();
        assert_eq!(p, dec!(3.5));
        assert_eq!(p.to_string(), "3.50");
    }

    #[test]
    fn blank_price_is_absent() {
        assert_eq!(parse_price("highPrice", Some("  ")).unwrap(), None);
        assert_eq!(parse_price("highPrice", None).unwrap(), None);
    }

    #[test]
    fn bad_price_names_field() {
        match parse_price("avgPrice", Some("4,5")) {
            Err(PriceError::Parse { field, .. }) => assert_eq!(field, "avgPrice"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn negative_price_rejected() {
        assert!(parse_price("lowPrice", Some("-1.2")).is_err());
        assert_eq!(
            parse_price("lowPrice", Some("0")).unwrap(),
            Some(Decimal::ZERO)
        );
    }

    #[test]
    fn date_accepts_timestamp_suffix() {
        let d = parse_date("pubDate", Some("2023-03-18 00:00:00")).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2023, 3, 18).unwrap());
        let d = parse_date("pubDate", Some("2023/03/18")).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2023, 3, 18).unwrap());
    }

    #[test]
    fn numbers_read_as_text() {
        let v = Some(serde_json::json!(4.25));
        assert_eq!(json_text("avgPrice", &v).unwrap().as_deref(), Some("4.25"));
        let v = Some(serde_json::json!([1]));
        assert!(json_text("avgPrice", &v).is_err());
    }
}
