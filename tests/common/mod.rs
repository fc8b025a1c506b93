//! Shared fixtures for the produce-prices integration tests.
//!
//! Provides listing-row builders, a scripted in-memory `PageSource`, and a
//! pipeline factory backed by a temporary store directory.

#![allow(dead_code)]

use std::time::Duration;

use chrono::NaiveDate;
use produce_prices::models::{PageRequest, PriceRecord, RawPage};
use produce_prices::{PageSource, Pipeline, PriceError, Result};
use rust_decimal::Decimal;
use serde_json::{json, Value};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn price(s: &str) -> Option<Decimal> {
    if s.is_empty() {
        None
    } else {
        Some(s.parse().unwrap())
    }
}

/// A listing entry shaped like the source's JSON, prices as strings.
pub fn row(name: &str, cat: &str, low: &str, avg: &str, high: &str, day: &str) -> Value {
    json!({
        "id": 1,
        "prodName": name,
        "prodCatid": 1186,
        "prodCat": cat,
        "prodPcatid": null,
        "prodPcat": "",
        "lowPrice": low,
        "highPrice": high,
        "avgPrice": avg,
        "place": "",
        "specInfo": "",
        "unitInfo": "kg",
        "pubDate": format!("{} 00:00:00", day),
        "status": null
    })
}

pub fn body(rows: &[Value], count: u64, current: u32) -> String {
    json!({
        "current": current,
        "limit": rows.len(),
        "count": count,
        "list": rows
    })
    .to_string()
}

pub fn record(name: &str, cat: &str, low: &str, avg: &str, high: &str, day: &str) -> PriceRecord {
    PriceRecord {
        name: name.to_string(),
        category: cat.to_string(),
        unit: "kg".to_string(),
        low_price: price(low),
        avg_price: price(avg),
        high_price: price(high),
        date: date(day),
        place: None,
        spec: None,
    }
}

/// The two rows from the reference scenario.
pub fn scenario_records() -> Vec<PriceRecord> {
    vec![
        record("ProductA", "Vegetables", "3.5", "4.0", "4.5", "2024-01-01"),
        record("ProductB", "Fruits", "", "6.0", "", "2024-01-01"),
    ]
}

/// Serves pre-built pages; the `limit = 1` probe reports `total`.
pub struct ScriptedSource {
    pub pages: Vec<Vec<Value>>,
    pub total: u64,
    /// Page index (1-based) that fails with a network error.
    pub fail_on: Option<u32>,
    pub requests: Vec<PageRequest>,
}

impl ScriptedSource {
    pub fn new(pages: Vec<Vec<Value>>) -> Self {
        let total = pages.iter().map(|p| p.len() as u64).sum();
        Self {
            pages,
            total,
            fail_on: None,
            requests: Vec::new(),
        }
    }

    pub fn failing_on(mut self, page: u32) -> Self {
        self.fail_on = Some(page);
        self
    }
}

impl PageSource for ScriptedSource {
    fn fetch_page(&mut self, request: &PageRequest) -> Result<RawPage> {
        self.requests.push(request.clone());
        let page = request.page_index();

        if request.limit == 1 {
            let first: Vec<Value> = self
                .pages
                .first()
                .and_then(|p| p.first())
                .cloned()
                .into_iter()
                .collect();
            return Ok(RawPage {
                request: request.clone(),
                body: body(&first, self.total, 1),
            });
        }
        if self.fail_on == Some(page) {
            return Err(PriceError::Network {
                url: "scripted".to_string(),
                attempts: 3,
                message: format!("page {} unreachable", page),
            });
        }
        let rows = self
            .pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default();
        Ok(RawPage {
            request: request.clone(),
            body: body(&rows, self.total, page),
        })
    }
}

/// Five pages of two distinct products each.
pub fn five_pages() -> Vec<Vec<Value>> {
    (1..=5)
        .map(|p| {
            vec![
                row(&format!("Leaf{}", p), "Vegetables", "1.0", "1.5", "2.0", "2024-01-01"),
                row(&format!("Fruit{}", p), "Fruits", "3.0", "3.5", "4.0", "2024-01-01"),
            ]
        })
        .collect()
}

/// Pipeline over a store in a fresh temp dir, two rows per page, no delay.
pub fn setup_pipeline() -> (Pipeline, tempfile::TempDir) {
    let tmp_dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::builder()
        .store_path(tmp_dir.path().join("prices.csv"))
        .page_size(2)
        .request_delay(Duration::ZERO)
        .build()
        .unwrap();
    (pipeline, tmp_dir)
}
