use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Store columns
// ---------------------------------------------------------------------------

/// Column headers of the tabular store, in write order.
pub const STORE_COLUMNS: [&str; 9] = [
    "prodName",
    "prodCat",
    "unitInfo",
    "lowPrice",
    "avgPrice",
    "highPrice",
    "pubDate",
    "place",
    "specInfo",
];

/// Columns a store file must carry to be loadable.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "prodName",
    "prodCat",
    "unitInfo",
    "lowPrice",
    "avgPrice",
    "highPrice",
    "pubDate",
];

// ---------------------------------------------------------------------------
// PriceRecord — One product-price observation for one date
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceRecord {
    pub name: String,
    pub category: String,
    pub unit: String,
    pub low_price: Option<Decimal>,
    pub avg_price: Option<Decimal>,
    pub high_price: Option<Decimal>,
    pub date: NaiveDate,
    pub place: Option<String>,
    pub spec: Option<String>,
}

/// Deduplication identity of a [`PriceRecord`]: product name and date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub name: String,
    pub date: NaiveDate,
}

impl PriceRecord {
    pub fn id(&self) -> RecordId {
        RecordId {
            name: self.name.clone(),
            date: self.date,
        }
    }

    /// Copy in the form the store reads back: text trimmed, blank
    /// place/spec cleared.
    pub fn normalized(&self) -> PriceRecord {
        let optional = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        PriceRecord {
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            unit: self.unit.trim().to_string(),
            low_price: self.low_price,
            avg_price: self.avg_price,
            high_price: self.high_price,
            date: self.date,
            place: optional(&self.place),
            spec: optional(&self.spec),
        }
    }

    /// Render the record as a store row, in [`STORE_COLUMNS`] order.
    ///
    /// Absent values become empty cells.
    pub fn to_fields(&self) -> [String; 9] {
        let price = |p: &Option<Decimal>| p.map(|d| d.to_string()).unwrap_or_default();
        [
            self.name.clone(),
            self.category.clone(),
            self.unit.clone(),
            price(&self.low_price),
            price(&self.avg_price),
            price(&self.high_price),
            self.date.format("%Y-%m-%d").to_string(),
            self.place.clone().unwrap_or_default(),
            self.spec.clone().unwrap_or_default(),
        ]
    }
}
