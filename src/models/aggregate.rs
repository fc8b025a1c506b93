use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Summary — Statistic computed over one group
// ---------------------------------------------------------------------------

/// A statistic over one group.
///
/// `value` is `None` when the group held no usable prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub value: Option<Decimal>,
}

impl Summary {
    pub const EMPTY: Summary = Summary {
        count: 0,
        value: None,
    };

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Group key to statistic, ordered lexicographically by key.
pub type AggregateResult = BTreeMap<String, Summary>;

// ---------------------------------------------------------------------------
// Series — Per-product price line over time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<(NaiveDate, Decimal)>,
}
