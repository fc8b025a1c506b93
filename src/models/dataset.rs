use std::collections::HashSet;

use super::record::{PriceRecord, RecordId};
use crate::aggregate::Filter;

// ---------------------------------------------------------------------------
// Dataset — The full collection of stored price records
// ---------------------------------------------------------------------------

/// Records in store order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<PriceRecord>,
}

impl Dataset {
    pub fn new(records: Vec<PriceRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PriceRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<PriceRecord> {
        self.records
    }

    pub fn ids(&self) -> HashSet<RecordId> {
        self.records.iter().map(PriceRecord::id).collect()
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.records
            .iter()
            .any(|r| r.date == id.date && r.name == id.name)
    }

    /// A new dataset holding only the records accepted by `filter`.
    pub fn filter(&self, filter: &Filter) -> Dataset {
        Dataset::new(
            self.records
                .iter()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a PriceRecord;
    type IntoIter = std::slice::Iter<'a, PriceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
