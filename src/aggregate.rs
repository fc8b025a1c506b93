//! Grouping, filtering and summary statistics over a [`Dataset`].
//!
//! Results are keyed by strings in a `BTreeMap`, so the same dataset and
//! parameters always produce the same ordering. Null prices are ignored by
//! mean/min/max; a group without any usable price yields `value: None`
//! instead of dividing by zero.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::prelude::*;

use crate::error::PriceError;
use crate::models::{AggregateResult, Dataset, PriceRecord, Series, Summary};

/// Decimal places kept for computed means.
const MEAN_SCALE: u32 = 4;

// ---------------------------------------------------------------------------
// Bucket
// ---------------------------------------------------------------------------

/// Calendar bucket for time grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Day,
    /// ISO week, keyed by its Monday.
    Week,
    Month,
}

impl Bucket {
    /// First day of the bucket containing `date`.
    pub fn start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Bucket::Day => date,
            Bucket::Week => date - Duration::days(date.weekday().num_days_from_monday() as i64),
            Bucket::Month => date.with_day(1).unwrap_or(date),
        }
    }

    pub fn label(&self, date: NaiveDate) -> String {
        match self {
            Bucket::Day | Bucket::Week => self.start(date).format("%Y-%m-%d").to_string(),
            Bucket::Month => date.format("%Y-%m").to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// GroupKey / PriceField / Statistic
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Category,
    Product,
    Unit,
    Place,
    Date(Bucket),
}

impl GroupKey {
    pub fn key(&self, record: &PriceRecord) -> String {
        match self {
            GroupKey::Category => record.category.clone(),
            GroupKey::Product => record.name.clone(),
            GroupKey::Unit => record.unit.clone(),
            GroupKey::Place => record.place.clone().unwrap_or_default(),
            GroupKey::Date(bucket) => bucket.label(record.date),
        }
    }
}

impl FromStr for GroupKey {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "category" => Ok(GroupKey::Category),
            "product" | "name" => Ok(GroupKey::Product),
            "unit" => Ok(GroupKey::Unit),
            "place" => Ok(GroupKey::Place),
            "day" | "date" => Ok(GroupKey::Date(Bucket::Day)),
            "week" => Ok(GroupKey::Date(Bucket::Week)),
            "month" => Ok(GroupKey::Date(Bucket::Month)),
            other => Err(PriceError::InvalidArgument(format!(
                "unknown grouping: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Low,
    Average,
    High,
}

impl PriceField {
    pub fn value(&self, record: &PriceRecord) -> Option<Decimal> {
        match self {
            PriceField::Low => record.low_price,
            PriceField::Average => record.avg_price,
            PriceField::High => record.high_price,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            PriceField::Low => "lowPrice",
            PriceField::Average => "avgPrice",
            PriceField::High => "highPrice",
        }
    }
}

impl FromStr for PriceField {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" | "lowprice" => Ok(PriceField::Low),
            "avg" | "average" | "avgprice" => Ok(PriceField::Average),
            "high" | "highprice" => Ok(PriceField::High),
            other => Err(PriceError::InvalidArgument(format!(
                "unknown price field: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Mean,
    Min,
    Max,
    /// Number of records in the group, priced or not.
    Count,
}

impl FromStr for Statistic {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mean" | "avg" => Ok(Statistic::Mean),
            "min" => Ok(Statistic::Min),
            "max" => Ok(Statistic::Max),
            "count" => Ok(Statistic::Count),
            other => Err(PriceError::InvalidArgument(format!(
                "unknown statistic: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Statistic::Mean => "mean",
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Count => "count",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Record selection. Empty lists and `None` bounds do not constrain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub categories: Vec<String>,
    pub products: Vec<String>,
    /// Matched as substrings of the record's place.
    pub places: Vec<String>,
    pub specs: Vec<String>,
    /// Bounds on the average price; unpriced records fail a set bound.
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

impl Filter {
    pub fn matches(&self, r: &PriceRecord) -> bool {
        if self.from.is_some_and(|d| r.date < d) || self.to.is_some_and(|d| r.date > d) {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&r.category) {
            return false;
        }
        if !self.products.is_empty() && !self.products.contains(&r.name) {
            return false;
        }
        if !self.places.is_empty() {
            let place = r.place.as_deref().unwrap_or("");
            if !self.places.iter().any(|p| place.contains(p.as_str())) {
                return false;
            }
        }
        if !self.specs.is_empty() {
            let spec = r.spec.as_deref().unwrap_or("");
            if !self.specs.iter().any(|s| s == spec) {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if !r.avg_price.is_some_and(|p| p >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if !r.avg_price.is_some_and(|p| p <= max) {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Read-only analysis view over a dataset.
pub struct Aggregator<'a> {
    dataset: &'a Dataset,
}

impl<'a> Aggregator<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self { dataset }
    }

    /// Summarize `field` per group of `key`.
    pub fn aggregate(&self, key: GroupKey, field: PriceField, stat: Statistic) -> AggregateResult {
        self.group_by(|r| Some(key.key(r)), field, stat)
    }

    /// Summarize with a custom key function. Records keyed `None` are skipped.
    pub fn group_by<F>(&self, key_fn: F, field: PriceField, stat: Statistic) -> AggregateResult
    where
        F: Fn(&PriceRecord) -> Option<String>,
    {
        let mut groups: BTreeMap<String, Vec<&PriceRecord>> = BTreeMap::new();
        for record in self.dataset {
            if let Some(key) = key_fn(record) {
                groups.entry(key).or_default().push(record);
            }
        }
        groups
            .into_iter()
            .map(|(k, records)| (k, summarize(records.into_iter(), field, stat)))
            .collect()
    }

    /// Summarize exactly the requested `keys`.
    ///
    /// A requested key with no records gets an explicit empty entry.
    pub fn aggregate_keys(
        &self,
        key: GroupKey,
        field: PriceField,
        stat: Statistic,
        keys: &[&str],
    ) -> AggregateResult {
        let computed = self.aggregate(key, field, stat);
        keys.iter()
            .map(|k| {
                let summary = computed
                    .get(*k)
                    .copied()
                    .unwrap_or_else(|| empty_summary(stat));
                (k.to_string(), summary)
            })
            .collect()
    }

    /// Time series of the per-`bucket` mean of each `field` for each product.
    ///
    /// Series come product by product, fields in the order given, and are
    /// named `"{product} - {column}"`. Products without data yield empty
    /// series. With `outlier_threshold = Some(k)`, points are clipped to
    /// `[Q1 - k*IQR, Q3 + k*IQR]` of their own series.
    pub fn series(
        &self,
        products: &[&str],
        fields: &[PriceField],
        bucket: Bucket,
        outlier_threshold: Option<f64>,
    ) -> Vec<Series> {
        let mut out = Vec::with_capacity(products.len() * fields.len());
        for product in products {
            let records: Vec<&PriceRecord> =
                self.dataset.iter().filter(|r| r.name == *product).collect();
            for field in fields {
                let mut buckets: BTreeMap<NaiveDate, Vec<Decimal>> = BTreeMap::new();
                for r in &records {
                    if let Some(v) = field.value(r) {
                        buckets.entry(bucket.start(r.date)).or_default().push(v);
                    }
                }
                let mut points: Vec<(NaiveDate, Decimal)> = buckets
                    .into_iter()
                    .filter_map(|(d, values)| mean(&values).map(|m| (d, m)))
                    .collect();
                if let Some(k) = outlier_threshold {
                    clip_outliers(&mut points, k);
                }
                out.push(Series {
                    name: format!("{} - {}", product, field.column()),
                    points,
                });
            }
        }
        out
    }
}

/// Compute one statistic over a group of records.
pub fn summarize<'r, I>(records: I, field: PriceField, stat: Statistic) -> Summary
where
    I: Iterator<Item = &'r PriceRecord>,
{
    let mut count = 0;
    let mut values = Vec::new();
    for r in records {
        count += 1;
        if let Some(v) = field.value(r) {
            values.push(v);
        }
    }
    let value = match stat {
        Statistic::Count => Some(Decimal::from(count)),
        Statistic::Mean => mean(&values),
        Statistic::Min => values.iter().copied().min(),
        Statistic::Max => values.iter().copied().max(),
    };
    Summary { count, value }
}

fn empty_summary(stat: Statistic) -> Summary {
    match stat {
        Statistic::Count => Summary {
            count: 0,
            value: Some(Decimal::ZERO),
        },
        _ => Summary::EMPTY,
    }
}

fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum = values
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))?;
    sum.checked_div(Decimal::from(values.len()))
        .map(|m| m.round_dp(MEAN_SCALE))
}

/// Linear-interpolated quantile of sorted values.
fn quantile(sorted: &[Decimal], q: Decimal) -> Option<Decimal> {
    if sorted.is_empty() {
        return None;
    }
    let pos = Decimal::from(sorted.len() - 1) * q;
    let lower = pos.floor();
    let frac = pos - lower;
    let i = lower.to_usize()?;
    let a = sorted[i];
    let b = sorted.get(i + 1).copied().unwrap_or(a);
    Some(a + (b - a) * frac)
}

fn clip_outliers(points: &mut [(NaiveDate, Decimal)], threshold: f64) {
    if !threshold.is_finite() || threshold < 0.0 {
        return;
    }
    let mut sorted: Vec<Decimal> = points.iter().map(|(_, v)| *v).collect();
    sorted.sort();
    let (Some(q1), Some(q3), Some(k)) = (
        quantile(&sorted, dec!(0.25)),
        quantile(&sorted, dec!(0.75)),
        Decimal::from_f64(threshold),
    ) else {
        return;
    };
    let iqr = q3 - q1;
    let lo = q1 - k * iqr;
    let hi = q3 + k * iqr;
    for (_, v) in points.iter_mut() {
        *v = (*v).clamp(lo, hi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn week_bucket_starts_monday() {
        // 2024-01-04 is a Thursday.
        assert_eq!(Bucket::Week.start(d(2024, 1, 4)), d(2024, 1, 1));
        assert_eq!(Bucket::Week.start(d(2024, 1, 1)), d(2024, 1, 1));
        assert_eq!(Bucket::Month.label(d(2024, 2, 29)), "2024-02");
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[dec!(1), dec!(2)]), Some(dec!(1.5)));
        assert_eq!(mean(&[dec!(1), dec!(1), dec!(2)]), Some(dec!(1.3333)));
    }

    #[test]
    fn quantile_interpolates() {
        let v = [dec!(1), dec!(2), dec!(3), dec!(4)];
        assert_eq!(quantile(&v, dec!(0.25)), Some(dec!(1.75)));
        assert_eq!(quantile(&v, dec!(0.75)), Some(dec!(3.25)));
    }

    #[test]
    fn outliers_are_clipped() {
        let mut points = vec![
            (d(2024, 1, 1), dec!(1)),
            (d(2024, 1, 2), dec!(2)),
            (d(2024, 1, 3), dec!(3)),
            (d(2024, 1, 4), dec!(100)),
        ];
        clip_outliers(&mut points, 1.5);
        // Q1 = 1.75, Q3 = 27.25, IQR = 25.5 -> upper bound 65.5
        assert_eq!(points[3].1, dec!(65.5));
        assert_eq!(points[0].1, dec!(1));
    }

    #[test]
    fn parse_keys() {
        assert_eq!("Week".parse::<GroupKey>().unwrap(), GroupKey::Date(Bucket::Week));
        assert_eq!("avg".parse::<PriceField>().unwrap(), PriceField::Average);
        assert!("median".parse::<Statistic>().is_err());
    }
}
