//! Chart rendering tests: input validation and PNG output.

mod common;

use common::scenario_records;
use produce_prices::aggregate::{Bucket, GroupKey, PriceField, Statistic};
use produce_prices::models::{AggregateResult, Dataset, Series, Summary};
use produce_prices::render::{render_aggregate, render_series, ChartKind, ChartSpec};
use produce_prices::{Aggregator, PriceError};

fn scenario_result() -> AggregateResult {
    let dataset = Dataset::new(scenario_records());
    Aggregator::new(&dataset).aggregate(GroupKey::Category, PriceField::Average, Statistic::Mean)
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

#[test]
fn unknown_series_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("chart.png");
    let spec = ChartSpec {
        series: vec!["Grains".to_string()],
        ..ChartSpec::default()
    };

    match render_aggregate(&scenario_result(), &spec, &out) {
        Err(PriceError::Render(msg)) => assert!(msg.contains("Grains"), "{}", msg),
        other => panic!("expected render error, got {:?}", other),
    }
    assert!(!out.exists());
}

#[test]
fn aggregate_without_values_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("chart.png");

    let empty = AggregateResult::new();
    assert!(matches!(
        render_aggregate(&empty, &ChartSpec::default(), &out),
        Err(PriceError::Render(_))
    ));

    let mut unpriced = AggregateResult::new();
    unpriced.insert("Grains".to_string(), Summary::EMPTY);
    assert!(matches!(
        render_aggregate(&unpriced, &ChartSpec::default(), &out),
        Err(PriceError::Render(_))
    ));
}

#[test]
fn fixed_range_must_be_ordered() {
    let tmp = tempfile::tempdir().unwrap();
    let spec = ChartSpec {
        y_range: Some((10.0, 1.0)),
        ..ChartSpec::default()
    };
    assert!(matches!(
        render_aggregate(&scenario_result(), &spec, &tmp.path().join("chart.png")),
        Err(PriceError::Render(_))
    ));
}

#[test]
fn series_without_points_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let series = vec![Series {
        name: "Durian".to_string(),
        points: Vec::new(),
    }];
    let spec = ChartSpec {
        kind: ChartKind::Line,
        ..ChartSpec::default()
    };
    assert!(matches!(
        render_series(&series, &spec, &tmp.path().join("chart.png")),
        Err(PriceError::Render(_))
    ));

    let named = ChartSpec {
        series: vec!["Mango".to_string()],
        ..spec
    };
    assert!(matches!(
        render_series(&series, &named, &tmp.path().join("chart.png")),
        Err(PriceError::Render(_))
    ));
}

// ---------------------------------------------------------------------------
// Drawing
// ---------------------------------------------------------------------------

#[test]
fn draws_bar_chart_of_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("charts/by_category.png");
    let spec = ChartSpec {
        title: "Mean average price".to_string(),
        x_label: "Category".to_string(),
        ..ChartSpec::default()
    };

    render_aggregate(&scenario_result(), &spec, &out).unwrap();
    let bytes = std::fs::read(&out).unwrap();
    assert!(bytes.len() > 8);
    assert_eq!(&bytes[1..4], b"PNG");
}

#[test]
fn draws_series_lines() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("series.png");
    let mut records = scenario_records();
    records.push(common::record("ProductA", "Vegetables", "3.0", "3.6", "4.2", "2024-01-09"));
    let dataset = Dataset::new(records);
    let series = Aggregator::new(&dataset).series(
        &["ProductA"],
        &[PriceField::Low, PriceField::High],
        Bucket::Week,
        None,
    );
    assert_eq!(series.len(), 2);
    let spec = ChartSpec {
        kind: ChartKind::Line,
        title: "Weekly low and high".to_string(),
        ..ChartSpec::default()
    };

    render_series(&series, &spec, &out).unwrap();
    assert!(std::fs::metadata(&out).unwrap().len() > 0);

    let named = ChartSpec {
        series: vec!["ProductA - highPrice".to_string()],
        ..spec
    };
    render_series(&series, &named, &tmp.path().join("high.png")).unwrap();
}
