//! Live test against the public price endpoint.
//!
//! Run with: cargo test --test smoke_test -- --ignored

use std::time::Duration;

use chrono::NaiveDate;
use produce_prices::aggregate::{Filter, GroupKey, PriceField, Statistic};
use produce_prices::models::FetchQuery;
use produce_prices::render::{render_aggregate, ChartSpec};
use produce_prices::{Pipeline, RetryPolicy};

#[test]
#[ignore = "hits the live endpoint"]
fn fetch_one_day_and_chart_it() {
    let _ = env_logger::builder().is_test(true).try_init();
    let tmp = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::builder()
        .store_path(tmp.path().join("prices.csv.gz"))
        .max_pages(Some(3))
        .timeout(Duration::from_secs(30))
        .retry(RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        })
        .build()
        .unwrap();

    let day = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
    let query = FetchQuery {
        from: Some(day),
        to: Some(day),
        ..FetchQuery::default()
    };
    let report = pipeline.fetch_and_persist(&query).unwrap();
    println!("{}", report);
    assert!(report.pages <= 3);
    assert_eq!(report.stored_total, pipeline.load().unwrap().len());

    let again = pipeline.fetch_and_persist(&query).unwrap();
    assert_eq!(again.written, 0);

    if report.stored_total > 0 {
        let result = pipeline
            .aggregate(&Filter::default(), GroupKey::Category, PriceField::Average, Statistic::Mean)
            .unwrap();
        let out = tmp.path().join("by_category.png");
        render_aggregate(&result, &ChartSpec::default(), &out).unwrap();
        assert!(out.exists());
    }
}
