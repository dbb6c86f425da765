//! Statement normalization tests

use pretty_assertions::assert_eq;
use serde_json::json;
use test_log::test;

use crate::common::logging::{init_test_logging, log_test_data, log_test_step};
use crate::common::test_data;
use rust_financials::errors::NormalizeError;
use rust_financials::models::RawPayload;
use rust_financials::normalizer::{column_order, StatementNormalizer};

#[test]
fn test_abc_example_end_to_end() {
    init_test_logging();
    log_test_step("Normalizing the ABC example");

    let rows = StatementNormalizer::new()
        .normalize(&RawPayload::new(test_data::abc_payload()))
        .expect("ABC payload normalizes");
    log_test_data("Rows", &rows);

    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].period.as_str(), "2021-12-31");
    assert_eq!(rows[0].values.len(), 1);
    assert_eq!(rows[0].get("revenue"), Some(&json!(90)));

    assert_eq!(rows[1].period.as_str(), "2022-12-31");
    assert_eq!(rows[1].values.len(), 2);
    assert_eq!(rows[1].get("revenue"), Some(&json!(100)));
    assert_eq!(rows[1].get("totalAssets"), Some(&json!(500)));

    assert_eq!(column_order(&rows), vec!["period", "revenue", "totalAssets"]);
}

#[test]
fn test_one_row_per_distinct_period() {
    let periods = [
        ("2019-03-31", 1),
        ("2023-03-31", 5),
        ("2020-03-31", 2),
        ("2022-03-31", 4),
        ("2021-03-31", 3),
        ("2020-03-31", 20),
    ];
    let rows = StatementNormalizer::new()
        .normalize(&RawPayload::new(test_data::income_statement(&periods)))
        .unwrap();

    assert_eq!(rows.len(), 5);
    assert!(rows.windows(2).all(|w| w[0].period < w[1].period));
    assert_eq!(rows[1].get("revenue"), Some(&json!(20)));
    assert!(rows.iter().all(|r| r.get("IS_link").is_some() && r.get("link").is_none()));
}

#[test]
fn test_block_order_does_not_change_row_order() {
    let forward = json!({"annual": [
        {"type": "CASH_FLOW", "data": [{"date": "2023-12-31", "fcf": 1}]},
        {"type": "KEY_STATS", "data": [{"date": "2020-12-31", "pe": 2}]}
    ]});
    let reversed = json!({"annual": [
        {"type": "KEY_STATS", "data": [{"date": "2020-12-31", "pe": 2}]},
        {"type": "CASH_FLOW", "data": [{"date": "2023-12-31", "fcf": 1}]}
    ]});

    let normalizer = StatementNormalizer::new();
    let a = normalizer.normalize(&RawPayload::new(forward)).unwrap();
    let b = normalizer.normalize(&RawPayload::new(reversed)).unwrap();

    assert_eq!(a, b);
    assert_eq!(a[0].period.as_str(), "2020-12-31");
}

#[test]
fn test_mixed_period_formats_sort_chronologically() {
    let payload = json!({"annual": [
        {"type": "KEY_STATS", "data": [
            {"calendarYear": "2021", "pe": 1},
            {"date": "2021-03-31T00:00:00", "pe": 2},
            {"date": "2020-12-31", "pe": 3},
            {"date": "TTM", "pe": 4}
        ]}
    ]});

    let rows = StatementNormalizer::new().normalize(&RawPayload::new(payload)).unwrap();
    let periods: Vec<&str> = rows.iter().map(|r| r.period.as_str()).collect();
    assert_eq!(periods, vec!["2020-12-31", "2021-03-31", "2021", "TTM"]);
}

#[test]
fn test_payload_without_statements() {
    let result = StatementNormalizer::new().normalize(&RawPayload::new(json!({"quote": {"price": 1}})));
    assert_eq!(result, Err(NormalizeError::MissingStatements));
}
