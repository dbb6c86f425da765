//! Embedded payload extraction tests

use pretty_assertions::assert_eq;
use serde_json::json;
use test_log::test;

use crate::common::logging::{init_test_logging, log_test_step};
use crate::common::test_data;
use rust_financials::extractor::{canonical_markers, extract, EmbeddedPayloadExtractor, Marker};
use rust_financials::normalizer::StatementNormalizer;

#[test]
fn test_next_data_page_returns_annual_holder() {
    init_test_logging();
    log_test_step("Extracting from a Next.js page");

    let payload = test_data::abc_payload();
    let page = test_data::next_data_page(&payload);

    let extracted = EmbeddedPayloadExtractor::default()
        .extract(&page)
        .expect("payload embedded in page");
    assert_eq!(extracted.value(), &payload);

    let rows = StatementNormalizer::new().normalize(&extracted).unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_preloaded_state_assignment() {
    let page = r#"<script>window.__PRELOADED_STATE__ = {"quote":{"symbol":"ITC.NS"},"financials":{"annual":[{"type":"BALANCE_SHEET","data":[{"date":"2023-03-31","totalAssets":1}]}]}};</script>"#;

    let payload = extract(page, &canonical_markers()).expect("payload");
    assert_eq!(
        payload.value()["annual"][0]["type"],
        json!("BALANCE_SHEET")
    );
}

#[test]
fn test_challenge_page_has_nothing() {
    assert!(EmbeddedPayloadExtractor::default()
        .extract(&test_data::challenge_page())
        .is_none());
}

#[test]
fn test_custom_marker_list_is_respected() {
    let page = r#"<script>APP_STATE={ "annual": [] }</script>"#;

    assert!(EmbeddedPayloadExtractor::default().extract(page).is_none());

    let custom = EmbeddedPayloadExtractor::new(vec![Marker::literal("APP_STATE=", "</script>")]);
    let payload = custom.extract(page).expect("custom marker matches");
    assert_eq!(payload.value(), &json!({"annual": []}));
}
