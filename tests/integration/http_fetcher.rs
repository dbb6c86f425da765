//! reqwest transport against a local mock server

use pretty_assertions::assert_eq;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::logging::{init_test_logging, log_test_step};
use rust_financials::api::{FetchRequest, HttpFetcher, ReqwestFetcher};

const UA: &str = "rust-financials-test/1.0";

#[tokio::test]
async fn test_fetch_sends_headers_and_params() {
    init_test_logging();
    log_test_step("Fetching with query parameters and headers");

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/finance/financials/TCS.NS"))
        .and(query_param("version", "2.18"))
        .and(header("referer", "https://example.test/finance/TCS.NS"))
        .and(header("user-agent", UA))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"annual":[]}"#))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(UA, Duration::from_secs(5)).unwrap();
    let request = FetchRequest::get(
        format!("{}/rest/finance/financials/TCS.NS", server.uri()),
        Duration::from_secs(5),
    )
    .with_header("Referer", "https://example.test/finance/TCS.NS")
    .with_params(&[("version".to_string(), "2.18".to_string())]);

    let response = fetcher.fetch(&request).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, r#"{"annual":[]}"#);
}

#[tokio::test]
async fn test_non_200_is_returned_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("blocked"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(UA, Duration::from_secs(5)).unwrap();
    let response = fetcher
        .fetch(&FetchRequest::get(server.uri(), Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(response.status, 403);
    assert!(!response.is_ok());
}

#[tokio::test]
async fn test_request_timeout_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(UA, Duration::from_secs(5)).unwrap();
    let result = fetcher
        .fetch(&FetchRequest::get(server.uri(), Duration::from_millis(50)))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_session_carries_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "sid=abc123; Path=/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/check"))
        .and(header("cookie", "sid=abc123"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/check"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(UA, Duration::from_secs(5)).unwrap();
    let root = FetchRequest::get(format!("{}/", server.uri()), Duration::from_secs(5));
    let check = FetchRequest::get(format!("{}/check", server.uri()), Duration::from_secs(5));

    // plain fetcher keeps no cookies
    fetcher.fetch(&root).await.unwrap();
    assert_eq!(fetcher.fetch(&check).await.unwrap().status, 401);

    let session = fetcher.session().unwrap();
    session.fetch(&root).await.unwrap();
    assert_eq!(session.fetch(&check).await.unwrap().status, 200);
}
