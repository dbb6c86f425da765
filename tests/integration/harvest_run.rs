//! End-to-end harvest against a mock upstream

use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::logging::{init_test_logging, log_test_data, log_test_step};
use crate::common::{symbol, test_data};
use rust_financials::api::{HttpFetcher, ReqwestFetcher, RequestJitter};
use rust_financials::harvester::{FetchStatus, HarvestOptions, Harvester};
use rust_financials::models::{SourceProfile, StrategyKind, Symbol};
use rust_financials::store::DatasetStore;
use rust_financials::strategy::build_strategies;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn upstream() -> MockServer {
    let server = MockServer::start().await;

    // ABC.NS: API blocked, page embeds the statements
    Mock::given(method("GET"))
        .and(path("/rest/finance/financials/ABC.NS"))
        .respond_with(ResponseTemplate::new(403).set_body_string(test_data::challenge_page()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/finance/ABC.NS"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(test_data::next_data_page(&test_data::abc_payload())),
        )
        .mount(&server)
        .await;

    // XYZ.NS: API answers directly
    Mock::given(method("GET"))
        .and(path("/rest/finance/financials/XYZ.NS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data::income_statement(&[
            ("2022-03-31", 10),
            ("2023-03-31", 12),
        ])))
        .mount(&server)
        .await;

    // BAD.NS: nothing works
    Mock::given(method("GET"))
        .and(path("/rest/finance/financials/BAD.NS"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/finance/BAD.NS"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    server
}

fn harvester(server: &MockServer, checkpoint: &Path, resume: bool) -> Harvester {
    let profile = SourceProfile {
        base_url: server.uri(),
        strategies: vec![StrategyKind::Direct, StrategyKind::Html],
        ..SourceProfile::default()
    };
    let fetcher: Arc<dyn HttpFetcher> =
        Arc::new(ReqwestFetcher::new(&profile.user_agent, TIMEOUT).unwrap());
    let strategies = build_strategies(Arc::new(profile), fetcher, TIMEOUT);

    let options = HarvestOptions {
        checkpoint_path: checkpoint.to_path_buf(),
        checkpoint_every: 1,
        resume,
        limit: None,
        export_dir: None,
    };
    Harvester::new(strategies, RequestJitter::none(), options)
}

fn symbols(names: &[&str]) -> Vec<Symbol> {
    names.iter().map(|s| symbol(*s)).collect()
}

#[tokio::test]
async fn test_harvest_then_resume() {
    init_test_logging();
    log_test_step("Harvesting three symbols against the mock upstream");

    let server = upstream().await;
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = dir.path().join("financials_master.csv");

    let mut first = harvester(&server, &checkpoint, false);
    let summary = first
        .run(&symbols(&["ABC.NS", "XYZ.NS", "BAD.NS"]))
        .await
        .expect("run completes");
    log_test_data("First run", &summary);

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failure_count, 1);
    assert_eq!(summary.skipped_count, 0);
    assert_eq!(summary.total_symbols, 3);
    assert_eq!(
        summary.outcomes[0].status,
        FetchStatus::Completed {
            rows: 2,
            strategy: "html_extraction".to_string()
        }
    );
    assert_eq!(
        summary.outcomes[1].status,
        FetchStatus::Completed {
            rows: 2,
            strategy: "direct_call".to_string()
        }
    );
    assert!(matches!(summary.outcomes[2].status, FetchStatus::Failed(_)));

    let content = std::fs::read_to_string(&checkpoint).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "symbol,period,IS_link,revenue,totalAssets");
    assert_eq!(
        &lines[1..],
        &[
            "ABC.NS,2021-12-31,,90,",
            "ABC.NS,2022-12-31,,100,500",
            "XYZ.NS,2022-03-31,https://sec.example/10k,10,",
            "XYZ.NS,2023-03-31,https://sec.example/10k,12,",
        ]
    );

    log_test_step("Resuming: only the failed symbol is retried");
    let requests_before = server.received_requests().await.unwrap_or_default().len();

    let mut second = harvester(&server, &checkpoint, true);
    let summary = second
        .run(&symbols(&["ABC.NS", "XYZ.NS", "BAD.NS"]))
        .await
        .unwrap();

    assert_eq!(summary.skipped_count, 2);
    assert_eq!(summary.failure_count, 1);
    assert_eq!(second.store().symbol_count(), 2);

    let retried: Vec<String> = server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .skip(requests_before)
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(retried, vec!["/rest/finance/financials/BAD.NS", "/finance/BAD.NS"]);

    let (_, done) = DatasetStore::load(&checkpoint).unwrap();
    assert_eq!(done.len(), 2);
}

#[tokio::test]
async fn test_unwritable_checkpoint_stops_run() {
    let server = upstream().await;
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, "file in the way").unwrap();

    let mut harvester = harvester(&server, &blocker.join("master.csv"), false);
    let result = harvester.run(&symbols(&["XYZ.NS", "ABC.NS"])).await;

    assert!(result.is_err());
    // the first success is still held in memory
    assert_eq!(harvester.store().symbol_count(), 1);
}
