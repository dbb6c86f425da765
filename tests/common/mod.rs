//! Common test utilities and helpers


pub use api_mock::ScriptedFetcher;

use rust_financials::models::Symbol;

/// Non-blank symbol for fixtures
pub fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("fixture symbol is not blank")
}

/// Statement payload fixtures
pub mod test_data {
    use serde_json::{json, Value};

    /// The two-block example: income statement for 2022 and 2021, balance
    /// sheet for 2022 only
    pub fn abc_payload() -> Value {
        json!({
            "annual": [
                {"type": "INCOME_STATEMENT", "data": [
                    {"date": "2022-12-31", "revenue": 100},
                    {"date": "2021-12-31", "revenue": 90}
                ]},
                {"type": "BALANCE_SHEET", "data": [
                    {"date": "2022-12-31", "totalAssets": 500}
                ]}
            ]
        })
    }

    /// Income statement block with one record per `(date, revenue)`
    pub fn income_statement(periods: &[(&str, i64)]) -> Value {
        let records: Vec<Value> = periods
            .iter()
            .map(|(date, revenue)| json!({"date": date, "revenue": revenue, "link": "https://sec.example/10k"}))
            .collect();
        json!({"annual": [{"type": "INCOME_STATEMENT", "data": records}]})
    }

    /// A finance page carrying `payload` in a Next.js data script
    pub fn next_data_page(payload: &Value) -> String {
        let data = json!({"props": {"pageProps": {"financials": payload}}});
        format!(
            "<!DOCTYPE html><html><head><title>Financials</title></head><body>\
             <div id=\"__next\"></div>\
             <script id=\"__NEXT_DATA__\" type=\"application/json\">{}</script>\
             </body></html>",
            data
        )
    }

    /// A page that only shows an anti-bot interstitial
    pub fn challenge_page() -> String {
        "<html><head><title>Just a moment...</title></head><body>Checking your browser</body></html>"
            .to_string()
    }
}

/// Logging utilities for tests
pub mod logging {
    use std::sync::Once;
    use tracing::{debug, info};

    static INIT: Once = Once::new();

    /// Initialize test logging
    pub fn init_test_logging() {
        INIT.call_once(|| {
            // test-log may already have installed a subscriber
            let _ = tracing::subscriber::set_global_default(
                tracing_subscriber::fmt()
                    .with_env_filter("rust_financials=debug,main=debug")
                    .with_test_writer()
                    .finish(),
            );
        });
    }

    /// Log test step
    pub fn log_test_step(step: &str) {
        info!("🧪 Test Step: {}", step);
    }

    /// Log test data
    pub fn log_test_data<T: std::fmt::Debug>(label: &str, data: &T) {
        debug!("📊 {}: {:?}", label, data);
    }
}
