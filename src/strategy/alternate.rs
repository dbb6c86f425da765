use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{expect_json, send, SourceContext, Strategy};
use crate::api::HttpFetcher;
use crate::models::{RawPayload, StrategyKind, Symbol};

/// Walks the profile's fallback endpoints until one answers with JSON.
///
/// Each URL is requested at most once; any non-200 or non-JSON answer
/// moves on to the next template.
pub struct AlternateEndpoints {
    context: SourceContext,
    fetcher: Arc<dyn HttpFetcher>,
}

impl AlternateEndpoints {
    pub fn new(context: SourceContext, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { context, fetcher }
    }
}

#[async_trait]
impl Strategy for AlternateEndpoints {
    fn name(&self) -> &str {
        StrategyKind::Alternate.name()
    }

    async fn try_fetch(&self, symbol: &Symbol) -> Option<RawPayload> {
        for request in self.context.alternate_requests(symbol) {
            let result = send(self.fetcher.as_ref(), &request)
                .await
                .and_then(|response| expect_json(&response, &request.url));

            match result {
                Ok(payload) => {
                    info!("✅ Alternate endpoint answered for {}: {}", symbol, request.url);
                    return Some(payload);
                }
                Err(e) => debug!("{}: {} rejected: {}", self.name(), request.url, e),
            }
        }
        None
    }
}
