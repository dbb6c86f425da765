use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{expect_json, log_failure, send, SourceContext, Strategy};
use crate::api::HttpFetcher;
use crate::models::{RawPayload, StrategyKind, Symbol};

/// One request to the canonical financials endpoint
pub struct DirectCall {
    context: SourceContext,
    fetcher: Arc<dyn HttpFetcher>,
}

impl DirectCall {
    pub fn new(context: SourceContext, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { context, fetcher }
    }
}

#[async_trait]
impl Strategy for DirectCall {
    fn name(&self) -> &str {
        StrategyKind::Direct.name()
    }

    async fn try_fetch(&self, symbol: &Symbol) -> Option<RawPayload> {
        let request = self.context.api_request(symbol);
        debug!("{}: GET {}", self.name(), request.url);

        let result = send(self.fetcher.as_ref(), &request)
            .await
            .and_then(|response| expect_json(&response, &request.url));
        log_failure(self.name(), symbol, result)
    }
}
