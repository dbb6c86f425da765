use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::{expect_page, log_failure, send, SourceContext, Strategy};
use crate::api::HttpFetcher;
use crate::extractor::EmbeddedPayloadExtractor;
use crate::models::{RawPayload, StrategyKind, Symbol};

/// Scrape the payload embedded in the public symbol page
pub struct HtmlExtraction {
    context: SourceContext,
    fetcher: Arc<dyn HttpFetcher>,
    extractor: EmbeddedPayloadExtractor,
}

impl HtmlExtraction {
    pub fn new(context: SourceContext, fetcher: Arc<dyn HttpFetcher>) -> Self {
        let extractor = context.extractor();
        Self {
            context,
            fetcher,
            extractor,
        }
    }
}

#[async_trait]
impl Strategy for HtmlExtraction {
    fn name(&self) -> &str {
        StrategyKind::Html.name()
    }

    async fn try_fetch(&self, symbol: &Symbol) -> Option<RawPayload> {
        let request = self.context.page_request(symbol, None);
        let result = send(self.fetcher.as_ref(), &request)
            .await
            .and_then(|response| expect_page(response, &request.url));

        let body = log_failure(self.name(), symbol, result)?;
        let payload = self.extractor.extract(&body);
        if payload.is_none() {
            warn!("⚠️ No embedded statements in page for {}", symbol);
        }
        payload
    }
}
