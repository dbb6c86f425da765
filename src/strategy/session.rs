use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{expect_json, expect_page, log_failure, send, SourceContext, Strategy};
use crate::api::HttpFetcher;
use crate::errors::FetchError;
use crate::models::{RawPayload, StrategyKind, Symbol};

/// Browse like a visitor before calling the API.
///
/// All three steps share one cookie-carrying session: the landing page, the
/// symbol page (which may already embed the payload) and finally the
/// canonical endpoint. A failed step ends the attempt.
pub struct SessionSequence {
    context: SourceContext,
    fetcher: Arc<dyn HttpFetcher>,
}

impl SessionSequence {
    pub fn new(context: SourceContext, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { context, fetcher }
    }

    async fn run(&self, symbol: &Symbol) -> Result<RawPayload, FetchError> {
        let session = self.fetcher.session().map_err(FetchError::transport)?;

        let root = self.context.root_request();
        debug!("{}: seeding session at {}", self.name(), root.url);
        expect_page(send(session.as_ref(), &root).await?, &root.url)?;

        let page = self.context.page_request(symbol, Some(root.url.clone()));
        let body = expect_page(send(session.as_ref(), &page).await?, &page.url)?;
        if let Some(payload) = self.context.extractor().extract(&body) {
            info!("📄 Symbol page for {} already embeds statements", symbol);
            return Ok(payload);
        }

        let api = self.context.api_request(symbol);
        let response = send(session.as_ref(), &api).await?;
        expect_json(&response, &api.url)
    }
}

#[async_trait]
impl Strategy for SessionSequence {
    fn name(&self) -> &str {
        StrategyKind::Session.name()
    }

    async fn try_fetch(&self, symbol: &Symbol) -> Option<RawPayload> {
        let result = self.run(symbol).await;
        log_failure(self.name(), symbol, result)
    }
}
