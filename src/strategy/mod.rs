//! Acquisition strategies.
//!
//! Each strategy is one way of getting a symbol's statement payload out of
//! the upstream source. They never fail loudly: anything that goes wrong is
//! logged and reported as "no result" so the orchestrator can move on.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::api::{FetchRequest, FetchResponse, HttpFetcher};
use crate::errors::FetchError;
use crate::extractor::EmbeddedPayloadExtractor;
use crate::models::{RawPayload, SourceProfile, StrategyKind, Symbol};

pub mod alternate;
pub mod direct;
pub mod html;
pub mod session;

pub use alternate::AlternateEndpoints;
pub use direct::DirectCall;
pub use html::HtmlExtraction;
pub use session::SessionSequence;

#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// A usable payload for `symbol`, or `None` on any failure
    async fn try_fetch(&self, symbol: &Symbol) -> Option<RawPayload>;
}

/// Profile plus request settings shared by all strategies
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub profile: Arc<SourceProfile>,
    pub timeout: Duration,
}

impl SourceContext {
    pub fn new(profile: Arc<SourceProfile>, timeout: Duration) -> Self {
        Self { profile, timeout }
    }

    /// Canonical JSON endpoint, referred from the symbol page
    pub fn api_request(&self, symbol: &Symbol) -> FetchRequest {
        FetchRequest::get(self.profile.api_url(symbol), self.timeout)
            .with_headers(&self.profile.api_headers)
            .with_header("Referer", self.profile.page_url(symbol))
            .with_params(&self.profile.query)
    }

    pub fn alternate_requests(&self, symbol: &Symbol) -> Vec<FetchRequest> {
        let referer = self.profile.root_url();
        self.profile
            .alternate_endpoints
            .iter()
            .map(|template| {
                FetchRequest::get(self.profile.url_for(template, Some(symbol)), self.timeout)
                    .with_headers(&self.profile.api_headers)
                    .with_header("Referer", referer.clone())
            })
            .collect()
    }

    pub fn root_request(&self) -> FetchRequest {
        FetchRequest::get(self.profile.root_url(), self.timeout)
            .with_headers(&self.profile.page_headers)
    }

    pub fn page_request(&self, symbol: &Symbol, referer: Option<String>) -> FetchRequest {
        let request = FetchRequest::get(self.profile.page_url(symbol), self.timeout)
            .with_headers(&self.profile.page_headers);
        match referer {
            Some(referer) => request.with_header("Referer", referer),
            None => request,
        }
    }

    pub fn extractor(&self) -> EmbeddedPayloadExtractor {
        EmbeddedPayloadExtractor::new(self.profile.markers.clone())
    }
}

/// Body of a 200 response as JSON. `null` and empty containers count as no data.
pub fn expect_json(response: &FetchResponse, url: &str) -> Result<RawPayload, FetchError> {
    if !response.is_ok() {
        return Err(FetchError::Status {
            status: response.status,
            url: url.to_string(),
        });
    }
    let value = response.json()?;
    let empty = match &value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    if empty {
        return Err(FetchError::EmptyBody { url: url.to_string() });
    }
    Ok(RawPayload::new(value))
}

/// Body of a 200 response as text
pub fn expect_page(response: FetchResponse, url: &str) -> Result<String, FetchError> {
    if !response.is_ok() {
        return Err(FetchError::Status {
            status: response.status,
            url: url.to_string(),
        });
    }
    Ok(response.body)
}

/// Send one request, folding transport errors into `FetchError`
pub async fn send(
    fetcher: &dyn HttpFetcher,
    request: &FetchRequest,
) -> Result<FetchResponse, FetchError> {
    fetcher.fetch(request).await.map_err(FetchError::transport)
}

pub(crate) fn log_failure<T>(strategy: &str, symbol: &Symbol, result: Result<T, FetchError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("⚠️ {} failed for {}: {}", strategy, symbol, e);
            None
        }
    }
}

/// Instantiate the strategies named by the profile, in profile order
pub fn build_strategies(
    profile: Arc<SourceProfile>,
    fetcher: Arc<dyn HttpFetcher>,
    timeout: Duration,
) -> Vec<Box<dyn Strategy>> {
    let context = SourceContext::new(profile.clone(), timeout);

    profile
        .strategies
        .iter()
        .map(|kind| -> Box<dyn Strategy> {
            match kind {
                StrategyKind::Direct => Box::new(DirectCall::new(context.clone(), fetcher.clone())),
                StrategyKind::Alternate => {
                    Box::new(AlternateEndpoints::new(context.clone(), fetcher.clone()))
                }
                StrategyKind::Session => {
                    Box::new(SessionSequence::new(context.clone(), fetcher.clone()))
                }
                StrategyKind::Html => Box::new(HtmlExtraction::new(context.clone(), fetcher.clone())),
            }
        })
        .collect()
}
