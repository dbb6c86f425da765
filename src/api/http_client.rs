//! `reqwest`-backed transport.
//!
//! Plain HTTP only: no browser or TLS impersonation. A session gets its own
//! client with a cookie store so cookies set by one step reach the next.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{FetchRequest, FetchResponse, HttpFetcher};

pub struct ReqwestFetcher {
    client: Client,
    user_agent: String,
    timeout: Duration,
}

impl ReqwestFetcher {
    /// Create a stateless fetcher
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        Self::build(user_agent, timeout, false)
    }

    fn build(user_agent: &str, timeout: Duration, cookies: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .cookie_store(cookies)
            .build()?;

        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let mut builder = self.client.get(&request.url).timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }

        debug!("Making request to: {}", request.url);

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!("{} responded {} ({} bytes)", request.url, status, body.len());

        Ok(FetchResponse { status, body })
    }

    fn session(&self) -> Result<Box<dyn HttpFetcher>> {
        Ok(Box::new(Self::build(&self.user_agent, self.timeout, true)?))
    }
}
