//! Upstream source description.
//!
//! Every URL, header set and marker the strategies use lives here so the
//! acquisition code carries no source-specific literals. The built-in
//! profile can be replaced by a JSON file (`SOURCE_PROFILE_PATH`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::extractor::{canonical_markers, Marker};
use crate::models::Symbol;

/// Acquisition channel, in the order the profile lists them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Direct,
    Alternate,
    Session,
    Html,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Direct => "direct_call",
            StrategyKind::Alternate => "alternate_endpoints",
            StrategyKind::Session => "session_sequence",
            StrategyKind::Html => "html_extraction",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceProfile {
    pub base_url: String,
    /// Landing page used to seed session cookies
    pub root_path: String,
    /// Canonical JSON endpoint; `{symbol}` is substituted
    pub api_path: String,
    /// Human-facing symbol page, also the HTML extraction target
    pub page_path: String,
    /// Relative (`/...`) or absolute fallback endpoint templates
    pub alternate_endpoints: Vec<String>,
    pub query: Vec<(String, String)>,
    pub user_agent: String,
    pub api_headers: Vec<(String, String)>,
    pub page_headers: Vec<(String, String)>,
    pub markers: Vec<Marker>,
    pub strategies: Vec<StrategyKind>,
}

impl Default for SourceProfile {
    fn default() -> Self {
        Self {
            base_url: "https://www.perplexity.ai".to_string(),
            root_path: "/".to_string(),
            api_path: "/rest/finance/financials/{symbol}".to_string(),
            page_path: "/finance/{symbol}".to_string(),
            alternate_endpoints: vec![
                "/api/finance/data/{symbol}".to_string(),
                "/finance/api/v1/financials/{symbol}".to_string(),
                "https://api.perplexity.ai/finance/{symbol}/financials".to_string(),
                "/rest/v2/finance/financials/{symbol}".to_string(),
            ],
            query: vec![
                ("version".to_string(), "2.18".to_string()),
                ("source".to_string(), "default".to_string()),
            ],
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            api_headers: vec![
                ("Accept".to_string(), "application/json, text/plain, */*".to_string()),
                ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
            ],
            page_headers: vec![
                (
                    "Accept".to_string(),
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
                ),
                ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
            ],
            markers: canonical_markers(),
            strategies: vec![
                StrategyKind::Direct,
                StrategyKind::Alternate,
                StrategyKind::Session,
                StrategyKind::Html,
            ],
        }
    }
}

impl SourceProfile {
    /// Read a profile from a JSON file; missing fields take the built-in values
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read source profile {}", path.display()))?;
        let profile: SourceProfile = serde_json::from_str(&content)
            .with_context(|| format!("Invalid source profile {}", path.display()))?;

        if profile.strategies.is_empty() {
            return Err(anyhow::anyhow!(
                "Source profile {} lists no strategies",
                path.display()
            ));
        }
        Ok(profile)
    }

    /// Built-in profile unless a path is configured
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Expand a template into an absolute URL for `symbol`
    pub fn url_for(&self, template: &str, symbol: Option<&Symbol>) -> String {
        let expanded = match symbol {
            Some(symbol) => template.replace("{symbol}", &path_segment(symbol.as_str())),
            None => template.to_string(),
        };

        if expanded.starts_with("http://") || expanded.starts_with("https://") {
            expanded
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                expanded.trim_start_matches('/')
            )
        }
    }

    pub fn root_url(&self) -> String {
        self.url_for(&self.root_path, None)
    }

    pub fn api_url(&self, symbol: &Symbol) -> String {
        self.url_for(&self.api_path, Some(symbol))
    }

    pub fn page_url(&self, symbol: &Symbol) -> String {
        self.url_for(&self.page_path, Some(symbol))
    }
}

/// Percent-encode `raw` as a single URL path segment
fn path_segment(raw: &str) -> String {
    let Ok(mut scratch) = url::Url::parse("http://segment.invalid/") else {
        return raw.to_string();
    };
    if let Ok(mut segments) = scratch.path_segments_mut() {
        segments.clear().push(raw);
    }
    scratch.path().trim_start_matches('/').to_string()
}
