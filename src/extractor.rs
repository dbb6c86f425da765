//! Pull statement JSON out of HTML pages.
//!
//! Pages that render the financials server-side embed the same payload the
//! API returns, either in a Next.js data script, in a `window.__...__`
//! assignment, or inline. A marker names where such a fragment starts and how
//! it ends; the extractor tries markers in order and keeps the first fragment
//! that parses and actually contains statement data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::RawPayload;

/// Deepest level the target search descends to
pub const MAX_SEARCH_DEPTH: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminator {
    /// Fragment ends at the next occurrence of this text
    Literal(String),
    /// Fragment ends where the opening brace closes
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub start: String,
    pub terminator: Terminator,
}

impl Marker {
    pub fn literal(start: &str, end: &str) -> Self {
        Self {
            start: start.to_string(),
            terminator: Terminator::Literal(end.to_string()),
        }
    }

    pub fn balanced(start: &str) -> Self {
        Self {
            start: start.to_string(),
            terminator: Terminator::Balanced,
        }
    }
}

/// Markers seen on the finance pages, most specific first
pub fn canonical_markers() -> Vec<Marker> {
    vec![
        Marker::literal("id=\"__NEXT_DATA__\"", "</script>"),
        Marker::literal("window.__INITIAL_DATA__ = ", ";"),
        Marker::literal("window.__PRELOADED_STATE__ = ", ";"),
        Marker::literal("window.__INITIAL_STATE__", ";"),
        Marker::literal("window.__DATA__", ";"),
        Marker::balanced("\"financials\":"),
        Marker::balanced("{\"annual\":"),
    ]
}

#[derive(Debug, Error)]
enum ExtractError {
    #[error("no JSON value follows the marker")]
    NoJsonStart,
    #[error("terminator {0:?} not found")]
    Unterminated(String),
    #[error("braces never balance")]
    Unbalanced,
    #[error("fragment is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no statement data within depth {}", MAX_SEARCH_DEPTH)]
    TargetMissing,
}

/// Extractor bound to a marker list
#[derive(Debug, Clone)]
pub struct EmbeddedPayloadExtractor {
    markers: Vec<Marker>,
}

impl Default for EmbeddedPayloadExtractor {
    fn default() -> Self {
        Self::new(canonical_markers())
    }
}

impl EmbeddedPayloadExtractor {
    pub fn new(markers: Vec<Marker>) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn extract(&self, text: &str) -> Option<RawPayload> {
        extract(text, &self.markers)
    }
}

/// Return the first embedded statement payload found by `markers`, in order.
///
/// Candidates that fail to parse or hold no statement data are skipped.
pub fn extract(text: &str, markers: &[Marker]) -> Option<RawPayload> {
    for marker in markers {
        if !text.contains(marker.start.as_str()) {
            continue;
        }

        match extract_with(text, marker) {
            Ok(payload) => {
                debug!("Embedded payload found via marker {:?}", marker.start);
                return Some(payload);
            }
            Err(e) => {
                debug!("Marker {:?} rejected: {}", marker.start, e);
            }
        }
    }
    None
}

fn extract_with(text: &str, marker: &Marker) -> Result<RawPayload, ExtractError> {
    let span = candidate_span(text, marker)?;
    let value: Value = serde_json::from_str(span)?;
    let target = locate_target(&value, 0).ok_or(ExtractError::TargetMissing)?;
    Ok(RawPayload::new(target.clone()))
}

fn candidate_span<'a>(text: &'a str, marker: &Marker) -> Result<&'a str, ExtractError> {
    // caller checked the marker is present
    let found = text.find(marker.start.as_str()).ok_or(ExtractError::NoJsonStart)?;
    let offset = if marker.start.starts_with('{') {
        found
    } else {
        found + marker.start.len()
    };
    let rest = &text[offset..];

    match &marker.terminator {
        Terminator::Literal(end) => {
            let close = rest
                .find(end.as_str())
                .ok_or_else(|| ExtractError::Unterminated(end.clone()))?;
            let fragment = &rest[..close];
            let open = fragment
                .find(|c: char| c == '{' || c == '[')
                .ok_or(ExtractError::NoJsonStart)?;
            Ok(fragment[open..].trim())
        }
        Terminator::Balanced => {
            let open = rest.find('{').ok_or(ExtractError::NoJsonStart)?;
            balanced_span(&rest[open..])
        }
    }
}

/// Slice from the leading `{` to its matching `}`.
///
/// Braces inside string literals do not count.
fn balanced_span(body: &str) -> Result<&str, ExtractError> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, byte) in body.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(&body[..=i]);
                }
            }
            _ => {}
        }
    }

    Err(ExtractError::Unbalanced)
}

/// Whether `value` holds statement data within the search depth
pub fn contains_target(value: &Value, depth: usize) -> bool {
    locate_target(value, depth).is_some()
}

/// The object carrying `annual`, descending through `financials` when present
fn locate_target(value: &Value, depth: usize) -> Option<&Value> {
    if depth > MAX_SEARCH_DEPTH {
        return None;
    }

    match value {
        Value::Object(map) => {
            if map.contains_key("annual") {
                return Some(value);
            }
            let nested = map
                .values()
                .find_map(|child| locate_target(child, depth + 1));
            match nested {
                Some(target) => Some(target),
                // a bare `financials` block still beats nothing
                None if map.contains_key("financials") => Some(value),
                None => None,
            }
        }
        Value::Array(items) => items
            .iter()
            .find_map(|child| locate_target(child, depth + 1)),
        _ => None,
    }
}
