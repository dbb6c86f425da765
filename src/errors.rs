use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::Symbol;

/// A single request that did not produce a usable payload.
///
/// Never leaves a strategy; it is logged and turned into "no result".
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("response body is not JSON: {0}")]
    Body(#[from] serde_json::Error),
    #[error("empty JSON body from {url}")]
    EmptyBody { url: String },
}

impl FetchError {
    pub fn transport(err: anyhow::Error) -> Self {
        FetchError::Transport(format!("{err:#}"))
    }
}

/// Payload held no usable statement data
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("no annual statement blocks found in payload")]
    MissingStatements,
    #[error("statement blocks contained no period records")]
    NoRows,
}

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("all {count} strategies failed for {symbol} (tried: {tried})", count = .attempted.len(), tried = .attempted.join(", "))]
    Exhausted {
        symbol: Symbol,
        attempted: Vec<String>,
    },
}

/// Checkpoint read/write failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{} is not a dataset checkpoint: {reason}", .path.display())]
    MalformedCheckpoint { path: PathBuf, reason: String },
}

/// Errors that end a harvest run
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
