//! Error types for bundled agents

use thiserror::Error;

/// Errors produced by snapshot sources and stores.
///
/// Ingestion maps these onto the lifecycle taxonomy: a failed fetch is
/// recorded and recoverable, a failed store write is unrecoverable.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A source could not be fetched
    #[error("fetch failed for source {source_name}: {reason}")]
    Fetch {
        /// Source name
        source_name: String,
        /// Failure description
        reason: String,
    },

    /// The backing store rejected a write
    #[error("store error: {0}")]
    Store(String),

    /// IO error reading a file source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error fetching a URL source
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Payload was not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
