//! Fetching raw snapshots from external sources

use crate::error::IngestError;
use async_trait::async_trait;
use cadre_core::config::{SourceLocation, SourceSpec};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;

/// A raw, unnormalized snapshot fetched from one source
#[derive(Debug, Clone)]
pub struct RawSnapshot {
    /// Name of the source this came from
    pub source: String,

    /// Parsed JSON payload
    pub payload: serde_json::Value,

    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,

    /// SHA-256 of the raw content, for deduplication
    pub content_hash: String,
}

/// Capability seam for fetching source data.
///
/// Injected into [`crate::ingestion::Ingestion`] at construction; tests swap
/// in canned implementations.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch and parse one source
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawSnapshot, IngestError>;
}

/// Default source: local JSON files and HTTP(S) JSON documents
pub struct FetchingSource {
    client: reqwest::Client,
}

impl FetchingSource {
    /// Create a source with a 30 second request timeout
    pub fn new() -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SnapshotSource for FetchingSource {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawSnapshot, IngestError> {
        let text = match &spec.location {
            SourceLocation::File { path } => tokio::fs::read_to_string(path).await?,
            SourceLocation::Url { url } => {
                self.client
                    .get(url)
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?
            }
        };

        let content_hash = format!("{:x}", Sha256::digest(text.as_bytes()));
        let payload = serde_json::from_str(&text)?;
        debug!(source = %spec.name, hash = %content_hash, "source fetched");

        Ok(RawSnapshot {
            source: spec.name.clone(),
            payload,
            fetched_at: Utc::now(),
            content_hash,
        })
    }
}
