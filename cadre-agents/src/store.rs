//! Snapshot storage seam for ingestion agents

use crate::error::IngestError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Metadata recorded for every fetch attempt, successful or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Unique id for this snapshot
    pub snapshot_id: Uuid,

    /// Source name
    pub source: String,

    /// When the fetch completed or failed
    pub fetched_at: DateTime<Utc>,

    /// Whether the fetch succeeded
    pub ok: bool,

    /// SHA-256 of the content, when available
    pub content_hash: Option<String>,

    /// Failure description, when the fetch failed
    pub error: Option<String>,
}

/// Capability seam for persisting ingested data.
///
/// Real database backends live outside the control plane; they implement
/// this trait and are injected into the agent at construction.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Record fetch metadata
    async fn record_snapshot(&self, record: SnapshotRecord) -> Result<(), IngestError>;

    /// Append normalized rows to a named table
    async fn append_rows(
        &self,
        table: &str,
        rows: Vec<serde_json::Value>,
    ) -> Result<(), IngestError>;
}

/// In-process store used by tests and single-process deployments
#[derive(Default)]
pub struct MemoryStore {
    snapshots: Mutex<Vec<SnapshotRecord>>,
    tables: Mutex<HashMap<String, Vec<serde_json::Value>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded snapshots, in insertion order
    pub fn snapshots(&self) -> Vec<SnapshotRecord> {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Rows appended to `table` so far
    pub fn rows(&self, table: &str) -> Vec<serde_json::Value> {
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn record_snapshot(&self, record: SnapshotRecord) -> Result<(), IngestError> {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        Ok(())
    }

    async fn append_rows(
        &self,
        table: &str,
        rows: Vec<serde_json::Value>,
    ) -> Result<(), IngestError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(table.to_string())
            .or_default()
            .extend(rows);
        Ok(())
    }
}
