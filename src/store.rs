//! Durable Record Store
//!
//! Named, timestamped snapshot records with a status sub-document. The
//! cloud sink's delivery state machine lives entirely in this store; the
//! process keeps no authoritative state in memory, so partially synced
//! history survives restarts and is reconciled on the next run.
//!
//! # Architecture
//!
//! - [`RecordStore`]: create / list / delete / patch-status seam
//! - [`FsRecordStore`]: JSON-file-per-record implementation
//! - [`MemoryRecordStore`]: in-memory implementation for tests

mod fs;
mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use fs::FsRecordStore;
pub use memory::MemoryRecordStore;

/// Errors from the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization/deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// No record with the given name exists.
    #[error("record '{0}' not found")]
    NotFound(String),

    /// A record with the given name already exists.
    #[error("record '{0}' already exists")]
    AlreadyExists(String),

    /// Optimistic concurrency check failed.
    #[error("record '{name}' version conflict: expected {expected}, found {actual}")]
    Conflict {
        /// Record name.
        name: String,
        /// Version the caller read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },
}

/// Record metadata maintained by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    /// Record name, derived from the snapshot's own timestamp.
    pub name: String,
    /// Creation time, assigned by the store.
    pub creation_time: DateTime<Utc>,
    /// Set when deletion has been requested but not completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_time: Option<DateTime<Utc>>,
    /// Monotonic version counter for optimistic concurrency.
    pub resource_version: u64,
}

/// Status sub-document of a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfoStatus {
    /// The full snapshot payload. Immutable once written.
    pub payload: Value,
    /// Set once the payload has been delivered remotely. A record carrying
    /// a sync time is terminal and skipped by future sync passes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_time: Option<DateTime<Utc>>,
}

impl ClusterInfoStatus {
    /// Status for a freshly collected, not-yet-synced payload.
    pub fn unsynced(payload: Value) -> Self {
        Self {
            payload,
            sync_time: None,
        }
    }
}

/// A persisted, timestamped copy of one historical snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfoRecord {
    /// Store-maintained metadata.
    pub metadata: RecordMeta,
    /// Snapshot payload and sync marker.
    pub status: ClusterInfoStatus,
}

/// Persistence API for snapshot history.
///
/// Only the cloud sink writes through this seam, and a single active
/// reporter per cluster is assumed, so no inter-process locking exists.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Whether the record kind is available at all.
    ///
    /// `false` routes the cloud sink onto its direct-delivery fallback.
    async fn kind_available(&self) -> Result<bool, StoreError>;

    /// Create a record with its full status in one atomic step.
    ///
    /// The store assigns `creation_time` and the initial resource version.
    ///
    /// # Errors
    /// Returns [`StoreError::AlreadyExists`] on a name collision, which is
    /// how replays of the same snapshot instant are deduplicated.
    async fn create(
        &self,
        name: &str,
        status: ClusterInfoStatus,
    ) -> Result<ClusterInfoRecord, StoreError>;

    /// List all records.
    async fn list(&self) -> Result<Vec<ClusterInfoRecord>, StoreError>;

    /// Delete a record by name.
    async fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Replace a record's status, checking the resource version read by the
    /// caller.
    ///
    /// # Errors
    /// Returns [`StoreError::Conflict`] if the record changed since it was
    /// read, [`StoreError::NotFound`] if it no longer exists.
    async fn update_status(
        &self,
        name: &str,
        status: ClusterInfoStatus,
        expected_version: u64,
    ) -> Result<(), StoreError>;
}
