//! Core collector trait and error types.

use serde_json::Value;
use thiserror::Error;

use crate::client::{ClientError, ClusterReader};

/// Errors that can occur during collection.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Cluster-state read failed.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Source data exists but cannot be interpreted yet.
    #[error("not ready: {0}")]
    NotReady(String),

    /// Collected value could not be serialized.
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A unit producing one named part of a snapshot.
///
/// Collectors are stateless across cycles and run concurrently within one
/// cycle, all sharing the same read-only [`ClusterReader`]. Each collector
/// owns exactly one record key; the registry rejects duplicates at startup.
#[async_trait::async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Snapshot key this collector's value is stored under.
    fn record_key(&self) -> &'static str;

    /// Perform one collection pass against the shared reader.
    ///
    /// # Errors
    /// Any error fails the whole cycle; there is no per-collector retry.
    async fn collect(&self, reader: &dyn ClusterReader) -> Result<Value, CollectError>;
}
