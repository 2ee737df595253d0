//! Report Layer
//!
//! Delivery targets for a completed snapshot. The orchestrator hands every
//! canonical snapshot to exactly one [`Report`] implementation:
//!
//! - [`LocalReport`]: timestamped JSON artifact in a local directory
//! - [`CloudReport`]: durable persist / expire / sync pipeline against a
//!   record store, delivering through the rate-limited [`DeliveryClient`]

mod client;
mod cloud;
mod local;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::store::StoreError;
use crate::telemetry::Snapshot;

pub use client::{DELIVERY_BURST, DELIVERY_RPS, DeliveryClient};
pub use cloud::{CloudReport, DEFAULT_RETENTION};
pub use local::LocalReport;

/// Errors from snapshot delivery.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Local artifact could not be created or written.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Record store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Outbound HTTP request failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote endpoint answered with a non-200 status.
    #[error("unexpected response status {0}, expected 200")]
    UnexpectedStatus(u16),

    /// The snapshot carries no usable `ts` field.
    #[error("snapshot has no 'ts' timestamp")]
    MissingTimestamp,

    /// The cycle was cancelled before the request was sent.
    #[error("delivery cancelled")]
    Cancelled,

    /// Multiple independent failures from one phase, reported jointly.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// Accumulated failures from a phase that must not short-circuit.
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<ReportError>,
}

impl AggregateError {
    /// `Ok` if `errors` is empty, otherwise the joined error.
    pub fn join(errors: Vec<ReportError>) -> Result<(), ReportError> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AggregateError { errors }.into())
        }
    }

    /// The individual failures.
    pub fn errors(&self) -> &[ReportError] {
        &self.errors
    }
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error(s): ", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Delivery target for a completed snapshot.
#[async_trait::async_trait]
pub trait Report: Send + Sync {
    /// Persist or deliver one snapshot.
    ///
    /// Cancelling the token aborts in-flight HTTP work; already-applied
    /// store mutations are not rolled back.
    async fn save(&self, cancel: &CancellationToken, snapshot: &Snapshot)
    -> Result<(), ReportError>;
}
