//! Snapshot Orchestrator
//!
//! One collection cycle is strictly: parallel phase (every registered
//! collector, fanned out as tokio tasks) → barrier → sequential phase
//! (canonicalize → sink). The first collector failure cancels the in-flight
//! siblings and fails the cycle; no partial snapshot ever reaches the sink.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::client::ClusterReader;
use crate::collector::{CollectError, CollectorRegistry};
use crate::report::{Report, ReportError};

/// One cycle's consolidated collection result: record keys plus `ts`.
pub type Snapshot = serde_json::Map<String, Value>;

/// Errors from a collection cycle.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A collector failed; the whole cycle is abandoned.
    #[error("collector '{key}' failed: {source}")]
    Collect {
        /// Record key of the failing collector.
        key: &'static str,
        /// The collector's error, verbatim.
        #[source]
        source: CollectError,
    },

    /// The cycle was cancelled before completing.
    #[error("collection cycle cancelled")]
    Cancelled,

    /// A collector task could not be joined.
    #[error("collector task failed: {0}")]
    Join(String),

    /// Snapshot canonicalization failed.
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The sink rejected the snapshot.
    #[error("report error: {0}")]
    Report(#[from] ReportError),
}

/// One-shot telemetry cycle: collectors → snapshot → sink.
pub struct Telemetry {
    registry: CollectorRegistry,
    reader: Arc<dyn ClusterReader>,
    report: Arc<dyn Report>,
}

impl Telemetry {
    /// Wire a cycle from its three collaborators.
    pub fn new(
        registry: CollectorRegistry,
        reader: Arc<dyn ClusterReader>,
        report: Arc<dyn Report>,
    ) -> Self {
        Self {
            registry,
            reader,
            report,
        }
    }

    /// Run one complete cycle.
    ///
    /// # Errors
    /// Fails on the first collector error (wrapped with its record key), on
    /// cancellation, or on any sink failure.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<(), TelemetryError> {
        let snapshot = collect_snapshot(&self.registry, &self.reader, cancel).await?;
        let snapshot = canonicalize(snapshot)?;

        tracing::info!(keys = snapshot.len(), "Snapshot collected, saving");
        self.report.save(cancel, &snapshot).await?;
        Ok(())
    }
}

/// Fan out every registered collector and join the results into a snapshot.
///
/// The `ts` key is stamped before any collector is dispatched. All tasks
/// share `reader` and a child of `cancel`; the first failure cancels the
/// child token so siblings return promptly, then everything is joined
/// before the error is propagated.
pub async fn collect_snapshot(
    registry: &CollectorRegistry,
    reader: &Arc<dyn ClusterReader>,
    cancel: &CancellationToken,
) -> Result<Snapshot, TelemetryError> {
    let mut snapshot = Snapshot::new();
    snapshot.insert(
        "ts".to_string(),
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
    );

    let cycle = cancel.child_token();
    let mut tasks: JoinSet<Result<(&'static str, Value), TelemetryError>> = JoinSet::new();

    for collector in registry.iter() {
        let collector = Arc::clone(collector);
        let reader = Arc::clone(reader);
        let cycle = cycle.clone();

        tasks.spawn(async move {
            let key = collector.record_key();
            tokio::select! {
                _ = cycle.cancelled() => Err(TelemetryError::Cancelled),
                result = collector.collect(reader.as_ref()) => match result {
                    Ok(value) => Ok((key, value)),
                    Err(source) => {
                        tracing::error!(record_key = key, error = %source, "Collector failed");
                        Err(TelemetryError::Collect { key, source })
                    }
                }
            }
        });
    }

    let mut first_error: Option<TelemetryError> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok((key, value))) => {
                snapshot.insert(key.to_string(), value);
            }
            Ok(Err(e)) => {
                if first_error.is_none() {
                    // Stop the remaining in-flight collectors; keep joining
                    // so the barrier holds before the error propagates.
                    cycle.cancel();
                    first_error = Some(e);
                }
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                if first_error.is_none() {
                    cycle.cancel();
                    first_error = Some(TelemetryError::Join(e.to_string()));
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(snapshot),
    }
}

/// Round-trip the snapshot through its serialized form.
///
/// Guarantees every consumer observes the same normalized value types no
/// matter what in-memory types the collectors produced.
fn canonicalize(snapshot: Snapshot) -> Result<Snapshot, TelemetryError> {
    let bytes = serde_json::to_vec(&snapshot)?;
    Ok(serde_json::from_slice(&bytes)?)
}
