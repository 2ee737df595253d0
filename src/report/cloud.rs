//! Cloud sink: the durable delivery state machine.
//!
//! Each snapshot becomes a [`ClusterInfoRecord`] whose lifecycle is
//! `created` → `synced` (terminal) or `created` → deleted once it outlives
//! the retention window. One `save` call runs three ordered phases:
//!
//! 1. **Persist** the snapshot as a new record, named from its own `ts` so
//!    replays of the same instant collide in the store.
//! 2. **Expire** every record older than the retention window, collecting
//!    per-record failures without aborting.
//! 3. **Sync** every unsynced, not-deleting record to the remote endpoint,
//!    marking `syncTime` on success; one record's failure never blocks the
//!    others.
//!
//! Expire always completes before sync begins, so a record deleted in this
//! pass is never delivered by it.
//!
//! If the record kind is unavailable, the snapshot is delivered once
//! directly with no persistence or sync tracking.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::store::{ClusterInfoStatus, RecordStore, StoreError};
use crate::telemetry::Snapshot;

use super::client::DeliveryClient;
use super::{AggregateError, Report, ReportError};

/// Remote ingestion path; the host cluster id rides in the query string.
const TELEMETRY_PATH: &str = "/apis/telemetry/v1/clusterinfos";

/// Durable record name prefix.
const RECORD_PREFIX: &str = "clusterinfo-";

/// Product discriminator for payloads synced from durable records.
const PRODUCT_MANAGED: &str = "kse";

/// Product discriminator for the direct-delivery fallback.
const PRODUCT_DIRECT: &str = "ks";

/// Default history retention: one year.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Sink persisting snapshots as durable records and syncing them remotely.
pub struct CloudReport {
    store: Arc<dyn RecordStore>,
    client: DeliveryClient,
    base_url: String,
    reporter_id: String,
    retention: Duration,
}

impl CloudReport {
    /// Create a cloud sink.
    pub fn new(
        store: Arc<dyn RecordStore>,
        client: DeliveryClient,
        base_url: impl Into<String>,
        reporter_id: impl Into<String>,
        retention: Duration,
    ) -> Self {
        Self {
            store,
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            reporter_id: reporter_id.into(),
            retention,
        }
    }

    /// Phase 1: persist the snapshot as a new record named from its `ts`.
    ///
    /// The record is created with its full payload in one store call, so a
    /// failure here leaves either a complete record or none at all. A name
    /// collision means this exact instant was already persisted by an
    /// earlier run; the cycle carries on into expire and sync so pending
    /// history still gets reconciled.
    async fn persist(&self, snapshot: &Snapshot) -> Result<(), ReportError> {
        let ts = snapshot
            .get("ts")
            .and_then(Value::as_str)
            .ok_or(ReportError::MissingTimestamp)?;

        let name = record_name(ts);
        let status = ClusterInfoStatus::unsynced(Value::Object(snapshot.clone()));
        match self.store.create(&name, status).await {
            Ok(record) => {
                tracing::info!(record = %record.metadata.name, "Snapshot persisted");
                Ok(())
            }
            Err(StoreError::AlreadyExists(_)) => {
                tracing::info!(record = %name, "Snapshot already persisted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Phase 2: delete every record past the retention window.
    async fn expire(&self, errors: &mut Vec<ReportError>) {
        let records = match self.store.list().await {
            Ok(records) => records,
            Err(e) => {
                errors.push(e.into());
                return;
            }
        };

        let now = Utc::now();
        for record in records {
            if !expired(record.metadata.creation_time, now, self.retention) {
                continue;
            }
            match self.store.delete(&record.metadata.name).await {
                Ok(()) => {
                    tracing::info!(record = %record.metadata.name, "Expired record deleted");
                }
                Err(StoreError::NotFound(_)) => {}
                Err(e) => {
                    tracing::error!(record = %record.metadata.name, error = %e, "Failed to delete expired record");
                    errors.push(e.into());
                }
            }
        }
    }

    /// Phase 3: deliver every unsynced record and mark it synced.
    async fn sync(&self, cancel: &CancellationToken, errors: &mut Vec<ReportError>) {
        let records = match self.store.list().await {
            Ok(records) => records,
            Err(e) => {
                errors.push(e.into());
                return;
            }
        };

        for record in records {
            if record.metadata.deletion_time.is_some() || record.status.sync_time.is_some() {
                continue;
            }

            match self
                .deliver(cancel, &record.status.payload, PRODUCT_MANAGED)
                .await
            {
                Ok(true) => {
                    let mut status = record.status.clone();
                    status.sync_time = Some(Utc::now());
                    if let Err(e) = self
                        .store
                        .update_status(
                            &record.metadata.name,
                            status,
                            record.metadata.resource_version,
                        )
                        .await
                    {
                        tracing::error!(record = %record.metadata.name, error = %e, "Failed to mark record synced");
                        errors.push(e.into());
                    } else {
                        tracing::info!(record = %record.metadata.name, "Record synced");
                    }
                }
                // No host cluster in this payload yet; leave it unsynced.
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(record = %record.metadata.name, error = %e, "Failed to sync record");
                    errors.push(e);
                }
            }
        }
    }

    /// Deliver one payload, tagged with a product discriminator.
    ///
    /// Returns `Ok(false)` when the payload names no host-role cluster yet,
    /// which is a silent skip rather than a failure.
    async fn deliver(
        &self,
        cancel: &CancellationToken,
        payload: &Value,
        product: &str,
    ) -> Result<bool, ReportError> {
        let Some(cluster_id) = host_cluster_id(payload) else {
            tracing::info!("No host cluster identity yet, skipping delivery");
            return Ok(false);
        };

        let mut data = payload.clone();
        if let Some(map) = data.as_object_mut() {
            map.insert("product".to_string(), json!(product));
        }
        let envelope = json!({ "user_id": self.reporter_id, "data": data });

        let url = format!(
            "{}{}?cluster_id={}",
            self.base_url, TELEMETRY_PATH, cluster_id
        );
        self.client.post(cancel, &url, &envelope).await?;
        Ok(true)
    }
}

impl std::fmt::Debug for CloudReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudReport")
            .field("base_url", &self.base_url)
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Report for CloudReport {
    async fn save(
        &self,
        cancel: &CancellationToken,
        snapshot: &Snapshot,
    ) -> Result<(), ReportError> {
        if !self.store.kind_available().await? {
            tracing::info!("Record store unavailable, delivering snapshot directly");
            self.deliver(cancel, &Value::Object(snapshot.clone()), PRODUCT_DIRECT)
                .await?;
            return Ok(());
        }

        self.persist(snapshot).await?;

        let mut errors = Vec::new();
        self.expire(&mut errors).await;
        self.sync(cancel, &mut errors).await;
        AggregateError::join(errors)
    }
}

/// Derive the durable record name from the snapshot timestamp.
///
/// The mapping is deterministic so replaying the same instant collides with
/// the existing record instead of duplicating it.
fn record_name(ts: &str) -> String {
    let sanitized: String = ts
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("{RECORD_PREFIX}{sanitized}")
}

/// Extract the host-role cluster's identity from a payload.
///
/// Scans every host-role entry; a host record whose identity is still
/// empty does not hide a later one that carries it.
fn host_cluster_id(payload: &Value) -> Option<String> {
    payload
        .get("clusters")?
        .as_array()?
        .iter()
        .filter(|cluster| cluster.get("role").and_then(Value::as_str) == Some("host"))
        .find_map(|cluster| {
            cluster
                .get("nid")
                .and_then(Value::as_str)
                .filter(|nid| !nid.is_empty())
        })
        .map(str::to_string)
}

/// A record expires strictly after `created + retention`; the boundary
/// instant itself is not yet expired.
fn expired(created: DateTime<Utc>, now: DateTime<Utc>, retention: Duration) -> bool {
    match now.signed_duration_since(created).to_std() {
        Ok(age) => age > retention,
        // Created in the future relative to now; keep it.
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_record_name_is_deterministic_and_flat() {
        let name = record_name("2024-01-01T00:00:00Z");
        assert_eq!(name, "clusterinfo-2024-01-01t00-00-00z");
        assert_eq!(name, record_name("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_host_cluster_id_requires_host_role() {
        let payload = json!({
            "clusters": [
                { "role": "member", "nid": "m-1" },
                { "role": "host", "nid": "abc" }
            ]
        });
        assert_eq!(host_cluster_id(&payload).as_deref(), Some("abc"));

        let members_only = json!({ "clusters": [{ "role": "member", "nid": "m-1" }] });
        assert_eq!(host_cluster_id(&members_only), None);

        let empty_nid = json!({ "clusters": [{ "role": "host", "nid": "" }] });
        assert_eq!(host_cluster_id(&empty_nid), None);

        assert_eq!(host_cluster_id(&json!({})), None);
    }

    #[test]
    fn test_host_cluster_id_skips_identityless_host_entries() {
        let payload = json!({
            "clusters": [
                { "role": "host", "nid": "" },
                { "role": "host", "nid": "abc" }
            ]
        });
        assert_eq!(host_cluster_id(&payload).as_deref(), Some("abc"));
    }

    #[test]
    fn test_expiry_boundary_is_not_expired() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let retention = Duration::from_secs(3600);

        let at_boundary = created + chrono::Duration::seconds(3600);
        assert!(!expired(created, at_boundary, retention));

        let past_boundary = created + chrono::Duration::seconds(3601);
        assert!(expired(created, past_boundary, retention));

        assert!(!expired(created, created, retention));
    }
}
