//! Cloud sink integration tests.
//!
//! Each test runs the real `CloudReport` pipeline against an in-memory
//! record store and a local axum endpoint capturing every delivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use beacon::report::DEFAULT_RETENTION;
use beacon::store::{ClusterInfoRecord, ClusterInfoStatus, MemoryRecordStore, RecordMeta};
use beacon::{CloudReport, DeliveryClient, Report, Snapshot};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Test Helpers
// =============================================================================

/// One captured delivery: the `cluster_id` query parameter and the body.
#[derive(Debug, Clone)]
struct Delivery {
    cluster_id: String,
    body: Value,
}

#[derive(Clone)]
struct EndpointState {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
    status: Arc<AtomicU16>,
}

async fn ingest(
    State(state): State<EndpointState>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> StatusCode {
    state.deliveries.lock().unwrap().push(Delivery {
        cluster_id: params.get("cluster_id").cloned().unwrap_or_default(),
        body: serde_json::from_str(&body).unwrap_or(Value::Null),
    });
    StatusCode::from_u16(state.status.load(Ordering::SeqCst)).unwrap_or(StatusCode::OK)
}

/// Start a capture endpoint; returns its base URL and shared state.
async fn start_endpoint() -> (String, EndpointState) {
    let state = EndpointState {
        deliveries: Arc::new(Mutex::new(Vec::new())),
        status: Arc::new(AtomicU16::new(200)),
    };
    let router = Router::new()
        .route("/apis/telemetry/v1/clusterinfos", post(ingest))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

fn cloud_report(base_url: &str, store: Arc<MemoryRecordStore>) -> CloudReport {
    CloudReport::new(
        store,
        DeliveryClient::new().unwrap(),
        base_url,
        "reporter-1",
        DEFAULT_RETENTION,
    )
}

fn snapshot_with_host(ts: &str, nid: &str) -> Snapshot {
    let mut snapshot = Snapshot::new();
    snapshot.insert("ts".to_string(), json!(ts));
    snapshot.insert(
        "clusters".to_string(),
        json!([{ "role": "host", "name": "host", "nid": nid }]),
    );
    snapshot
}

fn snapshot_without_host(ts: &str) -> Snapshot {
    let mut snapshot = Snapshot::new();
    snapshot.insert("ts".to_string(), json!(ts));
    snapshot.insert(
        "clusters".to_string(),
        json!([{ "role": "member", "name": "member-a", "nid": "m-1" }]),
    );
    snapshot
}

fn record(name: &str, payload: Value, age: ChronoDuration, synced: bool) -> ClusterInfoRecord {
    ClusterInfoRecord {
        metadata: RecordMeta {
            name: name.to_string(),
            creation_time: Utc::now() - age,
            deletion_time: None,
            resource_version: 1,
        },
        status: ClusterInfoStatus {
            payload,
            sync_time: synced.then(Utc::now),
        },
    }
}

// =============================================================================
// Sync Scenarios
// =============================================================================

#[tokio::test]
async fn test_only_fresh_record_is_delivered() {
    let (base_url, endpoint) = start_endpoint().await;
    let store = Arc::new(MemoryRecordStore::new());

    let synced = record(
        "clusterinfo-old",
        json!({ "clusters": [{ "role": "host", "nid": "old" }] }),
        ChronoDuration::hours(2),
        true,
    );
    let synced_at = synced.status.sync_time;
    store.insert_record(synced);
    store.insert_record(record(
        "clusterinfo-fresh",
        json!({ "clusters": [{ "role": "host", "nid": "abc" }] }),
        ChronoDuration::hours(1),
        false,
    ));

    let report = cloud_report(&base_url, store.clone());
    // The cycle's own snapshot has no host cluster yet, so only the fresh
    // stored record is deliverable.
    report
        .save(
            &CancellationToken::new(),
            &snapshot_without_host("2024-01-01T00:00:00Z"),
        )
        .await
        .unwrap();

    let deliveries = endpoint.deliveries.lock().unwrap().clone();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].cluster_id, "abc");

    let fresh = store.get("clusterinfo-fresh").unwrap();
    assert!(fresh.status.sync_time.is_some());
    assert_eq!(fresh.metadata.resource_version, 2);

    // The already-synced record is untouched.
    let old = store.get("clusterinfo-old").unwrap();
    assert_eq!(old.status.sync_time, synced_at);
    assert_eq!(old.metadata.resource_version, 1);

    // The new snapshot was persisted but not marked synced.
    let persisted = store.get("clusterinfo-2024-01-01t00-00-00z").unwrap();
    assert!(persisted.status.sync_time.is_none());
}

#[tokio::test]
async fn test_synced_records_never_redelivered() {
    let (base_url, endpoint) = start_endpoint().await;
    let store = Arc::new(MemoryRecordStore::new());
    let report = cloud_report(&base_url, store.clone());
    let cancel = CancellationToken::new();

    report
        .save(&cancel, &snapshot_with_host("2024-01-01T00:00:00Z", "abc"))
        .await
        .unwrap();
    assert_eq!(endpoint.deliveries.lock().unwrap().len(), 1);

    // A second cycle syncs its own new record but must not re-deliver the
    // first one.
    report
        .save(&cancel, &snapshot_with_host("2024-01-01T01:00:00Z", "abc"))
        .await
        .unwrap();
    assert_eq!(endpoint.deliveries.lock().unwrap().len(), 2);

    for record in [
        store.get("clusterinfo-2024-01-01t00-00-00z").unwrap(),
        store.get("clusterinfo-2024-01-01t01-00-00z").unwrap(),
    ] {
        assert!(record.status.sync_time.is_some());
    }
}

#[tokio::test]
async fn test_same_timestamp_replay_still_reconciles() {
    let (base_url, endpoint) = start_endpoint().await;
    let store = Arc::new(MemoryRecordStore::new());
    let report = cloud_report(&base_url, store.clone());
    let cancel = CancellationToken::new();

    let snapshot = snapshot_with_host("2024-01-09T00:00:00Z", "abc");
    report.save(&cancel, &snapshot).await.unwrap();
    assert_eq!(endpoint.deliveries.lock().unwrap().len(), 1);

    // A record left over from a run that persisted but never synced.
    store.insert_record(record(
        "clusterinfo-stranded",
        json!({ "clusters": [{ "role": "host", "nid": "xyz" }] }),
        ChronoDuration::hours(1),
        false,
    ));

    // Replaying the same instant collides in the store, but the cycle must
    // still run expire and sync for the stranded record.
    report.save(&cancel, &snapshot).await.unwrap();

    let deliveries = endpoint.deliveries.lock().unwrap().clone();
    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[1].cluster_id, "xyz");
    assert!(
        store
            .get("clusterinfo-stranded")
            .unwrap()
            .status
            .sync_time
            .is_some()
    );
}

#[tokio::test]
async fn test_record_pending_deletion_is_skipped() {
    let (base_url, endpoint) = start_endpoint().await;
    let store = Arc::new(MemoryRecordStore::new());

    store.insert_record(record(
        "clusterinfo-deleting",
        json!({ "clusters": [{ "role": "host", "nid": "abc" }] }),
        ChronoDuration::hours(1),
        false,
    ));
    store.mark_deleting("clusterinfo-deleting", Utc::now());

    let report = cloud_report(&base_url, store.clone());
    report
        .save(
            &CancellationToken::new(),
            &snapshot_without_host("2024-01-02T00:00:00Z"),
        )
        .await
        .unwrap();

    assert!(endpoint.deliveries.lock().unwrap().is_empty());
    assert!(
        store
            .get("clusterinfo-deleting")
            .unwrap()
            .status
            .sync_time
            .is_none()
    );
}

#[tokio::test]
async fn test_failed_delivery_reported_but_does_not_block_siblings() {
    let (base_url, endpoint) = start_endpoint().await;
    endpoint.status.store(500, Ordering::SeqCst);
    let store = Arc::new(MemoryRecordStore::new());

    store.insert_record(record(
        "clusterinfo-a",
        json!({ "clusters": [{ "role": "host", "nid": "a" }] }),
        ChronoDuration::hours(2),
        false,
    ));
    store.insert_record(record(
        "clusterinfo-b",
        json!({ "clusters": [{ "role": "host", "nid": "b" }] }),
        ChronoDuration::hours(1),
        false,
    ));

    let report = cloud_report(&base_url, store.clone());
    let err = report
        .save(
            &CancellationToken::new(),
            &snapshot_without_host("2024-01-03T00:00:00Z"),
        )
        .await
        .unwrap_err();

    // Both records were attempted despite the first failure.
    assert_eq!(endpoint.deliveries.lock().unwrap().len(), 2);
    assert!(err.to_string().contains("2 error(s)"));

    // Neither delivery succeeded, so both stay unsynced for the next run.
    assert!(store.get("clusterinfo-a").unwrap().status.sync_time.is_none());
    assert!(store.get("clusterinfo-b").unwrap().status.sync_time.is_none());
}

// =============================================================================
// Envelope Shape
// =============================================================================

#[tokio::test]
async fn test_delivery_envelope_shape() {
    let (base_url, endpoint) = start_endpoint().await;
    let store = Arc::new(MemoryRecordStore::new());

    let report = cloud_report(&base_url, store);
    report
        .save(
            &CancellationToken::new(),
            &snapshot_with_host("2024-01-04T00:00:00Z", "abc"),
        )
        .await
        .unwrap();

    let deliveries = endpoint.deliveries.lock().unwrap().clone();
    assert_eq!(deliveries.len(), 1);

    let body = &deliveries[0].body;
    assert_eq!(body["user_id"], "reporter-1");
    assert_eq!(body["data"]["product"], "kse");
    assert_eq!(body["data"]["ts"], "2024-01-04T00:00:00Z");
    assert_eq!(body["data"]["clusters"][0]["nid"], "abc");
}

// =============================================================================
// Expiry
// =============================================================================

#[tokio::test]
async fn test_expired_records_pruned_regardless_of_sync_state() {
    let (base_url, _endpoint) = start_endpoint().await;
    let store = Arc::new(MemoryRecordStore::new());

    let retention = ChronoDuration::days(365);
    store.insert_record(record(
        "clusterinfo-ancient-synced",
        json!({}),
        retention + ChronoDuration::hours(1),
        true,
    ));
    store.insert_record(record(
        "clusterinfo-ancient-unsynced",
        json!({}),
        retention + ChronoDuration::hours(1),
        false,
    ));
    store.insert_record(record(
        "clusterinfo-recent",
        json!({}),
        ChronoDuration::days(1),
        true,
    ));

    let report = cloud_report(&base_url, store.clone());
    report
        .save(
            &CancellationToken::new(),
            &snapshot_without_host("2024-01-05T00:00:00Z"),
        )
        .await
        .unwrap();

    assert!(store.get("clusterinfo-ancient-synced").is_none());
    assert!(store.get("clusterinfo-ancient-unsynced").is_none());
    assert!(store.get("clusterinfo-recent").is_some());
    assert!(store.get("clusterinfo-2024-01-05t00-00-00z").is_some());
}

// =============================================================================
// Fallback
// =============================================================================

#[tokio::test]
async fn test_fallback_delivers_directly_without_persisting() {
    let (base_url, endpoint) = start_endpoint().await;
    let store = Arc::new(MemoryRecordStore::new());
    store.set_available(false);

    let report = cloud_report(&base_url, store.clone());
    report
        .save(
            &CancellationToken::new(),
            &snapshot_with_host("2024-01-06T00:00:00Z", "abc"),
        )
        .await
        .unwrap();

    let deliveries = endpoint.deliveries.lock().unwrap().clone();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].cluster_id, "abc");
    assert_eq!(deliveries[0].body["data"]["product"], "ks");

    // Nothing reached the store.
    store.set_available(true);
    assert!(store.get("clusterinfo-2024-01-06t00-00-00z").is_none());
}

#[tokio::test]
async fn test_fallback_without_host_cluster_skips_silently() {
    let (base_url, endpoint) = start_endpoint().await;
    let store = Arc::new(MemoryRecordStore::new());
    store.set_available(false);

    let report = cloud_report(&base_url, store);
    report
        .save(
            &CancellationToken::new(),
            &snapshot_without_host("2024-01-07T00:00:00Z"),
        )
        .await
        .unwrap();

    assert!(endpoint.deliveries.lock().unwrap().is_empty());
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancelled_cycle_fails_delivery_without_sending() {
    let (base_url, endpoint) = start_endpoint().await;
    let store = Arc::new(MemoryRecordStore::new());
    let client = DeliveryClient::new().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = CloudReport::new(
        store.clone(),
        client,
        &base_url,
        "reporter-1",
        DEFAULT_RETENTION,
    );
    let err = report
        .save(&cancel, &snapshot_with_host("2024-01-08T00:00:00Z", "abc"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("cancelled"));
    // The snapshot was persisted before cancellation hit the sync phase.
    assert!(store.get("clusterinfo-2024-01-08t00-00-00z").is_some());
    assert!(endpoint.deliveries.lock().unwrap().is_empty());

    // Wait a moment to prove nothing was sent late.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(endpoint.deliveries.lock().unwrap().is_empty());
}
