//! In-memory record store.
//!
//! Used by tests; also doubles as a store for ephemeral runs. Offers
//! toggles the filesystem store cannot express cheaply (kind availability,
//! pending deletion).

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use super::{ClusterInfoRecord, ClusterInfoStatus, RecordMeta, RecordStore, StoreError};

/// Mutex-guarded map of records.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<String, ClusterInfoRecord>>,
    available: AtomicBool,
}

impl MemoryRecordStore {
    /// Create an empty, available store.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle whether the record kind reports as available.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Insert a fully formed record, bypassing `create` semantics.
    pub fn insert_record(&self, record: ClusterInfoRecord) {
        self.records
            .lock()
            .expect("record map poisoned")
            .insert(record.metadata.name.clone(), record);
    }

    /// Mark a record as pending deletion.
    pub fn mark_deleting(&self, name: &str, at: DateTime<Utc>) {
        if let Some(record) = self
            .records
            .lock()
            .expect("record map poisoned")
            .get_mut(name)
        {
            record.metadata.deletion_time = Some(at);
        }
    }

    /// Fetch one record by name.
    pub fn get(&self, name: &str) -> Option<ClusterInfoRecord> {
        self.records
            .lock()
            .expect("record map poisoned")
            .get(name)
            .cloned()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryRecordStore {
    async fn kind_available(&self) -> Result<bool, StoreError> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    async fn create(
        &self,
        name: &str,
        status: ClusterInfoStatus,
    ) -> Result<ClusterInfoRecord, StoreError> {
        let mut records = self.records.lock().expect("record map poisoned");
        if records.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }

        let record = ClusterInfoRecord {
            metadata: RecordMeta {
                name: name.to_string(),
                creation_time: Utc::now(),
                deletion_time: None,
                resource_version: 1,
            },
            status,
        };
        records.insert(name.to_string(), record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<ClusterInfoRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .expect("record map poisoned")
            .values()
            .cloned()
            .collect())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.records
            .lock()
            .expect("record map poisoned")
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn update_status(
        &self,
        name: &str,
        status: ClusterInfoStatus,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("record map poisoned");
        let record = records
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        if record.metadata.resource_version != expected_version {
            return Err(StoreError::Conflict {
                name: name.to_string(),
                expected: expected_version,
                actual: record.metadata.resource_version,
            });
        }

        record.status = status;
        record.metadata.resource_version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_create_and_conflict() {
        let store = MemoryRecordStore::new();
        let record = store
            .create("clusterinfo-m", ClusterInfoStatus::unsynced(json!({})))
            .await
            .unwrap();

        let mut status = record.status.clone();
        status.sync_time = Some(Utc::now());
        store
            .update_status("clusterinfo-m", status.clone(), 1)
            .await
            .unwrap();

        let err = store
            .update_status("clusterinfo-m", status, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { actual: 2, .. }));
    }

    #[tokio::test]
    async fn test_availability_toggle() {
        let store = MemoryRecordStore::new();
        assert!(store.kind_available().await.unwrap());
        store.set_available(false);
        assert!(!store.kind_available().await.unwrap());
    }
}
