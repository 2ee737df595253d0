//! File-backed record store.
//!
//! One JSON file per record under a state directory. Creation uses
//! create-new semantics so a replayed snapshot instant collides instead of
//! silently overwriting; status updates go through a temp-file rename so a
//! crash never leaves a half-written record.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use chrono::Utc;

use super::{ClusterInfoRecord, ClusterInfoStatus, RecordMeta, RecordStore, StoreError};

const RECORD_EXT: &str = "json";

/// Record store keeping each record as a JSON file under one directory.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    dir: PathBuf,
}

impl FsRecordStore {
    /// Create a store rooted at `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{RECORD_EXT}"))
    }

    async fn read_record(&self, path: &Path) -> Result<ClusterInfoRecord, StoreError> {
        let bytes = fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write a record through a temp file + rename so readers never observe
    /// a partial document.
    async fn replace_record(&self, record: &ClusterInfoRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.metadata.name);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(record)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for FsRecordStore {
    async fn kind_available(&self) -> Result<bool, StoreError> {
        // The kind exists as long as the state directory is usable.
        Ok(fs::create_dir_all(&self.dir).await.is_ok())
    }

    async fn create(
        &self,
        name: &str,
        status: ClusterInfoStatus,
    ) -> Result<ClusterInfoRecord, StoreError> {
        fs::create_dir_all(&self.dir).await?;

        let record = ClusterInfoRecord {
            metadata: RecordMeta {
                name: name.to_string(),
                creation_time: Utc::now(),
                deletion_time: None,
                resource_version: 1,
            },
            status,
        };

        let path = self.record_path(name);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    StoreError::AlreadyExists(name.to_string())
                } else {
                    StoreError::Io(e)
                }
            })?;
        file.write_all(&serde_json::to_vec_pretty(&record)?).await?;
        file.flush().await?;

        Ok(record)
    }

    async fn list(&self) -> Result<Vec<ClusterInfoRecord>, StoreError> {
        let mut records = Vec::new();

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            // Nothing persisted yet.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            match self.read_record(&path).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable record");
                }
            }
        }

        records.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(records)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.record_path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_status(
        &self,
        name: &str,
        status: ClusterInfoStatus,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let path = self.record_path(name);
        let mut record = match self.read_record(&path).await {
            Ok(record) => record,
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e),
        };

        if record.metadata.resource_version != expected_version {
            return Err(StoreError::Conflict {
                name: name.to_string(),
                expected: expected_version,
                actual: record.metadata.resource_version,
            });
        }

        record.status = status;
        record.metadata.resource_version += 1;
        self.replace_record(&record).await
    }
}
