//! Local artifact sink.

use std::path::PathBuf;

use tokio::fs;
use tokio_util::sync::CancellationToken;

use crate::telemetry::Snapshot;

use super::{Report, ReportError};

/// Prefix of local snapshot artifacts.
const ARTIFACT_PREFIX: &str = "clusterInfo-";

/// Sink writing each snapshot to `clusterInfo-<RFC3339 ts>` in a directory.
#[derive(Debug, Clone)]
pub struct LocalReport {
    dir: PathBuf,
}

impl LocalReport {
    /// Create a sink writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn artifact_path(&self, snapshot: &Snapshot) -> Result<PathBuf, ReportError> {
        let ts = snapshot
            .get("ts")
            .and_then(serde_json::Value::as_str)
            .ok_or(ReportError::MissingTimestamp)?;
        Ok(self.dir.join(format!("{ARTIFACT_PREFIX}{ts}")))
    }
}

#[async_trait::async_trait]
impl Report for LocalReport {
    async fn save(
        &self,
        _cancel: &CancellationToken,
        snapshot: &Snapshot,
    ) -> Result<(), ReportError> {
        let path = self.artifact_path(snapshot)?;
        tracing::info!(path = %path.display(), "Saving snapshot to local artifact");

        fs::write(&path, serde_json::to_vec(snapshot)?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn snapshot(ts: &str, marker: u64) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert("ts".to_string(), json!(ts));
        snapshot.insert("platform".to_string(), json!({ "workspace": marker }));
        snapshot
    }

    #[tokio::test]
    async fn test_two_saves_two_artifacts_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let report = LocalReport::new(dir.path());
        let cancel = CancellationToken::new();

        let first = snapshot("2024-01-01T00:00:00Z", 1);
        let second = snapshot("2024-01-01T00:00:01Z", 2);
        report.save(&cancel, &first).await.unwrap();
        report.save(&cancel, &second).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().flatten().collect();
        assert_eq!(entries.len(), 2);

        let bytes = std::fs::read(dir.path().join("clusterInfo-2024-01-01T00:00:01Z")).unwrap();
        let decoded: Snapshot = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, second);
    }

    #[tokio::test]
    async fn test_missing_ts_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let report = LocalReport::new(dir.path());
        let cancel = CancellationToken::new();

        let err = report.save(&cancel, &Snapshot::new()).await.unwrap_err();
        assert!(matches!(err, ReportError::MissingTimestamp));
    }

    #[tokio::test]
    async fn test_unwritable_dir_fails() {
        let report = LocalReport::new("/nonexistent/beacon-test");
        let cancel = CancellationToken::new();

        let err = report
            .save(&cancel, &snapshot("2024-01-01T00:00:00Z", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Io(_)));
    }
}
