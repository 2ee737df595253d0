//! Tenancy count collector.

use serde::Serialize;
use serde_json::Value;

use crate::client::ClusterReader;

use super::traits::{CollectError, Collector};

/// Record key for platform tenancy data.
pub const PLATFORM_KEY: &str = "platform";

/// Tenancy counts entry in the snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformRecord {
    /// Number of workspaces.
    pub workspace: u64,
    /// Number of users.
    pub user: u64,
}

/// Collector for the `platform` record.
#[derive(Debug, Default)]
pub struct PlatformCollector;

#[async_trait::async_trait]
impl Collector for PlatformCollector {
    fn record_key(&self) -> &'static str {
        PLATFORM_KEY
    }

    async fn collect(&self, reader: &dyn ClusterReader) -> Result<Value, CollectError> {
        let workspace = reader.count_workspaces().await?;
        let user = reader.count_users().await?;

        Ok(serde_json::to_value(PlatformRecord { workspace, user })?)
    }
}
