//! Installed extension metadata collector.

use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::Value;

use crate::client::ClusterReader;

use super::traits::{CollectError, Collector};

/// Record key for extension data.
pub const EXTENSION_KEY: &str = "extension";

/// One installed extension's entry in the snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionRecord {
    /// Extension name.
    pub name: String,
    /// Installed version.
    pub version: String,
    /// Install time, RFC3339.
    pub ctime: String,
}

/// Collector for the `extension` record.
#[derive(Debug, Default)]
pub struct ExtensionCollector;

#[async_trait::async_trait]
impl Collector for ExtensionCollector {
    fn record_key(&self) -> &'static str {
        EXTENSION_KEY
    }

    async fn collect(&self, reader: &dyn ClusterReader) -> Result<Value, CollectError> {
        let installs = reader.list_extensions().await?;

        let records: Vec<ExtensionRecord> = installs
            .into_iter()
            .map(|install| ExtensionRecord {
                name: install.name,
                version: install.version,
                ctime: install
                    .install_time
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
            })
            .collect();

        Ok(serde_json::to_value(records)?)
    }
}
