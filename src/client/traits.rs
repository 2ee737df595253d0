//! Read-only cluster-state access seam.

use thiserror::Error;

use super::types::{ClusterRegistration, ExtensionInstall, NodeInventory};

/// Errors from the cluster-state reader.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level request failure.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with an unexpected status code.
    #[error("unexpected status {status} from {path}")]
    Status {
        /// HTTP status code returned.
        status: u16,
        /// Request path that failed.
        path: String,
    },

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Reader configuration error.
    #[error("config error: {0}")]
    Config(String),
}

/// Read-only typed access to cluster-scoped resources.
///
/// Collectors never mutate cluster state; the reader is shared across all
/// concurrently running collectors.
#[async_trait::async_trait]
pub trait ClusterReader: Send + Sync {
    /// List all cluster registrations known to the host control plane.
    async fn list_clusters(&self) -> Result<Vec<ClusterRegistration>, ClientError>;

    /// List the node inventory of one cluster.
    async fn list_nodes(&self, cluster: &str) -> Result<Vec<NodeInventory>, ClientError>;

    /// Count the namespaces of one cluster.
    async fn count_namespaces(&self, cluster: &str) -> Result<u64, ClientError>;

    /// List installed extensions.
    async fn list_extensions(&self) -> Result<Vec<ExtensionInstall>, ClientError>;

    /// Count tenancy workspaces.
    async fn count_workspaces(&self) -> Result<u64, ClientError>;

    /// Count platform users.
    async fn count_users(&self) -> Result<u64, ClientError>;
}
