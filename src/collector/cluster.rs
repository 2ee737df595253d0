//! Cluster identity and node inventory collector.
//!
//! Produces the `clusters` record: one entry per registered cluster with its
//! role, identity, versions, namespace count, and node inventory. The cloud
//! sink later uses the host-role entry's `nid` as the delivery cluster id.

use serde::Serialize;
use serde_json::Value;

use crate::client::ClusterReader;
use crate::client::types::NodeInventory;

use super::traits::{CollectError, Collector};

/// Record key for cluster data.
pub const CLUSTERS_KEY: &str = "clusters";

/// Role of the host (control-plane) cluster.
pub const ROLE_HOST: &str = "host";

/// Role of a member cluster.
pub const ROLE_MEMBER: &str = "member";

/// One cluster's entry in the snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
    /// `host` or `member`.
    pub role: String,
    /// Cluster name.
    pub name: String,
    /// Registration object UID.
    pub uid: String,
    /// Cluster identity, used as the remote delivery cluster id.
    pub nid: String,
    /// Platform version.
    pub platform_version: String,
    /// Kubernetes version.
    pub kubernetes_version: String,
    /// Namespace count.
    pub namespace: u64,
    /// Node inventory.
    pub nodes: Vec<NodeRecord>,
}

/// One node's entry within a [`ClusterRecord`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    /// Node object UID.
    pub uid: String,
    /// Node name.
    pub name: String,
    /// Node roles.
    pub role: Vec<String>,
    /// CPU architecture.
    pub arch: String,
    /// Container runtime version.
    pub container_runtime: String,
    /// Kernel version.
    pub kernel: String,
    /// kube-proxy version.
    pub kube_proxy: String,
    /// kubelet version.
    pub kubelet: String,
    /// Operating system family.
    pub os: String,
    /// Operating system image.
    pub os_image: String,
}

impl From<NodeInventory> for NodeRecord {
    fn from(node: NodeInventory) -> Self {
        Self {
            uid: node.uid,
            name: node.name,
            role: node.roles,
            arch: node.arch,
            container_runtime: node.container_runtime,
            kernel: node.kernel,
            kube_proxy: node.kube_proxy,
            kubelet: node.kubelet,
            os: node.os,
            os_image: node.os_image,
        }
    }
}

/// Collector for the `clusters` record.
#[derive(Debug, Default)]
pub struct ClusterCollector;

#[async_trait::async_trait]
impl Collector for ClusterCollector {
    fn record_key(&self) -> &'static str {
        CLUSTERS_KEY
    }

    async fn collect(&self, reader: &dyn ClusterReader) -> Result<Value, CollectError> {
        let registrations = reader.list_clusters().await?;

        let mut records = Vec::with_capacity(registrations.len());
        for registration in registrations {
            // A registration without an identity means the cluster has not
            // finished joining; the whole cycle waits for the next run.
            if registration.nid.is_empty() {
                return Err(CollectError::NotReady(format!(
                    "cluster {} has no identity yet",
                    registration.name
                )));
            }

            let role = if registration.host {
                ROLE_HOST
            } else {
                ROLE_MEMBER
            };

            // Node and namespace lookups degrade per cluster rather than
            // failing the cycle; an unreachable member still gets reported.
            let nodes = match reader.list_nodes(&registration.name).await {
                Ok(nodes) => nodes.into_iter().map(NodeRecord::from).collect(),
                Err(e) => {
                    tracing::warn!(cluster = %registration.name, error = %e, "Failed to list nodes");
                    Vec::new()
                }
            };
            let namespace = match reader.count_namespaces(&registration.name).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!(cluster = %registration.name, error = %e, "Failed to count namespaces");
                    0
                }
            };

            records.push(ClusterRecord {
                role: role.to_string(),
                name: registration.name,
                uid: registration.uid,
                nid: registration.nid,
                platform_version: registration.platform_version,
                kubernetes_version: registration.kubernetes_version,
                namespace,
                nodes,
            });
        }

        Ok(serde_json::to_value(records)?)
    }
}
