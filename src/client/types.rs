//! Typed cluster-state resources read by the collectors.
//!
//! These mirror the wire shapes served by the platform API. Field extraction
//! into snapshot records happens in the collectors, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered cluster as known to the host control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRegistration {
    /// Cluster name.
    pub name: String,
    /// Registration object UID.
    pub uid: String,
    /// Cluster identity assigned once the cluster is ready.
    ///
    /// Empty until the control plane has established the cluster's identity.
    #[serde(default)]
    pub nid: String,
    /// Whether this registration is the host (control-plane) cluster.
    #[serde(default)]
    pub host: bool,
    /// Platform version running on the cluster.
    #[serde(default)]
    pub platform_version: String,
    /// Kubernetes version running on the cluster.
    #[serde(default)]
    pub kubernetes_version: String,
}

/// Node inventory entry for one cluster member node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInventory {
    /// Node object UID.
    pub uid: String,
    /// Node name.
    pub name: String,
    /// Node roles (control-plane, worker, ...).
    #[serde(default)]
    pub roles: Vec<String>,
    /// CPU architecture.
    #[serde(default)]
    pub arch: String,
    /// Container runtime version string.
    #[serde(default)]
    pub container_runtime: String,
    /// Kernel version.
    #[serde(default)]
    pub kernel: String,
    /// kube-proxy version.
    #[serde(default)]
    pub kube_proxy: String,
    /// kubelet version.
    #[serde(default)]
    pub kubelet: String,
    /// Operating system family.
    #[serde(default)]
    pub os: String,
    /// Operating system image.
    #[serde(default)]
    pub os_image: String,
}

/// An installed extension record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionInstall {
    /// Extension name.
    pub name: String,
    /// Installed version.
    pub version: String,
    /// Installation time.
    pub install_time: DateTime<Utc>,
}

/// A named resource reference, used where only counts matter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource name.
    pub name: String,
}
