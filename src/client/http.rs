//! HTTP-backed cluster-state reader.
//!
//! Reads the platform API's list endpoints with `reqwest` and decodes them
//! into the typed resources in [`crate::client::types`].

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use super::traits::{ClientError, ClusterReader};
use super::types::{ClusterRegistration, ExtensionInstall, NodeInventory, ResourceRef};

/// Default per-request timeout (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Cluster-state reader backed by the platform REST API.
pub struct HttpClusterReader {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpClusterReader {
    /// Create a reader for the given API base URL.
    ///
    /// # Errors
    /// Returns `ClientError::Config` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for HttpClusterReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClusterReader")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ClusterReader for HttpClusterReader {
    async fn list_clusters(&self) -> Result<Vec<ClusterRegistration>, ClientError> {
        self.get_json("/clusterinfo/v1/clusters").await
    }

    async fn list_nodes(&self, cluster: &str) -> Result<Vec<NodeInventory>, ClientError> {
        self.get_json(&format!("/clusterinfo/v1/clusters/{cluster}/nodes"))
            .await
    }

    async fn count_namespaces(&self, cluster: &str) -> Result<u64, ClientError> {
        let namespaces: Vec<ResourceRef> = self
            .get_json(&format!("/clusterinfo/v1/clusters/{cluster}/namespaces"))
            .await?;
        Ok(namespaces.len() as u64)
    }

    async fn list_extensions(&self) -> Result<Vec<ExtensionInstall>, ClientError> {
        self.get_json("/clusterinfo/v1/extensions").await
    }

    async fn count_workspaces(&self) -> Result<u64, ClientError> {
        let workspaces: Vec<ResourceRef> = self.get_json("/clusterinfo/v1/workspaces").await?;
        Ok(workspaces.len() as u64)
    }

    async fn count_users(&self) -> Result<u64, ClientError> {
        let users: Vec<ResourceRef> = self.get_json("/clusterinfo/v1/users").await?;
        Ok(users.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    async fn start_api_server() -> String {
        let router = Router::new()
            .route(
                "/clusterinfo/v1/clusters",
                get(|| async {
                    Json(json!([
                        {"name": "host", "uid": "u-1", "nid": "n-1", "host": true},
                        {"name": "member-a", "uid": "u-2", "nid": "n-2"}
                    ]))
                }),
            )
            .route(
                "/clusterinfo/v1/clusters/{cluster}/namespaces",
                get(|| async { Json(json!([{"name": "default"}, {"name": "kube-system"}])) }),
            )
            .route(
                "/clusterinfo/v1/users",
                get(|| async { Json(json!([{"name": "admin"}])) }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_list_clusters_decodes_defaults() {
        let base = start_api_server().await;
        let reader = HttpClusterReader::new(&base, None).unwrap();

        let clusters = reader.list_clusters().await.unwrap();
        assert_eq!(clusters.len(), 2);
        assert!(clusters[0].host);
        assert_eq!(clusters[0].nid, "n-1");
        assert!(!clusters[1].host);
        assert_eq!(clusters[1].platform_version, "");
    }

    #[tokio::test]
    async fn test_counts_from_list_endpoints() {
        let base = start_api_server().await;
        let reader = HttpClusterReader::new(&base, None).unwrap();

        assert_eq!(reader.count_namespaces("host").await.unwrap(), 2);
        assert_eq!(reader.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unexpected_status_is_an_error() {
        let base = start_api_server().await;
        let reader = HttpClusterReader::new(&base, None).unwrap();

        let err = reader.list_extensions().await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 404, .. }));
    }
}
