use crate::error::{Result, RuntimeError};
use crate::traits::{DeleteOutcome, PodDeleter};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{DeleteOptions, Preconditions};
use podmender_core::PodUid;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on a single API request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Lightweight HTTP client for the repair controller to talk to the API server
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RuntimeError::api_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of a single pod
    pub fn pod_url(&self, namespace: &str, name: &str) -> String {
        format!(
            "{}/api/v1/namespaces/{}/pods/{}",
            self.base_url, namespace, name
        )
    }

    /// GET /api/v1/pods, restricted to one node when `node_name` is set
    pub async fn list_pods(&self, node_name: Option<&str>) -> Result<Vec<Pod>> {
        let url = format!("{}/api/v1/pods", self.base_url);
        debug!("GET {}", url);

        let mut request = self.client.get(&url);
        if let Some(node) = node_name {
            request = request.query(&[("fieldSelector", format!("spec.nodeName={}", node))]);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| RuntimeError::api_error(format!("Failed to list pods: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RuntimeError::api_error(format!(
                "List pods failed with status {}: {}",
                status, body
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| RuntimeError::api_error(format!("Failed to parse pod list: {}", e)))?;

        let items = body["items"].as_array().cloned().unwrap_or_default();
        let mut pods = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<Pod>(item) {
                Ok(p) => pods.push(p),
                Err(e) => warn!("Failed to parse pod from list: {}", e),
            }
        }
        Ok(pods)
    }
}

#[async_trait]
impl PodDeleter for ApiClient {
    /// DELETE /api/v1/namespaces/{namespace}/pods/{name} with a UID precondition
    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        uid: &PodUid,
    ) -> Result<DeleteOutcome> {
        let url = self.pod_url(namespace, name);
        debug!("DELETE {} (uid {})", url, uid);

        let options = DeleteOptions {
            preconditions: Some(Preconditions {
                uid: Some(uid.to_string()),
                resource_version: None,
            }),
            ..Default::default()
        };

        let resp = self
            .client
            .delete(&url)
            .json(&options)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RuntimeError::delete_timeout(namespace, name)
                } else {
                    RuntimeError::api_error(format!("HTTP request failed: {}", e))
                }
            })?;

        match resp.status() {
            s if s.is_success() => Ok(DeleteOutcome::Deleted),
            StatusCode::NOT_FOUND => Ok(DeleteOutcome::NotFound),
            // UID precondition failed: the name now belongs to a recreated pod
            StatusCode::CONFLICT => Ok(DeleteOutcome::NotFound),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(RuntimeError::delete_failed(
                    namespace,
                    name,
                    status.as_u16(),
                    body,
                ))
            }
        }
    }
}
