//! HTTP gateway implementation

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sluice_core::domain::plan::CompiledPlan;
use tracing::debug;

use crate::client::{ClusterGateway, SavepointKind};
use crate::error::{GatewayError, Result};
use crate::outcome::{ConnectionProbe, GatewayOutcome, SavepointOutcome};

#[derive(Serialize)]
struct SubmitPlanRequest<'a> {
    plan: &'a CompiledPlan,
    artifacts: &'a [PathBuf],
    cluster_id: Option<&'a str>,
}

#[derive(Serialize)]
struct SubmitArtifactRequest<'a> {
    artifacts: &'a [PathBuf],
    cluster_id: Option<&'a str>,
}

#[derive(Serialize)]
struct SavepointRequest<'a> {
    kind: SavepointKind,
    target_path: Option<&'a str>,
}

/// HTTP client for a remote cluster gateway
///
/// One instance is configured per deployment target: the base URL names the
/// gateway service, and the optional cluster id pins submissions to an
/// already-running session cluster.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    /// Base URL of the gateway (e.g., "http://localhost:8240")
    base_url: String,
    /// Session cluster to target, when submitting to a running cluster
    cluster_id: Option<String>,
    /// HTTP client instance
    client: Client,
}

impl HttpGateway {
    /// Create a new gateway client
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            cluster_id: None,
            client: Client::new(),
        }
    }

    /// Create a gateway client with a custom HTTP client
    ///
    /// This allows configuring timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            cluster_id: None,
            client,
        }
    }

    /// Pin submissions to an existing session cluster
    pub fn for_cluster(mut self, cluster_id: impl Into<String>) -> Self {
        self.cluster_id = Some(cluster_id.into());
        self
    }

    /// Get the base URL of the gateway
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GatewayError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::ParseError(format!("failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GatewayError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[async_trait]
impl ClusterGateway for HttpGateway {
    async fn submit_plan(
        &self,
        plan: &CompiledPlan,
        artifacts: &[PathBuf],
    ) -> Result<GatewayOutcome> {
        let url = format!("{}/v1/jobs/plan", self.base_url);
        debug!("submitting compiled plan to {}", url);
        let response = self
            .client
            .post(&url)
            .json(&SubmitPlanRequest {
                plan,
                artifacts,
                cluster_id: self.cluster_id.as_deref(),
            })
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn submit_artifact(&self, artifacts: &[PathBuf]) -> Result<GatewayOutcome> {
        let url = format!("{}/v1/jobs/artifact", self.base_url);
        debug!("submitting {} artifact(s) to {}", artifacts.len(), url);
        let response = self
            .client
            .post(&url)
            .json(&SubmitArtifactRequest {
                artifacts,
                cluster_id: self.cluster_id.as_deref(),
            })
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn deploy_cluster(&self) -> Result<GatewayOutcome> {
        let url = format!("{}/v1/clusters", self.base_url);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    async fn kill_cluster(&self) -> Result<()> {
        let cluster_id = self.cluster_id.as_deref().ok_or_else(|| {
            GatewayError::InvalidRequest("no cluster id configured for kill".to_string())
        })?;
        let url = format!("{}/v1/clusters/{}", self.base_url, cluster_id);
        let response = self.client.delete(&url).send().await?;

        self.handle_empty_response(response).await
    }

    async fn cancel_job(&self, engine_job_id: &str) -> Result<bool> {
        let url = format!("{}/v1/jobs/{}/cancel", self.base_url, engine_job_id);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    async fn trigger_savepoint(
        &self,
        engine_job_id: &str,
        kind: SavepointKind,
        target_path: Option<&str>,
    ) -> Result<SavepointOutcome> {
        let url = format!("{}/v1/jobs/{}/savepoints", self.base_url, engine_job_id);
        let response = self
            .client
            .post(&url)
            .json(&SavepointRequest { kind, target_path })
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn test_connection(&self) -> Result<ConnectionProbe> {
        let url = format!("{}/v1/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_creation() {
        let gateway = HttpGateway::new("http://localhost:8240");
        assert_eq!(gateway.base_url(), "http://localhost:8240");
    }

    #[test]
    fn test_gateway_trims_trailing_slash() {
        let gateway = HttpGateway::new("http://localhost:8240/");
        assert_eq!(gateway.base_url(), "http://localhost:8240");
    }

    #[test]
    fn test_gateway_with_custom_client() {
        let http_client = Client::new();
        let gateway =
            HttpGateway::with_client("http://localhost:8240", http_client).for_cluster("session-1");
        assert_eq!(gateway.base_url(), "http://localhost:8240");
        assert_eq!(gateway.cluster_id.as_deref(), Some("session-1"));
    }
}
