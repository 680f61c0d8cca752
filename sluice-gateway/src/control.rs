//! Direct cluster REST control
//!
//! Talks to the compute cluster's own web endpoint for out-of-band control
//! (stop, savepoint) of an already-running job, bypassing the gateway. Used
//! when the cluster is directly reachable and the gateway path is not
//! preferred.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::SavepointKind;
use crate::error::{GatewayError, Result};
use crate::outcome::SavepointOutcome;

#[derive(Serialize)]
struct ControlSavepointRequest<'a> {
    kind: SavepointKind,
    target_path: Option<&'a str>,
}

#[derive(Deserialize)]
struct StopResponse {
    stopped: bool,
}

/// REST client for a cluster's own control endpoint
#[derive(Debug, Clone)]
pub struct ClusterControl {
    /// Web endpoint of the cluster (e.g., "http://jobmanager:8081")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl ClusterControl {
    /// Create a control client for the given cluster endpoint
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Get the cluster endpoint this client targets
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop a running job by engine-assigned id
    pub async fn stop_job(&self, engine_job_id: &str) -> Result<bool> {
        let url = format!("{}/jobs/{}/stop", self.base_url, engine_job_id);
        debug!("stopping job {} via {}", engine_job_id, url);
        let response = self.client.post(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GatewayError::api_error(status.as_u16(), error_text));
        }

        let body: StopResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::ParseError(format!("failed to parse JSON response: {}", e)))?;
        Ok(body.stopped)
    }

    /// Run a savepoint action against a running job
    pub async fn savepoint(
        &self,
        engine_job_id: &str,
        kind: SavepointKind,
        target_path: Option<&str>,
    ) -> Result<SavepointOutcome> {
        let url = format!("{}/jobs/{}/savepoints", self.base_url, engine_job_id);
        let response = self
            .client
            .post(&url)
            .json(&ControlSavepointRequest { kind, target_path })
            .send()
            .await?;

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
}
