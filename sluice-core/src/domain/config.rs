//! Submission configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Target run mode for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Execute through the in-process engine runtime.
    Local,
    /// Submit to an already-running cluster through the gateway.
    SessionCluster,
    /// Compile locally, deploy a one-shot cluster per job.
    PerJobCluster,
    /// Forward the artifact to the gateway; compilation happens remotely.
    ApplicationCluster,
}

impl RunMode {
    /// Whether submission goes through the remote gateway.
    pub fn uses_gateway(self) -> bool {
        !matches!(self, RunMode::Local)
    }

    /// Whether the gateway compiles the artifact remotely.
    pub fn is_application(self) -> bool {
        matches!(self, RunMode::ApplicationCluster)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Local => "local",
            RunMode::SessionCluster => "session-cluster",
            RunMode::PerJobCluster => "per-job-cluster",
            RunMode::ApplicationCluster => "application-cluster",
        }
    }
}

/// Execution options applied to the engine session.
///
/// `max_rows` caps how many rows a query result retains; zero means "use the
/// process default" resolved by the orchestrator's settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOptions {
    pub job_name: Option<String>,
    pub parallelism: Option<u32>,
    pub checkpoint_interval_ms: Option<u64>,
    pub savepoint_path: Option<String>,
    /// Batch multiple INSERT statements into one combined execution unit.
    pub statement_set: bool,
    pub max_rows: usize,
    pub time_zone: Option<String>,
    /// Expose change-log rows instead of materialized rows for queries.
    pub use_changelog: bool,
    /// Stop the backing engine job once a capped query result is collected.
    pub auto_cancel: bool,
    /// Rewrite INSERT statements to target a simulated sink.
    pub mock_sink: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            job_name: None,
            parallelism: None,
            checkpoint_interval_ms: None,
            savepoint_path: None,
            statement_set: false,
            max_rows: 100,
            time_zone: None,
            use_changelog: false,
            auto_cancel: false,
            mock_sink: false,
        }
    }
}

/// Deployment parameters for gateway-backed run modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayParams {
    /// Base URL of the gateway service.
    pub endpoint: String,
    /// Identifier of an existing cluster, required for session mode.
    pub cluster_id: Option<String>,
    /// Jar/file dependencies shipped alongside the submission.
    pub artifact_paths: Vec<PathBuf>,
}

/// Immutable submission intent, created once per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub run_mode: RunMode,
    pub options: ExecOptions,
    pub gateway: Option<GatewayParams>,
    /// Web endpoint of the target cluster, used for direct REST control.
    pub cluster_address: Option<String>,
}

impl JobConfig {
    pub fn new(run_mode: RunMode) -> Self {
        Self {
            run_mode,
            options: ExecOptions::default(),
            gateway: None,
            cluster_address: None,
        }
    }

    pub fn with_options(mut self, options: ExecOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_gateway(mut self, gateway: GatewayParams) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_cluster_address(mut self, address: impl Into<String>) -> Self {
        self.cluster_address = Some(address.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_gateway_split() {
        assert!(!RunMode::Local.uses_gateway());
        assert!(RunMode::SessionCluster.uses_gateway());
        assert!(RunMode::PerJobCluster.uses_gateway());
        assert!(RunMode::ApplicationCluster.uses_gateway());
        assert!(RunMode::ApplicationCluster.is_application());
        assert!(!RunMode::PerJobCluster.is_application());
    }

    #[test]
    fn test_default_options() {
        let options = ExecOptions::default();
        assert_eq!(options.max_rows, 100);
        assert!(!options.statement_set);
        assert!(!options.use_changelog);
        assert!(!options.mock_sink);
    }

    #[test]
    fn test_config_builders() {
        let config = JobConfig::new(RunMode::PerJobCluster)
            .with_gateway(GatewayParams {
                endpoint: "http://gateway:8240".to_string(),
                cluster_id: None,
                artifact_paths: vec![],
            })
            .with_cluster_address("http://cluster:8081");
        assert_eq!(config.run_mode, RunMode::PerJobCluster);
        assert!(config.gateway.is_some());
        assert_eq!(config.cluster_address.as_deref(), Some("http://cluster:8081"));
    }
}
