//! Gateway trait
//!
//! The submission-target seam between the orchestrator and whatever deploys
//! jobs remotely. Implementations decide how "submit" maps onto their
//! deployment variant (session vs per-job vs application); the orchestrator
//! only sees normalized outcomes.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sluice_core::domain::plan::CompiledPlan;

use crate::error::Result;
use crate::outcome::{ConnectionProbe, GatewayOutcome, SavepointOutcome};

/// Kind of savepoint action to run against a remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavepointKind {
    /// Write a savepoint, keep the job running.
    Trigger,
    /// Write a savepoint, then stop the job gracefully.
    Stop,
    /// Cancel the job with a final savepoint.
    Cancel,
}

/// A remote submission target.
///
/// `submit_plan` carries a locally compiled plan plus resolved artifact
/// paths (per-job deployment). `submit_artifact` carries only artifacts:
/// for application deployment the gateway compiles remotely, for session
/// deployment it targets the already-running cluster it was configured with.
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    async fn submit_plan(
        &self,
        plan: &CompiledPlan,
        artifacts: &[PathBuf],
    ) -> Result<GatewayOutcome>;

    async fn submit_artifact(&self, artifacts: &[PathBuf]) -> Result<GatewayOutcome>;

    /// Deploy a long-running session cluster and report its endpoint.
    async fn deploy_cluster(&self) -> Result<GatewayOutcome>;

    /// Tear down the cluster this gateway is configured for.
    async fn kill_cluster(&self) -> Result<()>;

    /// Cancel a running job by engine-assigned id.
    async fn cancel_job(&self, engine_job_id: &str) -> Result<bool>;

    async fn trigger_savepoint(
        &self,
        engine_job_id: &str,
        kind: SavepointKind,
        target_path: Option<&str>,
    ) -> Result<SavepointOutcome>;

    async fn test_connection(&self) -> Result<ConnectionProbe>;
}
