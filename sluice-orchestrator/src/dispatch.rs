//! Execution dispatcher
//!
//! Chooses the submission target once per job: the in-process engine runtime
//! or the remote gateway in one of its deployment variants. Both paths
//! normalize into a [`DispatchOutcome`] folded into the job record. Dispatch
//! never swallows an exception: failures are formatted with the originating
//! statement's line-numbered text and re-raised after being recorded.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use sluice_core::domain::config::{JobConfig, RunMode};
use sluice_core::domain::job::Job;
use sluice_core::domain::plan::{CompiledPlan, SavepointRestore};
use sluice_gateway::{ClusterGateway, GatewayOutcome};

use crate::context::JobContext;
use crate::error::{OrchestratorError, Result};
use crate::executor::{Executor, RunHandle};
use crate::sqltext::add_line_numbers;

/// Normalized result of one dispatch.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// Local asynchronous submission; `None` means the engine returned no
    /// run handle.
    Local(Option<RunHandle>),
    Gateway(GatewayOutcome),
}

impl DispatchOutcome {
    /// Folds the outcome into the job record.
    ///
    /// Returns the failure message when the outcome is a rejection; the
    /// caller records it and finalizes the job as FAILED. Assigned ids are
    /// copied from the outcome verbatim.
    pub fn apply(&self, job: &mut Job) -> Option<String> {
        match self {
            DispatchOutcome::Local(Some(handle)) => {
                job.engine_job_id = Some(handle.id.clone());
                job.task_ids = vec![handle.id.clone()];
                None
            }
            DispatchOutcome::Local(None) => Some("engine returned no run handle".to_string()),
            DispatchOutcome::Gateway(outcome) => {
                job.engine_job_id = outcome.engine_job_id.clone();
                job.task_ids = outcome.task_ids.clone();
                job.cluster_address = outcome.web_endpoint.clone();
                if outcome.success {
                    None
                } else {
                    Some(
                        outcome
                            .error
                            .clone()
                            .unwrap_or_else(|| "gateway rejected the submission".to_string()),
                    )
                }
            }
        }
    }
}

/// Submission-target selector for one job.
pub struct Dispatcher {
    config: Arc<JobConfig>,
    executor: Arc<dyn Executor>,
    gateway: Option<Arc<dyn ClusterGateway>>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<JobConfig>,
        executor: Arc<dyn Executor>,
        gateway: Option<Arc<dyn ClusterGateway>>,
    ) -> Self {
        Self {
            config,
            executor,
            gateway,
        }
    }

    pub fn from_context(ctx: &JobContext) -> Self {
        Self::new(
            Arc::clone(&ctx.config),
            Arc::clone(&ctx.executor),
            ctx.gateway.clone(),
        )
    }

    /// Submits a compiled plan to the configured target.
    ///
    /// `origin` is the statement text the plan was compiled from, used only
    /// for diagnostics.
    pub async fn dispatch(&self, mut plan: CompiledPlan, origin: &str) -> Result<DispatchOutcome> {
        match self.config.run_mode {
            RunMode::Local => {
                let handle = self
                    .executor
                    .submit_plan(&plan)
                    .await
                    .map_err(|e| self.dispatch_error(origin, &e.to_string()))?;
                info!(
                    "local dispatch {}",
                    handle
                        .as_ref()
                        .map(|h| format!("accepted as {}", h.id))
                        .unwrap_or_else(|| "returned no run handle".to_string())
                );
                Ok(DispatchOutcome::Local(handle))
            }
            RunMode::ApplicationCluster => {
                let artifacts = self.resolve_artifacts();
                if artifacts.is_empty() {
                    return Err(OrchestratorError::InvalidSubmission(
                        "application deployment requires at least one artifact".to_string(),
                    ));
                }
                let outcome = self
                    .gateway()?
                    .submit_artifact(&artifacts)
                    .await
                    .map_err(|e| self.dispatch_error(origin, &e.to_string()))?;
                Ok(DispatchOutcome::Gateway(outcome))
            }
            RunMode::PerJobCluster => {
                if let Some(path) = &self.config.options.savepoint_path {
                    plan.savepoint = Some(SavepointRestore {
                        path: path.clone(),
                        allow_unclaimed_state: true,
                    });
                }
                let artifacts = self.resolve_artifacts();
                let outcome = self
                    .gateway()?
                    .submit_plan(&plan, &artifacts)
                    .await
                    .map_err(|e| self.dispatch_error(origin, &e.to_string()))?;
                Ok(DispatchOutcome::Gateway(outcome))
            }
            RunMode::SessionCluster => {
                let artifacts = self.resolve_artifacts();
                let outcome = self
                    .gateway()?
                    .submit_artifact(&artifacts)
                    .await
                    .map_err(|e| self.dispatch_error(origin, &e.to_string()))?;
                Ok(DispatchOutcome::Gateway(outcome))
            }
        }
    }

    fn gateway(&self) -> Result<&Arc<dyn ClusterGateway>> {
        self.gateway.as_ref().ok_or_else(|| {
            OrchestratorError::InvalidSubmission(format!(
                "run mode {} requires a gateway",
                self.config.run_mode.as_str()
            ))
        })
    }

    /// Jar/file dependencies resolved to local filesystem locations:
    /// configured deployment artifacts first, then session-registered ones.
    fn resolve_artifacts(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .config
            .gateway
            .as_ref()
            .map(|g| g.artifact_paths.clone())
            .unwrap_or_default();
        paths.extend(self.executor.artifact_paths());
        paths
            .into_iter()
            .map(|p| std::fs::canonicalize(&p).unwrap_or(p))
            .collect()
    }

    fn dispatch_error(&self, origin: &str, detail: &str) -> OrchestratorError {
        let message = format!(
            "exception while submitting statement:\n{}\n{}",
            add_line_numbers(origin),
            detail
        );
        error!("{}", message);
        OrchestratorError::Dispatch(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeExecutor, FakeGateway};
    use sluice_core::domain::config::GatewayParams;

    fn plan() -> CompiledPlan {
        CompiledPlan::new(
            vec!["INSERT INTO t SELECT * FROM s".to_string()],
            serde_json::json!({"nodes": 1}),
        )
    }

    fn gateway_config(run_mode: RunMode) -> JobConfig {
        JobConfig::new(run_mode).with_gateway(GatewayParams {
            endpoint: "http://gateway:8240".to_string(),
            cluster_id: Some("session-1".to_string()),
            artifact_paths: vec![PathBuf::from("/opt/job.jar")],
        })
    }

    #[tokio::test]
    async fn test_local_dispatch_returns_handle() {
        let executor = FakeExecutor::new().with_run_handle("run-1");
        let dispatcher = Dispatcher::new(
            Arc::new(JobConfig::new(RunMode::Local)),
            Arc::new(executor),
            None,
        );
        let outcome = dispatcher.dispatch(plan(), "INSERT ...").await.unwrap();

        let mut job = Job::build(RunMode::Local, "INSERT ...");
        assert!(outcome.apply(&mut job).is_none());
        assert_eq!(job.engine_job_id.as_deref(), Some("run-1"));
        assert_eq!(job.task_ids, vec!["run-1".to_string()]);
    }

    #[tokio::test]
    async fn test_local_dispatch_without_handle_is_failure() {
        let executor = FakeExecutor::new(); // no run handle configured
        let dispatcher = Dispatcher::new(
            Arc::new(JobConfig::new(RunMode::Local)),
            Arc::new(executor),
            None,
        );
        let outcome = dispatcher.dispatch(plan(), "INSERT ...").await.unwrap();

        let mut job = Job::build(RunMode::Local, "INSERT ...");
        let failure = outcome.apply(&mut job);
        assert_eq!(failure.as_deref(), Some("engine returned no run handle"));
        assert!(job.engine_job_id.is_none());
    }

    #[tokio::test]
    async fn test_per_job_dispatch_attaches_savepoint_and_artifacts() {
        let mut config = gateway_config(RunMode::PerJobCluster);
        config.options.savepoint_path = Some("/savepoints/sp-1".to_string());
        let gateway = Arc::new(FakeGateway::accepting("engine-9"));
        let dispatcher = Dispatcher::new(
            Arc::new(config),
            Arc::new(FakeExecutor::new()),
            Some(gateway.clone() as Arc<dyn ClusterGateway>),
        );

        let outcome = dispatcher.dispatch(plan(), "INSERT ...").await.unwrap();
        let mut job = Job::build(RunMode::PerJobCluster, "INSERT ...");
        assert!(outcome.apply(&mut job).is_none());
        assert_eq!(job.engine_job_id.as_deref(), Some("engine-9"));

        let submitted = gateway.submitted_plans();
        assert_eq!(submitted.len(), 1);
        assert_eq!(
            submitted[0].savepoint.as_ref().map(|s| s.path.as_str()),
            Some("/savepoints/sp-1")
        );
        assert_eq!(
            gateway.submitted_artifacts(),
            vec![PathBuf::from("/opt/job.jar")]
        );
    }

    #[tokio::test]
    async fn test_session_dispatch_submits_artifacts_only() {
        let gateway = Arc::new(FakeGateway::accepting("engine-2"));
        let dispatcher = Dispatcher::new(
            Arc::new(gateway_config(RunMode::SessionCluster)),
            Arc::new(FakeExecutor::new()),
            Some(gateway.clone() as Arc<dyn ClusterGateway>),
        );

        dispatcher.dispatch(plan(), "INSERT ...").await.unwrap();
        assert!(gateway.submitted_plans().is_empty());
        assert_eq!(
            gateway.submitted_artifacts(),
            vec![PathBuf::from("/opt/job.jar")]
        );
    }

    #[tokio::test]
    async fn test_application_dispatch_requires_artifact() {
        let gateway = Arc::new(FakeGateway::accepting("engine-3"));
        let dispatcher = Dispatcher::new(
            Arc::new(JobConfig::new(RunMode::ApplicationCluster)),
            Arc::new(FakeExecutor::new()),
            Some(gateway as Arc<dyn ClusterGateway>),
        );
        let err = dispatcher.dispatch(plan(), "EXECUTE ...").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidSubmission(_)));
    }

    #[tokio::test]
    async fn test_gateway_rejection_applies_error_without_ids() {
        let gateway = Arc::new(FakeGateway::rejecting("insufficient resources"));
        let dispatcher = Dispatcher::new(
            Arc::new(gateway_config(RunMode::PerJobCluster)),
            Arc::new(FakeExecutor::new()),
            Some(gateway as Arc<dyn ClusterGateway>),
        );

        let outcome = dispatcher.dispatch(plan(), "INSERT ...").await.unwrap();
        let mut job = Job::build(RunMode::PerJobCluster, "INSERT ...");
        let failure = outcome.apply(&mut job);
        assert_eq!(failure.as_deref(), Some("insufficient resources"));
        assert!(job.engine_job_id.is_none());
        assert!(job.task_ids.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_error_is_line_numbered() {
        let executor = FakeExecutor::new().failing_submit("runtime unavailable");
        let dispatcher = Dispatcher::new(
            Arc::new(JobConfig::new(RunMode::Local)),
            Arc::new(executor),
            None,
        );
        let err = dispatcher
            .dispatch(plan(), "INSERT INTO t\nSELECT * FROM s")
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("1: INSERT INTO t"));
        assert!(message.contains("2: SELECT * FROM s"));
        assert!(message.contains("runtime unavailable"));
    }
}
