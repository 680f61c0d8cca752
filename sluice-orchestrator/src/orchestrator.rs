//! Job orchestrator
//!
//! The façade driving one submission end to end: lifecycle state, stage
//! sequencing, error aggregation, status finalization, and exactly-once
//! release of the executor's per-submission scope. One instance handles
//! exactly one submission; reusing it is rejected.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use sluice_core::domain::config::JobConfig;
use sluice_core::domain::job::{Job, JobStatus};
use sluice_core::domain::result::TypedResult;
use sluice_core::domain::statement::{StatementKind, StatementUnit};
use sluice_gateway::{
    ClusterControl, ClusterGateway, ConnectionProbe, GatewayOutcome, SavepointKind,
    SavepointOutcome,
};

use crate::context::JobContext;
use crate::dispatch::Dispatcher;
use crate::error::{OrchestratorError, Result};
use crate::executor::Executor;
use crate::hook::{LifecycleHook, NoopHook};
use crate::pipeline;
use crate::pretreat::{Pretreater, quoted_paths};
use crate::settings::Settings;
use crate::sqltext::{add_line_numbers, split_statements};
use crate::store::ResultStore;
use crate::strategy::ResultStrategy;

/// Validation outcome for one statement of an explained script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainEntry {
    pub index: usize,
    pub kind: StatementKind,
    pub valid: bool,
    pub error: Option<String>,
}

/// Per-statement validation of a script without submitting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainReport {
    pub valid: bool,
    pub entries: Vec<ExplainEntry>,
}

/// Drives one submission through pretreatment, the stage pipeline, dispatch,
/// and finalization.
pub struct JobOrchestrator {
    config: Arc<JobConfig>,
    settings: Settings,
    executor: Arc<dyn Executor>,
    gateway: Option<Arc<dyn ClusterGateway>>,
    store: Arc<ResultStore>,
    hook: Arc<dyn LifecycleHook>,
    plan_only: bool,
    lifecycle: JobStatus,
    job: Option<Job>,
}

impl std::fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("plan_only", &self.plan_only)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

impl JobOrchestrator {
    /// Builds an orchestrator ready for one submission.
    pub fn build(
        config: JobConfig,
        executor: Arc<dyn Executor>,
        gateway: Option<Arc<dyn ClusterGateway>>,
        store: Arc<ResultStore>,
    ) -> Result<Self> {
        Self::init(config, executor, gateway, store, false)
    }

    /// Builds an orchestrator whose dispatcher is replaced by a compile-only
    /// path, for static plan inspection.
    pub fn build_plan_only(
        config: JobConfig,
        executor: Arc<dyn Executor>,
        store: Arc<ResultStore>,
    ) -> Result<Self> {
        let orchestrator = Self::init(config, executor, None, store, true)?;
        info!("built plan-only orchestrator");
        Ok(orchestrator)
    }

    fn init(
        config: JobConfig,
        executor: Arc<dyn Executor>,
        gateway: Option<Arc<dyn ClusterGateway>>,
        store: Arc<ResultStore>,
        plan_only: bool,
    ) -> Result<Self> {
        if !plan_only && config.run_mode.uses_gateway() && gateway.is_none() {
            return Err(OrchestratorError::InvalidSubmission(format!(
                "run mode {} requires a gateway",
                config.run_mode.as_str()
            )));
        }

        let settings = Settings::from_env().unwrap_or_else(|e| {
            warn!("invalid orchestration settings, using defaults: {}", e);
            Settings::default()
        });

        let mut config = config;
        if config.options.max_rows == 0 {
            config.options.max_rows = settings.default_max_rows;
        }

        debug!(
            "orchestrator initialized: mode {}, statement_set {}",
            config.run_mode.as_str(),
            config.options.statement_set
        );
        Ok(Self {
            config: Arc::new(config),
            settings,
            executor,
            gateway,
            store,
            hook: Arc::new(NoopHook),
            plan_only,
            lifecycle: JobStatus::Initialized,
            job: None,
        })
    }

    /// Installs a lifecycle observer.
    pub fn with_hook(mut self, hook: Arc<dyn LifecycleHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Overrides the process-level settings resolved from the environment.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn lifecycle(&self) -> JobStatus {
        self.lifecycle
    }

    /// The finalized job record of this orchestrator's submission, if one
    /// ran. Retained so callers can inspect FAILED submissions whose error
    /// was re-raised.
    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Retrieves a previously persisted result by job id, for asynchronous
    /// paging after the submitting call returned.
    pub fn fetch_result(store: &ResultStore, job_id: &str) -> Option<TypedResult> {
        store.get(job_id)
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.lifecycle != JobStatus::Initialized {
            return Err(OrchestratorError::InvalidSubmission(
                "orchestrator already drove a submission".to_string(),
            ));
        }
        Ok(())
    }

    /// Submits a full script: pretreatment, the four pipeline stages in
    /// order, dispatch, finalization, and scope release.
    ///
    /// Fatal errors (schema failures, dispatch exceptions) finalize the job
    /// as FAILED and are re-raised; the record stays available via
    /// [`JobOrchestrator::job`]. Non-exceptional failures (gateway
    /// rejection, missing run handle, per-statement errors) return the
    /// FAILED job normally.
    pub async fn submit_script(&mut self, script: &str) -> Result<Job> {
        self.ensure_ready()?;

        let mut job = Job::build(self.config.run_mode, script);
        job.cluster_address = self.config.cluster_address.clone();
        self.hook.on_init(&job);
        job.advance(JobStatus::Running);
        self.lifecycle = JobStatus::Running;
        info!(
            "job {} running in {} mode",
            job.id,
            self.config.run_mode.as_str()
        );

        let pretreated =
            Pretreater::new(self.executor.as_ref(), &self.config.options).pretreat(script);
        let units = match pretreated {
            Ok(units) => units,
            Err(e) => {
                if let Err(release_err) = self.executor.release() {
                    error!("scope release failed: {}", release_err);
                }
                job.fail(e.to_string());
                self.hook.on_failed(&job);
                self.lifecycle = JobStatus::Failed;
                self.job = Some(job);
                return Err(e);
            }
        };

        let mut ctx = JobContext::new(
            job,
            Arc::clone(&self.config),
            Arc::clone(&self.executor),
            self.gateway.clone(),
            Arc::clone(&self.store),
            units,
        );
        let outcome = self.run_stages(&mut ctx).await;
        self.finish(ctx, outcome)
    }

    /// Submits a pre-compiled artifact statement: the referenced artifact is
    /// registered and dispatched without statement staging.
    pub async fn submit_artifact_script(&mut self, statement: &str) -> Result<Job> {
        self.ensure_ready()?;

        let mut job = Job::build(self.config.run_mode, statement);
        job.cluster_address = self.config.cluster_address.clone();
        self.hook.on_init(&job);
        job.advance(JobStatus::Running);
        self.lifecycle = JobStatus::Running;

        let text = self.executor.pretreat_statement(statement);
        let unit = StatementUnit::new(0, text, StatementKind::Execute);
        let mut ctx = JobContext::new(
            job,
            Arc::clone(&self.config),
            Arc::clone(&self.executor),
            self.gateway.clone(),
            Arc::clone(&self.store),
            vec![unit],
        );
        let outcome = self.run_artifact(&mut ctx).await;
        self.finish(ctx, outcome)
    }

    async fn run_artifact(&self, ctx: &mut JobContext) -> Result<()> {
        let text = ctx.units[0].text.clone();
        ctx.units[0].stamp_start();

        let paths = quoted_paths(&text);
        if !paths.is_empty() {
            ctx.executor
                .register_artifacts(&paths)
                .map_err(OrchestratorError::Engine)?;
        }

        let compiled = ctx.executor.compile_plan(std::slice::from_ref(&text)).await;
        let mut plan = compiled.map_err(|e| {
            OrchestratorError::Dispatch(format!(
                "exception while submitting statement:\n{}\n{}",
                add_line_numbers(&text),
                e
            ))
        })?;
        if let Some(name) = &self.config.options.job_name {
            plan = plan.with_job_name(name.clone());
        }

        let dispatcher = Dispatcher::from_context(ctx);
        let outcome = dispatcher.dispatch(plan, &text).await?;
        match outcome.apply(&mut ctx.job) {
            None => {
                ctx.record_result(TypedResult::mutation_success(ctx.job.engine_job_id.clone()));
            }
            Some(reason) => {
                ctx.units[0].mark_error(reason.clone());
                ctx.record_failure_reason(reason.clone());
                ctx.record_result(TypedResult::error(reason));
            }
        }
        ctx.units[0].stamp_finish();
        Ok(())
    }

    async fn run_stages(&self, ctx: &mut JobContext) -> Result<()> {
        for stage in pipeline::stages() {
            debug!("running stage {}", stage.name());
            stage.run(ctx).await?;
        }
        Ok(())
    }

    /// Finalizes the job exactly once and releases the executor scope
    /// exactly once, on every exit path. A release failure never masks an
    /// in-flight error: it only surfaces when the submission itself was
    /// clean.
    fn finish(&mut self, mut ctx: JobContext, outcome: Result<()>) -> Result<Job> {
        let released = self.executor.release();
        if let Err(e) = &released {
            error!("scope release failed: {}", e);
        }

        let last_result = ctx.last_result().cloned();
        ctx.job.result = last_result;
        match outcome {
            Err(e) => {
                ctx.job.fail(e.to_string());
                self.hook.on_failed(&ctx.job);
                self.lifecycle = JobStatus::Failed;
                error!("job {} failed: {}", ctx.job.id, e);
                self.job = Some(ctx.job);
                Err(e)
            }
            Ok(()) if ctx.has_failed() => {
                let reason = ctx
                    .failure_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| ctx.statement_errors().join("\n"));
                ctx.job.fail(reason);
                self.hook.on_failed(&ctx.job);
                self.lifecycle = JobStatus::Failed;
                let job = ctx.job.clone();
                self.job = Some(ctx.job);
                Ok(job)
            }
            Ok(()) => {
                if let Err(e) = released {
                    ctx.job.fail(format!("scope release failed: {}", e));
                    self.hook.on_failed(&ctx.job);
                    self.lifecycle = JobStatus::Failed;
                    self.job = Some(ctx.job);
                    return Err(OrchestratorError::Engine(e));
                }
                ctx.job.succeed();
                self.hook.on_success(&ctx.job);
                self.lifecycle = JobStatus::Success;
                info!("job {} succeeded", ctx.job.id);
                let job = ctx.job.clone();
                self.job = Some(ctx.job);
                Ok(job)
            }
        }
    }

    /// Compile-only entry point: identical pretreatment and stage-building,
    /// but the dispatcher is replaced by plan capture. Returns the compiled
    /// plan's structural representation.
    pub async fn plan_script(&mut self, script: &str) -> Result<serde_json::Value> {
        if !self.plan_only {
            return Err(OrchestratorError::InvalidSubmission(
                "orchestrator was not built in plan-only mode".to_string(),
            ));
        }
        self.ensure_ready()?;
        self.lifecycle = JobStatus::Running;

        let units =
            Pretreater::new(self.executor.as_ref(), &self.config.options).pretreat(script)?;
        let job = Job::build(self.config.run_mode, script);
        let mut ctx = JobContext::new(
            job,
            Arc::clone(&self.config),
            Arc::clone(&self.executor),
            None,
            Arc::clone(&self.store),
            units,
        );
        ctx.plan_only = true;

        let outcome = self.run_stages(&mut ctx).await;
        if let Err(e) = self.executor.release() {
            error!("scope release failed: {}", e);
        }
        match outcome {
            Ok(()) => {
                self.lifecycle = JobStatus::Success;
                ctx.captured_plan.ok_or_else(|| {
                    OrchestratorError::InvalidSubmission(
                        "script contains no plannable statement".to_string(),
                    )
                })
            }
            Err(e) => {
                self.lifecycle = JobStatus::Failed;
                Err(e)
            }
        }
    }

    /// Executes only the schema/introspection statements of a script
    /// synchronously and returns the last statement's result. Mutations and
    /// queries are skipped; failures collapse into an error result instead
    /// of raising.
    pub async fn execute_schema_script(&self, script: &str) -> TypedResult {
        match self.try_execute_schema(script).await {
            Ok(Some(result)) => result,
            Ok(None) => TypedResult::Ack,
            Err(e) => {
                error!("schema script failed: {}", e);
                TypedResult::error(e.to_string())
            }
        }
    }

    async fn try_execute_schema(&self, script: &str) -> Result<Option<TypedResult>> {
        let mut last = None;
        for text in split_statements(script) {
            let text = self.executor.pretreat_statement(&text);
            if text.trim().is_empty() {
                continue;
            }
            let kind = StatementKind::classify(&text);
            if kind.is_mutation() || kind.is_query() || kind.is_program() {
                continue;
            }
            if kind.is_directive() {
                let paths = quoted_paths(&text);
                if !paths.is_empty() {
                    self.executor
                        .register_artifacts(&paths)
                        .map_err(OrchestratorError::Engine)?;
                }
            }
            let handle = self
                .executor
                .execute_statement(&text)
                .await
                .map_err(OrchestratorError::Engine)?;
            let strategy = ResultStrategy::select(kind, "", &self.config.options);
            last = Some(strategy.extract(&handle));
        }
        Ok(last)
    }

    /// Validates a script statement by statement without submitting it.
    /// Schema statements execute (later statements may depend on them);
    /// everything else only compiles.
    pub async fn explain_script(&self, script: &str) -> Result<ExplainReport> {
        let units =
            Pretreater::new(self.executor.as_ref(), &self.config.options).pretreat(script)?;
        let mut entries = Vec::with_capacity(units.len());

        for unit in &units {
            let entry = if let Some(error) = &unit.error {
                ExplainEntry {
                    index: unit.index,
                    kind: unit.kind,
                    valid: false,
                    error: Some(error.clone()),
                }
            } else if unit.kind.is_directive() {
                ExplainEntry {
                    index: unit.index,
                    kind: unit.kind,
                    valid: true,
                    error: None,
                }
            } else if unit.kind.is_schema() {
                let executed = self.executor.execute_statement(&unit.text).await;
                ExplainEntry {
                    index: unit.index,
                    kind: unit.kind,
                    valid: executed.is_ok(),
                    error: executed.err().map(|e| e.to_string()),
                }
            } else {
                let compiled = self
                    .executor
                    .compile_plan(std::slice::from_ref(&unit.text))
                    .await;
                ExplainEntry {
                    index: unit.index,
                    kind: unit.kind,
                    valid: compiled.is_ok(),
                    error: compiled.err().map(|e| e.to_string()),
                }
            };
            entries.push(entry);
        }

        Ok(ExplainReport {
            valid: entries.iter().all(|e| e.valid),
            entries,
        })
    }

    /// Renders the effective execution options as leading SET statements
    /// ahead of the pretreated script.
    pub fn export_script(&self, script: &str) -> String {
        let options = &self.config.options;
        let mut out = String::new();
        if let Some(name) = &options.job_name {
            out.push_str(&format!("SET pipeline.name = {};\n", name));
        }
        if let Some(parallelism) = options.parallelism {
            out.push_str(&format!("SET parallelism.default = {};\n", parallelism));
        }
        if let Some(interval) = options.checkpoint_interval_ms {
            out.push_str(&format!(
                "SET execution.checkpointing.interval = {};\n",
                interval
            ));
        }
        if let Some(path) = &options.savepoint_path {
            out.push_str(&format!("SET execution.savepoint.path = {};\n", path));
        }
        if self.config.run_mode.uses_gateway() {
            out.push_str(&format!(
                "SET execution.target = {};\n",
                self.config.run_mode.as_str()
            ));
        }
        out.push_str(&self.executor.pretreat_statement(script));
        out
    }

    /// Stops a running remote job by engine-assigned id, via the cluster's
    /// own control endpoint or the gateway's cancel path. Out-of-band: does
    /// not interact with an in-flight submission.
    pub async fn cancel_job(&self, engine_job_id: &str) -> Result<bool> {
        if self.config.run_mode.uses_gateway() && !self.settings.prefer_rest_control {
            let gateway = self.gateway.as_ref().ok_or_else(|| {
                OrchestratorError::InvalidSubmission("no gateway configured".to_string())
            })?;
            return Ok(gateway.cancel_job(engine_job_id).await?);
        }
        let address = self.config.cluster_address.as_ref().ok_or_else(|| {
            OrchestratorError::InvalidSubmission("no cluster address configured".to_string())
        })?;
        Ok(ClusterControl::new(address.clone())
            .stop_job(engine_job_id)
            .await?)
    }

    /// Runs a savepoint action against a running remote job.
    pub async fn savepoint(
        &self,
        engine_job_id: &str,
        kind: SavepointKind,
        target_path: Option<&str>,
    ) -> Result<SavepointOutcome> {
        if self.config.run_mode.uses_gateway() && !self.settings.prefer_rest_control {
            let gateway = self.gateway.as_ref().ok_or_else(|| {
                OrchestratorError::InvalidSubmission("no gateway configured".to_string())
            })?;
            return Ok(gateway
                .trigger_savepoint(engine_job_id, kind, target_path)
                .await?);
        }
        let address = self.config.cluster_address.as_ref().ok_or_else(|| {
            OrchestratorError::InvalidSubmission("no cluster address configured".to_string())
        })?;
        Ok(ClusterControl::new(address.clone())
            .savepoint(engine_job_id, kind, target_path)
            .await?)
    }
}

/// Deploys a long-running session cluster through a gateway.
pub async fn deploy_session_cluster(gateway: &dyn ClusterGateway) -> Result<GatewayOutcome> {
    Ok(gateway.deploy_cluster().await?)
}

/// Tears down the cluster a gateway is configured for.
pub async fn kill_cluster(gateway: &dyn ClusterGateway) -> Result<()> {
    Ok(gateway.kill_cluster().await?)
}

/// Probes a gateway for reachability.
pub async fn test_gateway(gateway: &dyn ClusterGateway) -> Result<ConnectionProbe> {
    Ok(gateway.test_connection().await?)
}
