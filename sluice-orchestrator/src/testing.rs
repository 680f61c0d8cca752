//! Hand-rolled fakes shared by the crate's tests
//!
//! The executor fake keeps a tiny catalog of known tables so scripts behave
//! realistically: creating a table makes it visible to later statements,
//! and referencing a missing table fails the way an engine would.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::bail;
use async_trait::async_trait;

use sluice_core::domain::config::{ExecOptions, JobConfig, RunMode};
use sluice_core::domain::job::{Job, JobStatus};
use sluice_core::domain::plan::CompiledPlan;
use sluice_core::domain::statement::StatementUnit;
use sluice_gateway::{
    ClusterGateway, ConnectionProbe, GatewayOutcome, Result as GatewayResult, SavepointKind,
    SavepointOutcome,
};

use crate::context::JobContext;
use crate::executor::{ExecutionHandle, Executor, RunHandle};
use crate::hook::LifecycleHook;
use crate::pretreat::Pretreater;
use crate::store::ResultStore;

#[derive(Default)]
struct FakeState {
    tables: HashSet<String>,
    artifacts: Vec<PathBuf>,
    extensions: Vec<String>,
    executed: Vec<String>,
    compiled: Vec<Vec<String>>,
    cancelled_runs: Vec<String>,
    run_handle: Option<String>,
    submit_error: Option<String>,
    statement_error: Option<(String, String)>,
    extension_error: Option<String>,
    program_error: Option<String>,
    program_job_id: Option<String>,
    release_error: Option<String>,
    release_count: usize,
}

/// Fake engine executor with a shared, clonable state.
#[derive(Clone, Default)]
pub(crate) struct FakeExecutor {
    inner: Arc<Mutex<FakeState>>,
}

fn identifier_after(statement: &str, keyword: &str) -> Option<String> {
    let lowered = statement.to_lowercase();
    let start = lowered.find(keyword)? + keyword.len();
    let name: String = statement[start..]
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!name.is_empty()).then_some(name.to_lowercase())
}

impl FakeExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_table(self, name: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .tables
            .insert(name.to_lowercase());
        self
    }

    pub(crate) fn with_run_handle(self, id: &str) -> Self {
        self.inner.lock().unwrap().run_handle = Some(id.to_string());
        self
    }

    pub(crate) fn with_program_job_id(self, id: &str) -> Self {
        self.inner.lock().unwrap().program_job_id = Some(id.to_string());
        self
    }

    pub(crate) fn failing_submit(self, error: &str) -> Self {
        self.inner.lock().unwrap().submit_error = Some(error.to_string());
        self
    }

    pub(crate) fn failing_statement(self, prefix: &str, error: &str) -> Self {
        self.inner.lock().unwrap().statement_error =
            Some((prefix.to_string(), error.to_string()));
        self
    }

    pub(crate) fn failing_extension(self, error: &str) -> Self {
        self.inner.lock().unwrap().extension_error = Some(error.to_string());
        self
    }

    pub(crate) fn failing_program(self, error: &str) -> Self {
        self.inner.lock().unwrap().program_error = Some(error.to_string());
        self
    }

    pub(crate) fn failing_release(self, error: &str) -> Self {
        self.inner.lock().unwrap().release_error = Some(error.to_string());
        self
    }

    pub(crate) fn executed_statements(&self) -> Vec<String> {
        self.inner.lock().unwrap().executed.clone()
    }

    pub(crate) fn compiled_plans(&self) -> Vec<Vec<String>> {
        self.inner.lock().unwrap().compiled.clone()
    }

    pub(crate) fn registered_extensions(&self) -> Vec<String> {
        self.inner.lock().unwrap().extensions.clone()
    }

    pub(crate) fn cancelled_runs(&self) -> Vec<String> {
        self.inner.lock().unwrap().cancelled_runs.clone()
    }

    pub(crate) fn release_count(&self) -> usize {
        self.inner.lock().unwrap().release_count
    }

    fn check_tables(state: &FakeState, statement: &str) -> anyhow::Result<()> {
        for keyword in [" into ", " from "] {
            if let Some(name) = identifier_after(statement, keyword) {
                if !state.tables.contains(&name) {
                    bail!("table {} not found", name);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn execute_statement(&self, statement: &str) -> anyhow::Result<ExecutionHandle> {
        let mut state = self.inner.lock().unwrap();
        if let Some((prefix, error)) = &state.statement_error {
            if statement.starts_with(prefix.as_str()) {
                bail!("{}", error.clone());
            }
        }

        let lowered = statement.to_lowercase();
        let handle = if lowered.starts_with("create table") {
            if let Some(name) = identifier_after(statement, "create table ") {
                state.tables.insert(name);
            }
            ExecutionHandle::default()
        } else if lowered.starts_with("select") || lowered.starts_with("with") {
            Self::check_tables(&state, statement)?;
            ExecutionHandle::with_rows(
                vec!["v".to_string()],
                vec![
                    serde_json::json!(1),
                    serde_json::json!(2),
                    serde_json::json!(3),
                ],
            )
        } else if lowered.starts_with("show") {
            let mut names: Vec<&String> = state.tables.iter().collect();
            names.sort();
            ExecutionHandle::with_rows(
                vec!["table name".to_string()],
                names.iter().map(|n| serde_json::json!(n)).collect(),
            )
        } else if lowered.starts_with("insert") {
            Self::check_tables(&state, statement)?;
            ExecutionHandle {
                engine_job_id: Some(format!("run-{}", state.executed.len() + 1)),
                columns: vec!["v".to_string()],
                rows: vec![serde_json::json!(1)],
            }
        } else {
            ExecutionHandle::default()
        };
        state.executed.push(statement.to_string());
        Ok(handle)
    }

    async fn compile_plan(&self, statements: &[String]) -> anyhow::Result<CompiledPlan> {
        let mut state = self.inner.lock().unwrap();
        for statement in statements {
            Self::check_tables(&state, statement)?;
        }
        state.compiled.push(statements.to_vec());
        Ok(CompiledPlan::new(
            statements.to_vec(),
            serde_json::json!({ "nodes": statements.len() }),
        ))
    }

    async fn submit_plan(&self, _plan: &CompiledPlan) -> anyhow::Result<Option<RunHandle>> {
        let state = self.inner.lock().unwrap();
        if let Some(error) = &state.submit_error {
            bail!("{}", error.clone());
        }
        Ok(state
            .run_handle
            .as_ref()
            .map(|id| RunHandle { id: id.clone() }))
    }

    async fn cancel_run(&self, run_id: &str) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .cancelled_runs
            .push(run_id.to_string());
        Ok(())
    }

    async fn execute_program(&self, statement: &str) -> anyhow::Result<ExecutionHandle> {
        let mut state = self.inner.lock().unwrap();
        if let Some(error) = &state.program_error {
            bail!("{}", error.clone());
        }
        state.executed.push(statement.to_string());
        Ok(ExecutionHandle {
            engine_job_id: state.program_job_id.clone(),
            columns: vec![],
            rows: vec![],
        })
    }

    async fn register_extension(&self, statement: &str) -> anyhow::Result<()> {
        let mut state = self.inner.lock().unwrap();
        if let Some(error) = &state.extension_error {
            bail!("{}", error.clone());
        }
        state.extensions.push(statement.to_string());
        Ok(())
    }

    fn register_artifacts(&self, paths: &[PathBuf]) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .artifacts
            .extend(paths.iter().cloned());
        Ok(())
    }

    fn artifact_paths(&self) -> Vec<PathBuf> {
        self.inner.lock().unwrap().artifacts.clone()
    }

    fn release(&self) -> anyhow::Result<()> {
        let mut state = self.inner.lock().unwrap();
        state.release_count += 1;
        if let Some(error) = &state.release_error {
            bail!("{}", error.clone());
        }
        Ok(())
    }
}

#[derive(Default)]
struct GatewayCalls {
    plans: Vec<CompiledPlan>,
    artifacts: Vec<Vec<PathBuf>>,
    cancelled: Vec<String>,
}

/// Fake gateway answering every submission with one fixed outcome.
pub(crate) struct FakeGateway {
    outcome: GatewayOutcome,
    calls: Mutex<GatewayCalls>,
}

impl FakeGateway {
    pub(crate) fn accepting(engine_job_id: &str) -> Self {
        Self {
            outcome: GatewayOutcome::accepted(engine_job_id).with_endpoint("http://cluster:8081"),
            calls: Mutex::new(GatewayCalls::default()),
        }
    }

    pub(crate) fn rejecting(error: &str) -> Self {
        Self {
            outcome: GatewayOutcome::rejected(error),
            calls: Mutex::new(GatewayCalls::default()),
        }
    }

    pub(crate) fn submitted_plans(&self) -> Vec<CompiledPlan> {
        self.calls.lock().unwrap().plans.clone()
    }

    pub(crate) fn submitted_artifacts(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .unwrap()
            .artifacts
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub(crate) fn cancelled_jobs(&self) -> Vec<String> {
        self.calls.lock().unwrap().cancelled.clone()
    }
}

#[async_trait]
impl ClusterGateway for FakeGateway {
    async fn submit_plan(
        &self,
        plan: &CompiledPlan,
        artifacts: &[PathBuf],
    ) -> GatewayResult<GatewayOutcome> {
        let mut calls = self.calls.lock().unwrap();
        calls.plans.push(plan.clone());
        calls.artifacts.push(artifacts.to_vec());
        Ok(self.outcome.clone())
    }

    async fn submit_artifact(&self, artifacts: &[PathBuf]) -> GatewayResult<GatewayOutcome> {
        self.calls
            .lock()
            .unwrap()
            .artifacts
            .push(artifacts.to_vec());
        Ok(self.outcome.clone())
    }

    async fn deploy_cluster(&self) -> GatewayResult<GatewayOutcome> {
        Ok(self.outcome.clone())
    }

    async fn kill_cluster(&self) -> GatewayResult<()> {
        Ok(())
    }

    async fn cancel_job(&self, engine_job_id: &str) -> GatewayResult<bool> {
        self.calls
            .lock()
            .unwrap()
            .cancelled
            .push(engine_job_id.to_string());
        Ok(true)
    }

    async fn trigger_savepoint(
        &self,
        _engine_job_id: &str,
        _kind: SavepointKind,
        target_path: Option<&str>,
    ) -> GatewayResult<SavepointOutcome> {
        Ok(SavepointOutcome::written(
            target_path.unwrap_or("/savepoints/sp-test"),
        ))
    }

    async fn test_connection(&self) -> GatewayResult<ConnectionProbe> {
        Ok(ConnectionProbe {
            reachable: true,
            message: None,
        })
    }
}

/// Lifecycle hook that counts its callbacks.
#[derive(Default)]
pub(crate) struct RecordingHook {
    pub(crate) inits: AtomicUsize,
    pub(crate) successes: AtomicUsize,
    pub(crate) failures: AtomicUsize,
}

impl LifecycleHook for RecordingHook {
    fn on_init(&self, _job: &Job) {
        self.inits.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&self, _job: &Job) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failed(&self, _job: &Job) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}

/// Pretreats a script with a throwaway executor and default options.
pub(crate) fn units_for(script: &str) -> Vec<StatementUnit> {
    let executor = FakeExecutor::new();
    let options = ExecOptions::default();
    Pretreater::new(&executor, &options)
        .pretreat(script)
        .expect("pretreat test script")
}

/// Builds a local-mode context around the given executor and units.
pub(crate) fn fake_context(executor: FakeExecutor, units: Vec<StatementUnit>) -> JobContext {
    let mut job = Job::build(RunMode::Local, "test script");
    job.advance(JobStatus::Running);
    JobContext::new(
        job,
        Arc::new(JobConfig::new(RunMode::Local)),
        Arc::new(executor),
        None,
        Arc::new(ResultStore::new()),
        units,
    )
}
