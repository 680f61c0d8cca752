//! Engine executor seam
//!
//! The orchestration core drives the compute engine through this trait and
//! treats it as an opaque capability provider: statement execution, plan
//! compilation, asynchronous runtime submission, artifact/extension
//! registration, and release of the per-submission scope.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sluice_core::domain::plan::CompiledPlan;

/// Materialized output of one executed statement.
///
/// The engine buffers whatever the statement produced: a row stream for
/// queries, catalog entries for introspection, nothing for schema changes.
/// Result strategies interpret this into exactly one typed result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionHandle {
    /// Engine job id, present when the statement spawned a background job.
    pub engine_job_id: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Value>,
}

impl ExecutionHandle {
    pub fn with_rows(columns: Vec<String>, rows: Vec<serde_json::Value>) -> Self {
        Self {
            engine_job_id: None,
            columns,
            rows,
        }
    }
}

/// Handle to a plan accepted by the engine's own runtime.
///
/// Returned by asynchronous local submission; "accepted for execution", not
/// "finished".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub id: String,
}

/// The target compute engine of one submission.
///
/// Implementations own an isolated per-submission scope (classloader-like
/// artifact registry, session catalog); [`Executor::release`] tears that
/// scope down and is called exactly once per submission by the orchestrator.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Rewrites one raw statement before classification (variable
    /// substitution and similar engine-side pretreatment).
    fn pretreat_statement(&self, statement: &str) -> String {
        statement.trim().to_string()
    }

    /// Executes one statement synchronously against the session.
    async fn execute_statement(&self, statement: &str) -> anyhow::Result<ExecutionHandle>;

    /// Compiles statements into the engine's plan representation.
    async fn compile_plan(&self, statements: &[String]) -> anyhow::Result<CompiledPlan>;

    /// Submits a compiled plan to the engine's own runtime asynchronously.
    ///
    /// `None` means the engine accepted the call but returned no run handle;
    /// callers treat that as failure with no further detail.
    async fn submit_plan(&self, plan: &CompiledPlan) -> anyhow::Result<Option<RunHandle>>;

    /// Cancels a run previously accepted by [`Executor::submit_plan`].
    async fn cancel_run(&self, run_id: &str) -> anyhow::Result<()>;

    /// Hands a full custom program statement to the engine's general
    /// execution path.
    async fn execute_program(&self, statement: &str) -> anyhow::Result<ExecutionHandle>;

    /// Compiles and registers a function/extension declaration so later
    /// statements can reference it.
    async fn register_extension(&self, statement: &str) -> anyhow::Result<()>;

    /// Registers jar/file dependencies with the session's artifact loader.
    fn register_artifacts(&self, paths: &[PathBuf]) -> anyhow::Result<()>;

    /// Paths of all artifacts registered in this session.
    fn artifact_paths(&self) -> Vec<PathBuf>;

    /// Releases the per-submission scope (artifact loader, session catalog).
    fn release(&self) -> anyhow::Result<()>;
}
