//! Submission-scoped pipeline state
//!
//! One `JobContext` exists per submission and is owned by the orchestrator
//! driving it; stages mutate it sequentially on the orchestrating task, so
//! no locking is involved. The failed flag is sticky: once set it stays set
//! for the rest of the submission.

use std::sync::Arc;

use sluice_core::domain::config::JobConfig;
use sluice_core::domain::job::Job;
use sluice_core::domain::result::TypedResult;
use sluice_core::domain::statement::StatementUnit;

use crate::executor::Executor;
use crate::store::ResultStore;
use sluice_gateway::ClusterGateway;

/// Shared mutable state threaded through the pipeline stages.
pub struct JobContext {
    pub job: Job,
    pub config: Arc<JobConfig>,
    pub executor: Arc<dyn Executor>,
    pub gateway: Option<Arc<dyn ClusterGateway>>,
    pub store: Arc<ResultStore>,
    pub units: Vec<StatementUnit>,
    pub results: Vec<TypedResult>,
    /// Compile-only mode: stages build plans but never dispatch.
    pub plan_only: bool,
    /// Structural plan captured in compile-only mode.
    pub captured_plan: Option<serde_json::Value>,
    failed: bool,
    failure_reason: Option<String>,
}

impl JobContext {
    pub fn new(
        job: Job,
        config: Arc<JobConfig>,
        executor: Arc<dyn Executor>,
        gateway: Option<Arc<dyn ClusterGateway>>,
        store: Arc<ResultStore>,
        units: Vec<StatementUnit>,
    ) -> Self {
        let failed = units.iter().any(|u| u.error.is_some());
        Self {
            job,
            config,
            executor,
            gateway,
            store,
            units,
            results: Vec::new(),
            plan_only: false,
            captured_plan: None,
            failed,
            failure_reason: None,
        }
    }

    /// Marks the submission as failed; never cleared within one submission.
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Records the submission's failure reason verbatim. The first recorded
    /// reason wins; later ones only mark the flag.
    pub fn record_failure_reason(&mut self, reason: impl Into<String>) {
        if self.failure_reason.is_none() {
            self.failure_reason = Some(reason.into());
        }
        self.failed = true;
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn record_result(&mut self, result: TypedResult) {
        if result.is_error() {
            self.failed = true;
        }
        self.results.push(result);
    }

    /// The last retained result, which becomes the job's final payload.
    pub fn last_result(&self) -> Option<&TypedResult> {
        self.results.last()
    }

    /// Errors collected on individual statements, in script order.
    pub fn statement_errors(&self) -> Vec<String> {
        self.units
            .iter()
            .filter_map(|u| {
                u.error
                    .as_ref()
                    .map(|e| format!("statement {}: {}", u.index + 1, e))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_context, FakeExecutor};
    use sluice_core::domain::statement::{StatementKind, StatementUnit};

    #[test]
    fn test_failed_flag_is_sticky() {
        let mut ctx = fake_context(FakeExecutor::new(), vec![]);
        assert!(!ctx.has_failed());
        ctx.mark_failed();
        assert!(ctx.has_failed());
    }

    #[test]
    fn test_error_result_sets_failed() {
        let mut ctx = fake_context(FakeExecutor::new(), vec![]);
        ctx.record_result(TypedResult::Ack);
        assert!(!ctx.has_failed());
        ctx.record_result(TypedResult::error("boom"));
        assert!(ctx.has_failed());
        assert!(ctx.last_result().unwrap().is_error());
    }

    #[test]
    fn test_pretreat_errors_seed_failed_flag() {
        let mut unit = StatementUnit::new(0, "ADD JAR", StatementKind::AddJar);
        unit.mark_error("no path");
        let ctx = fake_context(FakeExecutor::new(), vec![unit]);
        assert!(ctx.has_failed());
        assert_eq!(ctx.statement_errors(), vec!["statement 1: no path"]);
    }
}
