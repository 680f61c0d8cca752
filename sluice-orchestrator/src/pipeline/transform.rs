//! Transform execution stage

use async_trait::async_trait;
use tracing::{debug, info, warn};

use sluice_core::domain::result::TypedResult;
use sluice_core::domain::statement::StatementKind;

use crate::context::JobContext;
use crate::dispatch::Dispatcher;
use crate::error::{OrchestratorError, Result};
use crate::pipeline::PipelineStage;
use crate::sqltext::add_line_numbers;
use crate::strategy::ResultStrategy;

/// Executes insert/select/show/desc statements.
///
/// Inserts compile into a plan and go through the dispatcher; under
/// statement-set mode all inserts of the script batch into one combined
/// execution unit so they share a single plan. Queries and introspection
/// execute directly against the session, and their per-statement failures do
/// not abort the script.
pub struct TransformStage;

impl TransformStage {
    /// Compiles statements and hands the plan to the configured target,
    /// folding the outcome into the job. In plan-only mode the plan is
    /// captured instead of dispatched.
    async fn compile_and_dispatch(
        &self,
        ctx: &mut JobContext,
        indices: &[usize],
    ) -> Result<()> {
        let texts: Vec<String> = indices.iter().map(|i| ctx.units[*i].text.clone()).collect();
        let origin = texts.join(";\n");

        for idx in indices {
            ctx.units[*idx].stamp_start();
        }

        let compiled = ctx.executor.compile_plan(&texts).await;
        let mut plan = match compiled {
            Ok(plan) => plan,
            Err(e) => {
                let message = format!(
                    "exception while submitting statement:\n{}\n{}",
                    add_line_numbers(&origin),
                    e
                );
                for idx in indices {
                    ctx.units[*idx].mark_error(e.to_string());
                    ctx.units[*idx].stamp_finish();
                }
                ctx.mark_failed();
                return Err(OrchestratorError::Dispatch(message));
            }
        };
        if let Some(name) = &ctx.config.options.job_name {
            plan = plan.with_job_name(name.clone());
        }

        if ctx.plan_only {
            ctx.captured_plan = Some(plan.describe());
            for idx in indices {
                ctx.units[*idx].stamp_finish();
            }
            return Ok(());
        }

        let dispatcher = Dispatcher::from_context(ctx);
        let dispatched = dispatcher.dispatch(plan, &origin).await;
        let outcome = match dispatched {
            Ok(outcome) => outcome,
            Err(e) => {
                for idx in indices {
                    ctx.units[*idx].mark_error(e.to_string());
                    ctx.units[*idx].stamp_finish();
                }
                ctx.mark_failed();
                return Err(e);
            }
        };

        match outcome.apply(&mut ctx.job) {
            None => {
                info!(
                    "dispatch accepted, engine job id {:?}",
                    ctx.job.engine_job_id
                );
                ctx.record_result(TypedResult::mutation_success(ctx.job.engine_job_id.clone()));
            }
            Some(reason) => {
                warn!("dispatch rejected: {}", reason);
                for idx in indices {
                    ctx.units[*idx].mark_error(reason.clone());
                }
                ctx.record_failure_reason(reason.clone());
                ctx.record_result(TypedResult::error(reason));
            }
        }
        for idx in indices {
            ctx.units[*idx].stamp_finish();
        }
        Ok(())
    }

    /// Executes one query/introspection/simulated-mutation statement against
    /// the session. Failures are recorded on the unit and the script
    /// continues.
    async fn run_direct(&self, ctx: &mut JobContext, idx: usize) -> Result<()> {
        let text = ctx.units[idx].text.clone();
        let kind = ctx.units[idx].kind;
        let result_id = ctx.job.id.to_string();

        ctx.units[idx].stamp_start();
        let executed = ctx.executor.execute_statement(&text).await;
        ctx.units[idx].stamp_finish();
        match executed {
            Ok(handle) => {
                let strategy = ResultStrategy::select(kind, &result_id, &ctx.config.options);
                let result = strategy.extract_persisted(&handle, &ctx.store);
                if strategy.auto_cancel() {
                    if let Some(run_id) = &handle.engine_job_id {
                        if let Err(e) = ctx.executor.cancel_run(run_id).await {
                            warn!("auto-cancel of {} failed: {}", run_id, e);
                        }
                    }
                }
                ctx.record_result(result);
            }
            Err(e) => {
                let message = format!("{}\n{}", add_line_numbers(&text), e);
                warn!("statement {} failed: {}", idx + 1, e);
                ctx.units[idx].mark_error(message.clone());
                ctx.record_result(TypedResult::error(message));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PipelineStage for TransformStage {
    fn name(&self) -> &'static str {
        "transform"
    }

    async fn run(&self, ctx: &mut JobContext) -> Result<()> {
        if ctx.plan_only {
            // compile-only inspection: one combined plan over every
            // transform statement, nothing is dispatched
            let indices: Vec<usize> = ctx
                .units
                .iter()
                .filter(|u| u.kind.is_transform())
                .map(|u| u.index)
                .collect();
            if !indices.is_empty() {
                self.compile_and_dispatch(ctx, &indices).await?;
            }
            return Ok(());
        }

        let insert_indices: Vec<usize> = ctx
            .units
            .iter()
            .filter(|u| u.kind == StatementKind::Insert)
            .map(|u| u.index)
            .collect();
        let batch = ctx.config.options.statement_set && insert_indices.len() > 1;
        if batch {
            debug!(
                "statement-set mode: batching {} inserts into one execution unit",
                insert_indices.len()
            );
        }

        let mut batch_done = false;
        for idx in 0..ctx.units.len() {
            let kind = ctx.units[idx].kind;
            if !kind.is_transform() {
                continue;
            }
            if kind == StatementKind::Insert {
                if batch {
                    // the combined unit runs at the first insert's position
                    if !batch_done {
                        batch_done = true;
                        self.compile_and_dispatch(ctx, &insert_indices).await?;
                    }
                } else {
                    self.compile_and_dispatch(ctx, &[idx]).await?;
                }
            } else {
                self.run_direct(ctx, idx).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_context, units_for, FakeExecutor};

    #[tokio::test]
    async fn test_statement_set_batches_inserts_into_one_plan() {
        let executor = FakeExecutor::new()
            .with_table("t")
            .with_table("s")
            .with_run_handle("run-1");
        let probe = executor.clone();
        let units = units_for(
            "INSERT INTO t SELECT * FROM s; INSERT INTO t SELECT * FROM s; INSERT INTO t SELECT * FROM s;",
        );
        let mut ctx = fake_context(executor, units);
        ctx.config = std::sync::Arc::new({
            let mut config = (*ctx.config).clone();
            config.options.statement_set = true;
            config
        });

        TransformStage.run(&mut ctx).await.unwrap();

        let compiled = probe.compiled_plans();
        assert_eq!(compiled.len(), 1, "exactly one combined execution unit");
        assert_eq!(compiled[0].len(), 3, "all inserts in the combined plan");
        assert_eq!(ctx.results.len(), 1);
    }

    #[tokio::test]
    async fn test_inserts_dispatch_individually_without_statement_set() {
        let executor = FakeExecutor::new()
            .with_table("t")
            .with_table("s")
            .with_run_handle("run-1");
        let probe = executor.clone();
        let units = units_for("INSERT INTO t SELECT * FROM s; INSERT INTO t SELECT * FROM s;");
        let mut ctx = fake_context(executor, units);

        TransformStage.run(&mut ctx).await.unwrap();
        assert_eq!(probe.compiled_plans().len(), 2);
    }

    #[tokio::test]
    async fn test_query_failure_does_not_abort_script() {
        let executor = FakeExecutor::new().with_table("t");
        let units = units_for("SELECT * FROM missing; SHOW TABLES;");
        let mut ctx = fake_context(executor, units);

        TransformStage.run(&mut ctx).await.unwrap();
        assert!(ctx.has_failed());
        assert!(ctx.units[0].error.is_some());
        // the SHOW after the failing SELECT still produced a result
        assert_eq!(ctx.results.len(), 2);
        assert!(matches!(ctx.results[1], TypedResult::Messages(_)));
    }

    #[tokio::test]
    async fn test_insert_compile_failure_is_fatal_with_line_numbers() {
        let executor = FakeExecutor::new().with_table("t"); // source table missing
        let units = units_for("INSERT INTO t SELECT * FROM s;");
        let mut ctx = fake_context(executor, units);

        let err = TransformStage.run(&mut ctx).await.unwrap_err();
        match err {
            OrchestratorError::Dispatch(message) => {
                assert!(message.contains("1: INSERT INTO t SELECT * FROM s"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ctx.has_failed());
    }

    #[tokio::test]
    async fn test_simulated_mutation_runs_directly_and_auto_cancels() {
        let executor = FakeExecutor::new().with_table("t");
        let probe = executor.clone();
        let mut units = units_for("INSERT INTO t VALUES (1);");
        units[0].kind = StatementKind::MockedInsert;
        let mut ctx = fake_context(executor, units);
        ctx.config = std::sync::Arc::new({
            let mut config = (*ctx.config).clone();
            config.options.auto_cancel = true;
            config
        });

        TransformStage.run(&mut ctx).await.unwrap();
        assert!(probe.compiled_plans().is_empty(), "no plan is dispatched");
        assert!(matches!(ctx.results[0], TypedResult::Mutation(_)));
        assert_eq!(probe.cancelled_runs().len(), 1);
    }

    #[tokio::test]
    async fn test_query_results_are_persisted_by_job_id() {
        let executor = FakeExecutor::new().with_table("t");
        let units = units_for("SELECT * FROM t;");
        let mut ctx = fake_context(executor, units);

        TransformStage.run(&mut ctx).await.unwrap();
        let stored = ctx.store.get(&ctx.job.id.to_string());
        assert!(matches!(stored, Some(TypedResult::Rows(_))));
    }
}
