//! Custom program execution stage

use async_trait::async_trait;
use tracing::{error, info};

use sluice_core::domain::result::TypedResult;

use crate::context::JobContext;
use crate::error::{OrchestratorError, Result};
use crate::pipeline::PipelineStage;
use crate::sqltext::add_line_numbers;

/// Hands full custom program statements to the executor's general execution
/// path. A failing program is fatal: the engine already owns all control at
/// that point and nothing downstream can recover.
pub struct ProgramStage;

#[async_trait]
impl PipelineStage for ProgramStage {
    fn name(&self) -> &'static str {
        "program"
    }

    async fn run(&self, ctx: &mut JobContext) -> Result<()> {
        let indices: Vec<usize> = ctx
            .units
            .iter()
            .filter(|u| u.kind.is_program())
            .map(|u| u.index)
            .collect();
        if indices.is_empty() || ctx.plan_only {
            return Ok(());
        }

        for idx in indices {
            let text = ctx.units[idx].text.clone();
            info!("executing custom program statement {}", idx + 1);
            ctx.units[idx].stamp_start();
            let executed = ctx.executor.execute_program(&text).await;
            ctx.units[idx].stamp_finish();

            match executed {
                Ok(handle) => {
                    if let Some(id) = &handle.engine_job_id {
                        ctx.job.engine_job_id = Some(id.clone());
                        ctx.job.task_ids = vec![id.clone()];
                    }
                    ctx.record_result(TypedResult::mutation_success(
                        handle.engine_job_id.clone(),
                    ));
                }
                Err(e) => {
                    let message = format!(
                        "exception while submitting statement:\n{}\n{}",
                        add_line_numbers(&text),
                        e
                    );
                    error!("custom program failed: {}", e);
                    ctx.units[idx].mark_error(e.to_string());
                    ctx.mark_failed();
                    return Err(OrchestratorError::Dispatch(message));
                }
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
    async fn test_program_execution_records_engine_id() {
        let executor = FakeExecutor::new().with_program_job_id("stream-1");
        let units = units_for("EXECUTE PIPELINE my_stream;");
        let mut ctx = fake_context(executor, units);

        ProgramStage.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.job.engine_job_id.as_deref(), Some("stream-1"));
        assert!(matches!(ctx.results[0], TypedResult::Mutation(_)));
    }

    #[tokio::test]
    async fn test_program_failure_is_fatal() {
        let executor = FakeExecutor::new().failing_program("program panicked");
        let units = units_for("EXECUTE PIPELINE my_stream;");
        let mut ctx = fake_context(executor, units);

        let err = ProgramStage.run(&mut ctx).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Dispatch(_)));
        assert!(ctx.has_failed());
    }

    #[tokio::test]
    async fn test_plan_only_skips_programs() {
        let executor = FakeExecutor::new().failing_program("must not run");
        let units = units_for("EXECUTE PIPELINE my_stream;");
        let mut ctx = fake_context(executor, units);
        ctx.plan_only = true;

        ProgramStage.run(&mut ctx).await.unwrap();
        assert!(!ctx.has_failed());
    }
}
