//! Schema execution stage

use async_trait::async_trait;
use tracing::{debug, error};

use crate::context::JobContext;
use crate::error::{OrchestratorError, Result};
use crate::pipeline::PipelineStage;
use crate::sqltext::add_line_numbers;

/// Executes all schema-category statements synchronously, in script order.
/// A failure here is fatal to the whole submission: every later stage
/// depends on the catalog state these statements establish.
pub struct SchemaStage;

#[async_trait]
impl PipelineStage for SchemaStage {
    fn name(&self) -> &'static str {
        "schema"
    }

    async fn run(&self, ctx: &mut JobContext) -> Result<()> {
        let indices: Vec<usize> = ctx
            .units
            .iter()
            .filter(|u| u.kind.is_schema())
            .map(|u| u.index)
            .collect();

        for idx in indices {
            let text = ctx.units[idx].text.clone();
            debug!("executing schema statement {}", idx + 1);
            ctx.units[idx].stamp_start();
            let executed = ctx.executor.execute_statement(&text).await;
            ctx.units[idx].stamp_finish();

            if let Err(e) = executed {
                let message = format!("{}\n{}", add_line_numbers(&text), e);
                error!("schema statement {} failed: {}", idx + 1, e);
                ctx.units[idx].mark_error(e.to_string());
                ctx.record_failure_reason(message.clone());
                return Err(OrchestratorError::SchemaFatal(message));
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
    async fn test_schema_statements_execute_in_order() {
        let executor = FakeExecutor::new();
        let probe = executor.clone();
        let units = units_for("CREATE TABLE a (x INT); CREATE TABLE b (y INT);");
        let mut ctx = fake_context(executor, units);

        SchemaStage.run(&mut ctx).await.unwrap();
        assert_eq!(
            probe.executed_statements(),
            vec![
                "CREATE TABLE a (x INT)".to_string(),
                "CREATE TABLE b (y INT)".to_string()
            ]
        );
        assert!(!ctx.has_failed());
    }

    #[tokio::test]
    async fn test_schema_failure_is_fatal_and_line_numbered() {
        let executor = FakeExecutor::new().failing_statement("CREATE TABLE bad", "syntax error");
        let units = units_for("CREATE TABLE bad (x INT);");
        let mut ctx = fake_context(executor, units);

        let err = SchemaStage.run(&mut ctx).await.unwrap_err();
        match &err {
            OrchestratorError::SchemaFatal(message) => {
                assert!(message.contains("1: CREATE TABLE bad"));
                assert!(message.contains("syntax error"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ctx.has_failed());
        assert!(ctx.units[0].error.is_some());
    }

    #[tokio::test]
    async fn test_non_schema_statements_are_skipped() {
        let executor = FakeExecutor::new();
        let probe = executor.clone();
        let units = units_for("INSERT INTO t VALUES (1); SELECT 1;");
        let mut ctx = fake_context(executor, units);

        SchemaStage.run(&mut ctx).await.unwrap();
        assert!(probe.executed_statements().is_empty());
    }
}
