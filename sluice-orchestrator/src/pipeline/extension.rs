//! Extension registration stage

use anyhow::anyhow;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::context::JobContext;
use crate::error::{OrchestratorError, Result};
use crate::pipeline::PipelineStage;
use crate::sqltext::add_line_numbers;

/// Compiles and registers function/extension declarations with the executor
/// before anything executes, since later stages may reference them. A
/// registration failure is fatal: every downstream statement could depend on
/// the missing extension.
pub struct ExtensionStage;

#[async_trait]
impl PipelineStage for ExtensionStage {
    fn name(&self) -> &'static str {
        "extension"
    }

    async fn run(&self, ctx: &mut JobContext) -> Result<()> {
        let indices: Vec<usize> = ctx
            .units
            .iter()
            .filter(|u| u.kind.is_extension())
            .map(|u| u.index)
            .collect();
        if indices.is_empty() {
            return Ok(());
        }
        info!("registering {} extension declaration(s)", indices.len());

        for idx in indices {
            let text = ctx.units[idx].text.clone();
            ctx.units[idx].stamp_start();
            let registered = ctx.executor.register_extension(&text).await;
            ctx.units[idx].stamp_finish();

            if let Err(e) = registered {
                ctx.units[idx].mark_error(e.to_string());
                ctx.mark_failed();
                return Err(OrchestratorError::Engine(anyhow!(
                    "extension registration failed:\n{}\n{}",
                    add_line_numbers(&text),
                    e
                )));
            }
            debug!("registered extension from statement {}", idx + 1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_context, units_for, FakeExecutor};

    #[tokio::test]
    async fn test_extensions_register_before_execution() {
        let executor = FakeExecutor::new();
        let probe = executor.clone();
        let units = units_for("CREATE FUNCTION f AS 'pkg.F'; SELECT 1;");
        let mut ctx = fake_context(executor, units);

        ExtensionStage.run(&mut ctx).await.unwrap();
        assert!(ctx.units[0].started_at.is_some());
        assert!(ctx.units[0].finished_at.is_some());
        assert_eq!(probe.registered_extensions().len(), 1);
    }

    #[tokio::test]
    async fn test_registration_failure_is_fatal() {
        let executor = FakeExecutor::new().failing_extension("compile error");
        let units = units_for("CREATE FUNCTION f AS 'pkg.F';");
        let mut ctx = fake_context(executor, units);

        let err = ExtensionStage.run(&mut ctx).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(ctx.has_failed());
        assert!(ctx.units[0].error.is_some());
    }

    #[tokio::test]
    async fn test_no_extensions_is_a_no_op() {
        let mut ctx = fake_context(FakeExecutor::new(), units_for("SELECT 1;"));
        ExtensionStage.run(&mut ctx).await.unwrap();
        assert!(!ctx.has_failed());
    }
}
