//! Pipeline stages
//!
//! The fixed-order stage list that drives one submission: extension
//! registration, schema execution, transforms, then custom programs. Every
//! stage consumes the same shared [`JobContext`]; the ordering dependency is
//! explicit here instead of being spread over ad hoc calls.
//!
//! A stage returning `Err` aborts the remaining stages (schema failures and
//! dispatch exceptions); per-statement failures are recorded on the context
//! and do not stop the pipeline.

use async_trait::async_trait;

use crate::context::JobContext;
use crate::error::Result;

mod extension;
mod program;
mod schema;
mod transform;

pub use extension::ExtensionStage;
pub use program::ProgramStage;
pub use schema::SchemaStage;
pub use transform::TransformStage;

/// One step of the submission pipeline.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &mut JobContext) -> Result<()>;
}

/// The stages of one submission, in execution order.
pub fn stages() -> Vec<Box<dyn PipelineStage>> {
    vec![
        Box::new(ExtensionStage),
        Box::new(SchemaStage),
        Box::new(TransformStage),
        Box::new(ProgramStage),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_fixed() {
        let names: Vec<&str> = stages().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["extension", "schema", "transform", "program"]);
    }
}
