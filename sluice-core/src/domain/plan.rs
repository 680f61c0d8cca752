//! Compiled-plan representation
//!
//! The engine-internal execution plan, distinct from the raw script text.
//! The orchestration layer treats the plan body as opaque JSON; it only
//! attaches savepoint-restore instructions and hands the plan to a
//! submission target.

use serde::{Deserialize, Serialize};

/// Savepoint-restore instructions attached to a plan before submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavepointRestore {
    pub path: String,
    pub allow_unclaimed_state: bool,
}

/// A script compiled by the executor, ready for submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPlan {
    pub job_name: Option<String>,
    /// The statements this plan was compiled from, in script order.
    pub statements: Vec<String>,
    /// Engine-produced structural plan body.
    pub graph: serde_json::Value,
    pub savepoint: Option<SavepointRestore>,
}

impl CompiledPlan {
    pub fn new(statements: Vec<String>, graph: serde_json::Value) -> Self {
        Self {
            job_name: None,
            statements,
            graph,
            savepoint: None,
        }
    }

    pub fn with_job_name(mut self, name: impl Into<String>) -> Self {
        self.job_name = Some(name.into());
        self
    }

    /// Structural representation for plan-only inspection.
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "job_name": self.job_name,
            "statements": self.statements,
            "graph": self.graph,
            "savepoint": self.savepoint.as_ref().map(|s| s.path.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_includes_statements_and_graph() {
        let plan = CompiledPlan::new(
            vec!["INSERT INTO t SELECT * FROM s".to_string()],
            serde_json::json!({"nodes": 2}),
        )
        .with_job_name("nightly-load");

        let described = plan.describe();
        assert_eq!(described["job_name"], "nightly-load");
        assert_eq!(described["graph"]["nodes"], 2);
        assert_eq!(described["statements"][0], "INSERT INTO t SELECT * FROM s");
        assert!(described["savepoint"].is_null());
    }
}
