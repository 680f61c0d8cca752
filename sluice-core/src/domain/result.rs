//! Typed statement results
//!
//! Exactly one result shape exists per semantic category: tabular rows for
//! queries, a summary for mutations, a message list for introspection, an
//! acknowledgment for schema statements, and an error payload for failures.

use serde::{Deserialize, Serialize};

/// Tabular output of a query statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Value>,
    /// True when the engine produced more rows than the configured cap.
    pub truncated: bool,
}

/// Outcome summary of a mutation statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationSummary {
    pub engine_job_id: Option<String>,
    pub success: bool,
}

/// The semantic-category-specific result of one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedResult {
    Rows(RowSet),
    Mutation(MutationSummary),
    Messages(Vec<String>),
    Ack,
    Error(String),
}

impl TypedResult {
    pub fn rows(columns: Vec<String>, rows: Vec<serde_json::Value>, truncated: bool) -> Self {
        TypedResult::Rows(RowSet {
            columns,
            rows,
            truncated,
        })
    }

    pub fn mutation_success(engine_job_id: Option<String>) -> Self {
        TypedResult::Mutation(MutationSummary {
            engine_job_id,
            success: true,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        TypedResult::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TypedResult::Error(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            TypedResult::Rows(_) => "rows",
            TypedResult::Mutation(_) => "mutation",
            TypedResult::Messages(_) => "messages",
            TypedResult::Ack => "ack",
            TypedResult::Error(_) => "error",
        }
    }
}
