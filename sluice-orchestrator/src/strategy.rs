//! Result strategies
//!
//! A strategy converts one engine execution handle into exactly one typed
//! result. Selection is a pure mapping from the statement's semantic
//! category and the submission's run options; no state is kept between
//! calls. The query and simulated-mutation strategies additionally persist
//! their output so it can be paged asynchronously by job id after the
//! submitting call returns.

use sluice_core::domain::config::ExecOptions;
use sluice_core::domain::result::TypedResult;
use sluice_core::domain::statement::StatementKind;

use crate::executor::ExecutionHandle;
use crate::store::ResultStore;

/// How one statement's engine output becomes a [`TypedResult`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResultStrategy {
    /// Streaming query output: row-capped, optionally change-log aware.
    Query {
        result_id: String,
        max_rows: usize,
        changelog: bool,
        time_zone: Option<String>,
    },
    /// Catalog introspection output as a message list.
    MessageList,
    /// Mutation summary keyed by the engine-assigned job id.
    Mutation,
    /// Simulated mutation: summary plus a captured row preview, optionally
    /// cancelling the backing engine job once the preview is collected.
    SimulatedMutation {
        result_id: String,
        max_rows: usize,
        auto_cancel: bool,
    },
    /// Generic acknowledgment for schema and other statements.
    Ack,
}

impl ResultStrategy {
    /// Selects the strategy for a semantic category.
    pub fn select(kind: StatementKind, result_id: &str, options: &ExecOptions) -> Self {
        match kind {
            StatementKind::Select | StatementKind::With => ResultStrategy::Query {
                result_id: result_id.to_string(),
                max_rows: options.max_rows,
                changelog: options.use_changelog,
                time_zone: options.time_zone.clone(),
            },
            StatementKind::Show | StatementKind::Desc => ResultStrategy::MessageList,
            StatementKind::Insert => ResultStrategy::Mutation,
            StatementKind::MockedInsert => ResultStrategy::SimulatedMutation {
                result_id: result_id.to_string(),
                max_rows: options.max_rows,
                auto_cancel: options.auto_cancel,
            },
            _ => ResultStrategy::Ack,
        }
    }

    /// Whether the backing engine job should be stopped after extraction.
    pub fn auto_cancel(&self) -> bool {
        matches!(
            self,
            ResultStrategy::SimulatedMutation {
                auto_cancel: true,
                ..
            }
        )
    }

    /// Converts an execution handle into this strategy's result shape.
    pub fn extract(&self, handle: &ExecutionHandle) -> TypedResult {
        match self {
            ResultStrategy::Query {
                max_rows,
                changelog: _,
                ..
            } => {
                let truncated = handle.rows.len() > *max_rows;
                let rows = handle.rows.iter().take(*max_rows).cloned().collect();
                TypedResult::rows(handle.columns.clone(), rows, truncated)
            }
            ResultStrategy::MessageList => TypedResult::Messages(
                handle
                    .rows
                    .iter()
                    .map(|row| match row {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            ResultStrategy::Mutation | ResultStrategy::SimulatedMutation { .. } => {
                TypedResult::mutation_success(handle.engine_job_id.clone())
            }
            ResultStrategy::Ack => TypedResult::Ack,
        }
    }

    /// Extracts the result and persists it for asynchronous retrieval when
    /// the strategy calls for it.
    pub fn extract_persisted(&self, handle: &ExecutionHandle, store: &ResultStore) -> TypedResult {
        let result = self.extract(handle);
        match self {
            ResultStrategy::Query { result_id, .. } => {
                store.put(result_id.clone(), result.clone());
            }
            ResultStrategy::SimulatedMutation {
                result_id,
                max_rows,
                ..
            } => {
                // the preview rows, not the summary, are what callers page
                let truncated = handle.rows.len() > *max_rows;
                let rows = handle.rows.iter().take(*max_rows).cloned().collect();
                store.put(
                    result_id.clone(),
                    TypedResult::rows(handle.columns.clone(), rows, truncated),
                );
            }
            _ => {}
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ExecOptions {
        ExecOptions {
            max_rows: 2,
            ..ExecOptions::default()
        }
    }

    #[test]
    fn test_selection_mapping() {
        let options = options();
        assert!(matches!(
            ResultStrategy::select(StatementKind::Select, "r", &options),
            ResultStrategy::Query { .. }
        ));
        assert!(matches!(
            ResultStrategy::select(StatementKind::With, "r", &options),
            ResultStrategy::Query { .. }
        ));
        assert_eq!(
            ResultStrategy::select(StatementKind::Show, "r", &options),
            ResultStrategy::MessageList
        );
        assert_eq!(
            ResultStrategy::select(StatementKind::Insert, "r", &options),
            ResultStrategy::Mutation
        );
        assert!(matches!(
            ResultStrategy::select(StatementKind::MockedInsert, "r", &options),
            ResultStrategy::SimulatedMutation { .. }
        ));
        assert_eq!(
            ResultStrategy::select(StatementKind::Create, "r", &options),
            ResultStrategy::Ack
        );
    }

    #[test]
    fn test_query_extraction_caps_rows() {
        let strategy = ResultStrategy::select(StatementKind::Select, "r", &options());
        let handle = ExecutionHandle::with_rows(
            vec!["n".to_string()],
            vec![
                serde_json::json!(1),
                serde_json::json!(2),
                serde_json::json!(3),
            ],
        );
        match strategy.extract(&handle) {
            TypedResult::Rows(set) => {
                assert_eq!(set.rows.len(), 2);
                assert!(set.truncated);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_query_extraction_persists_by_result_id() {
        let store = ResultStore::new();
        let strategy = ResultStrategy::select(StatementKind::Select, "job-9", &options());
        let handle =
            ExecutionHandle::with_rows(vec!["n".to_string()], vec![serde_json::json!(1)]);
        let result = strategy.extract_persisted(&handle, &store);
        assert_eq!(store.get("job-9"), Some(result));
    }

    #[test]
    fn test_mutation_extraction_keeps_engine_id() {
        let strategy = ResultStrategy::Mutation;
        let handle = ExecutionHandle {
            engine_job_id: Some("engine-7".to_string()),
            columns: vec![],
            rows: vec![],
        };
        match strategy.extract(&handle) {
            TypedResult::Mutation(summary) => {
                assert_eq!(summary.engine_job_id.as_deref(), Some("engine-7"));
                assert!(summary.success);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_simulated_mutation_persists_preview_rows() {
        let store = ResultStore::new();
        let mut opts = options();
        opts.auto_cancel = true;
        let strategy = ResultStrategy::select(StatementKind::MockedInsert, "job-3", &opts);
        assert!(strategy.auto_cancel());

        let handle = ExecutionHandle {
            engine_job_id: Some("engine-3".to_string()),
            columns: vec!["n".to_string()],
            rows: vec![serde_json::json!(1)],
        };
        let result = strategy.extract_persisted(&handle, &store);
        assert!(matches!(result, TypedResult::Mutation(_)));
        assert!(matches!(store.get("job-3"), Some(TypedResult::Rows(_))));
    }

    #[test]
    fn test_message_list_extraction() {
        let handle = ExecutionHandle::with_rows(
            vec!["table name".to_string()],
            vec![serde_json::json!("orders"), serde_json::json!("users")],
        );
        assert_eq!(
            ResultStrategy::MessageList.extract(&handle),
            TypedResult::Messages(vec!["orders".to_string(), "users".to_string()])
        );
    }
}
