//! Normalized gateway outcomes
//!
//! Every gateway operation resolves into one of these shapes regardless of
//! the deployment variant behind it. A `success == false` outcome is a
//! rejection, not a transport failure; transport failures surface as
//! [`crate::error::GatewayError`].

use serde::{Deserialize, Serialize};

/// Result of a remote submission or deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOutcome {
    pub success: bool,
    /// Job id assigned by the remote engine.
    pub engine_job_id: Option<String>,
    /// Sub-task ids belonging to the submission.
    pub task_ids: Vec<String>,
    /// Web endpoint of the cluster that took the job.
    pub web_endpoint: Option<String>,
    pub error: Option<String>,
}

impl GatewayOutcome {
    pub fn accepted(engine_job_id: impl Into<String>) -> Self {
        let id = engine_job_id.into();
        Self {
            success: true,
            task_ids: vec![id.clone()],
            engine_job_id: Some(id),
            web_endpoint: None,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            engine_job_id: None,
            task_ids: Vec::new(),
            web_endpoint: None,
            error: Some(error.into()),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.web_endpoint = Some(endpoint.into());
        self
    }
}

/// Result of a savepoint operation on a remote job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavepointOutcome {
    pub success: bool,
    /// Location of the written savepoint, when one was produced.
    pub location: Option<String>,
    pub error: Option<String>,
}

impl SavepointOutcome {
    pub fn written(location: impl Into<String>) -> Self {
        Self {
            success: true,
            location: Some(location.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            location: None,
            error: Some(error.into()),
        }
    }
}

/// Result of probing a gateway for reachability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionProbe {
    pub reachable: bool,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_outcome_carries_ids() {
        let outcome = GatewayOutcome::accepted("engine-42").with_endpoint("http://web:8081");
        assert!(outcome.success);
        assert_eq!(outcome.engine_job_id.as_deref(), Some("engine-42"));
        assert_eq!(outcome.task_ids, vec!["engine-42".to_string()]);
        assert_eq!(outcome.web_endpoint.as_deref(), Some("http://web:8081"));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_rejected_outcome_has_no_ids() {
        let outcome = GatewayOutcome::rejected("insufficient resources");
        assert!(!outcome.success);
        assert!(outcome.engine_job_id.is_none());
        assert!(outcome.task_ids.is_empty());
        assert_eq!(outcome.error.as_deref(), Some("insufficient resources"));
    }
}
