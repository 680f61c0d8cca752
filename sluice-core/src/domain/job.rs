//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::config::RunMode;
use crate::domain::result::TypedResult;

/// Lifecycle status of one submission.
///
/// Transitions are strictly monotonic: `Created` → `Initialized` → `Running`
/// → one of the terminal states. A terminal status is set exactly once and
/// never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Created,
    Initialized,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    /// Whether this status ends the lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Created => 0,
            JobStatus::Initialized => 1,
            JobStatus::Running => 2,
            JobStatus::Success | JobStatus::Failed => 3,
        }
    }

    /// Whether moving from `self` to `next` is a forward transition.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// The mutable record of one orchestration run.
///
/// Created at the start of a submission, mutated only by the orchestrator and
/// dispatcher, and frozen once the status reaches a terminal value. The
/// status field is private so every change goes through [`Job::advance`],
/// [`Job::succeed`] or [`Job::fail`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub run_mode: RunMode,
    pub script: String,
    status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Identifier assigned by the compute engine once submission is accepted.
    pub engine_job_id: Option<String>,
    /// Sub-task identifiers reported by a remote submission.
    pub task_ids: Vec<String>,
    /// Web endpoint of the cluster running the job, when known.
    pub cluster_address: Option<String>,
    pub error: Option<String>,
    /// Last retained result of the script's output-producing statements.
    pub result: Option<TypedResult>,
}

impl Job {
    /// Builds the entity for a fresh submission.
    pub fn build(run_mode: RunMode, script: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_mode,
            script: script.into(),
            status: JobStatus::Initialized,
            started_at: Utc::now(),
            finished_at: None,
            engine_job_id: None,
            task_ids: Vec::new(),
            cluster_address: None,
            error: None,
            result: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn is_failed(&self) -> bool {
        self.status == JobStatus::Failed
    }

    /// Moves the status forward. Backward or post-terminal transitions are
    /// rejected and leave the entity untouched.
    pub fn advance(&mut self, next: JobStatus) -> bool {
        if !self.status.can_advance_to(next) {
            return false;
        }
        self.status = next;
        true
    }

    /// Terminal success transition; stamps the finish time.
    pub fn succeed(&mut self) -> bool {
        if !self.advance(JobStatus::Success) {
            return false;
        }
        self.finished_at = Some(Utc::now());
        true
    }

    /// Terminal failure transition; records the error and finish time.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if !self.advance(JobStatus::Failed) {
            return false;
        }
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_advances_forward_only() {
        let mut job = Job::build(RunMode::Local, "SELECT 1");
        assert_eq!(job.status(), JobStatus::Initialized);
        assert!(job.advance(JobStatus::Running));
        assert!(!job.advance(JobStatus::Initialized));
        assert!(!job.advance(JobStatus::Created));
        assert_eq!(job.status(), JobStatus::Running);
    }

    #[test]
    fn test_terminal_status_set_once() {
        let mut job = Job::build(RunMode::Local, "SELECT 1");
        job.advance(JobStatus::Running);
        assert!(job.fail("boom"));
        assert!(!job.succeed());
        assert!(!job.fail("other"));
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_success_records_finish_time() {
        let mut job = Job::build(RunMode::Local, "SELECT 1");
        job.advance(JobStatus::Running);
        assert!(job.succeed());
        assert_eq!(job.status(), JobStatus::Success);
        assert!(job.error.is_none());
        assert!(job.finished_at.is_some());
    }
}
