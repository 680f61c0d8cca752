//! Error types for the orchestration core

use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors raised while driving one submission
///
/// `Statement` failures are recorded on the contributing unit and normally do
/// not abort the script; the remaining variants are fatal to the submission
/// and are re-raised to the caller after the job record is finalized.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// One statement of a multi-statement script failed
    #[error("statement {index} failed: {message}")]
    Statement { index: usize, message: String },

    /// A schema-stage statement failed; later stages depend on schema state
    #[error("schema statement failed:\n{0}")]
    SchemaFatal(String),

    /// Local or gateway submission threw
    #[error("dispatch failed:\n{0}")]
    Dispatch(String),

    /// The gateway reported a non-exceptional rejection
    #[error("gateway rejected submission: {0}")]
    GatewayRejection(String),

    /// Transport-level gateway failure
    #[error(transparent)]
    Gateway(#[from] sluice_gateway::GatewayError),

    /// The engine collaborator failed in an unstructured way
    #[error("engine error: {0}")]
    Engine(#[from] anyhow::Error),

    /// The submission request itself is unusable
    #[error("invalid submission: {0}")]
    InvalidSubmission(String),
}

impl OrchestratorError {
    /// Whether this error aborts the remaining pipeline stages
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Statement { .. })
    }
}
