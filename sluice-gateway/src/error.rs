//! Error types for the gateway client

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors that can occur when talking to a cluster gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Gateway returned an error status code
    #[error("gateway error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the gateway
        message: String,
    },

    /// Failed to parse response
    #[error("failed to parse response: {0}")]
    ParseError(String),

    /// Invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" response
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }
}
