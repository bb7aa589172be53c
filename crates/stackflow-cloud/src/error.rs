//! Cloud provider error types

use thiserror::Error;

/// Provider errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CloudError {
    /// Whether retrying the same call may succeed.
    ///
    /// Timeouts are not retried: the call may still have gone through on
    /// the provider side, so the node fails instead.
    pub fn is_transient(&self) -> bool {
        matches!(self, CloudError::Unavailable(_) | CloudError::RateLimited(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
