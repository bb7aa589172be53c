//! Local provider error types

use stackflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocalError {
    #[error("Address pool exhausted: {0}")]
    AddressPoolExhausted(&'static str),

    #[error("Unsupported resource kind: {0}")]
    UnsupportedKind(String),

    #[error("Simulated failure creating {0}")]
    SimulatedFailure(String),

    #[error("Instance not found: {0}")]
    NotFound(String),

    #[error("Provider state unavailable: {0}")]
    StatePoisoned(String),
}

impl From<LocalError> for CloudError {
    fn from(e: LocalError) -> Self {
        match e {
            LocalError::NotFound(id) => CloudError::ResourceNotFound(id),
            LocalError::UnsupportedKind(_) => CloudError::InvalidConfig(e.to_string()),
            LocalError::SimulatedFailure(_) | LocalError::AddressPoolExhausted(_) => {
                CloudError::ApiError(e.to_string())
            }
            LocalError::StatePoisoned(_) => CloudError::Internal(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, LocalError>;
