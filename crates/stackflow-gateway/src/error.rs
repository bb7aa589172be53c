//! Topology synthesis error types

use stackflow_core::InstanceStatus;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Service '{0}' has an empty upstream pool")]
    EmptyPool(String),

    #[error("Pool member '{id}' is not ready (status: {status})")]
    NotReady { id: String, status: InstanceStatus },

    #[error("Pool member '{0}' has no private_ip attribute")]
    MissingAddress(String),

    #[error("Weight of '{0}' must be greater than zero")]
    ZeroWeight(String),

    #[error("Invalid health check policy: {0}")]
    InvalidPolicy(String),

    #[error("Render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, SynthesisError>;
