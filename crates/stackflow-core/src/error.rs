use crate::model::{InstanceStatus, ResourceKind};
use std::path::PathBuf;
use thiserror::Error;

/// Bad declaration, reported before any provisioning starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("unknown resource kind '{0}' (expected security-group, instance or instance-set)")]
    UnknownKind(String),

    #[error("resource '{0}' is declared more than once")]
    DuplicateId(String),

    #[error("invalid resource id '{0}': ids must be non-empty and may not contain '.', '[' or ']'")]
    InvalidId(String),

    #[error("instance-set '{0}' requires a non-empty for-each key set")]
    EmptyCountKey(String),

    #[error("resource '{id}' of kind {kind} cannot declare for-each keys")]
    UnexpectedCountKey { id: String, kind: ResourceKind },

    #[error("invalid for-each key '{key}' in '{id}'")]
    InvalidKey { id: String, key: String },

    #[error("'{from}' references undeclared resource '{target}'")]
    UnknownReference { from: String, target: String },

    #[error("'{from}' references '{set}.{key}' but '{key}' is not a key of instance-set '{set}'")]
    UnknownMember {
        from: String,
        set: String,
        key: String,
    },

    #[error("'{from}' addresses a member of '{target}', which is not an instance-set")]
    NotASet { from: String, target: String },

    #[error("invalid reference expression '{0}'")]
    InvalidReference(String),

    #[error("'${{each.key}}' used in '{0}', which is not an instance-set")]
    EachKeyOutsideSet(String),

    #[error("invalid declaration: {0}")]
    Invalid(String),
}

/// The reference graph is not acyclic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("dependency cycle detected: {}", .cycle.join(" -> "))]
pub struct CycleError {
    /// Node ids along the cycle; the first id is repeated at the end.
    pub cycle: Vec<String>,
}

/// Resolution failures. These only surface when the scheduler ordering
/// invariant is broken, so callers treat them as internal errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("'{target}' is not ready (status: {status})")]
    NotReady {
        target: String,
        status: InstanceStatus,
    },

    #[error("'{target}' has no attribute '{attribute}'")]
    UnknownAttribute { target: String, attribute: String },

    #[error("no instance named '{0}'")]
    UnknownTarget(String),

    #[error("'${{each.key}}' reached resolution without being expanded")]
    UnexpandedEachKey,
}

#[derive(Error, Debug)]
pub enum StackError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("IO error: {path}\nreason: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, StackError>;
