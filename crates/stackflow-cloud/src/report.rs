//! Result of one apply or destroy run

use crate::action::{Action, Plan, PlanSummary};
use serde::{Deserialize, Serialize};
use stackflow_core::InstanceMap;
use std::fmt;

/// Why a node did not reach `Ready`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureCause {
    /// The provider call failed (after retries, or timed out)
    Provider { message: String },
    /// A transitive dependency failed; the node was never dispatched
    DependencyFailed { root: String },
    /// A dependent could not be destroyed, so this node was kept
    Blocked { by: String },
    /// The run was cancelled before the node was dispatched
    Cancelled,
    /// Scheduler bookkeeping error
    Internal { message: String },
}

impl FailureCause {
    pub fn provider(message: impl Into<String>) -> Self {
        FailureCause::Provider {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        FailureCause::Internal {
            message: message.into(),
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Provider { message } => write!(f, "provider error: {}", message),
            FailureCause::DependencyFailed { root } => write!(f, "dependency '{}' failed", root),
            FailureCause::Blocked { by } => write!(f, "kept because '{}' could not be destroyed", by),
            FailureCause::Cancelled => write!(f, "cancelled before dispatch"),
            FailureCause::Internal { message } => write!(f, "internal error: {}", message),
        }
    }
}

/// One failed or cascaded node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub id: String,
    pub cause: FailureCause,
}

impl NodeFailure {
    pub fn new(id: impl Into<String>, cause: FailureCause) -> Self {
        Self {
            id: id.into(),
            cause,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyOutcome {
    Success,
    /// Every failed or skipped node with its cause, ordered by id
    PartialFailure { failures: Vec<NodeFailure> },
}

/// Result of applying a graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    pub outcome: ApplyOutcome,

    /// Final instance map
    pub instances: InstanceMap,

    /// Actions taken, in dispatch order
    pub actions: Vec<Action>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.outcome == ApplyOutcome::Success
    }

    pub fn failures(&self) -> &[NodeFailure] {
        match &self.outcome {
            ApplyOutcome::Success => &[],
            ApplyOutcome::PartialFailure { failures } => failures,
        }
    }

    /// Cause recorded for `id`, if it failed
    pub fn failure(&self, id: &str) -> Option<&FailureCause> {
        self.failures().iter().find(|f| f.id == id).map(|f| &f.cause)
    }

    pub fn summary(&self) -> PlanSummary {
        Plan::new(self.actions.clone()).summary()
    }
}
