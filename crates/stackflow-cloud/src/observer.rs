//! Progress notifications from the scheduler

use crate::action::ActionType;
use crate::report::FailureCause;
use stackflow_core::ResourceInstance;

/// Receives state transitions from the coordinator, in the order they
/// happen. Calls are made from the coordinator only, never concurrently.
///
/// `on_ready` is the hand-off point for boot/config collaborators: the
/// instance passed in is `Ready` and its attributes are final.
pub trait ApplyObserver: Send + Sync {
    fn on_dispatch(&self, _id: &str, _action: ActionType) {}

    fn on_ready(&self, _instance: &ResourceInstance) {}

    fn on_failed(&self, _id: &str, _cause: &FailureCause) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ApplyObserver for NoopObserver {}
