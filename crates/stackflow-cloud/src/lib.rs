//! StackFlow Cloud
//!
//! Provider abstraction and the provisioning scheduler that walks a
//! dependency graph against it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  StackFlow CLI                   │
//! │                  (stack apply)                   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               stackflow-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  Scheduler (coordinator + worker tasks)  │   │
//! │  └───────────────┬──────────────────────────┘   │
//! │  ┌──────────────┐│ ┌──────────────┐             │
//! │  │   Planner    ││ │   Outputs    │             │
//! │  └──────────────┘│ └──────────────┘             │
//! │  ┌───────────────▼──────────────────────────┐   │
//! │  │  trait CloudProvider { create, describe, │   │
//! │  │                        destroy }         │   │
//! │  └──────────────────────────────────────────┘   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │ local (sim)   │
//!           │   provider    │
//!           └───────────────┘
//! ```

pub mod action;
pub mod error;
pub mod observer;
pub mod output;
pub mod planner;
pub mod provider;
pub mod report;
pub mod retry;
pub mod scheduler;

// Re-exports
pub use action::{Action, ActionType, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use observer::{ApplyObserver, NoopObserver};
pub use output::{OutputSet, project, project_available};
pub use planner::plan;
pub use provider::{CloudProvider, CreateRequest, RetryConfig};
pub use report::{ApplyOutcome, ApplyReport, FailureCause, NodeFailure};
pub use retry::call_with_retry;
pub use scheduler::{ScheduleOptions, Scheduler};
