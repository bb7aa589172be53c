//! Local simulated provider for StackFlow
//!
//! Implements the `CloudProvider` trait entirely in memory. Used by the
//! `stack` CLI and by tests that need a provider with realistic attributes
//! but no network.
//!
//! # Features
//!
//! - Security groups (`id`, `name`)
//! - Instances (`id`, `name`, `private_ip`, `public_ip`, `zone`)
//! - Deterministic addresses derived from the instance id
//! - Failure injection per instance id
//!
//! # Example
//!
//! ```ignore
//! use stackflow_cloud_local::LocalCloudProvider;
//! use stackflow_cloud::Scheduler;
//! use std::sync::Arc;
//!
//! let provider = LocalCloudProvider::new("local-1").with_failure("apps.b");
//! let report = Scheduler::new(Arc::new(provider)).apply(&graph, &prior).await;
//! ```

pub mod error;
pub mod provider;

pub use error::{LocalError, Result};
pub use provider::LocalCloudProvider;
