//! StackFlow Gateway
//!
//! Turns the resolved addresses of an application pool into a gateway
//! configuration (weighted upstream targets plus an active health check)
//! and renders it for Kong.
//!
//! ```text
//! pool (Ready instances) ──synthesize──▶ TopologyConfig ──render_kong──▶ kong.yml
//!                                          │
//!                                          └──to_json──▶ topology.json
//! ```

pub mod error;
pub mod render;
pub mod synth;
pub mod topology;
pub mod tracker;

pub use error::{Result, SynthesisError};
pub use render::{KONG_FORMAT_VERSION, render_kong, to_json};
pub use synth::{ADDRESS_ATTRIBUTE, pool_members, synthesize};
pub use topology::{HealthCheckPolicy, ServiceSpec, TopologyConfig, UpstreamTarget};
pub use tracker::TopologyTracker;
