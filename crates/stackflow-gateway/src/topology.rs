//! Gateway topology types

use crate::error::{Result, SynthesisError};
use serde::{Deserialize, Serialize};
use stackflow_core::{GatewayDecl, HealthCheckDecl};
use std::collections::BTreeMap;

/// Active health check settings for the upstream
///
/// Defaults probe `/health` every 5 seconds, mark a target healthy after 2
/// successes and unhealthy after a single failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckPolicy {
    /// Seconds between probes
    pub interval: u64,
    pub success_threshold: u32,
    pub failure_threshold: u32,
    pub path: String,
    /// Probe timeout in seconds
    pub timeout: u64,
}

impl Default for HealthCheckPolicy {
    fn default() -> Self {
        Self {
            interval: 5,
            success_threshold: 2,
            failure_threshold: 1,
            path: "/health".to_string(),
            timeout: 1,
        }
    }
}

impl HealthCheckPolicy {
    /// Defaults overridden by whatever the declaration sets.
    pub fn from_decl(decl: Option<&HealthCheckDecl>) -> Self {
        let mut policy = Self::default();
        if let Some(decl) = decl {
            if let Some(interval) = decl.interval {
                policy.interval = interval;
            }
            if let Some(successes) = decl.success_threshold {
                policy.success_threshold = successes;
            }
            if let Some(failures) = decl.failure_threshold {
                policy.failure_threshold = failures;
            }
            if let Some(path) = &decl.path {
                policy.path = path.clone();
            }
            if let Some(timeout) = decl.timeout {
                policy.timeout = timeout;
            }
        }
        policy
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 || self.timeout == 0 {
            return Err(SynthesisError::InvalidPolicy(
                "interval and timeout must be at least 1 second".to_string(),
            ));
        }
        if self.success_threshold == 0 || self.failure_threshold == 0 {
            return Err(SynthesisError::InvalidPolicy(
                "thresholds must be at least 1".to_string(),
            ));
        }
        if !self.path.starts_with('/') {
            return Err(SynthesisError::InvalidPolicy(format!(
                "probe path '{}' must start with '/'",
                self.path
            )));
        }
        Ok(())
    }
}

/// Per-deployment inputs of one gateway service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub service_name: String,
    pub route_paths: Vec<String>,
    /// Port every pool member listens on
    pub port: u16,
    pub default_weight: u32,
    /// Weight overrides by instance id
    pub weights: BTreeMap<String, u32>,
}

impl ServiceSpec {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            route_paths: vec!["/".to_string()],
            port: 8080,
            default_weight: 100,
            weights: BTreeMap::new(),
        }
    }

    pub fn from_decl(decl: &GatewayDecl) -> Self {
        let mut spec = Self::new(&decl.service_name);
        if !decl.paths.is_empty() {
            spec.route_paths = decl.paths.clone();
        }
        if let Some(port) = decl.port {
            spec.port = port;
        }
        if let Some(weight) = decl.default_weight {
            spec.default_weight = weight;
        }
        spec.weights = decl.weights.clone();
        spec
    }

    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.route_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_weight(mut self, id: impl Into<String>, weight: u32) -> Self {
        self.weights.insert(id.into(), weight);
        self
    }

    /// Effective weight of pool member `id`
    pub fn weight_for(&self, id: &str) -> u32 {
        self.weights.get(id).copied().unwrap_or(self.default_weight)
    }
}

/// One load-balancing target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpstreamTarget {
    /// `ip:port`
    pub address: String,
    pub weight: u32,
}

impl UpstreamTarget {
    pub fn new(address: impl Into<String>, weight: u32) -> Self {
        Self {
            address: address.into(),
            weight,
        }
    }
}

/// Synthesized gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    pub service_name: String,
    pub route_paths: Vec<String>,
    /// In pool order
    pub upstream_targets: Vec<UpstreamTarget>,
    pub health_check: HealthCheckPolicy,
}

impl TopologyConfig {
    /// Name of the upstream the service routes to
    pub fn upstream_name(&self) -> String {
        format!("{}-upstream", self.service_name)
    }
}
