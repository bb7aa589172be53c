//! Cloud provider trait definition

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stackflow_core::{ResourceInstance, ResourceKind};
use std::collections::BTreeMap;
use std::time::Duration;

/// Cloud provider abstraction trait
///
/// The scheduler only needs these three operations. Providers report the
/// attributes of created resources under conventional names per kind:
/// `id` for security groups, `private_ip` and `public_ip` for instances.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g., "local", "sakura-cloud")
    fn name(&self) -> &str;

    /// Create a resource and return it with attributes populated
    async fn create(&self, request: &CreateRequest) -> Result<ResourceInstance>;

    /// Look up a previously created resource by provider id
    async fn describe(&self, provider_id: &str) -> Result<ResourceInstance>;

    /// Destroy a resource by provider id
    async fn destroy(&self, provider_id: &str) -> Result<()>;
}

/// Everything a provider needs to create one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Logical id (`db`, `apps.a`)
    pub id: String,

    pub kind: ResourceKind,

    /// Fully resolved inputs
    pub inputs: BTreeMap<String, serde_json::Value>,
}

impl CreateRequest {
    pub fn new(
        id: impl Into<String>,
        kind: ResourceKind,
        inputs: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            inputs,
        }
    }

    /// Get an input value as a specific type
    pub fn get_input<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.inputs
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Retry configuration for provider operations
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// A single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt + 1` (exponential, capped).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}
