//! Parsed stack file

use super::input::Reference;
use super::resource::Stack;
use crate::error::SpecError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything declared in one stack file
#[derive(Debug, Clone, Default)]
pub struct StackFile {
    pub name: String,
    pub stack: Stack,
    pub gateways: Vec<GatewayDecl>,
    pub outputs: Vec<OutputDecl>,
}

impl StackFile {
    /// Validates resource references plus the gateway pools and outputs.
    pub fn validate(&self) -> Result<(), SpecError> {
        self.stack.validate()?;

        for gateway in &self.gateways {
            let pool = self.stack.get(&gateway.pool).ok_or_else(|| SpecError::UnknownReference {
                from: format!("gateway {}", gateway.service_name),
                target: gateway.pool.clone(),
            })?;
            for member in gateway.weights.keys() {
                let owned = member
                    .split_once('.')
                    .is_some_and(|(set, key)| set == pool.id && pool.keys().any(|k| k == key));
                if !owned && *member != pool.id {
                    return Err(SpecError::Invalid(format!(
                        "gateway {} sets a weight for '{}', which is not in pool '{}'",
                        gateway.service_name, member, pool.id
                    )));
                }
            }
        }

        for output in &self.outputs {
            self.stack
                .check_reference(&format!("output {}", output.name), &output.reference)?;
        }
        Ok(())
    }

    pub fn gateway(&self, service_name: &str) -> Option<&GatewayDecl> {
        self.gateways.iter().find(|g| g.service_name == service_name)
    }
}

/// `gateway` block: inputs for topology synthesis
///
/// KDL form:
/// ```kdl
/// gateway "app-service" {
///     pool "apps"
///     port 8080
///     paths "/api"
///     health-check interval=5 successes=2 failures=1 path="/health" timeout=1
///     weight "apps.b" 50
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayDecl {
    pub service_name: String,
    /// Resource whose instances form the upstream pool
    pub pool: String,
    pub port: Option<u16>,
    #[serde(default)]
    pub paths: Vec<String>,
    pub default_weight: Option<u32>,
    /// Per-instance weight overrides, keyed by instance id
    #[serde(default)]
    pub weights: BTreeMap<String, u32>,
    pub health_check: Option<HealthCheckDecl>,
}

/// Health check overrides; unset fields keep the policy defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckDecl {
    pub interval: Option<u64>,
    pub success_threshold: Option<u32>,
    pub failure_threshold: Option<u32>,
    pub path: Option<String>,
    pub timeout: Option<u64>,
}

/// `output "name" "${target.attr}"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDecl {
    pub name: String,
    pub reference: Reference,
}

impl OutputDecl {
    pub fn new(name: impl Into<String>, reference: Reference) -> Self {
        Self {
            name: name.into(),
            reference,
        }
    }
}
