//! In-memory provider implementation

use crate::error::{LocalError, Result};
use async_trait::async_trait;
use serde_json::json;
use stackflow_cloud::{CloudProvider, CreateRequest};
use stackflow_core::{InstanceStatus, ResourceInstance, ResourceKind};
use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Hosts per /24 that can be handed out (.1 to .254)
const HOSTS_PER_SUBNET: u32 = 254;

/// Private addresses come from 10.0.0.0/16
const PRIVATE_SLOTS: u32 = 256 * HOSTS_PER_SUBNET;

/// Public addresses come from 203.0.113.0/24 (documentation range)
const PUBLIC_SLOTS: u32 = HOSTS_PER_SUBNET;

/// Simulated provider keeping every resource in memory
///
/// Addresses are derived from the instance id, so the same stack gets the
/// same addresses on every run regardless of completion order (probing only
/// kicks in on a hash collision).
pub struct LocalCloudProvider {
    zone: String,
    state: Mutex<LocalState>,
    fail_on: HashSet<String>,
    latency: Duration,
}

#[derive(Default)]
struct LocalState {
    /// Live resources by provider id
    resources: BTreeMap<String, ResourceInstance>,
    private_ips: HashSet<Ipv4Addr>,
    public_ips: HashSet<Ipv4Addr>,
    serial: u32,
}

impl LocalCloudProvider {
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            state: Mutex::new(LocalState::default()),
            fail_on: HashSet::new(),
            latency: Duration::ZERO,
        }
    }

    /// Creating `id` fails with a simulated API error.
    pub fn with_failure(mut self, id: impl Into<String>) -> Self {
        self.fail_on.insert(id.into());
        self
    }

    /// Simulated duration of every create call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Snapshot of every live resource, ordered by provider id
    pub fn resources(&self) -> Result<Vec<ResourceInstance>> {
        Ok(self.lock()?.resources.values().cloned().collect())
    }

    /// Live resource created for logical id `id`
    pub fn find(&self, id: &str) -> Result<Option<ResourceInstance>> {
        Ok(self
            .lock()?
            .resources
            .values()
            .find(|r| r.id == id)
            .cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, LocalState>> {
        self.state
            .lock()
            .map_err(|e| LocalError::StatePoisoned(e.to_string()))
    }

    fn allocate(&self, request: &CreateRequest) -> Result<ResourceInstance> {
        let mut state = self.lock()?;
        state.serial += 1;

        let mut instance = match request.kind {
            ResourceKind::SecurityGroup => {
                let provider_id = format!("sg-{:04}", state.serial);
                ResourceInstance::new(&request.id, request.kind)
                    .with_attribute("id", json!(provider_id))
                    .with_attribute("name", json!(request.id))
                    .with_provider_id(provider_id)
            }
            ResourceKind::Instance => {
                let private_ip = allocate_address(&mut state.private_ips, &request.id, PRIVATE_SLOTS, |slot| {
                    Ipv4Addr::new(10, 0, (slot / HOSTS_PER_SUBNET) as u8, (slot % HOSTS_PER_SUBNET + 1) as u8)
                })
                .ok_or(LocalError::AddressPoolExhausted("10.0.0.0/16"))?;
                let public_ip = match allocate_address(&mut state.public_ips, &request.id, PUBLIC_SLOTS, |slot| {
                    Ipv4Addr::new(203, 0, 113, (slot + 1) as u8)
                }) {
                    Some(ip) => ip,
                    None => {
                        state.private_ips.remove(&private_ip);
                        return Err(LocalError::AddressPoolExhausted("203.0.113.0/24"));
                    }
                };

                let provider_id = format!("srv-{:04}", state.serial);
                let name = request
                    .get_input::<String>("name")
                    .unwrap_or_else(|| request.id.clone());
                ResourceInstance::new(&request.id, request.kind)
                    .with_attribute("id", json!(provider_id))
                    .with_attribute("name", json!(name))
                    .with_attribute("private_ip", json!(private_ip.to_string()))
                    .with_attribute("public_ip", json!(public_ip.to_string()))
                    .with_attribute("zone", json!(self.zone))
                    .with_provider_id(provider_id)
            }
            ResourceKind::InstanceSet => {
                return Err(LocalError::UnsupportedKind(request.kind.to_string()));
            }
        };

        instance.inputs = request.inputs.clone();
        instance.transition(InstanceStatus::Ready);
        if let Some(provider_id) = instance.provider_id.clone() {
            state.resources.insert(provider_id, instance.clone());
        }
        Ok(instance)
    }
}

/// First free slot at or after the id's hash, wrapping around.
fn allocate_address(
    taken: &mut HashSet<Ipv4Addr>,
    id: &str,
    slots: u32,
    address: impl Fn(u32) -> Ipv4Addr,
) -> Option<Ipv4Addr> {
    let start = (fnv1a(id) % u64::from(slots)) as u32;
    (0..slots)
        .map(|n| address((start + n) % slots))
        .find(|ip| taken.insert(*ip))
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[async_trait]
impl CloudProvider for LocalCloudProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn create(&self, request: &CreateRequest) -> stackflow_cloud::Result<ResourceInstance> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_on.contains(&request.id) {
            tracing::debug!(id = %request.id, "injected failure");
            return Err(LocalError::SimulatedFailure(request.id.clone()).into());
        }

        let instance = self.allocate(request)?;
        tracing::debug!(
            id = %instance.id,
            provider_id = instance.provider_id.as_deref().unwrap_or_default(),
            "created"
        );
        Ok(instance)
    }

    async fn describe(&self, provider_id: &str) -> stackflow_cloud::Result<ResourceInstance> {
        let state = self.lock()?;
        state
            .resources
            .get(provider_id)
            .cloned()
            .ok_or_else(|| LocalError::NotFound(provider_id.to_string()).into())
    }

    async fn destroy(&self, provider_id: &str) -> stackflow_cloud::Result<()> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let removed = state
            .resources
            .remove(provider_id)
            .ok_or_else(|| LocalError::NotFound(provider_id.to_string()))?;

        for (attribute, pool) in [
            ("private_ip", &mut state.private_ips),
            ("public_ip", &mut state.public_ips),
        ] {
            if let Some(ip) = removed.attribute_str(attribute).and_then(|s| s.parse::<Ipv4Addr>().ok()) {
                pool.remove(&ip);
            }
        }
        tracing::debug!(id = %removed.id, provider_id, "destroyed");
        Ok(())
    }
}
