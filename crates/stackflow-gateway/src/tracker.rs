//! Re-synthesis on pool changes

use crate::error::Result;
use crate::synth::{ADDRESS_ATTRIBUTE, synthesize};
use crate::topology::{HealthCheckPolicy, ServiceSpec, TopologyConfig};
use stackflow_core::{InstanceStatus, ResourceInstance};

/// Membership, status and address of each member the last pool had
type Fingerprint = Vec<(String, InstanceStatus, Option<String>)>;

/// Holds the current topology and rebuilds it only when pool membership,
/// a member status or a member address changes.
#[derive(Debug, Clone)]
pub struct TopologyTracker {
    service: ServiceSpec,
    policy: HealthCheckPolicy,
    fingerprint: Option<Fingerprint>,
    current: Option<TopologyConfig>,
    /// Member ids `current` routes to
    routed: Vec<String>,
}

impl TopologyTracker {
    pub fn new(service: ServiceSpec, policy: HealthCheckPolicy) -> Self {
        Self {
            service,
            policy,
            fingerprint: None,
            current: None,
            routed: Vec::new(),
        }
    }

    /// Latest successfully synthesized config
    pub fn current(&self) -> Option<&TopologyConfig> {
        self.current.as_ref()
    }

    /// Re-synthesizes when `pool` differs from the last accepted pool.
    /// Returns whether a new config was produced.
    ///
    /// On error the previous config is kept only while every member it
    /// routes to is still ready in `pool`; otherwise it is dropped.
    pub fn update(&mut self, pool: &[&ResourceInstance]) -> Result<bool> {
        let fingerprint: Fingerprint = pool
            .iter()
            .map(|m| {
                (
                    m.id.clone(),
                    m.status,
                    m.attribute_str(ADDRESS_ATTRIBUTE).map(str::to_string),
                )
            })
            .collect();
        if self.fingerprint.as_ref() == Some(&fingerprint) {
            return Ok(false);
        }

        let config = match synthesize(&self.service, pool, &self.policy) {
            Ok(config) => config,
            Err(e) => {
                self.fingerprint = None;
                let stale = self
                    .routed
                    .iter()
                    .any(|id| !pool.iter().any(|m| &m.id == id && m.is_ready()));
                if stale && self.current.is_some() {
                    tracing::warn!(
                        service = %self.service.service_name,
                        error = %e,
                        "dropping topology that routes to members no longer ready"
                    );
                    self.current = None;
                    self.routed.clear();
                }
                return Err(e);
            }
        };

        tracing::info!(
            service = %self.service.service_name,
            targets = config.upstream_targets.len(),
            "topology changed"
        );
        self.fingerprint = Some(fingerprint);
        self.current = Some(config);
        self.routed = pool.iter().map(|m| m.id.clone()).collect();
        Ok(true)
    }

    /// Replaces the service inputs; the next `update` always re-synthesizes.
    pub fn set_service(&mut self, service: ServiceSpec) {
        self.service = service;
        self.fingerprint = None;
    }

    /// Replaces the policy; the next `update` always re-synthesizes.
    pub fn set_policy(&mut self, policy: HealthCheckPolicy) {
        self.policy = policy;
        self.fingerprint = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::error::SynthesisError;
    use stackflow_core::ResourceKind;

    fn member(id: &str, ip: &str) -> ResourceInstance {
        ResourceInstance::new(id, ResourceKind::Instance)
            .with_status(InstanceStatus::Ready)
            .with_attribute("private_ip", json!(ip))
    }

    fn tracker() -> TopologyTracker {
        TopologyTracker::new(ServiceSpec::new("svc"), HealthCheckPolicy::default())
    }

    #[test]
    fn test_unchanged_pool_is_not_resynthesized() {
        let a = member("apps.a", "10.0.1.1");
        let b = member("apps.b", "10.0.1.2");
        let mut tracker = tracker();

        assert!(tracker.update(&[&a, &b]).unwrap());
        assert!(!tracker.update(&[&a, &b]).unwrap());
        assert_eq!(tracker.current().unwrap().upstream_targets.len(), 2);
    }

    #[test]
    fn test_membership_and_address_changes() {
        let a = member("apps.a", "10.0.1.1");
        let b = member("apps.b", "10.0.1.2");
        let mut tracker = tracker();
        tracker.update(&[&a, &b]).unwrap();

        assert!(tracker.update(&[&a]).unwrap());
        assert_eq!(tracker.current().unwrap().upstream_targets.len(), 1);

        let moved = member("apps.a", "10.0.1.9");
        assert!(tracker.update(&[&moved]).unwrap());
        assert_eq!(
            tracker.current().unwrap().upstream_targets[0].address,
            "10.0.1.9:8080"
        );
    }

    #[test]
    fn test_failed_update_keeps_previous_config() {
        let a = member("apps.a", "10.0.1.1");
        let mut tracker = tracker();
        tracker.update(&[&a]).unwrap();

        let pending = ResourceInstance::new("apps.b", ResourceKind::Instance);
        assert!(tracker.update(&[&a, &pending]).is_err());
        assert_eq!(tracker.current().unwrap().upstream_targets.len(), 1);
    }

    #[test]
    fn test_member_turning_failed_drops_its_target() {
        let a = member("apps.a", "10.0.1.1");
        let b = member("apps.b", "10.0.1.2");
        let mut tracker = tracker();
        tracker.update(&[&a, &b]).unwrap();

        // same address, no longer ready
        let failed = member("apps.b", "10.0.1.2").with_status(InstanceStatus::Failed);
        assert_eq!(
            tracker.update(&[&a, &failed]),
            Err(SynthesisError::NotReady {
                id: "apps.b".into(),
                status: InstanceStatus::Failed,
            })
        );
        assert!(tracker.current().is_none());

        assert!(tracker.update(&[&a]).unwrap());
        let targets = &tracker.current().unwrap().upstream_targets;
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].address, "10.0.1.1:8080");
    }

    #[test]
    fn test_failed_update_is_retried() {
        let a = member("apps.a", "10.0.1.1");
        let pending = ResourceInstance::new("apps.b", ResourceKind::Instance);
        let mut tracker = tracker();
        tracker.update(&[&a]).unwrap();

        assert!(tracker.update(&[&a, &pending]).is_err());
        assert!(tracker.update(&[&a, &pending]).is_err());

        let ready = member("apps.b", "10.0.1.2");
        assert!(tracker.update(&[&a, &ready]).unwrap());
        assert_eq!(tracker.current().unwrap().upstream_targets.len(), 2);
    }

    #[test]
    fn test_policy_change_forces_resynthesis() {
        let a = member("apps.a", "10.0.1.1");
        let mut tracker = tracker();
        tracker.update(&[&a]).unwrap();

        tracker.set_policy(HealthCheckPolicy {
            interval: 10,
            ..Default::default()
        });
        assert!(tracker.update(&[&a]).unwrap());
        assert_eq!(tracker.current().unwrap().health_check.interval, 10);
    }
}
