//! Topology synthesis from resolved pool members

use crate::error::{Result, SynthesisError};
use crate::topology::{HealthCheckPolicy, ServiceSpec, TopologyConfig, UpstreamTarget};
use stackflow_core::{InstanceMap, ResourceInstance, set_members};

/// Attribute every pool member must expose
pub const ADDRESS_ATTRIBUTE: &str = "private_ip";

/// Builds the gateway configuration for `app_pool`.
///
/// Targets follow the pool order. The pool is only read; the same inputs
/// always produce an equal config.
pub fn synthesize(
    service: &ServiceSpec,
    app_pool: &[&ResourceInstance],
    policy: &HealthCheckPolicy,
) -> Result<TopologyConfig> {
    if app_pool.is_empty() {
        return Err(SynthesisError::EmptyPool(service.service_name.clone()));
    }
    policy.validate()?;

    let upstream_targets = app_pool
        .iter()
        .map(|member| target_for(service, member))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        service = %service.service_name,
        targets = upstream_targets.len(),
        "synthesized topology"
    );
    Ok(TopologyConfig {
        service_name: service.service_name.clone(),
        route_paths: service.route_paths.clone(),
        upstream_targets,
        health_check: policy.clone(),
    })
}

fn target_for(service: &ServiceSpec, member: &ResourceInstance) -> Result<UpstreamTarget> {
    if !member.is_ready() {
        return Err(SynthesisError::NotReady {
            id: member.id.clone(),
            status: member.status,
        });
    }
    let ip = member
        .attribute_str(ADDRESS_ATTRIBUTE)
        .ok_or_else(|| SynthesisError::MissingAddress(member.id.clone()))?;
    let weight = service.weight_for(&member.id);
    if weight == 0 {
        return Err(SynthesisError::ZeroWeight(member.id.clone()));
    }
    Ok(UpstreamTarget::new(format!("{}:{}", ip, service.port), weight))
}

/// Instances making up pool `pool`: the members of an instance-set in key
/// order, or the single instance with that id.
pub fn pool_members<'a>(pool: &str, instances: &'a InstanceMap) -> Vec<&'a ResourceInstance> {
    match instances.get(pool) {
        Some(instance) => vec![instance],
        None => set_members(pool, instances),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stackflow_core::{InstanceStatus, ResourceKind};

    fn member(key: &str, ip: &str) -> ResourceInstance {
        ResourceInstance::new(format!("apps.{}", key), ResourceKind::Instance)
            .with_membership("apps", key)
            .with_status(InstanceStatus::Ready)
            .with_attribute("private_ip", json!(ip))
    }

    fn pool() -> Vec<ResourceInstance> {
        vec![
            member("a", "10.0.1.1"),
            member("b", "10.0.1.2"),
            member("c", "10.0.1.3"),
        ]
    }

    #[test]
    fn test_equal_weights_in_pool_order() {
        let pool = pool();
        let refs: Vec<&ResourceInstance> = pool.iter().collect();
        let config = synthesize(&ServiceSpec::new("app-service"), &refs, &HealthCheckPolicy::default()).unwrap();

        assert_eq!(
            config.upstream_targets,
            vec![
                UpstreamTarget::new("10.0.1.1:8080", 100),
                UpstreamTarget::new("10.0.1.2:8080", 100),
                UpstreamTarget::new("10.0.1.3:8080", 100),
            ]
        );
        assert_eq!(config.route_paths, vec!["/"]);
        assert_eq!(config.health_check, HealthCheckPolicy::default());
    }

    #[test]
    fn test_order_follows_input() {
        let pool = pool();
        let refs = vec![&pool[2], &pool[0]];
        let config = synthesize(&ServiceSpec::new("svc"), &refs, &HealthCheckPolicy::default()).unwrap();
        let addresses: Vec<&str> = config.upstream_targets.iter().map(|t| t.address.as_str()).collect();
        assert_eq!(addresses, vec!["10.0.1.3:8080", "10.0.1.1:8080"]);
    }

    #[test]
    fn test_weight_override() {
        let pool = pool();
        let refs: Vec<&ResourceInstance> = pool.iter().collect();
        let service = ServiceSpec::new("svc").with_port(9000).with_weight("apps.b", 50);
        let config = synthesize(&service, &refs, &HealthCheckPolicy::default()).unwrap();
        assert_eq!(config.upstream_targets[1], UpstreamTarget::new("10.0.1.2:9000", 50));
        assert_eq!(config.upstream_targets[0].weight, 100);
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let pool = pool();
        let refs: Vec<&ResourceInstance> = pool.iter().collect();
        let service = ServiceSpec::new("svc").with_paths(["/api", "/v2"]);
        let first = synthesize(&service, &refs, &HealthCheckPolicy::default()).unwrap();
        let second = synthesize(&service, &refs, &HealthCheckPolicy::default()).unwrap();
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn test_rejects_bad_pools() {
        let policy = HealthCheckPolicy::default();
        let service = ServiceSpec::new("svc");
        assert_eq!(
            synthesize(&service, &[], &policy),
            Err(SynthesisError::EmptyPool("svc".to_string()))
        );

        let pending = ResourceInstance::new("apps.a", ResourceKind::Instance);
        assert!(matches!(
            synthesize(&service, &[&pending], &policy),
            Err(SynthesisError::NotReady { .. })
        ));

        let no_ip = ResourceInstance::new("apps.a", ResourceKind::Instance).with_status(InstanceStatus::Ready);
        assert_eq!(
            synthesize(&service, &[&no_ip], &policy),
            Err(SynthesisError::MissingAddress("apps.a".to_string()))
        );

        let pool = pool();
        let zero = ServiceSpec::new("svc").with_weight("apps.a", 0);
        assert_eq!(
            synthesize(&zero, &[&pool[0]], &policy),
            Err(SynthesisError::ZeroWeight("apps.a".to_string()))
        );
    }

    #[test]
    fn test_pool_members() {
        let mut instances: InstanceMap = pool().into_iter().map(|i| (i.id.clone(), i)).collect();
        let db = ResourceInstance::new("db", ResourceKind::Instance);
        instances.insert("db".to_string(), db);

        let ids: Vec<&str> = pool_members("apps", &instances).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["apps.a", "apps.b", "apps.c"]);
        assert_eq!(pool_members("db", &instances).len(), 1);
        assert!(pool_members("cache", &instances).is_empty());
    }
}
