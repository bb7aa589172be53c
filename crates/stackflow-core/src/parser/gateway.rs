//! `gateway` and `output` node parsing

use super::expr::parse_expression;
use crate::error::{Result, SpecError};
use crate::model::{GatewayDecl, HealthCheckDecl, Input, OutputDecl};
use kdl::KdlNode;

fn first_string(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn first_integer(node: &KdlNode) -> Option<i128> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
}

fn property_integer(node: &KdlNode, names: &[&str]) -> Option<i128> {
    node.entries()
        .iter()
        .find(|e| e.name().is_some_and(|n| names.contains(&n.value())))
        .and_then(|e| e.value().as_integer())
}

fn narrow<T: TryFrom<i128>>(value: i128, what: &str, owner: &str) -> Result<T> {
    T::try_from(value)
        .map_err(|_| SpecError::Invalid(format!("{} of gateway {} is out of range: {}", what, owner, value)).into())
}

/// Parses a `gateway "<service>" { ... }` block.
pub fn parse_gateway(node: &KdlNode) -> Result<GatewayDecl> {
    let service_name = first_string(node)
        .ok_or_else(|| SpecError::Invalid("gateway requires a service name".to_string()))?;

    let mut gateway = GatewayDecl {
        service_name: service_name.clone(),
        ..Default::default()
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "pool" => {
                    gateway.pool = first_string(child).unwrap_or_default();
                }
                "port" => {
                    if let Some(port) = first_integer(child) {
                        gateway.port = Some(narrow(port, "port", &service_name)?);
                    }
                }
                "paths" | "path" => {
                    gateway.paths.extend(
                        child
                            .entries()
                            .iter()
                            .filter_map(|e| e.value().as_string().map(|s| s.to_string())),
                    );
                }
                "default-weight" | "default_weight" => {
                    if let Some(weight) = first_integer(child) {
                        gateway.default_weight = Some(narrow(weight, "default-weight", &service_name)?);
                    }
                }
                "weight" => {
                    // weight "apps.b" 50
                    let member = first_string(child);
                    let weight = child
                        .entries()
                        .iter()
                        .filter(|e| e.name().is_none())
                        .find_map(|e| e.value().as_integer());
                    match (member, weight) {
                        (Some(member), Some(weight)) => {
                            gateway
                                .weights
                                .insert(member, narrow(weight, "weight", &service_name)?);
                        }
                        _ => {
                            return Err(SpecError::Invalid(format!(
                                "weight in gateway {} expects an instance id and a number",
                                service_name
                            ))
                            .into());
                        }
                    }
                }
                "health-check" | "health_check" | "healthcheck" => {
                    gateway.health_check = Some(parse_health_check(child, &service_name)?);
                }
                other => {
                    tracing::debug!("gateway {}: ignoring '{}'", service_name, other);
                }
            }
        }
    }

    if gateway.pool.is_empty() {
        return Err(SpecError::Invalid(format!("gateway {} requires a pool", service_name)).into());
    }
    Ok(gateway)
}

fn parse_health_check(node: &KdlNode, owner: &str) -> Result<HealthCheckDecl> {
    let mut decl = HealthCheckDecl::default();
    if let Some(v) = property_integer(node, &["interval"]) {
        decl.interval = Some(narrow(v, "health-check interval", owner)?);
    }
    if let Some(v) = property_integer(node, &["successes", "success-threshold"]) {
        decl.success_threshold = Some(narrow(v, "health-check successes", owner)?);
    }
    if let Some(v) = property_integer(node, &["failures", "failure-threshold"]) {
        decl.failure_threshold = Some(narrow(v, "health-check failures", owner)?);
    }
    if let Some(v) = property_integer(node, &["timeout"]) {
        decl.timeout = Some(narrow(v, "health-check timeout", owner)?);
    }
    decl.path = node
        .entries()
        .iter()
        .find(|e| e.name().is_some_and(|n| n.value() == "path"))
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string());
    Ok(decl)
}

/// Parses `output "<name>" "${target.attr}"`.
pub fn parse_output(node: &KdlNode) -> Result<OutputDecl> {
    let mut args = node
        .entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value().as_string());

    let name = args
        .next()
        .flatten()
        .ok_or_else(|| SpecError::Invalid("output requires a name".to_string()))?;
    let expr = args
        .next()
        .flatten()
        .ok_or_else(|| SpecError::Invalid(format!("output {} requires a reference", name)))?;

    match parse_expression(expr)? {
        Input::Ref(reference) => Ok(OutputDecl::new(name, reference)),
        _ => Err(SpecError::InvalidReference(expr.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kdl::KdlDocument;

    fn first_node(kdl: &str) -> KdlNode {
        let doc: KdlDocument = kdl.parse().unwrap();
        doc.nodes()[0].clone()
    }

    #[test]
    fn test_parse_gateway() {
        let node = first_node(
            r#"
            gateway "app-service" {
                pool "apps"
                port 8080
                paths "/api" "/v1"
                default-weight 100
                weight "apps.b" 50
                health-check interval=10 successes=3 failures=1 path="/ready"
            }
            "#,
        );
        let gateway = parse_gateway(&node).unwrap();
        assert_eq!(gateway.service_name, "app-service");
        assert_eq!(gateway.pool, "apps");
        assert_eq!(gateway.port, Some(8080));
        assert_eq!(gateway.paths, vec!["/api", "/v1"]);
        assert_eq!(gateway.default_weight, Some(100));
        assert_eq!(gateway.weights.get("apps.b"), Some(&50));

        let hc = gateway.health_check.unwrap();
        assert_eq!(hc.interval, Some(10));
        assert_eq!(hc.success_threshold, Some(3));
        assert_eq!(hc.failure_threshold, Some(1));
        assert_eq!(hc.path.as_deref(), Some("/ready"));
        assert_eq!(hc.timeout, None);
    }

    #[test]
    fn test_gateway_requires_pool() {
        let node = first_node(r#"gateway "svc" { port 8080 }"#);
        assert!(parse_gateway(&node).is_err());
    }

    #[test]
    fn test_gateway_port_out_of_range() {
        let node = first_node(r#"gateway "svc" { pool "apps"; port 70000 }"#);
        assert!(parse_gateway(&node).is_err());
    }

    #[test]
    fn test_parse_output() {
        let node = first_node(r#"output "apps_public_ips" "${apps[*].public_ip}""#);
        let output = parse_output(&node).unwrap();
        assert_eq!(output.name, "apps_public_ips");
        assert_eq!(output.reference.target, "apps");
        assert_eq!(output.reference.attribute, "public_ip");

        let node = first_node(r#"output "bad" "literal""#);
        assert!(parse_output(&node).is_err());
    }
}
