use super::*;
use crate::error::SpecError;
use crate::model::{Input, Reference, ResourceKind};
use std::fs;

const KONG_STACK: &str = r#"
stack "kong-demo"

resource "security-group" "app_sg" {
    ingress port=8080 cidr="10.0.0.0/16"
}

resource "instance" "db" {
    size "small"
    security-groups "${app_sg.id}"
}

resource "instance-set" "apps" {
    for-each "a" "b" "c"
    name "app-${each.key}"
    db-host "${db.private_ip}"
}

resource "instance" "kong" {
    upstreams "${apps[*].private_ip}"
}

gateway "app-service" {
    pool "apps"
    port 8080
    paths "/api"
}

output "kong_public_ip" "${kong.public_ip}"
output "apps_public_ips" "${apps[*].public_ip}"
output "database_private_ip" "${db.private_ip}"
"#;

#[test]
fn test_parse_full_stack() {
    let file = parse_stack_string(KONG_STACK, "default".to_string()).unwrap();
    assert_eq!(file.name, "kong-demo");

    let ids: Vec<&str> = file.stack.specs().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["app_sg", "db", "apps", "kong"]);
    assert_eq!(file.stack.get("apps").unwrap().kind, ResourceKind::InstanceSet);
    assert_eq!(
        file.stack.get("kong").unwrap().inputs["upstreams"],
        Input::Ref(Reference::new("apps", "private_ip"))
    );

    assert_eq!(file.gateways.len(), 1);
    assert_eq!(file.gateway("app-service").unwrap().port, Some(8080));
    assert_eq!(file.outputs.len(), 3);
}

#[test]
fn test_default_name_without_stack_node() {
    let file = parse_stack_string(r#"resource "instance" "db""#, "fallback".to_string()).unwrap();
    assert_eq!(file.name, "fallback");
    assert_eq!(file.stack.len(), 1);
}

#[test]
fn test_unknown_nodes_are_skipped() {
    let file = parse_stack_string(
        r#"
        provider "sakura-cloud"
        resource "instance" "db"
        "#,
        "test".to_string(),
    )
    .unwrap();
    assert_eq!(file.stack.len(), 1);
}

#[test]
fn test_duplicate_resource() {
    let err = parse_stack_string(
        r#"
        resource "instance" "db"
        resource "instance" "db"
        "#,
        "test".to_string(),
    )
    .unwrap_err();
    assert!(matches!(err, StackError::Spec(SpecError::DuplicateId(_))));
}

#[test]
fn test_instance_set_without_keys() {
    let err = parse_stack_string(r#"resource "instance-set" "apps""#, "test".to_string()).unwrap_err();
    assert!(matches!(err, StackError::Spec(SpecError::EmptyCountKey(_))));
}

#[test]
fn test_undeclared_reference() {
    let err = parse_stack_string(
        r#"
        resource "instance" "kong" {
            upstreams "${apps[*].private_ip}"
        }
        "#,
        "test".to_string(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        StackError::Spec(SpecError::UnknownReference { .. })
    ));
}

#[test]
fn test_gateway_pool_must_exist() {
    let err = parse_stack_string(
        r#"
        resource "instance" "db"
        gateway "svc" { pool "apps" }
        "#,
        "test".to_string(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        StackError::Spec(SpecError::UnknownReference { .. })
    ));
}

#[test]
fn test_gateway_weight_must_name_pool_member() {
    let err = parse_stack_string(
        r#"
        resource "instance-set" "apps" { for-each "a" }
        gateway "svc" {
            pool "apps"
            weight "apps.z" 10
        }
        "#,
        "test".to_string(),
    )
    .unwrap_err();
    assert!(matches!(err, StackError::Spec(SpecError::Invalid(_))));
}

#[test]
fn test_invalid_kdl() {
    let err = parse_stack_string("resource \"instance\" {", "test".to_string()).unwrap_err();
    assert!(matches!(err, StackError::KdlParse(_)));
}

#[test]
fn test_parse_stack_file_uses_directory_name() {
    let temp_dir = tempfile::tempdir().unwrap();
    let project = temp_dir.path().join("my-stack");
    fs::create_dir(&project).unwrap();
    let path = project.join("stack.kdl");
    fs::write(&path, r#"resource "instance" "db""#).unwrap();

    let file = parse_stack_file(&path).unwrap();
    assert_eq!(file.name, "my-stack");
}

#[test]
fn test_parse_missing_file() {
    let err = parse_stack_file("/nonexistent/stack.kdl").unwrap_err();
    assert!(matches!(err, StackError::IoError { .. }));
}
