#![allow(deprecated)]

mod common;

use assert_cmd::Command;
use common::{DEMO_STACK, TestProject};
use predicates::prelude::*;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("graph"))
        .stdout(predicate::str::contains("apply"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackflow"));
}

#[test]
fn test_apply_help() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.args(["apply", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[FILE]"))
        .stdout(predicate::str::contains("--gateway-out"))
        .stdout(predicate::str::contains("--fail"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

#[test]
fn test_validate_without_stack_file() {
    let project = TestProject::new();
    project
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Stack file not found"));
}

#[test]
fn test_validate_demo_stack() {
    let project = TestProject::new();
    project.write_stack_kdl(DEMO_STACK);
    project
        .command()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stack is valid"))
        .stdout(predicate::str::contains("Instances: 6"))
        .stdout(predicate::str::contains("app-service"));
}

#[test]
fn test_validate_reports_cycle() {
    let project = TestProject::new();
    project.write_stack_kdl(
        r#"
resource "instance" "a" {
    peer "${b.private_ip}"
}
resource "instance" "b" {
    peer "${a.private_ip}"
}
"#,
    );
    project
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Dependency cycle"));
}

#[test]
fn test_validate_reports_unknown_reference() {
    let project = TestProject::new();
    let path = project.path().join("broken.kdl");
    std::fs::write(
        &path,
        r#"
resource "instance" "kong" {
    upstreams "${apps[*].private_ip}"
}
"#,
    )
    .unwrap();
    project
        .command()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("undeclared resource 'apps'"));
}

#[test]
fn test_graph_prints_dependency_order() {
    let project = TestProject::new();
    project.write_stack_kdl(DEMO_STACK);
    let output = project.command().arg("graph").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let position = |id: &str| stdout.find(&format!(". {}", id)).unwrap();
    assert!(position("app_sg") < position("db"));
    assert!(position("db") < position("apps.a"));
    assert!(position("apps.c") < position("kong"));
    assert!(stdout.contains("<- apps.a, apps.b, apps.c"));
}

#[test]
fn test_apply_prints_outputs_and_gateway() {
    let project = TestProject::new();
    project.write_stack_kdl(DEMO_STACK);
    project
        .command()
        .arg("apply")
        .assert()
        .success()
        .stdout(predicate::str::contains("kong_public_ip = 203.0.113."))
        .stdout(predicate::str::contains("apps_private_ips = {\"a\":\"10.0."))
        .stdout(predicate::str::contains("_format_version"))
        .stdout(predicate::str::contains("app-service-upstream"))
        .stdout(predicate::str::contains("6 to create"));
}

#[test]
fn test_apply_writes_json_gateway() {
    let project = TestProject::new();
    project.write_stack_kdl(DEMO_STACK);
    let out = project.path().join("topology.json");
    project
        .command()
        .args(["apply", "--format", "json", "--gateway-out"])
        .arg(&out)
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    let topology = &json[0];
    assert_eq!(topology["service_name"], "app-service");
    assert_eq!(topology["route_paths"][0], "/api");
    assert_eq!(topology["upstream_targets"].as_array().unwrap().len(), 3);
}

#[test]
fn test_apply_partial_failure_exits_non_zero() {
    let project = TestProject::new();
    project.write_stack_kdl(DEMO_STACK);
    project
        .command()
        .args(["apply", "--fail", "apps.b"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Apply failed"))
        .stderr(predicate::str::contains("apps.b: provider error"))
        .stderr(predicate::str::contains("kong: dependency 'apps.b' failed"))
        .stdout(predicate::str::contains("Gateway config").not());
}

#[test]
fn test_apply_partial_failure_prints_available_outputs() {
    let project = TestProject::new();
    project.write_stack_kdl(DEMO_STACK);
    project
        .command()
        .args(["apply", "--fail", "apps.b"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Outputs:"))
        .stdout(predicate::str::contains("database_private_ip = 10.0."))
        .stdout(predicate::str::contains("kong_public_ip").not())
        .stdout(predicate::str::contains("apps_private_ips").not());
}

#[test]
fn test_apply_uses_project_settings() {
    let project = TestProject::new();
    project.write_stack_kdl(DEMO_STACK);
    project.write_settings("concurrency: 2\n");
    project
        .command()
        .arg("apply")
        .assert()
        .success()
        .stdout(predicate::str::contains("concurrency 2"));

    project
        .command()
        .args(["apply", "-j", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("concurrency 1"));
}

#[test]
fn test_apply_rejects_zero_concurrency() {
    let project = TestProject::new();
    project.write_stack_kdl(DEMO_STACK);
    project
        .command()
        .env("STACK_CONCURRENCY", "0")
        .arg("apply")
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency must be at least 1"));
}
