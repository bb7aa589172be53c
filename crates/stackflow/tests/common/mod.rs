#![allow(deprecated)]

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const DEMO_STACK: &str = r#"
stack "kong-demo"

resource "security-group" "app_sg" {
    ingress port=8080 cidr="10.0.0.0/16"
}

resource "instance" "db" {
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
output "apps_private_ips" "${apps[*].private_ip}"
output "database_private_ip" "${db.private_ip}"
"#;

/// Project directory isolated from the user's config and environment
pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write_stack_kdl(&self, content: &str) {
        fs::write(self.root.path().join("stack.kdl"), content).unwrap();
    }

    #[allow(dead_code)]
    pub fn write_settings(&self, content: &str) {
        let dir = self.root.path().join(".stackflow");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("settings.yaml"), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    /// `stack` running inside the project with a private config dir
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("stack").unwrap();
        cmd.current_dir(self.path())
            .env("XDG_CONFIG_HOME", self.path().join(".config"))
            .env_remove("STACK_CONFIG_PATH")
            .env_remove("STACK_CONCURRENCY")
            .env_remove("RUST_LOG");
        cmd
    }
}
