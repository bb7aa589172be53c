//! Gateway artifact rendering
//!
//! Kong declarative configuration (DB-less mode, format version 3.0):
//!
//! ```yaml
//! _format_version: '3.0'
//! services:
//! - name: app-service
//!   host: app-service-upstream
//!   port: 8080
//!   protocol: http
//!   routes:
//!   - name: app-service-route
//!     paths:
//!     - /api
//! upstreams:
//! - name: app-service-upstream
//!   healthchecks:
//!     active: { ... }
//!   targets:
//!   - target: 10.0.1.1:8080
//!     weight: 100
//! ```

use crate::error::{Result, SynthesisError};
use crate::topology::TopologyConfig;
use serde::Serialize;

pub const KONG_FORMAT_VERSION: &str = "3.0";

#[derive(Debug, Serialize)]
struct KongConfig<'a> {
    #[serde(rename = "_format_version")]
    format_version: &'static str,
    services: Vec<KongService<'a>>,
    upstreams: Vec<KongUpstream<'a>>,
}

#[derive(Debug, Serialize)]
struct KongService<'a> {
    name: &'a str,
    host: String,
    port: u16,
    protocol: &'static str,
    routes: Vec<KongRoute<'a>>,
}

#[derive(Debug, Serialize)]
struct KongRoute<'a> {
    name: String,
    paths: &'a [String],
}

#[derive(Debug, Serialize)]
struct KongUpstream<'a> {
    name: String,
    healthchecks: KongHealthchecks<'a>,
    targets: Vec<KongTarget<'a>>,
}

#[derive(Debug, Serialize)]
struct KongHealthchecks<'a> {
    active: KongActiveCheck<'a>,
}

#[derive(Debug, Serialize)]
struct KongActiveCheck<'a> {
    #[serde(rename = "type")]
    check_type: &'static str,
    http_path: &'a str,
    timeout: u64,
    healthy: KongHealthy,
    unhealthy: KongUnhealthy,
}

#[derive(Debug, Serialize)]
struct KongHealthy {
    interval: u64,
    successes: u32,
}

#[derive(Debug, Serialize)]
struct KongUnhealthy {
    interval: u64,
    http_failures: u32,
    tcp_failures: u32,
    timeouts: u32,
}

#[derive(Debug, Serialize)]
struct KongTarget<'a> {
    target: &'a str,
    weight: u32,
}

/// The service port is the port shared by every target; the upstream name
/// stands in for the host so Kong balances over the targets.
fn kong_config(config: &TopologyConfig) -> KongConfig<'_> {
    let port = config
        .upstream_targets
        .first()
        .and_then(|t| t.address.rsplit_once(':'))
        .and_then(|(_, port)| port.parse().ok())
        .unwrap_or(80);
    let policy = &config.health_check;

    KongConfig {
        format_version: KONG_FORMAT_VERSION,
        services: vec![KongService {
            name: &config.service_name,
            host: config.upstream_name(),
            port,
            protocol: "http",
            routes: vec![KongRoute {
                name: format!("{}-route", config.service_name),
                paths: &config.route_paths,
            }],
        }],
        upstreams: vec![KongUpstream {
            name: config.upstream_name(),
            healthchecks: KongHealthchecks {
                active: KongActiveCheck {
                    check_type: "http",
                    http_path: &policy.path,
                    timeout: policy.timeout,
                    healthy: KongHealthy {
                        interval: policy.interval,
                        successes: policy.success_threshold,
                    },
                    unhealthy: KongUnhealthy {
                        interval: policy.interval,
                        http_failures: policy.failure_threshold,
                        tcp_failures: policy.failure_threshold,
                        timeouts: policy.failure_threshold,
                    },
                },
            },
            targets: config
                .upstream_targets
                .iter()
                .map(|t| KongTarget {
                    target: &t.address,
                    weight: t.weight,
                })
                .collect(),
        }],
    }
}

/// Renders Kong declarative YAML.
pub fn render_kong(config: &TopologyConfig) -> Result<String> {
    serde_yaml::to_string(&kong_config(config)).map_err(|e| SynthesisError::Render(e.to_string()))
}

/// Canonical JSON form of the topology itself.
pub fn to_json(config: &TopologyConfig) -> Result<String> {
    serde_json::to_string_pretty(config).map_err(|e| SynthesisError::Render(e.to_string()))
}
