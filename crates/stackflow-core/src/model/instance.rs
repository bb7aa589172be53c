//! Materialized resource state

use super::resource::ResourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Instances keyed by id. Ordered so every walk over it is deterministic.
pub type InstanceMap = BTreeMap<String, ResourceInstance>;

/// Lifecycle of one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Declared, not dispatched yet
    Pending,
    /// Create call in flight
    Creating,
    /// Created and attributes populated
    Ready,
    /// Creation failed, or a dependency failed (terminal)
    Failed,
}

impl InstanceStatus {
    /// Whether `self -> next` is a legal transition.
    ///
    /// `Pending -> Ready` is the adoption of an unchanged instance from a
    /// previous run; `Pending -> Failed` is a cascade from a failed
    /// dependency.
    pub fn can_transition_to(self, next: InstanceStatus) -> bool {
        use InstanceStatus::*;
        matches!(
            (self, next),
            (Pending, Creating) | (Pending, Ready) | (Pending, Failed) | (Creating, Ready) | (Creating, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InstanceStatus::Ready | InstanceStatus::Failed)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::Pending => write!(f, "pending"),
            InstanceStatus::Creating => write!(f, "creating"),
            InstanceStatus::Ready => write!(f, "ready"),
            InstanceStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Provider-assigned state of one resource (or one instance-set member)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInstance {
    /// Logical id (`db`, `apps.a`)
    pub id: String,

    pub kind: ResourceKind,

    pub status: InstanceStatus,

    /// Provider-reported attributes (private_ip, public_ip, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,

    /// Resolved inputs the instance was created with
    #[serde(default)]
    pub inputs: BTreeMap<String, serde_json::Value>,

    /// Provider-side identifier, used for describe/destroy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// Owning instance-set, for set members
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_of: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Ids this instance depended on when it was declared. Undeclared
    /// instances are torn down in this order, dependents first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Failure cause when `status == Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ResourceInstance {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind,
            status: InstanceStatus::Pending,
            attributes: BTreeMap::new(),
            inputs: BTreeMap::new(),
            provider_id: None,
            member_of: None,
            key: None,
            depends_on: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_membership(mut self, set: impl Into<String>, key: impl Into<String>) -> Self {
        self.member_of = Some(set.into());
        self.key = Some(key.into());
        self
    }

    pub fn with_provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    pub fn is_ready(&self) -> bool {
        self.status == InstanceStatus::Ready
    }

    /// Applies a status transition. Returns `false` and leaves the instance
    /// untouched when the transition is illegal.
    pub fn transition(&mut self, next: InstanceStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }
}
