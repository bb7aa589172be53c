//! Resource declarations

use super::input::{Input, Reference, is_identifier, is_key};
use crate::error::SpecError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Kind of a declared resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    SecurityGroup,
    Instance,
    /// Expands into one `Instance` per for-each key
    InstanceSet,
}

impl ResourceKind {
    pub fn parse(s: &str) -> Result<Self, SpecError> {
        match s.to_lowercase().as_str() {
            "security-group" | "security_group" => Ok(Self::SecurityGroup),
            "instance" => Ok(Self::Instance),
            "instance-set" | "instance_set" => Ok(Self::InstanceSet),
            _ => Err(SpecError::UnknownKind(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecurityGroup => "security-group",
            Self::Instance => "instance",
            Self::InstanceSet => "instance-set",
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::InstanceSet)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub id: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub inputs: BTreeMap<String, Input>,
    /// for-each keys, required iff `kind == InstanceSet`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_key: Option<BTreeSet<String>>,
}

impl ResourceSpec {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            inputs: BTreeMap::new(),
            count_key: None,
        }
    }

    pub fn security_group(id: impl Into<String>) -> Self {
        Self::new(id, ResourceKind::SecurityGroup)
    }

    pub fn instance(id: impl Into<String>) -> Self {
        Self::new(id, ResourceKind::Instance)
    }

    pub fn instance_set<I, K>(id: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut spec = Self::new(id, ResourceKind::InstanceSet);
        spec.count_key = Some(keys.into_iter().map(Into::into).collect());
        spec
    }

    pub fn with_input(mut self, name: impl Into<String>, input: Input) -> Self {
        self.inputs.insert(name.into(), input);
        self
    }

    pub fn references(&self) -> Vec<&Reference> {
        self.inputs.values().flat_map(Input::references).collect()
    }

    /// Member keys in expansion order (empty for non-set kinds).
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.count_key.iter().flatten()
    }
}

/// Declaration registry
///
/// `declare` enforces the per-declaration rules; references may point
/// forward, so they are only checked by `validate` once everything is
/// declared.
#[derive(Debug, Clone, Default)]
pub struct Stack {
    specs: Vec<ResourceSpec>,
    index: HashMap<String, usize>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares every spec in order, stopping at the first error.
    pub fn from_specs(specs: impl IntoIterator<Item = ResourceSpec>) -> Result<Self, SpecError> {
        let mut stack = Self::new();
        for spec in specs {
            stack.declare(spec)?;
        }
        Ok(stack)
    }

    pub fn declare(&mut self, spec: ResourceSpec) -> Result<(), SpecError> {
        if !is_identifier(&spec.id) {
            return Err(SpecError::InvalidId(spec.id));
        }
        if self.index.contains_key(&spec.id) {
            return Err(SpecError::DuplicateId(spec.id));
        }

        match (&spec.kind, &spec.count_key) {
            (ResourceKind::InstanceSet, None) => return Err(SpecError::EmptyCountKey(spec.id)),
            (ResourceKind::InstanceSet, Some(keys)) if keys.is_empty() => {
                return Err(SpecError::EmptyCountKey(spec.id));
            }
            (ResourceKind::InstanceSet, Some(keys)) => {
                if let Some(bad) = keys.iter().find(|k| !is_key(k)) {
                    return Err(SpecError::InvalidKey {
                        id: spec.id.clone(),
                        key: bad.clone(),
                    });
                }
            }
            (kind, Some(_)) => {
                return Err(SpecError::UnexpectedCountKey {
                    id: spec.id.clone(),
                    kind: *kind,
                });
            }
            (_, None) => {}
        }

        if !spec.kind.is_set() && spec.inputs.values().any(Input::contains_each_key) {
            return Err(SpecError::EachKeyOutsideSet(spec.id));
        }

        tracing::debug!(id = %spec.id, kind = %spec.kind, "declared resource");
        self.index.insert(spec.id.clone(), self.specs.len());
        self.specs.push(spec);
        Ok(())
    }

    /// Checks that every reference names a declared resource and, for member
    /// references, a key of that instance-set.
    pub fn validate(&self) -> Result<(), SpecError> {
        for spec in &self.specs {
            for reference in spec.references() {
                self.check_reference(&spec.id, reference)?;
            }
        }
        Ok(())
    }

    pub(crate) fn check_reference(&self, from: &str, reference: &Reference) -> Result<(), SpecError> {
        let target_id = reference.resource_id();
        let target = self.get(target_id).ok_or_else(|| SpecError::UnknownReference {
            from: from.to_string(),
            target: target_id.to_string(),
        })?;

        if let Some(key) = reference.member_key() {
            if !target.kind.is_set() {
                return Err(SpecError::NotASet {
                    from: from.to_string(),
                    target: target_id.to_string(),
                });
            }
            if !target.keys().any(|k| k == key) {
                return Err(SpecError::UnknownMember {
                    from: from.to_string(),
                    set: target_id.to_string(),
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ResourceSpec> {
        self.index.get(id).map(|&i| &self.specs[i])
    }

    /// Specs in declaration order
    pub fn specs(&self) -> &[ResourceSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
