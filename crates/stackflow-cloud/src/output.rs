//! Output projection
//!
//! Read-only view of final attributes under stable names, e.g.
//! `kong_public_ip` or `apps_private_ips`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stackflow_core::{InstanceMap, OutputDecl, Reference, ResolveError, resolve, set_members};
use std::collections::BTreeMap;

/// Named output values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSet {
    values: BTreeMap<String, Value>,
}

impl OutputSet {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Key to value mapping of a whole-set output
    pub fn get_map(&self, name: &str) -> Option<BTreeMap<String, String>> {
        let object = self.get(name)?.as_object()?;
        object
            .iter()
            .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resolves every declared output.
///
/// Fails with `ResolveError::NotReady` while any referenced instance is not
/// ready yet.
pub fn project(outputs: &[OutputDecl], instances: &InstanceMap) -> Result<OutputSet, ResolveError> {
    let values = outputs
        .iter()
        .map(|output| project_one(&output.reference, instances).map(|v| (output.name.clone(), v)))
        .collect::<Result<_, _>>()?;
    Ok(OutputSet { values })
}

/// Resolves the outputs whose referenced instances are ready and leaves
/// out the rest. Used to report what did come up after a partial failure;
/// any error other than `NotReady` still fails.
pub fn project_available(outputs: &[OutputDecl], instances: &InstanceMap) -> Result<OutputSet, ResolveError> {
    let mut values = BTreeMap::new();
    for output in outputs {
        match project_one(&output.reference, instances) {
            Ok(value) => {
                values.insert(output.name.clone(), value);
            }
            Err(ResolveError::NotReady { target, status }) => {
                tracing::debug!(output = %output.name, target = %target, status = %status, "output skipped");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(OutputSet { values })
}

/// A whole-set reference projects to a key to value object; anything else
/// to the single resolved value.
fn project_one(reference: &Reference, instances: &InstanceMap) -> Result<Value, ResolveError> {
    if instances.contains_key(&reference.target) {
        return resolve(reference, instances);
    }

    let members = set_members(&reference.target, instances);
    if members.is_empty() {
        return Err(ResolveError::UnknownTarget(reference.target.clone()));
    }

    let mut projected = serde_json::Map::new();
    for member in members {
        let value = resolve(&Reference::new(&member.id, &reference.attribute), instances)?;
        let key = member.key.clone().unwrap_or_else(|| member.id.clone());
        projected.insert(key, value);
    }
    Ok(Value::Object(projected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stackflow_core::{InstanceStatus, ResourceInstance, ResourceKind};

    fn instance(id: &str, private_ip: &str, public_ip: &str) -> ResourceInstance {
        ResourceInstance::new(id, ResourceKind::Instance)
            .with_status(InstanceStatus::Ready)
            .with_attribute("private_ip", json!(private_ip))
            .with_attribute("public_ip", json!(public_ip))
    }

    fn instances() -> InstanceMap {
        [
            instance("db", "10.0.0.5", "203.0.113.5"),
            instance("apps.a", "10.0.1.1", "203.0.113.11").with_membership("apps", "a"),
            instance("apps.b", "10.0.1.2", "203.0.113.12").with_membership("apps", "b"),
            instance("kong", "10.0.2.1", "203.0.113.20"),
        ]
        .into_iter()
        .map(|i| (i.id.clone(), i))
        .collect()
    }

    fn outputs() -> Vec<OutputDecl> {
        vec![
            OutputDecl::new("kong_public_ip", Reference::new("kong", "public_ip")),
            OutputDecl::new("apps_private_ips", Reference::new("apps", "private_ip")),
            OutputDecl::new("database_private_ip", Reference::new("db", "private_ip")),
        ]
    }

    #[test]
    fn test_project_outputs() {
        let set = project(&outputs(), &instances()).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.get_str("kong_public_ip"), Some("203.0.113.20"));
        assert_eq!(set.get_str("database_private_ip"), Some("10.0.0.5"));
        assert_eq!(
            set.get_map("apps_private_ips").unwrap(),
            BTreeMap::from([
                ("a".to_string(), "10.0.1.1".to_string()),
                ("b".to_string(), "10.0.1.2".to_string()),
            ])
        );
    }

    #[test]
    fn test_project_before_ready() {
        let mut map = instances();
        map.get_mut("kong").unwrap().status = InstanceStatus::Creating;
        assert!(matches!(
            project(&outputs(), &map),
            Err(ResolveError::NotReady { target, .. }) if target == "kong"
        ));
    }

    #[test]
    fn test_available_outputs_skip_unready_instances() {
        let mut map = instances();
        map.get_mut("kong").unwrap().status = InstanceStatus::Failed;
        map.get_mut("apps.b").unwrap().status = InstanceStatus::Failed;

        let set = project_available(&outputs(), &map).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get_str("database_private_ip"), Some("10.0.0.5"));
        assert!(set.get("kong_public_ip").is_none());
        assert!(set.get("apps_private_ips").is_none());
    }

    #[test]
    fn test_available_outputs_still_reject_unknown_attributes() {
        let broken = vec![OutputDecl::new("db_port", Reference::new("db", "port"))];
        assert!(project_available(&broken, &instances()).is_err());
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let set = project(&outputs()[..1], &instances()).unwrap();
        assert_eq!(
            serde_json::to_value(&set).unwrap(),
            json!({"kong_public_ip": "203.0.113.20"})
        );
    }
}
