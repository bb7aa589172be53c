//! Attribute resolution
//!
//! Pure functions over an instance map. Resolution never triggers
//! creation; asking for an attribute of an instance that is not `Ready`
//! is an ordering bug in the caller and reported as `NotReady`.

use crate::error::ResolveError;
use crate::model::{Input, InstanceMap, Reference, ResourceInstance, Segment};
use serde_json::Value;
use std::collections::BTreeMap;

/// Resolves one reference.
///
/// A reference to a whole instance-set resolves to an array of the members'
/// values in key order, and requires every member to be ready.
pub fn resolve(reference: &Reference, instances: &InstanceMap) -> Result<Value, ResolveError> {
    if let Some(instance) = instances.get(&reference.target) {
        return read_attribute(instance, reference);
    }

    let members = set_members(&reference.target, instances);
    if members.is_empty() {
        return Err(ResolveError::UnknownTarget(reference.target.clone()));
    }
    members
        .into_iter()
        .map(|m| read_attribute(m, reference))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

/// Members of an instance-set, ordered by key.
pub fn set_members<'a>(set: &str, instances: &'a InstanceMap) -> Vec<&'a ResourceInstance> {
    let mut members: Vec<&ResourceInstance> = instances
        .values()
        .filter(|i| i.member_of.as_deref() == Some(set))
        .collect();
    members.sort_by(|a, b| a.key.cmp(&b.key));
    members
}

fn read_attribute(instance: &ResourceInstance, reference: &Reference) -> Result<Value, ResolveError> {
    if !instance.is_ready() {
        return Err(ResolveError::NotReady {
            target: instance.id.clone(),
            status: instance.status,
        });
    }
    instance
        .attributes
        .get(&reference.attribute)
        .cloned()
        .ok_or_else(|| ResolveError::UnknownAttribute {
            target: instance.id.clone(),
            attribute: reference.attribute.clone(),
        })
}

/// Resolves a whole input tree into a JSON value.
pub fn resolve_input(input: &Input, instances: &InstanceMap) -> Result<Value, ResolveError> {
    match input {
        Input::Literal(value) => Ok(value.clone()),
        Input::Ref(reference) => resolve(reference, instances),
        Input::Template(segments) => {
            let mut out = String::new();
            for segment in segments {
                match segment {
                    Segment::Text(text) => out.push_str(text),
                    Segment::Ref(reference) => out.push_str(&render_fragment(&resolve(reference, instances)?)),
                    Segment::EachKey => return Err(ResolveError::UnexpandedEachKey),
                }
            }
            Ok(Value::String(out))
        }
        Input::List(items) => items
            .iter()
            .map(|i| resolve_input(i, instances))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Input::Map(map) => map
            .iter()
            .map(|(k, v)| resolve_input(v, instances).map(|v| (k.clone(), v)))
            .collect::<Result<serde_json::Map<_, _>, _>>()
            .map(Value::Object),
        Input::EachKey => Err(ResolveError::UnexpandedEachKey),
    }
}

/// Resolves every named input.
pub fn resolve_inputs(
    inputs: &BTreeMap<String, Input>,
    instances: &InstanceMap,
) -> Result<BTreeMap<String, Value>, ResolveError> {
    inputs
        .iter()
        .map(|(name, input)| resolve_input(input, instances).map(|v| (name.clone(), v)))
        .collect()
}

/// Text form of a value interpolated into a template.
fn render_fragment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(render_fragment).collect::<Vec<_>>().join(","),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
