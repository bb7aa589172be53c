//! `resource` node parsing

use super::expr::parse_expression;
use crate::error::{Result, SpecError};
use crate::model::{Input, ResourceKind, ResourceSpec};
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::collections::{BTreeMap, BTreeSet};

const FOR_EACH: &str = "for-each";

/// Parses `resource "<kind>" "<id>" { ... }`.
pub fn parse_resource(node: &KdlNode) -> Result<ResourceSpec> {
    let mut args = node
        .entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value().as_string());

    let kind = args
        .next()
        .flatten()
        .ok_or_else(|| SpecError::Invalid("resource requires a kind".to_string()))?;
    let kind = ResourceKind::parse(kind)?;
    let id = args
        .next()
        .flatten()
        .ok_or_else(|| SpecError::Invalid(format!("{} resource requires an id", kind)))?
        .to_string();

    let mut spec = ResourceSpec::new(id, kind);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            if matches!(child.name().value(), "for-each" | "for_each" | "count-key") {
                let keys = child
                    .entries()
                    .iter()
                    .map(|e| {
                        e.value().as_string().map(str::to_string).ok_or_else(|| {
                            SpecError::Invalid(format!("{} keys of '{}' must be strings", FOR_EACH, spec.id))
                        })
                    })
                    .collect::<std::result::Result<BTreeSet<_>, _>>()?;
                spec.count_key = Some(keys);
            }
        }
        spec.inputs = parse_block(children, &spec.id)?;
    }

    Ok(spec)
}

/// Converts a child block into named inputs. Repeated child names collect
/// into a list.
fn parse_block(doc: &KdlDocument, owner: &str) -> Result<BTreeMap<String, Input>> {
    let mut grouped: BTreeMap<String, Vec<Input>> = BTreeMap::new();
    for child in doc.nodes() {
        let name = child.name().value();
        if matches!(name, "for-each" | "for_each" | "count-key") {
            continue;
        }
        grouped
            .entry(name.to_string())
            .or_default()
            .push(parse_node(child, owner)?);
    }

    Ok(grouped
        .into_iter()
        .map(|(name, mut values)| {
            let input = if values.len() == 1 {
                values.remove(0)
            } else {
                Input::List(values)
            };
            (name, input)
        })
        .collect())
}

/// One argument is a scalar, several a list; properties or a child block
/// make a map.
fn parse_node(node: &KdlNode, owner: &str) -> Result<Input> {
    let mut args = Vec::new();
    let mut props = BTreeMap::new();
    for entry in node.entries() {
        let value = parse_value(entry.value())?;
        match entry.name() {
            Some(name) => {
                props.insert(name.value().to_string(), value);
            }
            None => args.push(value),
        }
    }

    if let Some(children) = node.children() {
        props.extend(parse_block(children, owner)?);
    }

    match (args.len(), props.is_empty()) {
        (0, true) => Ok(Input::literal(true)),
        (0, false) => Ok(Input::Map(props)),
        (1, true) => Ok(args.remove(0)),
        (_, true) => Ok(Input::List(args)),
        (_, false) => Err(SpecError::Invalid(format!(
            "input '{}' of '{}' mixes arguments with properties or children",
            node.name().value(),
            owner
        ))
        .into()),
    }
}

fn parse_value(value: &KdlValue) -> Result<Input> {
    if let Some(s) = value.as_string() {
        return Ok(parse_expression(s)?);
    }
    if let Some(i) = value.as_integer() {
        let i = i64::try_from(i)
            .map_err(|_| SpecError::Invalid(format!("integer {} is out of range", i)))?;
        return Ok(Input::literal(i));
    }
    if let Some(f) = value.as_float() {
        return Ok(Input::literal(f));
    }
    if let Some(b) = value.as_bool() {
        return Ok(Input::literal(b));
    }
    Ok(Input::Literal(serde_json::Value::Null))
}
