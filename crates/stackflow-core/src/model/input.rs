//! Declared inputs and references

use crate::error::SpecError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder for an attribute that is only known after `target` exists.
///
/// `target` is either a resource id (`db`, or `apps` for a whole
/// instance-set) or a member id (`apps.a`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    pub target: String,
    pub attribute: String,
}

impl Reference {
    pub fn new(target: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            attribute: attribute.into(),
        }
    }

    /// Parses `db.private_ip`, `apps[*].private_ip`, `apps[a].private_ip`
    /// or `apps.a.private_ip`.
    pub fn parse(expr: &str) -> Result<Self, SpecError> {
        let invalid = || SpecError::InvalidReference(expr.to_string());
        let expr = expr.trim();

        let (target, attribute) = expr.rsplit_once('.').ok_or_else(invalid)?;
        if !is_identifier(attribute) {
            return Err(invalid());
        }

        let target = if let Some(set) = target.strip_suffix("[*]") {
            set.to_string()
        } else if let Some((set, rest)) = target.split_once('[') {
            let key = rest
                .strip_suffix(']')
                .ok_or_else(invalid)?
                .trim_matches('"');
            if key.is_empty() {
                return Err(invalid());
            }
            format!("{}.{}", set, key)
        } else {
            target.to_string()
        };

        let reference = Self::new(target, attribute);
        let id_ok = is_identifier(reference.resource_id());
        let key_ok = reference.member_key().is_none_or(is_key);
        if !id_ok || !key_ok {
            return Err(invalid());
        }
        Ok(reference)
    }

    /// Declared resource id this reference points into.
    pub fn resource_id(&self) -> &str {
        self.target
            .split_once('.')
            .map(|(id, _)| id)
            .unwrap_or(&self.target)
    }

    /// Member key, when the reference addresses a single instance-set member.
    pub fn member_key(&self) -> Option<&str> {
        self.target.split_once('.').map(|(_, key)| key)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.attribute)
    }
}

pub(crate) fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub(crate) fn is_key(s: &str) -> bool {
    !s.is_empty() && !s.contains(['.', '[', ']'])
}

/// One piece of an interpolated string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Text(String),
    Ref(Reference),
    EachKey,
}

/// A declared input value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Input {
    /// A value known at declaration time
    Literal(serde_json::Value),
    /// A value only known once the target is ready
    Ref(Reference),
    /// A string with embedded references
    Template(Vec<Segment>),
    List(Vec<Input>),
    Map(BTreeMap<String, Input>),
    /// The key of the instance-set member being expanded
    EachKey,
}

impl Input {
    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        Input::Literal(value.into())
    }

    pub fn reference(target: impl Into<String>, attribute: impl Into<String>) -> Self {
        Input::Ref(Reference::new(target, attribute))
    }

    /// Every reference in this input tree, in encounter order.
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Input::Ref(r) => out.push(r),
            Input::Template(segments) => {
                out.extend(segments.iter().filter_map(|s| match s {
                    Segment::Ref(r) => Some(r),
                    _ => None,
                }));
            }
            Input::List(items) => items.iter().for_each(|i| i.collect_references(out)),
            Input::Map(map) => map.values().for_each(|i| i.collect_references(out)),
            Input::Literal(_) | Input::EachKey => {}
        }
    }

    pub fn contains_each_key(&self) -> bool {
        match self {
            Input::EachKey => true,
            Input::Template(segments) => segments.iter().any(|s| matches!(s, Segment::EachKey)),
            Input::List(items) => items.iter().any(Input::contains_each_key),
            Input::Map(map) => map.values().any(Input::contains_each_key),
            Input::Literal(_) | Input::Ref(_) => false,
        }
    }

    /// Replaces `${each.key}` placeholders with `key`.
    pub fn expand_each_key(&self, key: &str) -> Input {
        match self {
            Input::EachKey => Input::literal(key),
            Input::Template(segments) => Input::Template(
                segments
                    .iter()
                    .map(|s| match s {
                        Segment::EachKey => Segment::Text(key.to_string()),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            Input::List(items) => Input::List(items.iter().map(|i| i.expand_each_key(key)).collect()),
            Input::Map(map) => Input::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.expand_each_key(key)))
                    .collect(),
            ),
            Input::Literal(_) | Input::Ref(_) => self.clone(),
        }
    }
}

impl From<Reference> for Input {
    fn from(reference: Reference) -> Self {
        Input::Ref(reference)
    }
}
