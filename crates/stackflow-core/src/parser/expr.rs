//! `${...}` expression parsing

use crate::error::SpecError;
use crate::model::{Input, Reference, Segment};
use regex::Regex;
use std::sync::LazyLock;

/// `${...}` placeholders, compiled once for the whole process
static PLACEHOLDER: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}"));

fn placeholder_pattern() -> Result<&'static Regex, SpecError> {
    PLACEHOLDER
        .as_ref()
        .map_err(|e| SpecError::Invalid(e.to_string()))
}

/// Parses a string value into an input.
///
/// - `"${db.private_ip}"` becomes a reference
/// - `"${each.key}"` becomes the each-key placeholder
/// - `"http://${db.private_ip}:5432"` becomes a template
/// - anything else is a literal string
pub fn parse_expression(value: &str) -> Result<Input, SpecError> {
    let re = placeholder_pattern()?;

    let mut segments = Vec::new();
    let mut last = 0;
    for caps in re.captures_iter(value) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Text(value[last..whole.start()].to_string()));
        }
        segments.push(parse_placeholder(inner.as_str())?);
        last = whole.end();
    }

    if segments.is_empty() {
        if value.contains("${") {
            return Err(SpecError::InvalidReference(value.to_string()));
        }
        return Ok(Input::literal(value));
    }
    if last < value.len() {
        segments.push(Segment::Text(value[last..].to_string()));
    }

    if segments.len() == 1 {
        match segments.pop() {
            Some(Segment::Ref(reference)) => return Ok(Input::Ref(reference)),
            Some(Segment::EachKey) => return Ok(Input::EachKey),
            Some(other) => segments.push(other),
            None => {}
        }
    }
    Ok(Input::Template(segments))
}

fn parse_placeholder(inner: &str) -> Result<Segment, SpecError> {
    match inner.trim() {
        "each.key" => Ok(Segment::EachKey),
        expr => Reference::parse(expr).map(Segment::Ref),
    }
}
