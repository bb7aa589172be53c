//! KDL parser
//!
//! Parses StackFlow stack files. Each node type is handled in its own
//! module.

mod expr;
mod gateway;
mod resource;

pub use expr::parse_expression;

use crate::error::{Result, StackError};
use crate::model::StackFile;
use gateway::{parse_gateway, parse_output};
use kdl::KdlDocument;
use resource::parse_resource;
use std::fs;
use std::path::Path;

/// Parses a stack file from disk. The parent directory name is the default
/// stack name.
pub fn parse_stack_file<P: AsRef<Path>>(path: P) -> Result<StackFile> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| StackError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let name = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_stack_string(&content, name)
}

/// Parses a stack file from a string, declaring every resource.
///
/// Cross-references are checked once the whole document has been read, so
/// resources may reference ones declared later in the file.
pub fn parse_stack_string(content: &str, default_name: String) -> Result<StackFile> {
    let doc: KdlDocument = content.parse()?;

    let mut file = StackFile {
        name: default_name,
        ..Default::default()
    };

    for node in doc.nodes() {
        match node.name().value() {
            "stack" | "project" => {
                if let Some(name) = node.entries().first().and_then(|e| e.value().as_string()) {
                    file.name = name.to_string();
                }
            }
            "resource" => {
                let spec = parse_resource(node)?;
                file.stack.declare(spec)?;
            }
            "gateway" => {
                file.gateways.push(parse_gateway(node)?);
            }
            "output" => {
                file.outputs.push(parse_output(node)?);
            }
            other => {
                tracing::debug!("skipping unknown node '{}'", other);
            }
        }
    }

    file.validate()?;
    tracing::debug!(
        name = %file.name,
        resources = file.stack.len(),
        gateways = file.gateways.len(),
        outputs = file.outputs.len(),
        "parsed stack file"
    );
    Ok(file)
}

#[cfg(test)]
mod tests;
