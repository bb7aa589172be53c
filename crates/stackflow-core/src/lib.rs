//! StackFlow Core
//!
//! Declarative resource model for StackFlow: typed resource declarations,
//! the dependency graph derived from their cross-references, and the pure
//! attribute resolver that turns references into values once the referenced
//! resource is ready.
//!
//! ```text
//! stack.kdl ──parse──▶ StackFile ──declare──▶ Stack ──build──▶ Graph
//!                                                              │
//!                              InstanceMap ◀──resolve── Reference
//! ```

pub mod error;
pub mod graph;
pub mod model;
pub mod parser;
pub mod resolver;

pub use error::{CycleError, ResolveError, Result, SpecError, StackError};
pub use graph::{Graph, Node, NodeIndex, build};
pub use model::*;
pub use parser::{parse_expression, parse_stack_file, parse_stack_string};
pub use resolver::{resolve, resolve_input, resolve_inputs, set_members};
