pub mod apply;
pub mod graph;
pub mod validate;
