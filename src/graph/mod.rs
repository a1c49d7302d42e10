//! Dependency graph resolution and export

mod export;
mod resolver;

pub use export::{export_graph, GraphFormat};
pub use resolver::DependencyGraph;
