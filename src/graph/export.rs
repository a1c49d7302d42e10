//! Dependency-graph export
//!
//! Emits the dependency graph as a JSON document for downstream lineage
//! rendering. Two shapes: a flat node/edge list, and a per-layer grouping.

use std::collections::BTreeMap;

use serde_json::json;

use crate::model::{Layer, Model};

/// Export document shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    NodesEdges,
    Hierarchical,
}

impl GraphFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "nodes_edges" | "nodes-edges" => Ok(GraphFormat::NodesEdges),
            "hierarchical" => Ok(GraphFormat::Hierarchical),
            _ => Err(format!("unknown graph format: {}", s)),
        }
    }
}

/// Render the corpus dependency graph in the requested format.
///
/// All collections are emitted in sorted order so the document is
/// byte-stable across runs.
pub fn export_graph(models: &BTreeMap<String, Model>, format: GraphFormat) -> serde_json::Value {
    match format {
        GraphFormat::NodesEdges => nodes_edges(models),
        GraphFormat::Hierarchical => hierarchical(models),
    }
}

fn nodes_edges(models: &BTreeMap<String, Model>) -> serde_json::Value {
    let mut nodes = Vec::new();
    let mut externals: Vec<&str> = Vec::new();
    let mut edges = Vec::new();

    for (name, model) in models {
        nodes.push(json!({
            "name": name,
            "layer": model.layer.as_str(),
            "kind": model.kind.as_str(),
            "external": false,
        }));
        for dep in &model.depends_on {
            if !models.contains_key(dep) && !externals.contains(&dep.as_str()) {
                externals.push(dep);
            }
            edges.push(json!({ "from": dep, "to": name }));
        }
    }

    externals.sort_unstable();
    for external in externals {
        nodes.push(json!({
            "name": external,
            "layer": "external",
            "kind": "EXTERNAL",
            "external": true,
        }));
    }
    edges.sort_by(|a, b| {
        (a["from"].as_str(), a["to"].as_str()).cmp(&(b["from"].as_str(), b["to"].as_str()))
    });

    json!({ "nodes": nodes, "edges": edges })
}

fn hierarchical(models: &BTreeMap<String, Model>) -> serde_json::Value {
    let mut layers = Vec::new();
    for layer in [Layer::Bronze, Layer::Silver, Layer::Gold, Layer::Cte] {
        let members: Vec<serde_json::Value> = models
            .values()
            .filter(|m| m.layer == layer)
            .map(|m| {
                json!({
                    "name": m.name,
                    "kind": m.kind.as_str(),
                    "depends_on": m.depends_on,
                })
            })
            .collect();
        layers.push(json!({ "layer": layer.as_str(), "models": members }));
    }
    json!({ "layers": layers })
}
