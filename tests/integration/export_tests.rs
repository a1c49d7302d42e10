//! Dependency-graph export tests

use pretty_assertions::assert_eq;

use rust_medallion::graph::GraphFormat;

use super::common::{write_forecast_fixture, TestContext};

#[test]
fn test_nodes_edges_export() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);

    let document = rust_medallion::export_graph(&ctx.root, GraphFormat::NodesEdges).unwrap();
    let nodes = document["nodes"].as_array().unwrap();
    let edges = document["edges"].as_array().unwrap();

    // 4 models + 1 external source table
    assert_eq!(nodes.len(), 5);
    let external = nodes
        .iter()
        .find(|n| n["name"] == "source_systems.forecast_cycles")
        .unwrap();
    assert_eq!(external["external"], true);

    assert!(edges.iter().any(|e| {
        e["from"] == "clean_forecast_cycle" && e["to"] == "fct_ForecastCycle"
    }));
    assert!(edges.iter().any(|e| {
        e["from"] == "raw_forecast_cycle" && e["to"] == "active_forecast_cycles"
    }));
}

#[test]
fn test_nodes_edges_is_sorted() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);

    let document = rust_medallion::export_graph(&ctx.root, GraphFormat::NodesEdges).unwrap();
    let edges = document["edges"].as_array().unwrap();
    let keys: Vec<(String, String)> = edges
        .iter()
        .map(|e| {
            (
                e["from"].as_str().unwrap().to_string(),
                e["to"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn test_hierarchical_export_groups_by_layer() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);

    let document = rust_medallion::export_graph(&ctx.root, GraphFormat::Hierarchical).unwrap();
    let layers = document["layers"].as_array().unwrap();
    assert_eq!(layers.len(), 4);
    assert_eq!(layers[0]["layer"], "bronze");
    assert_eq!(layers[0]["models"][0]["name"], "raw_forecast_cycle");
    assert_eq!(layers[2]["layer"], "gold");
    assert_eq!(layers[2]["models"][0]["name"], "fct_ForecastCycle");
    assert_eq!(layers[3]["layer"], "cte");
}

#[test]
fn test_format_parsing() {
    assert_eq!(
        GraphFormat::parse("nodes_edges").unwrap(),
        GraphFormat::NodesEdges
    );
    assert_eq!(
        GraphFormat::parse("HIERARCHICAL").unwrap(),
        GraphFormat::Hierarchical
    );
    assert!(GraphFormat::parse("dot").is_err());
}
