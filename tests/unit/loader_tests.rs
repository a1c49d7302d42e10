//! Loader and partial-merge tests

use pretty_assertions::assert_eq;

use rust_medallion::loader::load_models;
use rust_medallion::model::{has_errors, ModelKind};

use super::common::TestContext;

const BASE_MODEL: &str = r#"
model:
  name: clean_orders
  layer: silver
  kind: TABLE
source:
  base_table: raw.orders
  depends_on: [raw.orders]
transformations:
  - name: OrderId
    data_type: INT
"#;

#[test]
fn test_load_single_model() {
    let ctx = TestContext::new();
    ctx.write_model("clean_orders.yml", BASE_MODEL);

    let result = load_models(&ctx.root).unwrap();
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.models.len(), 1);
    let model = &result.models["clean_orders"];
    assert_eq!(model.kind, ModelKind::Table);
    assert_eq!(model.columns.len(), 1);
}

#[test]
fn test_load_recurses_into_subdirectories() {
    let ctx = TestContext::new();
    ctx.write_model("silver/clean_orders.yml", BASE_MODEL);

    let result = load_models(&ctx.root).unwrap();
    assert_eq!(result.models.len(), 1);
}

#[test]
fn test_partial_files_merge_into_one_model() {
    let ctx = TestContext::new();
    ctx.write_model(
        "clean_orders.part1.yml",
        r#"
model:
  name: clean_orders
  layer: silver
  kind: TABLE
source:
  base_table: raw.orders
  depends_on: [raw.orders]
transformations:
  - name: OrderId
    data_type: INT
"#,
    );
    ctx.write_model(
        "clean_orders.part2.yml",
        r#"
transformations:
  - name: OrderDate
    data_type: DATE
audits:
  - not_null: [OrderId]
"#,
    );

    let result = load_models(&ctx.root).unwrap();
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.models.len(), 1);
    let model = &result.models["clean_orders"];
    assert_eq!(model.columns.len(), 2);
    assert_eq!(model.columns[0].name, "OrderId");
    assert_eq!(model.columns[1].name, "OrderDate");
    assert_eq!(model.audits.len(), 1);
}

#[test]
fn test_partial_merge_remove_and_update_operators() {
    let ctx = TestContext::new();
    ctx.write_model(
        "clean_orders.part1.yml",
        r#"
model:
  name: clean_orders
  layer: silver
  kind: TABLE
source:
  base_table: raw.orders
  depends_on: [raw.orders]
transformations:
  - name: OrderId
    data_type: INT
  - name: Scratch
    data_type: VARCHAR
  - name: Amount
    expression: AMOUNT_RAW
    data_type: DECIMAL
"#,
    );
    ctx.write_model(
        "clean_orders.part2.yml",
        r#"
transformations:
  - name: Scratch
    operator: "-"
  - name: Amount
    expression: "ROUND(AMOUNT_RAW, 2)"
    data_type: DECIMAL
    operator: U
"#,
    );

    let result = load_models(&ctx.root).unwrap();
    let model = &result.models["clean_orders"];
    assert_eq!(model.columns.len(), 2);
    assert_eq!(model.columns[1].name, "Amount");
    assert_eq!(model.columns[1].expression, "ROUND(AMOUNT_RAW, 2)");
}

#[test]
fn test_scalar_overwrite_is_file_name_lexicographic() {
    let ctx = TestContext::new();
    ctx.write_model(
        "clean_orders.part1.yml",
        r#"
model:
  name: clean_orders
  layer: silver
  kind: TABLE
  owner: alice
source:
  base_table: raw.orders
  depends_on: [raw.orders]
transformations:
  - name: OrderId
    data_type: INT
"#,
    );
    ctx.write_model("clean_orders.part2.yml", "model:\n  owner: bob\n");

    let result = load_models(&ctx.root).unwrap();
    assert_eq!(result.models["clean_orders"].owner, "bob");
}

#[test]
fn test_bad_file_fails_alone() {
    let ctx = TestContext::new();
    ctx.write_model("clean_orders.yml", BASE_MODEL);
    ctx.write_model("broken.yml", "model: {name: broken, layer: mithril, kind: TABLE}");

    let result = load_models(&ctx.root).unwrap();
    assert_eq!(result.models.len(), 1);
    assert!(has_errors(&result.diagnostics));
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.model == "broken" && d.path == "model.layer"));
}

#[test]
fn test_unknown_top_level_section_fails_file() {
    let ctx = TestContext::new();
    ctx.write_model(
        "clean_orders.yml",
        &format!("{}\nmaterialization: table\n", BASE_MODEL.trim()),
    );

    let result = load_models(&ctx.root).unwrap();
    assert!(result.models.is_empty());
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.is_error() && d.message.contains("unknown top-level section")));
}

#[test]
fn test_duplicate_model_names_reported() {
    let ctx = TestContext::new();
    ctx.write_model("clean_orders.yml", BASE_MODEL);
    ctx.write_model(
        "clean_orders_copy.yml",
        &BASE_MODEL.replace("raw.orders", "raw.other_orders"),
    );

    let result = load_models(&ctx.root).unwrap();
    assert_eq!(result.models.len(), 1);
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.is_error() && d.message.contains("duplicate model name")));
}

#[test]
fn test_invalid_yaml_fails_file_only() {
    let ctx = TestContext::new();
    ctx.write_model("clean_orders.yml", BASE_MODEL);
    ctx.write_model("broken.yml", "model: [unterminated");

    let result = load_models(&ctx.root).unwrap();
    assert_eq!(result.models.len(), 1);
    assert!(has_errors(&result.diagnostics));
}
