//! Fingerprint stability and sensitivity tests

use pretty_assertions::assert_eq;

use rust_medallion::state::{fingerprint, SnapshotModel};

use super::common::TestContext;

const WHOLE_MODEL: &str = r#"
model:
  name: clean_orders
  description: Cleansed orders
  layer: silver
  kind: TABLE
  owner: data-eng
source:
  base_table: raw.orders
  depends_on: [raw.orders]
transformations:
  - name: OrderId
    data_type: INT
  - name: Amount
    expression: "ROUND(Amount, 2)"
    data_type: DECIMAL
filters:
  - reference_table: raw.orders
    condition: "IsDeleted = 0"
grain: [OrderId]
audits:
  - not_null: [OrderId]
"#;

/// An equivalent split of WHOLE_MODEL across two partial files.
fn write_split_fixture(ctx: &TestContext) {
    ctx.write_model(
        "clean_orders.part1.yml",
        r#"
model:
  name: clean_orders
  description: Cleansed orders
  layer: silver
  kind: TABLE
  owner: data-eng
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
  - name: Amount
    expression: "ROUND(Amount, 2)"
    data_type: DECIMAL
filters:
  - reference_table: raw.orders
    condition: "IsDeleted = 0"
grain: [OrderId]
audits:
  - not_null: [OrderId]
"#,
    );
}

#[test]
fn test_equivalent_partial_split_preserves_all_hashes() {
    let whole_ctx = TestContext::new();
    whole_ctx.write_model("clean_orders.yml", WHOLE_MODEL);
    let whole = whole_ctx.compile();

    let split_ctx = TestContext::new();
    write_split_fixture(&split_ctx);
    let split = split_ctx.compile();

    let whole_fp = fingerprint(&whole.models["clean_orders"]);
    let split_fp = fingerprint(&split.models["clean_orders"]);
    assert_eq!(whole_fp, split_fp);
}

#[test]
fn test_every_logic_field_moves_the_logic_hash() {
    let ctx = TestContext::new();
    ctx.write_model("clean_orders.yml", WHOLE_MODEL);
    let base = ctx.compile();
    let base_fp = fingerprint(&base.models["clean_orders"]);

    let variants: &[(&str, &str)] = &[
        // expression change
        ("ROUND(Amount, 2)", "ROUND(Amount, 4)"),
        // filter change
        ("IsDeleted = 0", "IsDeleted = 0 AND IsTest = 0"),
        // base_table change
        ("base_table: raw.orders", "base_table: raw.orders_v2"),
    ];

    for (from, to) in variants {
        let variant_ctx = TestContext::new();
        variant_ctx.write_model("clean_orders.yml", &WHOLE_MODEL.replace(from, to));
        let variant = variant_ctx.compile();
        let variant_fp = fingerprint(&variant.models["clean_orders"]);
        assert_ne!(
            base_fp.logic, variant_fp.logic,
            "logic hash did not move for {} -> {}",
            from, to
        );
    }
}

#[test]
fn test_hashes_disjoint_over_small_corpus() {
    // Collision smoke-check: no two distinct models in the fixture corpus
    // share a logic hash.
    let ctx = TestContext::new();
    super::common::write_forecast_fixture(&ctx);
    let compilation = ctx.compile();

    let hashes: Vec<u64> = compilation
        .models
        .values()
        .map(|m| fingerprint(m).logic)
        .collect();
    let mut deduped = hashes.clone();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(hashes.len(), deduped.len());
}

#[test]
fn test_snapshot_model_mirrors_fingerprints_and_nullability() {
    let ctx = TestContext::new();
    ctx.write_model("clean_orders.yml", WHOLE_MODEL);
    let compilation = ctx.compile();
    let model = &compilation.models["clean_orders"];

    let entry = SnapshotModel::capture(model);
    let fp = fingerprint(model);
    assert_eq!(entry.logic_hash, fp.logic_hex());
    assert_eq!(entry.schema_hash, fp.schema_hex());
    assert_eq!(entry.metadata_hash, fp.metadata_hex());

    // OrderId is covered by a NOT_NULL audit; Amount is not
    assert!(!entry.columns[0].nullable);
    assert!(entry.columns[1].nullable);
    assert_eq!(entry.dependencies, vec!["raw.orders"]);
}
