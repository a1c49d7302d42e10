//! End-to-end SQL generation tests

use pretty_assertions::assert_eq;

use rust_medallion::error::MedallionError;

use super::common::{write_forecast_fixture, TestContext};

#[test]
fn test_forecast_chain_generates_expected_artifacts() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);

    let report = ctx.generate("postgres");
    // CTE models do not materialize
    let names: Vec<&str> = report.artifacts.iter().map(|a| a.model.as_str()).collect();
    assert_eq!(
        names,
        vec!["raw_forecast_cycle", "clean_forecast_cycle", "fct_ForecastCycle"]
    );
}

#[test]
fn test_fact_model_inlines_cte_and_joins() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);

    let report = ctx.generate("postgres");
    let fact = report
        .artifacts
        .iter()
        .find(|a| a.model == "fct_ForecastCycle")
        .unwrap();

    assert!(fact.sql.contains("WITH active_forecast_cycles AS ("));
    assert!(fact
        .sql
        .contains("FROM clean_forecast_cycle AS T"));
    assert!(fact.sql.contains(
        "LEFT JOIN active_forecast_cycles AS A ON T.ForecastCycleId = A.ForecastCycleId"
    ));
    assert!(fact.sql.contains(
        "CASE WHEN A.ForecastCycleId IS NOT NULL THEN TRUE ELSE FALSE END AS IsActive"
    ));
    // The CTE body carries the filter, alias-qualified
    assert!(fact.sql.contains("(T.Status = 'ACTIVE')"));
}

#[test]
fn test_bronze_view_prelude_and_identity_columns() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);

    let report = ctx.generate("postgres");
    let raw = report
        .artifacts
        .iter()
        .find(|a| a.model == "raw_forecast_cycle")
        .unwrap();

    assert!(raw
        .sql
        .starts_with("CREATE OR REPLACE VIEW raw_forecast_cycle AS"));
    assert!(raw.sql.contains("FROM source_systems.forecast_cycles AS T"));
    assert!(raw.sql.contains("T.ForecastCycleId AS ForecastCycleId"));
}

#[test]
fn test_generation_is_deterministic() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);

    let first = ctx.generate("postgres");
    let second = ctx.generate("postgres");
    for (a, b) in first.artifacts.iter().zip(second.artifacts.iter()) {
        assert_eq!(a.model, b.model);
        assert_eq!(a.sql, b.sql);
    }
}

#[test]
fn test_artifact_files_written() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);

    ctx.generate("postgres");
    assert!(ctx.out_dir.join("fct_ForecastCycle.sql").exists());
    assert!(ctx.out_dir.join("clean_forecast_cycle.sql").exists());
    // clean_forecast_cycle declares a NOT_NULL audit
    assert!(ctx.out_dir.join("clean_forecast_cycle.audits.sql").exists());
    assert!(ctx.out_dir.join("graph.json").exists());
}

#[test]
fn test_audit_statements_keyed_by_model_and_index() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);

    let report = ctx.generate("postgres");
    let clean = report
        .artifacts
        .iter()
        .find(|a| a.model == "clean_forecast_cycle")
        .unwrap();
    assert_eq!(clean.audits.len(), 1);
    assert_eq!(clean.audits[0].key, "clean_forecast_cycle.0");
    assert!(clean.audits[0]
        .sql
        .contains("WHERE ForecastCycleId IS NULL"));
}

#[test]
fn test_spark_dialect_carries_partitioning() {
    let ctx = TestContext::new();
    ctx.write_model(
        "fct_partitioned.yml",
        r#"
model: {name: fct_partitioned, layer: gold, kind: TABLE}
source: {base_table: clean_orders, depends_on: [clean_orders]}
transformations:
  - {name: OrderId, data_type: INT}
  - {name: LoadDate, data_type: DATE}
optimization:
  partitioned_by: [LoadDate]
"#,
    );

    let report = ctx.generate("spark");
    let artifact = &report.artifacts[0];
    assert!(artifact.sql.contains("USING DELTA"));
    assert!(artifact.sql.contains("PARTITIONED BY (LoadDate)"));
}

#[test]
fn test_postgres_emits_index_statements() {
    let ctx = TestContext::new();
    ctx.write_model(
        "fct_indexed.yml",
        r#"
model: {name: fct_indexed, layer: gold, kind: TABLE}
source: {base_table: clean_orders, depends_on: [clean_orders]}
transformations:
  - {name: OrderId, data_type: INT}
optimization:
  indexes:
    - {name: ix_order, columns: [OrderId]}
"#,
    );

    let report = ctx.generate("postgres");
    assert!(report.artifacts[0]
        .sql
        .contains("CREATE INDEX ix_order ON fct_indexed (OrderId);"));
}

#[test]
fn test_group_by_and_having_rendered() {
    let ctx = TestContext::new();
    ctx.write_model(
        "fct_totals.yml",
        r#"
model: {name: fct_totals, layer: gold, kind: TABLE}
source: {base_table: clean_orders, depends_on: [clean_orders]}
transformations:
  - {name: CustomerId, data_type: INT}
  - {name: Total, expression: "SUM(Amount)", data_type: DECIMAL}
aggregations:
  group_by: [CustomerId]
  having: ["SUM(Amount) > 0"]
"#,
    );

    let report = ctx.generate("postgres");
    let sql = &report.artifacts[0].sql;
    assert!(sql.contains("SUM(Amount) AS Total"));
    assert!(sql.contains("GROUP BY T.CustomerId"));
    assert!(sql.contains("HAVING SUM(Amount) > 0"));
}

#[test]
fn test_unknown_dialect_is_fatal_with_exit_5() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);

    let error = rust_medallion::generate(&ctx.settings("oracle")).unwrap_err();
    assert!(matches!(error, MedallionError::UnknownDialect { .. }));
    assert_eq!(error.exit_code(), 5);
}

#[test]
fn test_unsupported_macro_is_generation_error() {
    let ctx = TestContext::new();
    ctx.write_model(
        "featureful.yml",
        r#"
model: {name: featureful, layer: gold, kind: TABLE}
source: {base_table: clean_orders, depends_on: [clean_orders]}
transformations:
  - {name: Flag, expression: "@Feature('scd2')", data_type: VARCHAR}
"#,
    );

    let error = rust_medallion::generate(&ctx.settings("postgres")).unwrap_err();
    match error {
        MedallionError::GenerationError { model, message } => {
            assert_eq!(model, "featureful");
            assert!(message.contains("@Feature"));
        }
        other => panic!("expected GenerationError, got {:?}", other),
    }

    // Spark declares support and expands it
    let report = ctx.generate("spark");
    assert!(report.artifacts[0]
        .sql
        .contains("feature_store.lookup('scd2') AS Flag"));
}

#[test]
fn test_unknown_function_warns_but_generates() {
    let ctx = TestContext::new();
    ctx.write_model(
        "funky.yml",
        r#"
model: {name: funky, layer: silver, kind: TABLE}
source: {base_table: raw.orders, depends_on: [raw.orders]}
transformations:
  - {name: OrderId, data_type: INT}
  - {name: Weird, expression: "FROBNICATE(OrderId)", data_type: INT}
"#,
    );

    let report = ctx.generate("postgres");
    assert_eq!(report.artifacts.len(), 1);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.message.contains("FROBNICATE") && d.message.contains("postgres")));
}

#[test]
fn test_newpk_macro_expands_per_dialect() {
    let ctx = TestContext::new();
    ctx.write_model(
        "keyed.yml",
        r#"
model: {name: keyed, layer: silver, kind: TABLE}
source: {base_table: raw.orders, depends_on: [raw.orders]}
transformations:
  - {name: RowKey, expression: "@newpk()", data_type: UUID}
  - {name: OrderId, data_type: INT}
"#,
    );

    let postgres = ctx.generate("postgres");
    assert!(postgres.artifacts[0].sql.contains("gen_random_uuid() AS RowKey"));
    let spark = ctx.generate("spark");
    assert!(spark.artifacts[0].sql.contains("uuid() AS RowKey"));
}
