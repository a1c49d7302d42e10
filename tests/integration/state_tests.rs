//! State snapshot and planner tests

use std::fs;

use pretty_assertions::assert_eq;

use rust_medallion::error::MedallionError;
use rust_medallion::state::{ChangeKind, StateLock};
use rust_medallion::ApplyMode;

use super::common::{write_forecast_fixture, TestContext};

#[test]
fn test_init_snapshots_every_model() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);

    let snapshot = ctx.init_state("prod").unwrap();
    assert_eq!(snapshot.models.len(), 4);
    assert!(ctx.state_dir.join("prod.state").exists());
}

#[test]
fn test_plan_after_init_is_empty() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);

    ctx.init_state("prod").unwrap();
    let plan = ctx.plan("prod").unwrap();
    assert!(plan.is_empty(), "{:?}", plan.changes);
}

#[test]
fn test_init_twice_is_snapshot_conflict() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);

    ctx.init_state("prod").unwrap();
    let error = ctx.init_state("prod").unwrap_err();
    assert!(matches!(error, MedallionError::SnapshotExists { .. }));
    assert_eq!(error.exit_code(), 3);
}

#[test]
fn test_show_state_roundtrips() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);

    let written = ctx.init_state("prod").unwrap();
    let read = ctx.show_state("prod").unwrap();
    assert_eq!(written.models, read.models);
}

#[test]
fn test_show_state_missing_environment() {
    let ctx = TestContext::new();
    let error = ctx.show_state("prod").unwrap_err();
    assert!(matches!(error, MedallionError::SnapshotMissing { .. }));
}

#[test]
fn test_logic_change_cascades_to_dependents() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);
    ctx.init_state("prod").unwrap();

    // Drop the TRIM from CycleName
    let path = ctx.root.join("clean_forecast_cycle.yml");
    let content = fs::read_to_string(&path).unwrap();
    fs::write(&path, content.replace("TRIM(UPPER(CycleName))", "UPPER(CycleName)")).unwrap();

    let plan = ctx.plan("prod").unwrap();
    let rendered: Vec<(ChangeKind, &str)> = plan
        .changes
        .iter()
        .map(|c| (c.kind, c.model.as_str()))
        .collect();
    assert_eq!(
        rendered,
        vec![
            (ChangeKind::Replace, "clean_forecast_cycle"),
            (ChangeKind::Replace, "fct_ForecastCycle"),
        ]
    );
}

#[test]
fn test_metadata_only_change_is_alter_meta_without_cascade() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);
    ctx.init_state("prod").unwrap();

    let path = ctx.root.join("clean_forecast_cycle.yml");
    let content = fs::read_to_string(&path).unwrap();
    fs::write(
        &path,
        content.replace("description: Cleansed forecast cycles", "description: Conformed forecast cycles"),
    )
    .unwrap();

    let plan = ctx.plan("prod").unwrap();
    let rendered: Vec<(ChangeKind, &str)> = plan
        .changes
        .iter()
        .map(|c| (c.kind, c.model.as_str()))
        .collect();
    assert_eq!(rendered, vec![(ChangeKind::AlterMeta, "clean_forecast_cycle")]);
}

#[test]
fn test_new_model_plans_as_add() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);
    ctx.init_state("prod").unwrap();

    ctx.write_model(
        "dim_cycle_status.yml",
        r#"
model: {name: dim_cycle_status, layer: gold, kind: TABLE}
source: {depends_on: [clean_forecast_cycle]}
transformations:
  - {name: Status, reference_table: clean_forecast_cycle, data_type: VARCHAR}
"#,
    );

    let plan = ctx.plan("prod").unwrap();
    assert_eq!(plan.changes.len(), 1);
    assert_eq!(plan.changes[0].kind, ChangeKind::Add);
    assert_eq!(plan.changes[0].model, "dim_cycle_status");
}

#[test]
fn test_removed_models_drop_dependents_first() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);
    ctx.init_state("prod").unwrap();

    // Remove the fact and the CTE it depends on; the fact must drop first
    fs::remove_file(ctx.root.join("fct_ForecastCycle.yml")).unwrap();
    fs::remove_file(ctx.root.join("active_forecast_cycles.yml")).unwrap();

    let plan = ctx.plan("prod").unwrap();
    let drops: Vec<&str> = plan
        .changes
        .iter()
        .filter(|c| c.kind == ChangeKind::DropRemove)
        .map(|c| c.model.as_str())
        .collect();
    assert_eq!(drops, vec!["fct_ForecastCycle", "active_forecast_cycles"]);
}

#[test]
fn test_apply_auto_then_plan_is_empty() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);
    ctx.init_state("prod").unwrap();

    let path = ctx.root.join("clean_forecast_cycle.yml");
    let content = fs::read_to_string(&path).unwrap();
    fs::write(&path, content.replace("TRIM(UPPER(CycleName))", "UPPER(CycleName)")).unwrap();

    let outcome = ctx.apply("prod", ApplyMode::Auto).unwrap();
    assert!(outcome.applied);
    assert!(!outcome.plan.is_empty());

    let replan = ctx.plan("prod").unwrap();
    assert!(replan.is_empty(), "{:?}", replan.changes);
}

#[test]
fn test_dry_run_never_writes() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);
    ctx.init_state("prod").unwrap();

    let path = ctx.root.join("clean_forecast_cycle.yml");
    let content = fs::read_to_string(&path).unwrap();
    fs::write(&path, content.replace("TRIM(UPPER(CycleName))", "UPPER(CycleName)")).unwrap();

    let outcome = ctx.apply("prod", ApplyMode::DryRun).unwrap();
    assert!(!outcome.applied);

    // The pending change is still there
    let replan = ctx.plan("prod").unwrap();
    assert_eq!(replan.changes.len(), 2);
}

#[test]
fn test_confirm_mode_defers_the_write() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);
    ctx.init_state("prod").unwrap();

    let outcome = ctx.apply("prod", ApplyMode::Confirm).unwrap();
    assert!(!outcome.applied);
}

#[test]
fn test_malformed_snapshot_is_fatal_and_preserved() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);
    ctx.init_state("prod").unwrap();

    let path = ctx.state_dir.join("prod.state");
    fs::write(&path, "{ not json").unwrap();

    let error = ctx.plan("prod").unwrap_err();
    assert!(matches!(error, MedallionError::SnapshotMalformed { .. }));
    assert_eq!(error.exit_code(), 3);
    // The malformed file is left alone for inspection
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
}

#[test]
fn test_lock_contention_fails_fast() {
    let ctx = TestContext::new();
    write_forecast_fixture(&ctx);
    ctx.init_state("prod").unwrap();

    let _held = StateLock::acquire(&ctx.state_dir, "prod").unwrap();
    let error = ctx.apply("prod", ApplyMode::Auto).unwrap_err();
    assert!(matches!(error, MedallionError::SnapshotLocked { .. }));
    assert_eq!(error.exit_code(), 3);
}

#[test]
fn test_lock_released_on_drop() {
    let ctx = TestContext::new();
    fs::create_dir_all(&ctx.state_dir).unwrap();
    {
        let _lock = StateLock::acquire(&ctx.state_dir, "prod").unwrap();
        assert!(StateLock::acquire(&ctx.state_dir, "prod").is_err());
    }
    assert!(StateLock::acquire(&ctx.state_dir, "prod").is_ok());
}
