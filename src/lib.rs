//! rust-medallion: A fast Rust compiler for medallion data-transformation models
//!
//! This library compiles declarative YAML model definitions into
//! dialect-specific SQL for a bronze/silver/gold pipeline, and keeps a
//! per-environment deployment snapshot so re-runs produce an actionable
//! plan of creations, replacements, and removals.

pub mod analyze;
pub mod error;
pub mod generate;
pub mod graph;
pub mod loader;
pub mod model;
pub mod state;
pub mod validate;

mod util;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use error::MedallionError;
use generate::{dialect_for, SqlArtifact, SqlGenerator};
use graph::{export_graph as render_graph, DependencyGraph, GraphFormat};
use model::{Diagnostic, Model};
use state::{plan_changes, Plan, Snapshot, StateLock};

/// Frozen invocation settings, assembled by the enclosing shell.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the model definition files
    pub root: PathBuf,
    /// Directory receiving generated artifacts
    pub out_dir: PathBuf,
    /// Dialect selector (`postgres`, `spark`)
    pub dialect: String,
    /// Target environment for state operations
    pub env: String,
    /// Apply mode for state writes
    pub mode: ApplyMode,
}

/// How `apply` treats the snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    DryRun,
    Auto,
    Confirm,
}

impl ApplyMode {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "dry_run" => Ok(ApplyMode::DryRun),
            "auto" => Ok(ApplyMode::Auto),
            "confirm" => Ok(ApplyMode::Confirm),
            _ => Err(format!("unknown apply mode: {}", s)),
        }
    }
}

/// A loaded, validated, cycle-free corpus.
#[derive(Debug)]
pub struct Compilation {
    pub models: BTreeMap<String, Model>,
    pub graph: DependencyGraph,
    /// Remaining diagnostics; warnings only once compilation succeeds
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of a validate run.
pub struct ValidationReport {
    pub model_count: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of a generate run.
#[derive(Debug)]
pub struct GenerateReport {
    pub artifacts: Vec<SqlArtifact>,
    pub diagnostics: Vec<Diagnostic>,
    /// Files written under the out_dir
    pub written: Vec<PathBuf>,
}

/// Outcome of an apply run.
#[derive(Debug)]
pub struct ApplyOutcome {
    pub plan: Plan,
    /// Whether the snapshot file was written
    pub applied: bool,
}

/// Load, validate, and resolve the corpus under `root`.
///
/// Load and validation errors accumulate; any error-severity diagnostic
/// halts the pipeline here. A dependency cycle is reported after
/// validation with its full membership.
pub fn compile(root: &Path) -> Result<Compilation, MedallionError> {
    let loaded = loader::load_models(root)?;
    let mut diagnostics = loaded.diagnostics;
    let models = loaded.models;

    diagnostics.extend(validate::validate(&models));
    model::sort_diagnostics(&mut diagnostics);

    if model::has_errors(&diagnostics) {
        return Err(MedallionError::ValidationFailed { diagnostics });
    }

    let graph = DependencyGraph::build(&models);
    graph.detect_cycles()?;

    log::info!("compiled {} model(s)", models.len());
    Ok(Compilation {
        models,
        graph,
        diagnostics,
    })
}

/// Validate the corpus without generating anything.
pub fn validate_corpus(root: &Path) -> Result<ValidationReport, MedallionError> {
    let compilation = compile(root)?;
    Ok(ValidationReport {
        model_count: compilation.models.len(),
        diagnostics: compilation.diagnostics,
    })
}

/// Generate SQL artifacts for every materializable model.
///
/// Writes `<model>.sql` (plus `<model>.audits.sql` when the model declares
/// audits) and a `graph.json` lineage document under the out_dir.
pub fn generate(settings: &Settings) -> Result<GenerateReport, MedallionError> {
    // Unknown dialect is fatal before any generation work
    let dialect = dialect_for(&settings.dialect)?;
    let compilation = compile(&settings.root)?;

    let mut diagnostics = compilation.diagnostics;
    diagnostics.extend(validate::validate_functions(
        &compilation.models,
        dialect.as_ref(),
    ));
    model::sort_diagnostics(&mut diagnostics);

    let generator = SqlGenerator::new(&compilation.models, &compilation.graph, dialect.as_ref());
    let artifacts = generator.generate_all()?;

    std::fs::create_dir_all(&settings.out_dir).map_err(|e| MedallionError::ArtifactWriteError {
        path: settings.out_dir.clone(),
        source: e,
    })?;

    let mut written = Vec::new();
    for artifact in &artifacts {
        let sql_path = settings.out_dir.join(format!("{}.sql", artifact.model));
        write_artifact(&sql_path, &artifact.sql)?;
        written.push(sql_path);

        if !artifact.audits.is_empty() {
            let mut audit_sql = String::new();
            for audit in &artifact.audits {
                audit_sql.push_str(&format!("-- {} {}\n{}\n", audit.key, audit.audit_type, audit.sql));
            }
            let audit_path = settings.out_dir.join(format!("{}.audits.sql", artifact.model));
            write_artifact(&audit_path, &audit_sql)?;
            written.push(audit_path);
        }
    }

    let graph_doc = render_graph(&compilation.models, GraphFormat::NodesEdges);
    let graph_path = settings.out_dir.join("graph.json");
    write_artifact(&graph_path, &format!("{:#}\n", graph_doc))?;
    written.push(graph_path);

    log::info!(
        "generated {} artifact(s) into {}",
        artifacts.len(),
        settings.out_dir.display()
    );
    Ok(GenerateReport {
        artifacts,
        diagnostics,
        written,
    })
}

fn write_artifact(path: &Path, content: &str) -> Result<(), MedallionError> {
    std::fs::write(path, content).map_err(|e| MedallionError::ArtifactWriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Snapshot the current IR for the settings' environment. Fails if a
/// snapshot already exists.
pub fn init_state(settings: &Settings, state_dir: &Path) -> Result<Snapshot, MedallionError> {
    let compilation = compile(&settings.root)?;
    if Snapshot::exists(state_dir, &settings.env) {
        return Err(MedallionError::SnapshotExists {
            environment: settings.env.clone(),
            path: Snapshot::path_for(state_dir, &settings.env),
        });
    }
    let _lock = StateLock::acquire(state_dir, &settings.env)?;
    let snapshot = Snapshot::capture(&settings.env, &compilation.models);
    snapshot.save(state_dir)?;
    Ok(snapshot)
}

/// Read the persisted snapshot for the settings' environment.
pub fn show_state(settings: &Settings, state_dir: &Path) -> Result<Snapshot, MedallionError> {
    Snapshot::load(state_dir, &settings.env)
}

/// Diff the current IR against the persisted snapshot.
pub fn plan(settings: &Settings, state_dir: &Path) -> Result<Plan, MedallionError> {
    let compilation = compile(&settings.root)?;
    let snapshot = Snapshot::load(state_dir, &settings.env)?;
    plan_changes(&compilation.models, &compilation.graph, &snapshot)
}

/// Compute the plan and, depending on `settings.mode`, persist the
/// updated snapshot.
///
/// `DryRun` never touches the file. `Confirm` computes the plan and leaves
/// the write to a follow-up `Auto` invocation once the shell has an ack.
pub fn apply(settings: &Settings, state_dir: &Path) -> Result<ApplyOutcome, MedallionError> {
    let compilation = compile(&settings.root)?;
    let snapshot = Snapshot::load(state_dir, &settings.env)?;
    let plan = plan_changes(&compilation.models, &compilation.graph, &snapshot)?;

    let applied = match settings.mode {
        ApplyMode::DryRun | ApplyMode::Confirm => false,
        ApplyMode::Auto => {
            let _lock = StateLock::acquire(state_dir, &settings.env)?;
            let updated = Snapshot::capture(&settings.env, &compilation.models);
            updated.save(state_dir)?;
            log::info!(
                "applied {} change(s) to environment {}",
                plan.changes.len(),
                settings.env
            );
            true
        }
    };

    Ok(ApplyOutcome { plan, applied })
}

/// Export the dependency graph for downstream lineage rendering.
pub fn export_graph(root: &Path, format: GraphFormat) -> Result<serde_json::Value, MedallionError> {
    let compilation = compile(root)?;
    Ok(render_graph(&compilation.models, format))
}
