use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use rust_medallion::error::MedallionError;
use rust_medallion::graph::GraphFormat;
use rust_medallion::state::Plan;
use rust_medallion::{ApplyMode, Settings};

#[derive(Parser)]
#[command(name = "rust-medallion")]
#[command(author, version, about = "Fast Rust compiler for medallion data-transformation models")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile model definitions into SQL artifacts
    Generate {
        /// Directory holding the model definition files
        #[arg(short, long)]
        root: PathBuf,

        /// Output directory for generated SQL
        #[arg(short, long)]
        out_dir: PathBuf,

        /// Target SQL dialect (postgres, spark)
        #[arg(short, long, default_value = "postgres")]
        dialect: String,
    },

    /// Validate model definitions without generating SQL
    Validate {
        #[arg(short, long)]
        root: PathBuf,
    },

    /// Snapshot the current models into a new environment state
    Init {
        #[arg(short, long)]
        root: PathBuf,

        /// Environment name (e.g. dev, prod)
        #[arg(short, long)]
        env: String,

        /// Base directory for state files (defaults to <root>/state)
        #[arg(short, long)]
        state_dir: Option<PathBuf>,
    },

    /// Print the persisted state snapshot for an environment
    Show {
        #[arg(short, long)]
        env: String,

        #[arg(short, long)]
        state_dir: PathBuf,
    },

    /// Diff current models against the environment snapshot
    Plan {
        #[arg(short, long)]
        root: PathBuf,

        #[arg(short, long)]
        env: String,

        #[arg(short, long)]
        state_dir: Option<PathBuf>,
    },

    /// Apply the plan, updating the environment snapshot
    Apply {
        #[arg(short, long)]
        root: PathBuf,

        #[arg(short, long)]
        env: String,

        #[arg(short, long)]
        state_dir: Option<PathBuf>,

        /// dry-run, auto, or confirm
        #[arg(short, long, default_value = "confirm")]
        mode: String,
    },

    /// Export the dependency graph for lineage rendering
    ExportGraph {
        #[arg(short, long)]
        root: PathBuf,

        /// nodes_edges or hierarchical
        #[arg(short, long, default_value = "nodes_edges")]
        format: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(error) = run(cli.command) {
        if let Some(MedallionError::ValidationFailed { diagnostics }) =
            error.downcast_ref::<MedallionError>()
        {
            for diagnostic in diagnostics {
                eprintln!("{}", diagnostic);
            }
        }
        eprintln!("error: {:#}", error);
        let code = error
            .downcast_ref::<MedallionError>()
            .map(MedallionError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Generate {
            root,
            out_dir,
            dialect,
        } => {
            let settings = Settings {
                root,
                out_dir,
                dialect,
                env: String::new(),
                mode: ApplyMode::DryRun,
            };
            let report = rust_medallion::generate(&settings)?;
            print_diagnostics(&report.diagnostics);
            println!(
                "Generated {} artifact(s), wrote {} file(s)",
                report.artifacts.len(),
                report.written.len()
            );
            Ok(())
        }

        Commands::Validate { root } => {
            let report = rust_medallion::validate_corpus(&root)?;
            print_diagnostics(&report.diagnostics);
            println!("Validated {} model(s)", report.model_count);
            Ok(())
        }

        Commands::Init {
            root,
            env,
            state_dir,
        } => {
            let state_dir = state_dir.unwrap_or_else(|| root.join("state"));
            let settings = state_settings(root, env, ApplyMode::DryRun);
            let snapshot = rust_medallion::init_state(&settings, &state_dir)?;
            println!(
                "Initialized environment {} with {} model(s)",
                settings.env,
                snapshot.models.len()
            );
            Ok(())
        }

        Commands::Show { env, state_dir } => {
            let settings = state_settings(PathBuf::new(), env, ApplyMode::DryRun);
            let snapshot = rust_medallion::show_state(&settings, &state_dir)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }

        Commands::Plan {
            root,
            env,
            state_dir,
        } => {
            let state_dir = state_dir.unwrap_or_else(|| root.join("state"));
            let settings = state_settings(root, env, ApplyMode::DryRun);
            let plan = rust_medallion::plan(&settings, &state_dir)?;
            print_plan(&plan);
            Ok(())
        }

        Commands::Apply {
            root,
            env,
            state_dir,
            mode,
        } => {
            let state_dir = state_dir.unwrap_or_else(|| root.join("state"));
            let mode = match ApplyMode::parse(&mode) {
                Ok(mode) => mode,
                Err(message) => bail!(message),
            };
            let settings = state_settings(root, env, mode);

            let outcome = rust_medallion::apply(&settings, &state_dir)?;
            print_plan(&outcome.plan);

            match mode {
                ApplyMode::DryRun => println!("Dry run; snapshot not written"),
                ApplyMode::Auto => {
                    println!("Snapshot updated for environment {}", settings.env)
                }
                ApplyMode::Confirm => {
                    if outcome.plan.is_empty() {
                        println!("Nothing to apply");
                    } else if confirm_prompt()? {
                        let confirmed = Settings {
                            mode: ApplyMode::Auto,
                            ..settings
                        };
                        rust_medallion::apply(&confirmed, &state_dir)?;
                        println!("Snapshot updated for environment {}", confirmed.env);
                    } else {
                        println!("Aborted; snapshot not written");
                    }
                }
            }
            Ok(())
        }

        Commands::ExportGraph { root, format } => {
            let format = match GraphFormat::parse(&format) {
                Ok(format) => format,
                Err(message) => bail!(message),
            };
            let document = rust_medallion::export_graph(&root, format)?;
            println!("{:#}", document);
            Ok(())
        }
    }
}

/// Settings for the state subcommands, which have no generation output.
fn state_settings(root: PathBuf, env: String, mode: ApplyMode) -> Settings {
    Settings {
        root,
        out_dir: PathBuf::new(),
        dialect: String::new(),
        env,
        mode,
    }
}

fn confirm_prompt() -> Result<bool> {
    print!("Apply these changes? [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!("No changes for environment {}", plan.environment);
        return;
    }
    println!(
        "Plan for environment {} ({} change(s)):",
        plan.environment,
        plan.changes.len()
    );
    for change in &plan.changes {
        println!("  {:<10} {}", change.kind.as_str(), change.model);
    }
}

fn print_diagnostics(diagnostics: &[rust_medallion::model::Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostic);
    }
}
