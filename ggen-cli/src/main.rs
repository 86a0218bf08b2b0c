// ggen CLI - thin wrapper over the engine facade
// Verbs: validate | drift | baseline | report. Exit codes: 1 on engine
// error, 3 on violations or drift in fail mode, 0 otherwise.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ggen_artifact::CancellationToken;
use ggen_engine::{Engine, EngineConfig};
use ggen_graph::Graph;
use ggen_validation::{exit_code, ExitStatus};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ggen", version, about = "Knowledge-graph driven artifact generation")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, default_value = "ggen.toml")]
    config: PathBuf,

    /// Print machine-readable JSON instead of the text summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a data graph against a shapes graph and the built-in rules
    Validate {
        /// Data graph file
        data: PathBuf,
        /// Shapes graph file
        shapes: PathBuf,
    },
    /// Check tracked files for drift against attestations and the baseline
    Drift {
        /// Files to check
        paths: Vec<PathBuf>,
    },
    /// Record the current state of tracked files as the baseline
    Baseline {
        /// Files to record
        paths: Vec<PathBuf>,
    },
    /// Combined validation and drift report
    Report {
        /// Data graph file
        #[arg(long)]
        data: Option<PathBuf>,
        /// Shapes graph file
        #[arg(long)]
        shapes: Option<PathBuf>,
        /// Tracked files to drift-check
        #[arg(long = "path")]
        paths: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = EngineConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let fail_mode = matches!(config.drift_mode, ggen_engine::DriftMode::Fail);

    let engine = Engine::new(config).context("building engine")?;
    engine.initialize().context("initializing engine")?;

    let code = match cli.command {
        Command::Validate { data, shapes } => {
            let data = load_graph(&data)?;
            let shapes = load_graph(&shapes)?;
            let report = engine.validate(&data, &shapes, None)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report.to_json())?);
            } else {
                print!("{}", report.to_text());
            }
            exit_code(ExitStatus {
                had_error: false,
                found_violations: !report.ok,
                fail_mode: true,
            })
        }
        Command::Drift { paths } => {
            let report = engine.drift(&paths, &CancellationToken::new())?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report.to_json())?);
            } else {
                print!("{}", report.to_text());
            }
            exit_code(ExitStatus {
                had_error: false,
                found_violations: report.summary.action_required,
                fail_mode,
            })
        }
        Command::Baseline { paths } => {
            let count = engine.baseline_update(&paths, &CancellationToken::new())?;
            println!("baseline updated: {} file(s)", count);
            0
        }
        Command::Report { data, shapes, paths } => {
            let mut document = serde_json::Map::new();
            let mut found_violations = false;

            if let (Some(data), Some(shapes)) = (&data, &shapes) {
                let data = load_graph(data)?;
                let shapes = load_graph(shapes)?;
                let report = engine.validate(&data, &shapes, None)?;
                found_violations |= !report.ok;
                document.insert("validation".to_string(), report.to_json());
            }

            if !paths.is_empty() {
                let report = engine.drift(&paths, &CancellationToken::new())?;
                found_violations |= report.summary.action_required;
                document.insert("drift".to_string(), report.to_json());
            }

            document.insert(
                "metrics".to_string(),
                serde_json::to_value(engine.metrics())?,
            );
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::Value::Object(document))?
            );
            exit_code(ExitStatus {
                had_error: false,
                found_violations,
                fail_mode,
            })
        }
    };

    engine.shutdown().context("shutting down engine")?;
    Ok(code)
}

fn load_graph(path: &PathBuf) -> anyhow::Result<Graph> {
    Graph::parse_file(path).with_context(|| format!("parsing {}", path.display()))
}
