//! project-maps CLI - persistent project-context maps for AI assistants
//!
//! Every subcommand prints a single JSON envelope on stdout:
//! `{success, data?, error?, message?}`. Diagnostics go to stderr via
//! `RUST_LOG`. `--formatted` switches to a human-readable rendering.

// CLI tools legitimately use print macros for user output
#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::{Parser, Subcommand};
use colored::Colorize;
use humansize::{format_size, BINARY};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;

use projmap_engine::generator::{analyze, generate, AnalyzeOptions};
use projmap_engine::incremental::{refresh, RefreshMode};
use projmap_engine::query::{route_question, run_query, QueryError, QueryType};
use projmap_engine::scanner::ScanOptions;
use projmap_engine::store::{
    list_projects, maps_root, project_key, ArtifactStore, StoreError, ARTIFACTS,
};
use projmap_engine::validate::validate;

/// project-maps - maintain queryable project-context maps
#[derive(Parser)]
#[command(
    name = "project-maps",
    version,
    about = "Generate and query compressed project-context maps",
    long_about = "project-maps keeps a compact, tiered, compressed JSON map of a repository's\nstructure and dependencies so AI assistants can answer questions about it\nwithout re-scanning."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Human-readable output instead of the JSON envelope
    #[arg(long, global = true)]
    formatted: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Full generation: write every map artifact for a project
    Generate {
        /// Project root
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Additional ignore glob (repeatable)
        #[arg(long = "ignore")]
        ignore: Vec<String>,

        /// Skip files at or above this many bytes
        #[arg(long)]
        max_file_size: Option<u64>,
    },

    /// Refresh existing maps, auto-detecting the mode from staleness
    Refresh {
        /// Project root
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Force a full refresh
        #[arg(long, conflicts_with = "incremental")]
        full: bool,

        /// Force an incremental refresh (still falls back over 30% churn)
        #[arg(long)]
        incremental: bool,
    },

    /// Emit stored maps as JSON
    Load {
        /// Project root
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Load every artifact up to this tier (1..4)
        #[arg(long)]
        tier: Option<u8>,

        /// Load a single named map
        #[arg(long = "map")]
        map: Option<String>,
    },

    /// Answer a pre-computed query
    Query {
        /// Query type (entry-points, framework, tests, largest, recent,
        /// structure, languages, and map-backed extended types)
        query_type: String,

        /// Project root
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },

    /// Route a natural-language question to a query
    Ask {
        /// The question
        question: String,

        /// Project root
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },

    /// Compression statistics per artifact
    Stats {
        /// Project root
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },

    /// Enumerate projects with stored maps
    List,

    /// Check map integrity
    Validate {
        /// Project root
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
}

/// The single JSON object every subcommand prints
#[derive(Serialize)]
struct Envelope {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// A failure carrying its exit code
struct CliError {
    code: &'static str,
    message: String,
    exit: u8,
}

impl CliError {
    fn fatal(code: &'static str, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), exit: 1 }
    }

    fn usage(code: &'static str, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), exit: 2 }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingArtifact(_) => Self::fatal(
                "maps-missing",
                format!("{err}; run `project-maps generate` first"),
            ),
            other => Self::fatal("store-error", other.to_string()),
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli.command) {
        Ok((data, message)) => {
            if cli.formatted {
                print_formatted(&cli.command, &data, message.as_deref());
            } else {
                let envelope = Envelope {
                    success: true,
                    data: Some(data),
                    error: None,
                    message,
                };
                println!("{}", serde_json::to_string(&envelope).expect("envelope serializes"));
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            let envelope = Envelope {
                success: false,
                data: None,
                error: Some(ErrorBody { code: err.code.to_owned(), message: err.message.clone() }),
                message: None,
            };
            if cli.formatted {
                eprintln!("{} {}", "error:".red().bold(), err.message);
            } else {
                println!("{}", serde_json::to_string(&envelope).expect("envelope serializes"));
            }
            ExitCode::from(err.exit)
        }
    }
}

fn run(command: &Commands) -> Result<(Value, Option<String>), CliError> {
    match command {
        Commands::Generate { path, ignore, max_file_size } => cmd_generate(path, ignore, *max_file_size),
        Commands::Refresh { path, full, incremental } => cmd_refresh(path, *full, *incremental),
        Commands::Load { path, tier, map } => cmd_load(path, *tier, map.as_deref()),
        Commands::Query { query_type, path } => cmd_query(path, query_type),
        Commands::Ask { question, path } => cmd_ask(path, question),
        Commands::Stats { path } => cmd_stats(path),
        Commands::List => cmd_list(),
        Commands::Validate { path } => cmd_validate(path),
    }
}

fn analyze_options(ignore: &[String], max_file_size: Option<u64>) -> AnalyzeOptions {
    let mut scan = ScanOptions { extra_ignores: ignore.to_vec(), ..Default::default() };
    if let Some(cap) = max_file_size {
        scan.max_file_size = cap;
    }
    AnalyzeOptions { scan, now_unix: None }
}

fn cmd_generate(
    path: &PathBuf,
    ignore: &[String],
    max_file_size: Option<u64>,
) -> Result<(Value, Option<String>), CliError> {
    let analysis = analyze(path, &analyze_options(ignore, max_file_size))
        .map_err(|err| CliError::fatal("invalid-path", err.to_string()))?;
    log::debug!("analyzed {} files under {}", analysis.files.len(), path.display());
    let mut store = ArtifactStore::open(path);
    let result = generate(&analysis, &mut store)?;

    let artifacts: Vec<Value> = result
        .artifacts
        .iter()
        .map(|a| {
            json!({
                "name": a.name,
                "compressionLevel": a.metadata.compression_level,
                "compressedSize": a.metadata.compressed_size,
            })
        })
        .collect();
    let count = artifacts.len();

    Ok((
        json!({
            "projectKey": project_key(path),
            "outputDir": store.dir(),
            "totalFiles": analysis.files.len(),
            "artifacts": artifacts,
            "warnings": result.warnings,
        }),
        Some(format!("Generated {count} map artifacts")),
    ))
}

fn cmd_refresh(path: &PathBuf, full: bool, incremental: bool) -> Result<(Value, Option<String>), CliError> {
    let force = if full {
        Some(RefreshMode::Full)
    } else if incremental {
        Some(RefreshMode::Incremental)
    } else {
        None
    };

    let mut store = ArtifactStore::open(path);
    let outcome = refresh(path, &mut store, &AnalyzeOptions::default(), force)
        .map_err(|err| CliError::fatal("refresh-failed", err.to_string()))?;

    Ok((
        json!({
            "mode": outcome.mode.name(),
            "changedFiles": outcome.changed,
            "artifacts": outcome.result.artifacts.len(),
            "warnings": outcome.result.warnings,
        }),
        Some(format!("Refresh complete ({})", outcome.mode.name())),
    ))
}

fn cmd_load(path: &PathBuf, tier: Option<u8>, map: Option<&str>) -> Result<(Value, Option<String>), CliError> {
    let store = ArtifactStore::open(path);

    if let Some(name) = map {
        if projmap_engine::store::artifact_info(name).is_none() {
            let valid: Vec<&str> = ARTIFACTS.iter().map(|a| a.name).collect();
            return Err(CliError::usage(
                "unknown-map",
                format!("unknown map {name:?}; valid maps: {}", valid.join(", ")),
            ));
        }
        let doc = store.read_artifact(name)?;
        return Ok((json!({ "maps": { name: doc } }), None));
    }

    let max_tier = tier.unwrap_or(1).clamp(1, 4);
    let mut maps = serde_json::Map::new();
    for info in ARTIFACTS.iter().filter(|a| a.tier <= max_tier) {
        if !store.artifact_exists(info.name) {
            if info.required {
                return Err(StoreError::MissingArtifact(info.name.to_owned()).into());
            }
            continue;
        }
        maps.insert(info.name.to_owned(), store.read_artifact(info.name)?);
    }
    Ok((json!({ "tier": max_tier, "maps": maps }), None))
}

fn cmd_query(path: &PathBuf, query_type: &str) -> Result<(Value, Option<String>), CliError> {
    let Some(query) = QueryType::from_name(query_type) else {
        return Err(CliError::usage(
            "unknown-query-type",
            format!(
                "unknown query type {query_type:?}; valid types: {}",
                QueryType::valid_names().join(", ")
            ),
        ));
    };

    let store = ArtifactStore::open(path);
    let answer = run_query(&store, query).map_err(query_error)?;
    Ok((json!({ "query": query.name(), "answer": answer }), None))
}

fn cmd_ask(path: &PathBuf, question: &str) -> Result<(Value, Option<String>), CliError> {
    let Some(query) = route_question(question) else {
        return Err(CliError::usage(
            "unknown-intent",
            format!(
                "could not route the question to a query; valid types: {}",
                QueryType::valid_names().join(", ")
            ),
        ));
    };

    let store = ArtifactStore::open(path);
    let answer = run_query(&store, query).map_err(query_error)?;
    Ok((
        json!({ "question": question, "query": query.name(), "answer": answer }),
        None,
    ))
}

fn query_error(err: QueryError) -> CliError {
    match err {
        QueryError::Store(store) => store.into(),
        QueryError::UnknownType { .. } => CliError::usage("unknown-query-type", err.to_string()),
        other => CliError::fatal("query-failed", other.to_string()),
    }
}

fn cmd_stats(path: &PathBuf) -> Result<(Value, Option<String>), CliError> {
    let store = ArtifactStore::open(path);
    let report = store.stats()?;
    if report.artifacts.is_empty() {
        return Err(CliError::fatal(
            "maps-missing",
            "no artifacts found; run `project-maps generate` first",
        ));
    }
    let data = serde_json::to_value(&report)
        .map_err(|err| CliError::fatal("stats-failed", err.to_string()))?;
    Ok((data, None))
}

fn cmd_list() -> Result<(Value, Option<String>), CliError> {
    let projects = list_projects()?;
    let count = projects.len();
    Ok((
        json!({ "root": maps_root(), "projects": projects }),
        Some(format!("{count} project(s) with stored maps")),
    ))
}

fn cmd_validate(path: &PathBuf) -> Result<(Value, Option<String>), CliError> {
    let store = ArtifactStore::open(path);
    let report = validate(&store);
    if report.is_fatal() {
        return Err(CliError::fatal("validation-failed", report.fatal.join("; ")));
    }
    let message = if report.passed {
        "All maps valid".to_owned()
    } else {
        format!(
            "Validation finished with {} error(s), {} warning(s)",
            report.errors.len(),
            report.warnings.len()
        )
    };
    let data = serde_json::to_value(&report)
        .map_err(|err| CliError::fatal("validation-failed", err.to_string()))?;
    Ok((data, Some(message)))
}

/// Human-readable rendering for `--formatted`
fn print_formatted(command: &Commands, data: &Value, message: Option<&str>) {
    match command {
        Commands::Stats { .. } => {
            println!("{}", "Compression statistics".bold());
            if let Some(artifacts) = data.get("artifacts").and_then(Value::as_array) {
                for artifact in artifacts {
                    let name = artifact["name"].as_str().unwrap_or("?");
                    let level = artifact["compressionLevel"].as_u64().unwrap_or(0);
                    let original = artifact["originalSize"].as_u64().unwrap_or(0);
                    let compressed = artifact["compressedSize"].as_u64().unwrap_or(0);
                    println!(
                        "  {:<24} L{}  {:>10} -> {:>10}",
                        name.cyan(),
                        level,
                        format_size(original, BINARY),
                        format_size(compressed, BINARY),
                    );
                }
            }
            let total_original = data["totalOriginal"].as_u64().unwrap_or(0);
            let total_compressed = data["totalCompressed"].as_u64().unwrap_or(0);
            println!(
                "  {:<24} {:>14} -> {:>10}",
                "total".bold(),
                format_size(total_original, BINARY),
                format_size(total_compressed, BINARY),
            );
        }
        Commands::List => {
            if let Some(projects) = data.get("projects").and_then(Value::as_array) {
                println!("{}", "Stored project maps".bold());
                for project in projects {
                    println!(
                        "  {}  {} artifact(s)  {}",
                        project["key"].as_str().unwrap_or("?").cyan(),
                        project["artifacts"].as_u64().unwrap_or(0),
                        project["generated"].as_str().unwrap_or("").dimmed(),
                    );
                }
            }
        }
        _ => {
            if let Some(message) = message {
                println!("{}", message.green().bold());
            }
            println!(
                "{}",
                serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_owned())
            );
        }
    }
}
