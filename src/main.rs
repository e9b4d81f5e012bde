use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use configuration::{load_schema, load_settings, parse_type, LogLevel, LoggingSettings, MapperSettings};
use core_types::{TypeDescriptor, Value};
use mapper::Mapper;
use serde_json::Value as Json;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// The main entry point for the Shapeshift mapping tool.
fn main() -> Result<()> {
    // Environment overrides (SHAPESHIFT__*) may live in a .env file.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref()).context("Failed to load settings")?;
    // Keep the guard alive so buffered file logs are flushed on exit.
    let _guard = init_tracing(&settings.logging, cli.log_level)?;

    match cli.command {
        Commands::Map(args) => handle_map(args, settings.mapper),
        Commands::Plan(args) => handle_plan(args, settings.mapper),
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Converts JSON documents between shapes declared in a schema.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to an optional ./shapeshift.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides both RUST_LOG and the configured log level.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map a JSON document from one declared type to another.
    Map(MapArgs),
    /// Show which strategy and member pairs a conversion would use.
    Plan(PlanArgs),
}

#[derive(Parser)]
struct MapArgs {
    /// Schema document (TOML or JSON) declaring records, enums and capabilities.
    #[arg(long, short)]
    schema: PathBuf,

    /// Source type expression (e.g. "Order" or "list<Order>").
    #[arg(long)]
    from: String,

    /// Destination type expression.
    #[arg(long)]
    to: String,

    /// JSON input file, or "-" for stdin.
    #[arg(long, short, default_value = "-")]
    input: PathBuf,

    /// Treat the input as a JSON array; --from and --to then name the element types.
    #[arg(long, conflicts_with = "into")]
    list: bool,

    /// An existing destination document to copy into instead of building a new one.
    #[arg(long)]
    into: Option<PathBuf>,
}

#[derive(Parser)]
struct PlanArgs {
    #[arg(long, short)]
    schema: PathBuf,

    #[arg(long)]
    from: String,

    #[arg(long)]
    to: String,
}

// ==============================================================================
// Logging
// ==============================================================================

/// Installs the global subscriber. Logs go to stderr so stdout stays valid
/// JSON, and are mirrored to a daily rolling file when a directory is set.
fn init_tracing(logging: &LoggingSettings, level: Option<LogLevel>) -> Result<Option<WorkerGuard>> {
    let filter = match level {
        Some(level) => EnvFilter::new(level.as_directive()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(logging.level.as_directive())),
    };

    let (writer, guard) = match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &logging.file_prefix);
            let (file, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(std::io::stderr.and(file)), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(guard)
}

// ==============================================================================
// Command Logic
// ==============================================================================

/// Loads the schema and resolves the two type expressions against it.
fn prepare(schema: &Path, from: &str, to: &str, settings: MapperSettings) -> Result<(Mapper, TypeDescriptor, TypeDescriptor)> {
    let registry = load_schema(schema).with_context(|| format!("Failed to load schema {}", schema.display()))?;
    let from = parse_type(&registry, from).with_context(|| format!("Invalid source type '{from}'"))?;
    let to = parse_type(&registry, to).with_context(|| format!("Invalid destination type '{to}'"))?;
    Ok((Mapper::with_registry(registry).with_settings(settings), from, to))
}

fn handle_map(args: MapArgs, settings: MapperSettings) -> Result<()> {
    let (mapper, from, to) = prepare(&args.schema, &args.from, &args.to, settings)?;
    let input = read_json(&args.input)?;

    let output = if args.list {
        let items = input.as_array().context("--list expects the input to be a JSON array")?;
        let sources = {
            let registry = mapper.registry();
            items
                .iter()
                .map(|item| registry.value_from_json(item, &from))
                .collect::<Result<Vec<Value>, _>>()?
        };
        let mapped = mapper.parse_list_value(&sources, &from, &to)?;
        tracing::info!(count = mapped.len(), "Mapped list.");
        let registry = mapper.registry();
        Json::Array(mapped.iter().map(|value| registry.value_to_json(value, &to)).collect())
    } else {
        let source = mapper.registry().value_from_json(&input, &from)?;
        match &args.into {
            Some(path) => {
                let mut destination = mapper.registry().value_from_json(&read_json(path)?, &to)?;
                if !mapper.copy_value(&source, &from, &mut destination, &to)? {
                    tracing::warn!(from = %from, to = %to, "Nothing in common; destination left unchanged.");
                }
                mapper.registry().value_to_json(&destination, &to)
            }
            None => {
                let parsed = mapper.parse_value(&source, &from, &to)?;
                mapper.registry().value_to_json(&parsed, &to)
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn handle_plan(args: PlanArgs, settings: MapperSettings) -> Result<()> {
    let (mapper, from, to) = prepare(&args.schema, &args.from, &args.to, settings)?;
    let plan = mapper.plan(&from, &to)?;

    println!("{from} -> {to}: {}", plan.strategy);
    if plan.pairs.is_empty() {
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Member", "Source type", "Destination type"]);
    for pair in &plan.pairs {
        table.add_row(vec![
            pair.name.clone(),
            pair.source_type.to_string(),
            pair.destination_type.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn read_json(path: &Path) -> Result<Json> {
    let text = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}
