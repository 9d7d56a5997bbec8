pub mod cli;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod ingest;
pub mod io_utils;
pub mod loader;
pub mod normalize;
pub mod quarantine;
pub mod sanitize;
pub mod schema;
pub mod store;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, Commands},
    config::IngestConfig,
    ingest::{CancelToken, IngestSummary, Ingestor},
};

pub use crate::error::IngestError;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("trip_loader", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest(args) => handle_ingest(&args),
        Commands::Init(args) => handle_init(&args),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<IngestConfig> {
    match path {
        Some(path) => {
            IngestConfig::load(path).with_context(|| format!("Loading configuration from {path:?}"))
        }
        None => Ok(IngestConfig::default()),
    }
}

fn handle_ingest(args: &cli::IngestArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(database) = &args.database {
        config.destination.database = database.clone();
    }
    if let Some(table) = &args.table {
        config.destination.table = table.clone();
    }
    if let Some(path) = &args.duplicates {
        config.quarantine.path = path.clone();
    }
    if let Some(zone) = &args.source_zone {
        config.timestamps.source_zone = zone.clone();
    }
    if let Some(delimiter) = args.delimiter {
        config.input.delimiter = delimiter as char;
    }
    if let Some(encoding) = &args.input_encoding {
        config.input.encoding = encoding.clone();
    }
    if args.require_quarantine {
        config.quarantine.required = true;
    }
    debug!("Effective configuration: {config:?}");

    info!(
        "Ingesting '{}' into '{}' at {:?} (delimiter '{}')",
        args.input.display(),
        config.destination.table,
        config.destination.database,
        printable_delimiter(config.input.delimiter as u8)
    );
    let ingestor = Ingestor::new(config).context("Validating configuration")?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        warn!("Interrupt received, cancelling before commit...");
        handler_token.cancel();
    }) {
        warn!("Ctrl+C handler unavailable: {err}");
    }

    let input = io_utils::open_input(&args.input)
        .with_context(|| format!("Opening input file {:?}", args.input))?;
    let summary = ingestor
        .ingest(input, &cancel)
        .with_context(|| format!("Ingesting {:?}", args.input))?;
    report_summary(&summary, args.json)
}

fn report_summary(summary: &IngestSummary, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(summary).context("Serializing ingestion summary")?;
        println!("{rendered}");
        return Ok(());
    }
    println!(
        "Loaded {} of {} row(s); {} duplicate(s), {} written to {}; {} incomplete row(s) dropped",
        summary.rows_loaded,
        summary.rows_read,
        summary.duplicate_rows,
        summary.duplicates_written,
        summary.quarantine_path.display(),
        summary.incomplete_rows
    );
    if !summary.columns_dropped.is_empty() {
        println!("Ignored column(s): {}", summary.columns_dropped.join(", "));
    }
    if let Some(error) = &summary.quarantine_error {
        println!("Warning: duplicates file not written: {error}");
    }
    Ok(())
}

fn handle_init(args: &cli::InitArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(database) = &args.database {
        config.destination.database = database.clone();
    }
    if let Some(table) = &args.table {
        config.destination.table = table.clone();
    }
    let conn = store::open_connection(&config.destination.database)
        .with_context(|| format!("Opening {:?}", config.destination.database))?;
    let created = store::ensure_destination(&conn, &config.destination.table)
        .with_context(|| format!("Creating table '{}'", config.destination.table))?;
    if created {
        println!(
            "Created table '{}' in {}",
            config.destination.table,
            config.destination.database.display()
        );
    } else {
        println!(
            "Table '{}' already exists in {}",
            config.destination.table,
            config.destination.database.display()
        );
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
