use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Clean trip-record CSV uploads and reload the trip table", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Clean a CSV upload and replace the destination table's contents with it
    Ingest(IngestArgs),
    /// Create the destination table and its indexes if they do not exist
    Init(InitArgs),
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Input CSV file (`-` reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// SQLite database holding the destination table
    #[arg(short = 'd', long = "database")]
    pub database: Option<PathBuf>,
    /// Destination table name
    #[arg(long)]
    pub table: Option<String>,
    /// Where to write duplicate rows
    #[arg(long = "duplicates")]
    pub duplicates: Option<PathBuf>,
    /// Zone of naive input timestamps: `local`, `utc` or an offset like `+02:00`
    #[arg(long = "source-zone")]
    pub source_zone: Option<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Fail when the duplicates file cannot be written
    #[arg(long = "require-quarantine")]
    pub require_quarantine: bool,
    /// Print the ingestion summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// YAML configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// SQLite database to create the table in
    #[arg(short = 'd', long = "database")]
    pub database: Option<PathBuf>,
    /// Destination table name
    #[arg(long)]
    pub table: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
