//! Ingestion configuration.
//!
//! [`IngestConfig`] is loaded from an optional YAML file. Every field has a
//! default, so an empty document (or no file at all) yields the standard
//! setup: UTF-8 input, `duplicates.csv` quarantine, `trip_records`
//! destination table and timestamps interpreted in the host's local zone.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::{FixedOffset, Offset, Utc};
use encoding_rs::{Encoding, UTF_8};
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

pub const DEFAULT_TABLE_NAME: &str = "trip_records";
pub const DEFAULT_DUPLICATES_PATH: &str = "duplicates.csv";
pub const DEFAULT_DATABASE_PATH: &str = "trips.db";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    pub input: InputConfig,
    pub quarantine: QuarantineConfig,
    pub destination: DestinationConfig,
    pub timestamps: TimestampConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    pub delimiter: char,
    pub encoding: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            encoding: "utf-8".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct QuarantineConfig {
    pub path: PathBuf,
    /// Fail the ingestion when the duplicates file cannot be written.
    pub required: bool,
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DUPLICATES_PATH),
            required: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DestinationConfig {
    pub database: PathBuf,
    pub table: String,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE_PATH),
            table: DEFAULT_TABLE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TimestampConfig {
    /// `local` or a fixed UTC offset such as `+02:00`.
    pub source_zone: String,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            source_zone: "local".to_string(),
        }
    }
}

/// Zone in which naive input timestamps are interpreted before conversion to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceZone {
    Local,
    Fixed(FixedOffset),
}

impl FromStr for SourceZone {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("local") {
            return Ok(SourceZone::Local);
        }
        if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
            return Ok(SourceZone::Fixed(Utc.fix()));
        }
        trimmed
            .parse::<FixedOffset>()
            .map(SourceZone::Fixed)
            .map_err(|_| {
                IngestError::Config(format!(
                    "Unknown source zone '{value}' (expected 'local', 'utc' or an offset like '+02:00')"
                ))
            })
    }
}

impl IngestConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: IngestConfig = serde_yaml::from_reader(reader).map_err(|err| {
            IngestError::Config(format!("Parsing configuration {path:?}: {err}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.delimiter()?;
        self.encoding()?;
        self.source_zone()?;
        validate_table_name(&self.destination.table)?;
        if self.quarantine.path.as_os_str().is_empty() {
            return Err(IngestError::Config(
                "Quarantine path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn delimiter(&self) -> Result<u8> {
        let delimiter = self.input.delimiter;
        if !delimiter.is_ascii() || delimiter == '"' || delimiter == '\n' {
            return Err(IngestError::Config(format!(
                "Delimiter {delimiter:?} must be a single ASCII character other than quote or newline"
            )));
        }
        Ok(delimiter as u8)
    }

    pub fn encoding(&self) -> Result<&'static Encoding> {
        let label = self.input.encoding.trim();
        if label.is_empty() {
            return Ok(UTF_8);
        }
        Encoding::for_label(label.as_bytes())
            .ok_or_else(|| IngestError::Config(format!("Unknown encoding '{label}'")))
    }

    pub fn source_zone(&self) -> Result<SourceZone> {
        self.timestamps.source_zone.parse()
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(IngestError::Config(format!(
            "Invalid destination table name '{name}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: IngestConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, IngestConfig::default());
        assert_eq!(config.quarantine.path, PathBuf::from("duplicates.csv"));
        assert_eq!(config.destination.table, "trip_records");
        assert_eq!(config.source_zone().unwrap(), SourceZone::Local);
    }

    #[test]
    fn partial_document_overrides_selected_fields() {
        let yaml = "destination:\n  table: nyc_trips\ntimestamps:\n  source_zone: \"-05:00\"\n";
        let config: IngestConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.destination.table, "nyc_trips");
        assert_eq!(config.destination.database, PathBuf::from("trips.db"));
        assert_eq!(
            config.source_zone().unwrap(),
            SourceZone::Fixed(FixedOffset::west_opt(5 * 3600).unwrap())
        );
        config.validate().unwrap();
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let yaml = "destination:\n  tabel: oops\n";
        assert!(serde_yaml::from_str::<IngestConfig>(yaml).is_err());
    }

    #[test]
    fn table_names_must_be_identifiers() {
        assert!(validate_table_name("trip_records").is_ok());
        assert!(validate_table_name("_t1").is_ok());
        assert!(validate_table_name("1trips").is_err());
        assert!(validate_table_name("trips; DROP TABLE x").is_err());
        assert!(validate_table_name("").is_err());
    }

    #[test]
    fn bad_zone_and_encoding_are_config_errors() {
        let mut config = IngestConfig::default();
        config.timestamps.source_zone = "mars".into();
        assert!(matches!(config.validate(), Err(IngestError::Config(_))));

        let mut config = IngestConfig::default();
        config.input.encoding = "klingon".into();
        assert!(matches!(config.encoding(), Err(IngestError::Config(_))));

        let mut config = IngestConfig::default();
        config.input.encoding = "windows-1252".into();
        assert_eq!(config.encoding().unwrap().name(), "windows-1252");
    }

    #[test]
    fn utc_alias_is_zero_offset() {
        assert_eq!(
            "utc".parse::<SourceZone>().unwrap(),
            SourceZone::Fixed(FixedOffset::east_opt(0).unwrap())
        );
    }
}
