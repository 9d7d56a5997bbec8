//! Error taxonomy for the ingestion pipeline.
//!
//! Every stage returns [`IngestError`]; the orchestrator never retries and
//! never recovers partially, so the first error raised is the one reported to
//! the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Input stream is not well-formed delimited text
    #[error("Malformed input at line {line}: {message}")]
    Parse { line: u64, message: String },

    /// A column required by a later stage is absent after filtering
    #[error("Required column '{column}' is missing from the input")]
    SchemaViolation { column: String },

    /// Quarantine artifact could not be written and the configuration requires it
    #[error("Failed to write duplicates to {path:?}: {source}")]
    Quarantine {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A cleaned value cannot be converted to its destination column type
    #[error("Row {row} column '{column}': cannot store '{value}' ({reason})")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
        reason: String,
    },

    /// Destination store rejected the truncate, a write, or the commit
    #[error("Destination store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Ingestion was cancelled before the destination transaction committed
    #[error("Ingestion cancelled before commit")]
    Cancelled,

    /// Configuration value is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading the input stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// True when the error was raised after the destination transaction began.
    pub fn is_store_side(&self) -> bool {
        matches!(
            self,
            IngestError::Store(_) | IngestError::InvalidValue { .. } | IngestError::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_reports_line() {
        let err = IngestError::Parse {
            line: 4,
            message: "found record with 2 fields, but the previous record has 3 fields".into(),
        };
        assert!(err.to_string().starts_with("Malformed input at line 4"));
        assert!(!err.is_store_side());
    }

    #[test]
    fn store_errors_keep_underlying_message() {
        let err = IngestError::from(rusqlite::Error::InvalidQuery);
        assert!(err.is_store_side());
        assert!(
            err.to_string()
                .contains(&rusqlite::Error::InvalidQuery.to_string())
        );
    }
}
