//! Ingestion orchestrator.
//!
//! [`Ingestor::ingest`] runs the whole pipeline for one upload:
//! load, filter columns, sanitize, detect and quarantine duplicates,
//! normalize, then truncate-and-reload the destination. The first failing
//! stage ends the run and its error is returned unchanged. Only the
//! destination write is transactional; a `duplicates.csv` written before a
//! later failure stays on disk.

use std::{
    io::Read,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    config::IngestConfig,
    dedupe,
    error::{IngestError, Result},
    loader, normalize, quarantine, sanitize, schema,
    store::BulkLoader,
};

/// Shared cancellation flag, checked before the destination is truncated and
/// between inserted rows.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(IngestError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IngestSummary {
    pub rows_read: usize,
    pub columns_dropped: Vec<String>,
    pub incomplete_rows: usize,
    pub duplicate_rows: usize,
    pub duplicates_written: usize,
    pub flags_normalized: usize,
    pub timestamps_normalized: usize,
    pub rows_loaded: usize,
    pub quarantine_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarantine_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Ingestor {
    config: IngestConfig,
    loader: BulkLoader,
}

impl Ingestor {
    pub fn new(config: IngestConfig) -> Result<Self> {
        config.validate()?;
        let loader = BulkLoader::new(
            config.destination.database.clone(),
            config.destination.table.clone(),
        )?;
        Ok(Self { config, loader })
    }

    pub fn ingest<R>(&self, input: R, cancel: &CancelToken) -> Result<IngestSummary>
    where
        R: Read,
    {
        let result = self.run(input, cancel);
        match &result {
            Ok(summary) => info!(
                "Ingestion complete: {} loaded, {} duplicate(s), {} incomplete",
                summary.rows_loaded, summary.duplicate_rows, summary.incomplete_rows
            ),
            Err(err) if err.is_store_side() => {
                warn!("Ingestion failed, destination left unchanged: {err}")
            }
            Err(err) => warn!("Ingestion failed before touching the destination: {err}"),
        }
        result
    }

    fn run<R>(&self, input: R, cancel: &CancelToken) -> Result<IngestSummary>
    where
        R: Read,
    {
        let mut summary = IngestSummary {
            quarantine_path: self.config.quarantine.path.clone(),
            ..IngestSummary::default()
        };

        let mut table =
            loader::load_table(input, self.config.delimiter()?, self.config.encoding()?)?;
        summary.rows_read = table.len();
        cancel.check()?;

        summary.columns_dropped = schema::filter_columns(&mut table);
        schema::require_columns(&table)?;

        summary.incomplete_rows = sanitize::sanitize(&mut table);

        let duplicates = dedupe::find_duplicates(&table)?;
        summary.duplicate_rows = duplicates.len();
        let report = quarantine::quarantine(
            &mut table,
            &duplicates,
            &self.config.quarantine.path,
            self.config.quarantine.required,
        )?;
        summary.duplicates_written = report.written;
        summary.quarantine_error = report.error;

        let (flags, timestamps) = normalize::normalize(&mut table, self.config.source_zone()?)?;
        summary.flags_normalized = flags;
        summary.timestamps_normalized = timestamps;
        debug!("{} row(s) ready for '{}'", table.len(), self.loader.table());

        summary.rows_loaded = self.loader.load(&table, cancel)?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(observer.check().is_ok());
        token.cancel();
        assert!(observer.is_cancelled());
        assert!(matches!(observer.check(), Err(IngestError::Cancelled)));
    }

    #[test]
    fn new_rejects_invalid_config() {
        let mut config = IngestConfig::default();
        config.destination.table = "bad name".into();
        assert!(matches!(Ingestor::new(config), Err(IngestError::Config(_))));
    }

    #[test]
    fn parse_errors_surface_before_destination_is_opened() {
        let dir = std::env::temp_dir().join("trip-loader-unit-missing-dir");
        let mut config = IngestConfig::default();
        config.destination.database = dir.join("nested").join("never.db");
        config.quarantine.path = dir.join("nested").join("duplicates.csv");
        let ingestor = Ingestor::new(config).unwrap();
        let err = ingestor
            .ingest("a,b\n1\n".as_bytes(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));
    }
}
