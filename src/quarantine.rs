//! Quarantine artifact for duplicate rows.
//!
//! The artifact is plain comma-joined text: a header line, then one line per
//! duplicate row. Values are written without quoting or escaping, so a value
//! containing a comma or a line break produces a line with extra fields.
//! Downstream readers of `duplicates.csv` depend on this exact layout.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use itertools::Itertools;
use log::{info, warn};

use crate::{
    dedupe::DuplicateSet,
    error::{IngestError, Result},
    table::Table,
};

/// Renders the header and duplicate rows to `out`.
pub fn write_duplicates_to<W>(table: &Table, duplicates: &DuplicateSet, out: &mut W) -> io::Result<usize>
where
    W: Write,
{
    writeln!(out, "{}", table.column_names().iter().join(","))?;
    let rows = duplicates.rows(table);
    for row in &rows {
        writeln!(out, "{}", row.values.iter().join(","))?;
    }
    out.flush()?;
    Ok(rows.len())
}

/// Overwrites `path` with the duplicate rows. Returns the number of data lines.
pub fn write_duplicates(table: &Table, duplicates: &DuplicateSet, path: &Path) -> io::Result<usize> {
    let mut writer = BufWriter::new(File::create(path)?);
    let written = write_duplicates_to(table, duplicates, &mut writer)?;
    info!("Wrote {written} duplicate row(s) to {path:?}");
    Ok(written)
}

/// Outcome of the quarantine step when write failures are tolerated.
#[derive(Debug, Default)]
pub struct QuarantineReport {
    pub written: usize,
    pub removed: usize,
    pub error: Option<String>,
}

/// Writes the artifact, then removes exactly the quarantined rows from the
/// table. A write failure is returned only when `required` is set; otherwise
/// it is logged and reported, and the rows are removed all the same.
pub fn quarantine(
    table: &mut Table,
    duplicates: &DuplicateSet,
    path: &Path,
    required: bool,
) -> Result<QuarantineReport> {
    let mut report = QuarantineReport::default();
    match write_duplicates(table, duplicates, path) {
        Ok(written) => report.written = written,
        Err(source) if required => {
            return Err(IngestError::Quarantine {
                path: path.to_path_buf(),
                source,
            });
        }
        Err(err) => {
            warn!("Could not write duplicates to {path:?}: {err}");
            report.error = Some(err.to_string());
        }
    }
    report.removed = table.remove_rows(&duplicates.ids);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, RowId, Value};

    fn table() -> Table {
        let mut table = Table::new(vec![Column::text("k"), Column::text("note")]);
        table.push_row(RowId(0), vec![Value::Text("1".into()), Value::Text("first".into())]);
        table.push_row(RowId(1), vec![Value::Text("1".into()), Value::Text("a,b".into())]);
        table.push_row(RowId(2), vec![Value::Text("2".into()), Value::Text("x".into())]);
        table
    }

    #[test]
    fn values_are_joined_without_quoting() {
        let table = table();
        let duplicates = DuplicateSet {
            ids: vec![RowId(1)],
        };
        let mut out = Vec::new();
        let written = write_duplicates_to(&table, &duplicates, &mut out).unwrap();
        assert_eq!(written, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "k,note\n1,a,b\n");
    }

    #[test]
    fn empty_set_still_writes_header() {
        let table = table();
        let mut out = Vec::new();
        write_duplicates_to(&table, &DuplicateSet::default(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "k,note\n");
    }

    #[test]
    fn tolerated_failure_still_removes_rows() {
        let mut table = table();
        let duplicates = DuplicateSet {
            ids: vec![RowId(1)],
        };
        let missing_dir = Path::new("/nonexistent-quarantine-dir/duplicates.csv");
        let report = quarantine(&mut table, &duplicates, missing_dir, false).unwrap();
        assert!(report.error.is_some());
        assert_eq!(report.removed, 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn required_failure_is_an_error() {
        let mut table = table();
        let missing_dir = Path::new("/nonexistent-quarantine-dir/duplicates.csv");
        let err = quarantine(&mut table, &DuplicateSet::default(), missing_dir, true).unwrap_err();
        assert!(matches!(err, IngestError::Quarantine { .. }));
        assert_eq!(table.len(), 3);
    }
}
