//! Accepted trip-record schema and the column filter built on it.
//!
//! [`ALLOWED_COLUMNS`] is both the whitelist applied to uploads and the column
//! order of the destination table. Filtering keeps the upload's own column
//! order; only the destination write reorders to the whitelist order.

use log::{debug, info};

use crate::{
    error::{IngestError, Result},
    table::{ColumnKind, Table},
};

pub const PICKUP_COLUMN: &str = "tpep_pickup_datetime";
pub const DROPOFF_COLUMN: &str = "tpep_dropoff_datetime";
pub const PASSENGER_COUNT_COLUMN: &str = "passenger_count";
pub const FLAG_COLUMN: &str = "store_and_fwd_flag";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedColumn {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Column type used when creating the destination table.
    pub sql_type: &'static str,
}

pub static ALLOWED_COLUMNS: [AllowedColumn; 9] = [
    AllowedColumn {
        name: PICKUP_COLUMN,
        kind: ColumnKind::Timestamp,
        sql_type: "DATETIME",
    },
    AllowedColumn {
        name: DROPOFF_COLUMN,
        kind: ColumnKind::Timestamp,
        sql_type: "DATETIME",
    },
    AllowedColumn {
        name: PASSENGER_COUNT_COLUMN,
        kind: ColumnKind::Integer,
        sql_type: "INT",
    },
    AllowedColumn {
        name: "trip_distance",
        kind: ColumnKind::Decimal,
        sql_type: "DECIMAL(10, 2)",
    },
    AllowedColumn {
        name: FLAG_COLUMN,
        kind: ColumnKind::Text,
        sql_type: "VARCHAR(3)",
    },
    AllowedColumn {
        name: "PULocationID",
        kind: ColumnKind::Integer,
        sql_type: "INT",
    },
    AllowedColumn {
        name: "DOLocationID",
        kind: ColumnKind::Integer,
        sql_type: "INT",
    },
    AllowedColumn {
        name: "fare_amount",
        kind: ColumnKind::Decimal,
        sql_type: "DECIMAL(10, 2)",
    },
    AllowedColumn {
        name: "tip_amount",
        kind: ColumnKind::Decimal,
        sql_type: "DECIMAL(10, 2)",
    },
];

/// Columns later stages read by name: the duplicate key and the flag.
pub const REQUIRED_COLUMNS: [&str; 4] = [
    PICKUP_COLUMN,
    DROPOFF_COLUMN,
    PASSENGER_COUNT_COLUMN,
    FLAG_COLUMN,
];

pub fn allowed_column(name: &str) -> Option<&'static AllowedColumn> {
    ALLOWED_COLUMNS.iter().find(|column| column.name == name)
}

/// Drops every column outside [`ALLOWED_COLUMNS`] and tags the survivors
/// with their declared kinds. Returns the names of the dropped columns.
pub fn filter_columns(table: &mut Table) -> Vec<String> {
    let removed = table.retain_columns(|column| allowed_column(&column.name).is_some());
    let kinds = table
        .columns()
        .iter()
        .map(|column| allowed_column(&column.name).map(|allowed| allowed.kind))
        .collect::<Vec<_>>();
    for (idx, kind) in kinds.into_iter().enumerate() {
        if let Some(kind) = kind {
            table.set_column_kind(idx, kind);
        }
    }
    if removed.is_empty() {
        debug!("All {} column(s) are accepted", table.columns().len());
    } else {
        info!(
            "Dropped {} unrecognized column(s): {}",
            removed.len(),
            removed.join(", ")
        );
    }
    removed
}

/// Fails on the first column in [`REQUIRED_COLUMNS`] the table lacks.
pub fn require_columns(table: &Table) -> Result<()> {
    for name in REQUIRED_COLUMNS {
        if table.column_index(name).is_none() {
            return Err(IngestError::SchemaViolation {
                column: name.to_string(),
            });
        }
    }
    Ok(())
}
