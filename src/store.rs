//! Destination store: SQLite table replaced wholesale by each ingestion.
//!
//! [`BulkLoader::load`] opens its own connection, truncates the destination
//! and inserts every cleaned row inside a single transaction. SQLite has no
//! `TRUNCATE`; an unqualified `DELETE` is used instead, which is transactional,
//! so a failure anywhere after it rolls the table back to its previous
//! contents. The connection is dropped (closed) on every return path.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use rusqlite::{Connection, Transaction, params_from_iter, types::Value as SqlValue};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

use crate::{
    config::validate_table_name,
    error::{IngestError, Result},
    ingest::CancelToken,
    schema::ALLOWED_COLUMNS,
    table::{ColumnKind, Row, Table, Value},
};

/// Total digits allowed by the destination's `DECIMAL(10, 2)` columns.
const DECIMAL_PRECISION: u32 = 10;
const DECIMAL_SCALE: u32 = 2;
const STORED_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp shapes accepted as-is for values the normalizer left as text.
const ACCEPTED_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
];

/// Indexed destination columns, created alongside the table.
const INDEXED_COLUMNS: &[&str] = &[
    "PULocationID",
    "tip_amount",
    "trip_distance",
    "tpep_pickup_datetime",
    "tpep_dropoff_datetime",
];

pub fn open_connection(database: &Path) -> Result<Connection> {
    let conn = Connection::open(database)?;
    debug!("Opened destination database {database:?}");
    Ok(conn)
}

/// Creates the destination table and its indexes when absent.
pub fn ensure_destination(conn: &Connection, table: &str) -> Result<bool> {
    validate_table_name(table)?;
    if table_exists(conn, table)? {
        debug!("Destination table '{table}' already exists");
        return Ok(false);
    }
    let columns = ALLOWED_COLUMNS
        .iter()
        .map(|column| format!("    \"{}\" {}", column.name, column.sql_type))
        .collect::<Vec<_>>()
        .join(",\n");
    let mut ddl = format!("CREATE TABLE \"{table}\" (\n{columns}\n);\n");
    for column in INDEXED_COLUMNS {
        ddl.push_str(&format!(
            "CREATE INDEX \"IX_{table}_{column}\" ON \"{table}\" (\"{column}\");\n"
        ));
    }
    conn.execute_batch(&ddl)?;
    info!("Created destination table '{table}'");
    Ok(true)
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn row_count(conn: &Connection, table: &str) -> Result<i64> {
    validate_table_name(table)?;
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

/// Truncate-and-reload writer bound to one destination table.
#[derive(Debug, Clone)]
pub struct BulkLoader {
    database: PathBuf,
    table: String,
}

impl BulkLoader {
    pub fn new(database: impl Into<PathBuf>, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self {
            database: database.into(),
            table,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Replaces the destination contents with `data`. On any error the
    /// transaction is rolled back and the original error returned.
    pub fn load(&self, data: &Table, cancel: &CancelToken) -> Result<usize> {
        let mut conn = open_connection(&self.database)?;
        let tx = conn.transaction()?;
        let outcome = cancel
            .check()
            .and_then(|()| self.clear(&tx))
            .and_then(|_| self.insert_rows(&tx, data, cancel));
        self.finish(tx, outcome)
    }

    fn clear(&self, tx: &Transaction<'_>) -> Result<usize> {
        let cleared = tx.execute(&format!("DELETE FROM \"{}\"", self.table), [])?;
        debug!("Cleared {cleared} existing row(s) from '{}'", self.table);
        Ok(cleared)
    }

    fn insert_rows(&self, tx: &Transaction<'_>, data: &Table, cancel: &CancelToken) -> Result<usize> {
        let plan = InsertPlan::new(data);
        let mut stmt = tx.prepare(&plan.sql(&self.table))?;
        let mut inserted = 0usize;
        for row in data.rows() {
            cancel.check()?;
            let values = plan.bind(data, row)?;
            stmt.execute(params_from_iter(values.iter()))?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Commits a successful load, or rolls back and returns the load error.
    fn finish(&self, tx: Transaction<'_>, outcome: Result<usize>) -> Result<usize> {
        match outcome {
            Ok(inserted) => {
                tx.commit()?;
                info!(
                    "Loaded {inserted} row(s) into '{}' at {:?}",
                    self.table, self.database
                );
                Ok(inserted)
            }
            Err(err) => {
                match tx.rollback() {
                    Ok(()) => warn!("Rolled back load into '{}': {err}", self.table),
                    Err(rollback_err) => warn!(
                        "Rollback of '{}' failed after {err}: {rollback_err}",
                        self.table
                    ),
                }
                Err(err)
            }
        }
    }
}

/// Destination columns in whitelist order, each mapped to its position in the
/// source table when present.
struct InsertPlan {
    columns: Vec<(&'static str, Option<usize>)>,
}

impl InsertPlan {
    fn new(data: &Table) -> Self {
        let columns = ALLOWED_COLUMNS
            .iter()
            .map(|column| (column.name, data.column_index(column.name)))
            .collect();
        Self { columns }
    }

    fn sql(&self, table: &str) -> String {
        let names = self
            .columns
            .iter()
            .map(|(name, _)| format!("\"{name}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=self.columns.len())
            .map(|idx| format!("?{idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("INSERT INTO \"{table}\" ({names}) VALUES ({placeholders})")
    }

    fn bind(&self, data: &Table, row: &Row) -> Result<Vec<SqlValue>> {
        self.columns
            .iter()
            .map(|(name, source)| match source {
                Some(idx) => {
                    let kind = data.columns()[*idx].kind;
                    to_sql_value(&row.values[*idx], kind).map_err(|reason| {
                        IngestError::InvalidValue {
                            row: row.id.source_line(),
                            column: (*name).to_string(),
                            value: row.values[*idx].to_string(),
                            reason,
                        }
                    })
                }
                None => Ok(SqlValue::Null),
            })
            .collect()
    }
}

/// Converts a cleaned value to the storage form of its declared column kind.
pub fn to_sql_value(value: &Value, kind: ColumnKind) -> std::result::Result<SqlValue, String> {
    match (value, kind) {
        (Value::Timestamp(ts), ColumnKind::Timestamp | ColumnKind::Text) => Ok(SqlValue::Text(
            ts.format(STORED_TIMESTAMP_FORMAT).to_string(),
        )),
        (Value::Timestamp(_), other) => Err(format!("timestamp in {other} column")),
        (Value::Text(text), ColumnKind::Text) => Ok(SqlValue::Text(text.clone())),
        (Value::Text(text), ColumnKind::Integer) => text
            .parse::<i64>()
            .map(SqlValue::Integer)
            .map_err(|err| format!("not an integer: {err}")),
        (Value::Text(text), ColumnKind::Decimal) => parse_decimal(text).and_then(|d| {
            d.to_f64()
                .map(SqlValue::Real)
                .ok_or_else(|| "decimal out of range".to_string())
        }),
        (Value::Text(text), ColumnKind::Timestamp) => parse_timestamp(text)
            .map(|ts| SqlValue::Text(ts.format(STORED_TIMESTAMP_FORMAT).to_string())),
    }
}

/// Parses a value into `DECIMAL(10, 2)`: rounded half away from zero to two
/// places, at most eight integral digits.
pub fn parse_decimal(text: &str) -> std::result::Result<Decimal, String> {
    let parsed = Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|err| format!("not a decimal: {err}"))?;
    let rounded = parsed.round_dp_with_strategy(DECIMAL_SCALE, RoundingStrategy::MidpointAwayFromZero);
    let limit = Decimal::from(10i64.pow(DECIMAL_PRECISION - DECIMAL_SCALE));
    if rounded.abs() >= limit {
        return Err(format!(
            "exceeds DECIMAL({DECIMAL_PRECISION}, {DECIMAL_SCALE})"
        ));
    }
    Ok(rounded)
}

pub fn parse_timestamp(text: &str) -> std::result::Result<NaiveDateTime, String> {
    ACCEPTED_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .ok_or_else(|| "not a recognized timestamp".to_string())
}
