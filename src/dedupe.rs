//! Duplicate detection on the (pickup, dropoff, passenger count) key.
//!
//! The key is built from the raw text of the three fields, before any
//! normalization, so which row counts as the first occurrence does not depend
//! on how timestamps or flags are later rewritten. Only the key is compared:
//! rows that share a key but differ in any other column are still duplicates.

use std::{collections::HashSet, fmt};

use log::info;

use crate::{
    error::{IngestError, Result},
    schema::{DROPOFF_COLUMN, PASSENGER_COUNT_COLUMN, PICKUP_COLUMN},
    table::{Row, RowId, Table},
};

/// Composite grouping key; never persisted. Fields are compared one by one,
/// so no separator character can make two different rows collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DuplicateKey {
    pub pickup: String,
    pub dropoff: String,
    pub passengers: String,
}

impl fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.pickup, self.dropoff, self.passengers)
    }
}

#[derive(Debug, Clone, Copy)]
struct KeyColumns {
    pickup: usize,
    dropoff: usize,
    passengers: usize,
}

impl KeyColumns {
    fn resolve(table: &Table) -> Result<Self> {
        let find = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| IngestError::SchemaViolation {
                    column: name.to_string(),
                })
        };
        Ok(Self {
            pickup: find(PICKUP_COLUMN)?,
            dropoff: find(DROPOFF_COLUMN)?,
            passengers: find(PASSENGER_COUNT_COLUMN)?,
        })
    }

    fn key(&self, row: &Row) -> DuplicateKey {
        let field = |idx: usize| {
            row.values
                .get(idx)
                .map(ToString::to_string)
                .unwrap_or_default()
        };
        DuplicateKey {
            pickup: field(self.pickup),
            dropoff: field(self.dropoff),
            passengers: field(self.passengers),
        }
    }
}

/// Rows classified as repeats of an earlier key, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateSet {
    pub ids: Vec<RowId>,
}

impl DuplicateSet {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Duplicate rows of `table`, in input order.
    pub fn rows<'a>(&self, table: &'a Table) -> Vec<&'a Row> {
        let wanted = self.ids.iter().copied().collect::<HashSet<_>>();
        table
            .rows()
            .iter()
            .filter(|row| wanted.contains(&row.id))
            .collect()
    }
}

pub fn duplicate_key(table: &Table, row: &Row) -> Result<DuplicateKey> {
    Ok(KeyColumns::resolve(table)?.key(row))
}

/// Classifies every row after the first occurrence of its key as a duplicate.
pub fn find_duplicates(table: &Table) -> Result<DuplicateSet> {
    let columns = KeyColumns::resolve(table)?;
    let mut seen = HashSet::with_capacity(table.len());
    let mut duplicates = DuplicateSet::default();
    for row in table.rows() {
        if !seen.insert(columns.key(row)) {
            duplicates.ids.push(row.id);
        }
    }
    if !duplicates.is_empty() {
        info!(
            "Found {} duplicate row(s) among {} row(s)",
            duplicates.len(),
            table.len()
        );
    }
    Ok(duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, Value};

    fn trips(rows: &[[&str; 4]]) -> Table {
        let mut table = Table::new(vec![
            Column::text(PICKUP_COLUMN),
            Column::text(DROPOFF_COLUMN),
            Column::text(PASSENGER_COUNT_COLUMN),
            Column::text("fare_amount"),
        ]);
        for (idx, row) in rows.iter().enumerate() {
            table.push_row(
                RowId(idx),
                row.iter().map(|v| Value::Text(v.to_string())).collect(),
            );
        }
        table
    }

    #[test]
    fn later_occurrences_are_duplicates() {
        let table = trips(&[
            ["p1", "d1", "1", "5.00"],
            ["p2", "d2", "1", "6.00"],
            ["p1", "d1", "1", "5.00"],
            ["p1", "d1", "1", "7.00"],
        ]);
        let duplicates = find_duplicates(&table).unwrap();
        assert_eq!(duplicates.ids, vec![RowId(2), RowId(3)]);
    }

    #[test]
    fn differing_non_key_fields_do_not_matter() {
        let table = trips(&[["p", "d", "2", "10.00"], ["p", "d", "2", "99.99"]]);
        let duplicates = find_duplicates(&table).unwrap();
        assert_eq!(duplicates.ids, vec![RowId(1)]);
        let rows = duplicates.rows(&table);
        assert_eq!(rows[0].values[3], Value::Text("99.99".into()));
    }

    #[test]
    fn key_fields_are_compared_individually() {
        let table = trips(&[["a", "b", "1", "x"], ["a", "b", "2", "x"], ["b", "a", "1", "x"]]);
        assert!(find_duplicates(&table).unwrap().is_empty());
    }

    #[test]
    fn key_displays_fields_with_separator() {
        let table = trips(&[["p", "d", "3", "1.00"]]);
        let key = duplicate_key(&table, &table.rows()[0]).unwrap();
        assert_eq!(key.passengers, "3");
        assert_eq!(key.to_string(), "p|d|3");
    }

    #[test]
    fn separator_inside_a_field_does_not_collide() {
        let table = trips(&[["a|b", "c", "1", "x"], ["a", "b|c", "1", "x"]]);
        assert!(find_duplicates(&table).unwrap().is_empty());
    }

    #[test]
    fn missing_key_column_is_a_schema_violation() {
        let table = Table::new(vec![Column::text(PICKUP_COLUMN)]);
        assert!(matches!(
            find_duplicates(&table),
            Err(IngestError::SchemaViolation { .. })
        ));
    }
}
