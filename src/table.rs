//! In-memory table threaded through the ingestion stages.
//!
//! A [`Table`] owns its columns and rows. Stages take it by value or by
//! mutable reference and never hold views into it across stage boundaries.
//! Rows carry a stable [`RowId`] assigned at load time so that removal can
//! target exact rows rather than rows that happen to compare equal.

use std::{collections::HashSet, fmt};

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Decimal,
    Timestamp,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::Decimal => "decimal",
            ColumnKind::Timestamp => "timestamp",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            Value::Timestamp(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Text(text) if text.is_empty())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => f.write_str(text),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Position of a record in the input stream, zero-based, header excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub usize);

impl RowId {
    /// 1-based line number in the source file, counting the header line.
    pub fn source_line(self) -> usize {
        self.0 + 2
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: RowId,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a row. Panics if the value count does not match the column count.
    pub fn push_row(&mut self, id: RowId, values: Vec<Value>) {
        assert_eq!(
            values.len(),
            self.columns.len(),
            "row {id:?} has {} values for {} columns",
            values.len(),
            self.columns.len()
        );
        self.rows.push(Row { id, values });
    }

    /// Keeps the columns for which `keep` returns true, dropping their values
    /// from every row. Returns the names of the removed columns.
    pub fn retain_columns<F>(&mut self, mut keep: F) -> Vec<String>
    where
        F: FnMut(&Column) -> bool,
    {
        let mask = self.columns.iter().map(&mut keep).collect::<Vec<_>>();
        if mask.iter().all(|k| *k) {
            return Vec::new();
        }
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.columns.len());
        for (column, retained) in self.columns.drain(..).zip(&mask) {
            if *retained {
                kept.push(column);
            } else {
                removed.push(column.name);
            }
        }
        self.columns = kept;
        for row in &mut self.rows {
            let mut flags = mask.iter();
            row.values.retain(|_| *flags.next().unwrap_or(&false));
        }
        removed
    }

    pub fn set_column_kind(&mut self, index: usize, kind: ColumnKind) {
        if let Some(column) = self.columns.get_mut(index) {
            column.kind = kind;
        }
    }

    /// Stable filter over rows. Returns the number of rows removed.
    pub fn retain_rows<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&Row) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(keep);
        before - self.rows.len()
    }

    /// Removes exactly the rows whose ids are listed, preserving the order of
    /// the remaining rows.
    pub fn remove_rows(&mut self, ids: &[RowId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let targets = ids.iter().copied().collect::<HashSet<_>>();
        self.retain_rows(|row| !targets.contains(&row.id))
    }
}
