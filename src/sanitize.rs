//! Row sanitation: whitespace trimming and removal of incomplete rows.

use log::{debug, info};

use crate::table::{Table, Value};

/// Strips leading and trailing whitespace from every text value in place.
/// Returns the number of values that changed.
pub fn trim_fields(table: &mut Table) -> usize {
    let mut changed = 0usize;
    for row in table.rows_mut() {
        for value in &mut row.values {
            if let Value::Text(text) = value {
                let trimmed = text.trim();
                if trimmed.len() != text.len() {
                    *text = trimmed.to_string();
                    changed += 1;
                }
            }
        }
    }
    debug!("Trimmed whitespace from {changed} value(s)");
    changed
}

/// Removes every row holding at least one empty value, keeping the order of
/// the rest. Returns the number of rows removed.
pub fn drop_incomplete_rows(table: &mut Table) -> usize {
    let dropped = table.retain_rows(|row| !row.values.iter().any(Value::is_empty));
    if dropped > 0 {
        info!("Dropped {dropped} row(s) with empty fields");
    }
    dropped
}

/// Both sanitation passes; returns the number of rows removed.
pub fn sanitize(table: &mut Table) -> usize {
    trim_fields(table);
    drop_incomplete_rows(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, RowId};

    fn table(rows: &[&[&str]]) -> Table {
        let mut table = Table::new(vec![Column::text("a"), Column::text("b")]);
        for (idx, row) in rows.iter().enumerate() {
            table.push_row(
                RowId(idx),
                row.iter().map(|v| Value::Text(v.to_string())).collect(),
            );
        }
        table
    }

    #[test]
    fn whitespace_only_fields_count_as_empty() {
        let mut t = table(&[&[" 1 ", "x"], &["2", "   "], &["", "y"], &["\t3", "z\n"]]);
        let dropped = sanitize(&mut t);
        assert_eq!(dropped, 2);
        let kept = t
            .rows()
            .iter()
            .map(|r| (r.id, r.values.clone()))
            .collect::<Vec<_>>();
        assert_eq!(
            kept,
            vec![
                (RowId(0), vec![Value::Text("1".into()), Value::Text("x".into())]),
                (RowId(3), vec![Value::Text("3".into()), Value::Text("z".into())]),
            ]
        );
    }

    #[test]
    fn sanitize_is_idempotent() {
        let mut t = table(&[&[" a", "b "], &["", "c"]]);
        sanitize(&mut t);
        let once = t.clone();
        assert_eq!(sanitize(&mut t), 0);
        assert_eq!(trim_fields(&mut t), 0);
        assert_eq!(t, once);
    }
}
