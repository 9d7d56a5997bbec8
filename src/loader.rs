//! Tabular loader: delimited text into an all-text [`Table`].

use std::{collections::HashSet, io::Read};

use encoding_rs::Encoding;
use log::debug;

use crate::{
    error::{IngestError, Result},
    io_utils,
    table::{Column, RowId, Table, Value},
};

/// Reads a header line plus records into a table whose values are the raw
/// field text. Any record with a field count different from the header's is
/// a parse error.
pub fn load_table<R>(input: R, delimiter: u8, encoding: &'static Encoding) -> Result<Table>
where
    R: Read,
{
    let mut reader = io_utils::open_csv_reader(input, delimiter);
    let headers = io_utils::reader_headers(&mut reader, encoding)?;

    let mut seen = HashSet::with_capacity(headers.len());
    for name in &headers {
        if !seen.insert(name.as_str()) {
            return Err(IngestError::Parse {
                line: 1,
                message: format!("duplicate column name '{name}' in header"),
            });
        }
    }

    let mut table = Table::new(headers.iter().map(Column::text).collect());
    let mut record = csv::ByteRecord::new();
    let mut idx = 0usize;
    loop {
        let fallback_line = RowId(idx).source_line() as u64;
        let more = reader
            .read_byte_record(&mut record)
            .map_err(|err| io_utils::csv_parse_error(err, fallback_line))?;
        if !more {
            break;
        }
        let line = record
            .position()
            .map(|pos| pos.line())
            .unwrap_or(fallback_line);
        let values = io_utils::decode_record(&record, encoding, line)?
            .into_iter()
            .map(Value::Text)
            .collect();
        table.push_row(RowId(idx), values);
        idx += 1;
    }
    debug!(
        "Loaded {} row(s) across {} column(s)",
        table.len(),
        table.columns().len()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;

    #[test]
    fn header_and_values_are_taken_verbatim() {
        let data = "b, a ,c\n 1 ,2,\"x,y\"\n";
        let table = load_table(data.as_bytes(), b',', UTF_8).unwrap();
        assert_eq!(table.column_names(), vec!["b", " a ", "c"]);
        assert_eq!(
            table.rows()[0].values,
            vec![
                Value::Text(" 1 ".into()),
                Value::Text("2".into()),
                Value::Text("x,y".into())
            ]
        );
    }

    #[test]
    fn short_record_is_a_parse_error() {
        let data = "a,b\n1,2\n3\n";
        let err = load_table(data.as_bytes(), b',', UTF_8).unwrap_err();
        assert!(matches!(err, IngestError::Parse { line: 3, .. }), "{err:?}");
    }

    #[test]
    fn duplicate_header_is_a_parse_error() {
        let err = load_table("a,a\n1,2\n".as_bytes(), b',', UTF_8).unwrap_err();
        assert!(matches!(err, IngestError::Parse { line: 1, .. }));
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let table = load_table("".as_bytes(), b',', UTF_8).unwrap();
        assert!(table.columns().is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn row_ids_follow_input_order() {
        let table = load_table("a\n1\n2\n3\n".as_bytes(), b',', UTF_8).unwrap();
        let ids = table.rows().iter().map(|r| r.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![RowId(0), RowId(1), RowId(2)]);
    }
}
