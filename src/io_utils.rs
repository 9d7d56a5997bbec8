//! I/O utilities for CSV reading and input decoding.
//!
//! Input flows through here before it reaches the loader:
//!
//! - **Reader construction**: strict (non-flexible) readers, so a record
//!   with the wrong field count surfaces as an error instead of a short row.
//! - **Encoding**: fields are read as bytes and decoded with `encoding_rs`,
//!   defaulting to UTF-8.
//! - **stdin**: the `-` path convention routes through standard input.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use encoding_rs::Encoding;

use crate::error::{IngestError, Result};

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if is_dash(path) {
        Ok(Box::new(std::io::stdin().lock()))
    } else {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

/// Decodes every field of `record`; `line` is used for error reporting only.
pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
    line: u64,
) -> Result<Vec<String>> {
    record
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            decode_bytes(field, encoding).ok_or_else(|| IngestError::Parse {
                line,
                message: format!(
                    "field {} is not valid {} text",
                    idx + 1,
                    encoding.name()
                ),
            })
        })
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader
        .byte_headers()
        .map_err(|err| csv_parse_error(err, 1))?
        .clone();
    decode_record(&headers, encoding, 1)
}

/// Maps a `csv` error to a parse error, preferring the line the reader reports.
/// Failures of the underlying reader stay I/O errors.
pub fn csv_parse_error(err: csv::Error, fallback_line: u64) -> IngestError {
    let line = err
        .position()
        .map(|pos| pos.line())
        .unwrap_or(fallback_line);
    let text = err.to_string();
    let message = match err.into_kind() {
        csv::ErrorKind::Io(source) => return IngestError::Io(source),
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("found record with {len} field(s), but the header has {expected_len}"),
        _ => text,
    };
    IngestError::Parse { line, message }
}
