//! Field normalization applied to deduplicated rows.
//!
//! Two independent rewrites:
//!
//! - the `store_and_fwd_flag` column maps `Y`/`N` to `Yes`/`No`;
//! - any value, in any column, shaped exactly like `MM/DD/YYYY hh:mm:ss AM`
//!   (or `PM`) is read as a naive time in the source zone and replaced by its
//!   UTC instant.
//!
//! The timestamp scan does not consult the schema. A text column whose value
//! happens to have that shape is converted like the datetime columns are;
//! existing consumers rely on this, so it is kept.

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};
use log::debug;
use regex::Regex;

use crate::{
    config::SourceZone,
    error::{IngestError, Result},
    schema::FLAG_COLUMN,
    table::{Table, Value},
};

const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";
/// How far back to look for a valid local time when one falls in a DST gap.
const GAP_SEARCH_HOURS: i64 = 24;

fn timestamp_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| {
        Regex::new(r"^\d{2}/\d{2}/\d{4} \d{2}:[0-5]\d:[0-5]\d (AM|PM)$")
            .unwrap_or_else(|err| panic!("timestamp pattern must compile: {err}"))
    })
}

pub fn normalize_flag(value: &str) -> &str {
    match value {
        "Y" => "Yes",
        "N" => "No",
        other => other,
    }
}

/// Parses a value of the exact `MM/DD/YYYY hh:mm:ss AM|PM` shape. Values of
/// any other shape, or that name no valid calendar time, yield `None`.
pub fn parse_local_timestamp(value: &str) -> Option<NaiveDateTime> {
    if !timestamp_shape().is_match(value) {
        return None;
    }
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

/// Converts a naive time in `zone` to UTC. Repeated times resolve to the
/// earlier instant. Times skipped by a DST transition take the offset in
/// effect just before the transition, so 02:30 on a spring-forward night in
/// UTC-5/UTC-4 becomes 07:30 UTC.
pub fn to_utc(naive: &NaiveDateTime, zone: SourceZone) -> Option<DateTime<Utc>> {
    match zone {
        SourceZone::Local => resolve(&Local, naive),
        SourceZone::Fixed(offset) => resolve::<FixedOffset>(&offset, naive),
    }
}

fn resolve<Tz: TimeZone>(zone: &Tz, naive: &NaiveDateTime) -> Option<DateTime<Utc>> {
    if let Some(dt) = zone.from_local_datetime(naive).earliest() {
        return Some(dt.with_timezone(&Utc));
    }
    // Inside a gap: borrow the offset of the closest earlier local time.
    let offset = (1..=GAP_SEARCH_HOURS).find_map(|hours| {
        let before = *naive - TimeDelta::hours(hours);
        zone.from_local_datetime(&before)
            .earliest()
            .map(|dt| dt.offset().fix())
    })?;
    let utc = *naive - TimeDelta::seconds(i64::from(offset.local_minus_utc()));
    Some(Utc.from_utc_datetime(&utc))
}

/// Rewrites the flag column of every row. Returns the number of changed values.
pub fn normalize_flags(table: &mut Table) -> Result<usize> {
    let idx = table
        .column_index(FLAG_COLUMN)
        .ok_or_else(|| IngestError::SchemaViolation {
            column: FLAG_COLUMN.to_string(),
        })?;
    let mut changed = 0usize;
    for row in table.rows_mut() {
        if let Some(Value::Text(text)) = row.values.get_mut(idx) {
            let mapped = normalize_flag(text);
            if mapped != text.as_str() {
                *text = mapped.to_string();
                changed += 1;
            }
        }
    }
    Ok(changed)
}

/// Converts every timestamp-shaped value in every column to UTC. Returns the
/// number of converted values.
pub fn normalize_timestamps(table: &mut Table, zone: SourceZone) -> usize {
    let mut converted = 0usize;
    for row in table.rows_mut() {
        for value in &mut row.values {
            let Some(naive) = value.as_text().and_then(parse_local_timestamp) else {
                continue;
            };
            match to_utc(&naive, zone) {
                Some(utc) => {
                    *value = Value::Timestamp(utc);
                    converted += 1;
                }
                None => debug!(
                    "Row {} keeps '{value}': no such local time in {zone:?}",
                    row.id.source_line()
                ),
            }
        }
    }
    converted
}

pub fn normalize(table: &mut Table, zone: SourceZone) -> Result<(usize, usize)> {
    let flags = normalize_flags(table)?;
    let timestamps = normalize_timestamps(table, zone);
    debug!("Normalized {flags} flag(s) and {timestamps} timestamp(s)");
    Ok((flags, timestamps))
}
