//! Chronological index over observation rows

use super::table::{CleanRow, CleanTable, CompleteTable};
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO 8601 date-time.
///
/// Offsets are converted to UTC; a bare date means midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.naive_utc());
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Canonical text form used when writing cleaned tables.
///
/// Fractional seconds are written only when present.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

/// Parse each row's timestamp and stable-sort rows ascending.
///
/// Any unparsable timestamp fails the whole table.
pub fn build_time_index(table: CompleteTable) -> Result<CleanTable> {
    let mut rows = table
        .rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| Error::Timestamp {
                row: i,
                value: row.timestamp.clone(),
            })?;
            Ok(CleanRow {
                timestamp,
                values: row.values,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // `sort_by_key` is stable: equal timestamps keep file order
    rows.sort_by_key(|row| row.timestamp);

    Ok(CleanTable {
        timestamp_column: table.timestamp_column,
        columns: table.columns,
        rows,
    })
}

/// Indices that put `timestamps` in stable ascending order
pub fn chronological_order(timestamps: &[NaiveDateTime]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..timestamps.len()).collect();
    order.sort_by_key(|&i| timestamps[i]);
    order
}
