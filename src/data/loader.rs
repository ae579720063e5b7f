//! CSV input and output for observation tables

use super::table::{CleanTable, RawRow, RawTable};
use super::time_index::{build_time_index, format_timestamp};
use crate::error::{Error, Result};
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// Read a raw observation table from a CSV file
pub fn load_raw_csv(path: &Path, timestamp_column: &str) -> Result<RawTable> {
    let file = std::fs::File::open(path)?;
    let table = read_raw_csv(file, timestamp_column)?;
    info!(
        path = %path.display(),
        rows = table.n_rows(),
        columns = table.columns.len(),
        "loaded observations"
    );
    Ok(table)
}

/// Read a raw observation table from any reader.
///
/// Short records are padded with blank cells, which normalize to missing.
pub fn read_raw_csv<R: Read>(reader: R, timestamp_column: &str) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
    let ts_idx = headers
        .iter()
        .position(|h| h == timestamp_column)
        .ok_or_else(|| Error::MissingColumn(timestamp_column.to_string()))?;

    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != ts_idx)
        .map(|(_, h)| h.clone())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let timestamp = record.get(ts_idx).unwrap_or("").to_string();
        let cells = (0..headers.len())
            .filter(|&j| j != ts_idx)
            .map(|j| record.get(j).unwrap_or("").to_string())
            .collect();
        rows.push(RawRow { timestamp, cells });
    }

    Ok(RawTable {
        timestamp_column: timestamp_column.to_string(),
        columns,
        rows,
    })
}

/// Read a table written by [`save_clean_csv`].
///
/// Every cell must already be numeric; a blank or marker cell surfaces as
/// `Error::IncompleteColumns`. Rows are re-sorted by timestamp.
pub fn load_clean_csv(path: &Path, timestamp_column: &str) -> Result<CleanTable> {
    let raw = load_raw_csv(path, timestamp_column)?;
    read_clean_table(&raw)
}

pub(crate) fn read_clean_table(raw: &RawTable) -> Result<CleanTable> {
    build_time_index(raw.normalize().into_complete()?)
}

/// Write a cleaned table, timestamp first
pub fn save_clean_csv(table: &CleanTable, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_clean_csv(table, file)?;
    info!(path = %path.display(), rows = table.n_rows(), "saved cleaned table");
    Ok(())
}

pub fn write_clean_csv<W: Write>(table: &CleanTable, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    let mut header = vec![table.timestamp_column.clone()];
    header.extend(table.columns.iter().cloned());
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![format_timestamp(&row.timestamp)];
        record.extend(row.values.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
