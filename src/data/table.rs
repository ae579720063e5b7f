//! Observation tables at each stage of cleaning
//!
//! The timestamp is a distinguished field on every row, so the set of
//! columns excluded from numeric processing is fixed by the types:
//! `columns` only ever names numeric measurement columns.

use crate::cleaning::sentinel::normalize_cell;
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One row as read from disk
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// Unparsed timestamp cell
    pub timestamp: String,
    /// Raw cells, one per entry of `RawTable::columns`
    pub cells: Vec<String>,
}

/// Table exactly as read from CSV
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Header name of the timestamp column
    pub timestamp_column: String,
    /// Remaining column names
    pub columns: Vec<String>,
    /// Rows in file order
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    /// Count of non-blank cells per column.
    ///
    /// Markers such as "M" count as present here; only empty cells are null.
    pub fn non_null_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.columns.len()];
        for row in &self.rows {
            for (j, cell) in row.cells.iter().enumerate() {
                if !cell.trim().is_empty() {
                    counts[j] += 1;
                }
            }
        }
        counts
    }

    /// Keep columns at least as populated as `threshold_column`, then drop
    /// the identifier columns listed in `drop`.
    pub fn select_columns(&self, threshold_column: Option<&str>, drop: &[String]) -> Result<Self> {
        let counts = self.non_null_counts();
        let threshold = match threshold_column {
            Some(name) => counts[self.column_index(name)?],
            None => 0,
        };

        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&j| counts[j] >= threshold)
            .filter(|&j| !drop.contains(&self.columns[j]))
            .collect();

        debug!(
            kept = keep.len(),
            dropped = self.columns.len() - keep.len(),
            threshold,
            "selected columns"
        );

        Ok(Self {
            timestamp_column: self.timestamp_column.clone(),
            columns: keep.iter().map(|&j| self.columns[j].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| RawRow {
                    timestamp: row.timestamp.clone(),
                    cells: keep
                        .iter()
                        .map(|&j| row.cells.get(j).cloned().unwrap_or_default())
                        .collect(),
                })
                .collect(),
        })
    }

    /// Map every numeric cell through the sentinel vocabulary
    pub fn normalize(&self) -> ObservationTable {
        ObservationTable {
            timestamp_column: self.timestamp_column.clone(),
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .map(|row| Observation {
                    timestamp: row.timestamp.clone(),
                    values: row.cells.iter().map(|c| normalize_cell(c)).collect(),
                })
                .collect(),
        }
    }
}

/// Row with normalized numeric values
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Unparsed timestamp cell
    pub timestamp: String,
    /// `None` marks a missing cell
    pub values: Vec<Option<f64>>,
}

/// Normalized table; cells are finite floats or missing
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationTable {
    pub timestamp_column: String,
    pub columns: Vec<String>,
    pub rows: Vec<Observation>,
}

impl ObservationTable {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    /// Copy of column `j`
    pub fn column(&self, j: usize) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row.values[j]).collect()
    }

    /// Number of missing cells in column `j`
    pub fn missing_count(&self, j: usize) -> usize {
        self.rows.iter().filter(|row| row.values[j].is_none()).count()
    }

    /// Names of columns that still contain missing cells
    pub fn incomplete_columns(&self) -> Vec<String> {
        (0..self.n_columns())
            .filter(|&j| self.missing_count(j) > 0)
            .map(|j| self.columns[j].clone())
            .collect()
    }

    /// New table with the given columns replaced
    pub fn with_columns(&self, replacements: &[(usize, Vec<Option<f64>>)]) -> Self {
        let mut rows = self.rows.clone();
        for (j, values) in replacements {
            for (row, value) in rows.iter_mut().zip(values) {
                row.values[*j] = *value;
            }
        }
        Self {
            timestamp_column: self.timestamp_column.clone(),
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Convert to fully numeric rows; fails if any cell is missing
    pub fn into_complete(self) -> Result<CompleteTable> {
        let incomplete = self.incomplete_columns();
        if !incomplete.is_empty() {
            return Err(Error::IncompleteColumns {
                columns: incomplete,
            });
        }

        Ok(CompleteTable {
            timestamp_column: self.timestamp_column,
            columns: self.columns,
            rows: self
                .rows
                .into_iter()
                .map(|row| CompleteRow {
                    timestamp: row.timestamp,
                    values: row.values.into_iter().flatten().collect(),
                })
                .collect(),
        })
    }
}

/// Row with every numeric value present
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteRow {
    pub timestamp: String,
    pub values: Vec<f64>,
}

/// Imputed table whose timestamps are not yet parsed
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteTable {
    pub timestamp_column: String,
    pub columns: Vec<String>,
    pub rows: Vec<CompleteRow>,
}

impl CompleteTable {
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row.values[j]).collect()
    }

    /// New table with column `j` replaced
    pub fn with_column(&self, j: usize, values: &[f64]) -> Self {
        let mut rows = self.rows.clone();
        for (row, &value) in rows.iter_mut().zip(values) {
            row.values[j] = value;
        }
        Self {
            timestamp_column: self.timestamp_column.clone(),
            columns: self.columns.clone(),
            rows,
        }
    }
}

/// Cleaned row keyed by its parsed timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRow {
    pub timestamp: NaiveDateTime,
    pub values: Vec<f64>,
}

/// Fully cleaned table in chronological order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanTable {
    pub timestamp_column: String,
    pub columns: Vec<String>,
    pub rows: Vec<CleanRow>,
}

impl CleanTable {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row.values[j]).collect()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.rows.iter().map(|row| row.timestamp).collect()
    }
}
