//! Two-pass neighborhood-mean imputation
//!
//! Every window mean is computed from the column as it was before any
//! filling, so the result does not depend on the order in which cells or
//! columns are visited.

use crate::data::ObservationTable;
use tracing::{debug, warn};

/// Default half-width of the imputation window
pub const DEFAULT_HALF_WINDOW: usize = 10;

/// Window means read from a frozen column
struct WindowMeans<'a> {
    column: &'a [Option<f64>],
    half_window: usize,
}

impl<'a> WindowMeans<'a> {
    fn new(column: &'a [Option<f64>], half_window: usize) -> Self {
        Self {
            column,
            half_window,
        }
    }

    /// Mean of present values in `[idx - w, idx + w]`, clipped to bounds
    fn window_mean(&self, idx: usize) -> Option<f64> {
        let start = idx.saturating_sub(self.half_window);
        let end = (idx + self.half_window + 1).min(self.column.len());
        mean_present(&self.column[start..end])
    }

    fn global_mean(&self) -> Option<f64> {
        mean_present(self.column)
    }
}

/// Mean of the present values of a slice; each window is summed on its own
fn mean_present(values: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Result of imputing one column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFill {
    pub values: Vec<Option<f64>>,
    /// Cells filled from a local window in the first pass
    pub window_filled: usize,
    /// Cells filled in the second pass
    pub fallback_filled: usize,
}

impl ColumnFill {
    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }
}

/// Summary of a table imputation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImputationReport {
    pub window_filled: usize,
    pub fallback_filled: usize,
    /// Columns with no present value at all; their cells stay missing
    pub unfilled_columns: Vec<String>,
}

impl ImputationReport {
    pub fn is_complete(&self) -> bool {
        self.unfilled_columns.is_empty()
    }
}

/// Fills missing cells with the mean of a symmetric row window
#[derive(Debug, Clone, Copy)]
pub struct NeighborhoodImputer {
    half_window: usize,
}

impl Default for NeighborhoodImputer {
    fn default() -> Self {
        Self::new(DEFAULT_HALF_WINDOW)
    }
}

impl NeighborhoodImputer {
    pub fn new(half_window: usize) -> Self {
        Self { half_window }
    }

    pub fn half_window(&self) -> usize {
        self.half_window
    }

    /// Impute a single column.
    ///
    /// Pass 1 writes window means where the window holds any present value.
    /// Pass 2 revisits what is still missing, retries the window on the
    /// original column and falls back to the column's global mean. A column
    /// with no present values comes back unchanged.
    pub fn impute_column(&self, original: &[Option<f64>]) -> ColumnFill {
        let means = WindowMeans::new(original, self.half_window);
        let mut values = original.to_vec();
        let mut window_filled = 0;
        let mut fallback_filled = 0;

        for (i, value) in values.iter_mut().enumerate() {
            if original[i].is_none() {
                if let Some(mean) = means.window_mean(i) {
                    *value = Some(mean);
                    window_filled += 1;
                }
            }
        }

        let global = means.global_mean();
        for (i, value) in values.iter_mut().enumerate() {
            if value.is_none() {
                *value = means.window_mean(i).or(global);
                if value.is_some() {
                    fallback_filled += 1;
                }
            }
        }

        ColumnFill {
            values,
            window_filled,
            fallback_filled,
        }
    }

    /// Impute every numeric column, returning a new table
    pub fn impute(&self, table: &ObservationTable) -> (ObservationTable, ImputationReport) {
        let mut report = ImputationReport::default();
        let mut replacements = Vec::with_capacity(table.n_columns());

        for j in 0..table.n_columns() {
            let fill = self.impute_column(&table.column(j));
            report.window_filled += fill.window_filled;
            report.fallback_filled += fill.fallback_filled;

            if !fill.is_complete() {
                warn!(column = %table.columns[j], "column has no values to impute from");
                report.unfilled_columns.push(table.columns[j].clone());
            }
            replacements.push((j, fill.values));
        }

        debug!(
            window_filled = report.window_filled,
            fallback_filled = report.fallback_filled,
            half_window = self.half_window,
            "imputation finished"
        );

        (table.with_columns(&replacements), report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Observation, ObservationTable};
    use approx::assert_relative_eq;

    fn table(columns: &[&str], rows: Vec<Vec<Option<f64>>>) -> ObservationTable {
        ObservationTable {
            timestamp_column: "DATE".to_string(),
            columns: columns.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .into_iter()
                .enumerate()
                .map(|(i, values)| Observation {
                    timestamp: format!("2020-01-01T{:02}:00:00", i),
                    values,
                })
                .collect(),
        }
    }

    #[test]
    fn test_window_mean_uses_neighbors() {
        let imputer = NeighborhoodImputer::new(1);
        let fill = imputer.impute_column(&[Some(1.0), None, Some(3.0), Some(5.0)]);
        assert_eq!(fill.values, vec![Some(1.0), Some(2.0), Some(3.0), Some(5.0)]);
        assert_eq!(fill.window_filled, 1);
        assert_eq!(fill.fallback_filled, 0);
    }

    #[test]
    fn test_reads_frozen_original_column() {
        // Row 2's window [1, 3] holds no original values. If row 1's
        // first-pass fill leaked into it, row 2 would become 0.0.
        let imputer = NeighborhoodImputer::new(1);
        let fill = imputer.impute_column(&[Some(0.0), None, None, None, Some(10.0)]);

        assert_eq!(
            fill.values,
            vec![Some(0.0), Some(0.0), Some(5.0), Some(10.0), Some(10.0)]
        );
        assert_eq!(fill.window_filled, 2);
        assert_eq!(fill.fallback_filled, 1);
    }

    #[test]
    fn test_window_clipped_at_edges() {
        let imputer = NeighborhoodImputer::new(2);
        let fill = imputer.impute_column(&[None, Some(4.0), Some(8.0), Some(100.0)]);
        assert_relative_eq!(fill.values[0].unwrap(), 6.0);
    }

    #[test]
    fn test_all_missing_column_stays_missing() {
        let imputer = NeighborhoodImputer::default();
        let fill = imputer.impute_column(&[None, None, None]);
        assert_eq!(fill.values, vec![None, None, None]);
        assert!(!fill.is_complete());
    }

    #[test]
    fn test_full_table_is_unchanged() {
        let t = table(
            &["A", "B"],
            vec![
                vec![Some(1.0), Some(2.0)],
                vec![Some(3.0), Some(4.0)],
            ],
        );

        let (filled, report) = NeighborhoodImputer::default().impute(&t);
        assert_eq!(filled, t);
        assert_eq!(report, ImputationReport::default());
    }

    #[test]
    fn test_reachable_filled_unreachable_reported() {
        let t = table(
            &["A", "Empty"],
            vec![
                vec![None, None],
                vec![Some(2.0), None],
                vec![None, None],
                vec![Some(4.0), None],
                vec![None, None],
            ],
        );

        let (filled, report) = NeighborhoodImputer::new(1).impute(&t);

        assert_eq!(
            filled.column(0),
            vec![Some(2.0), Some(2.0), Some(3.0), Some(4.0), Some(4.0)]
        );
        assert_eq!(filled.column(1), vec![None; 5]);
        assert_eq!(report.unfilled_columns, vec!["Empty"]);
        assert_eq!(report.window_filled, 3);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_deterministic_and_column_order_independent() {
        let rows = vec![
            vec![Some(1.0), None],
            vec![None, Some(7.0)],
            vec![None, None],
            vec![Some(9.0), None],
            vec![None, None],
            vec![None, Some(1.0)],
        ];
        let swapped: Vec<Vec<Option<f64>>> =
            rows.iter().map(|r| vec![r[1], r[0]]).collect();

        let imputer = NeighborhoodImputer::new(1);
        let (a, _) = imputer.impute(&table(&["X", "Y"], rows.clone()));
        let (b, _) = imputer.impute(&table(&["X", "Y"], rows));
        let (c, _) = imputer.impute(&table(&["Y", "X"], swapped));

        assert_eq!(a, b);
        assert_eq!(a.column(0), c.column(1));
        assert_eq!(a.column(1), c.column(0));
    }

    #[test]
    fn test_window_mean_ignores_values_outside_window() {
        let imputer = NeighborhoodImputer::new(1);
        let fill = imputer.impute_column(&[Some(1e17), Some(1.0), None, Some(1.0)]);
        assert_eq!(fill.values[2], Some(1.0));

        let fill = imputer.impute_column(&[Some(1.0), None, Some(3.0), Some(-1e17), Some(1e17)]);
        assert_eq!(fill.values[1], Some(2.0));
    }
}
