//! Dataset structure for machine learning

use super::table::{CleanTable, RawTable};
use super::time_index::{chronological_order, parse_timestamp};
use crate::cleaning::sentinel::normalize_cell;
use crate::config::{SplitConfig, SplitMode};
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Feature matrix and target vector derived from a cleaned table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    /// Feature matrix (n_samples x n_features)
    pub features: Vec<Vec<f64>>,
    /// Target values
    pub labels: Vec<f64>,
    /// Feature names
    pub feature_names: Vec<String>,
    /// Timestamp of each sample
    pub timestamps: Vec<NaiveDateTime>,
}

/// Train/test split result
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
}

impl Dataset {
    /// Create a new empty dataset
    pub fn new(feature_names: Vec<String>) -> Self {
        Self {
            features: Vec::new(),
            labels: Vec::new(),
            feature_names,
            timestamps: Vec::new(),
        }
    }

    /// X = every column except `target`, y = `target`
    pub fn from_table(table: &CleanTable, target: &str) -> Result<Self> {
        let target_idx = table.column_index(target)?;

        let feature_names = table
            .columns
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != target_idx)
            .map(|(_, name)| name.clone())
            .collect();

        let features = table
            .rows
            .iter()
            .map(|row| {
                row.values
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != target_idx)
                    .map(|(_, &v)| v)
                    .collect()
            })
            .collect();

        Ok(Self {
            features,
            labels: table.column(target_idx),
            feature_names,
            timestamps: table.timestamps(),
        })
    }

    /// Number of samples
    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    /// Number of features
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Add a sample
    pub fn add_sample(&mut self, features: Vec<f64>, label: f64, timestamp: NaiveDateTime) {
        assert_eq!(features.len(), self.feature_names.len());
        self.features.push(features);
        self.labels.push(label);
        self.timestamps.push(timestamp);
    }

    /// Get feature matrix as ndarray
    pub fn features_array(&self) -> Array2<f64> {
        let n_samples = self.n_samples();
        let n_features = self.n_features();

        if n_samples == 0 {
            return Array2::zeros((0, n_features));
        }

        Array2::from_shape_fn((n_samples, n_features), |(i, j)| self.features[i][j])
    }

    /// Get labels as ndarray
    pub fn labels_array(&self) -> Array1<f64> {
        Array1::from_vec(self.labels.clone())
    }

    /// Split according to the configured mode
    pub fn split(&self, config: &SplitConfig) -> Split {
        match config.mode {
            SplitMode::Shuffled => self.random_split(config.test_ratio, config.seed),
            SplitMode::Chronological => self.train_test_split(config.test_ratio),
        }
    }

    /// Split by time: leading rows train, trailing rows test
    pub fn train_test_split(&self, test_ratio: f64) -> Split {
        let n = self.n_samples();
        let test_size = (test_ratio * n as f64).ceil() as usize;
        let train_size = n - test_size.min(n);

        let train: Vec<usize> = (0..train_size).collect();
        let test: Vec<usize> = (train_size..n).collect();

        Split {
            train: self.subset(&train),
            test: self.subset(&test),
        }
    }

    /// Seeded random assignment of rows to partitions.
    ///
    /// Rows are picked by shuffling, then each partition is put back in
    /// original (chronological) order so that windows over it are ordered.
    pub fn random_split(&self, test_ratio: f64, seed: u64) -> Split {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = self.n_samples();

        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);

        let test_size = ((test_ratio * n as f64).ceil() as usize).min(n);
        let (test_indices, train_indices) = indices.split_at(test_size);

        let mut train_indices = train_indices.to_vec();
        let mut test_indices = test_indices.to_vec();
        train_indices.sort_unstable();
        test_indices.sort_unstable();

        Split {
            train: self.subset(&train_indices),
            test: self.subset(&test_indices),
        }
    }

    /// Create a subset of the dataset by indices
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            feature_names: self.feature_names.clone(),
            timestamps: indices.iter().map(|&i| self.timestamps[i]).collect(),
        }
    }

    /// Row indices drawn with replacement
    pub fn bootstrap_indices(n: usize, seed: u64) -> Vec<usize> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen_range(0..n)).collect()
    }
}

/// Feature matrix for inference from a raw table without a target column.
///
/// Columns are picked by name in `feature_names` order, cells go through the
/// sentinel vocabulary (missing becomes NaN for the preprocessor's imputer),
/// and rows are put in chronological order.
pub fn inference_features(raw: &RawTable, feature_names: &[String]) -> Result<Array2<f64>> {
    let positions = feature_names
        .iter()
        .map(|name| raw.column_index(name))
        .collect::<Result<Vec<_>>>()?;

    let timestamps = raw
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            parse_timestamp(&row.timestamp).ok_or_else(|| Error::Timestamp {
                row: i,
                value: row.timestamp.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let order = chronological_order(&timestamps);

    Ok(Array2::from_shape_fn(
        (order.len(), positions.len()),
        |(i, j)| {
            raw.rows[order[i]]
                .cells
                .get(positions[j])
                .and_then(|cell| normalize_cell(cell))
                .unwrap_or(f64::NAN)
        },
    ))
}
