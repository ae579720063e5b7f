//! Sliding windows for the sequence model
//!
//! Window `i` covers rows `i .. i + T` and is paired with the target of row
//! `i + T`, so a span of `n` rows yields `n - T` samples and nothing when
//! `n <= T`.

use crate::error::{Error, Result};
use ndarray::{s, Array2, Array3};

/// Builds overlapping windows and minibatches from row-ordered features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceGenerator {
    /// Window length T
    pub length: usize,
    /// Samples per minibatch
    pub batch_size: usize,
}

impl SequenceGenerator {
    pub fn new(length: usize, batch_size: usize) -> Self {
        Self { length, batch_size }
    }

    /// Number of windows a span of `n_rows` produces
    pub fn n_windows(&self, n_rows: usize) -> usize {
        n_rows.saturating_sub(self.length)
    }

    /// Stack windows into `[samples, T, features]`
    pub fn windows(&self, x: &Array2<f64>) -> Array3<f64> {
        let n_windows = self.n_windows(x.nrows());
        let n_features = x.ncols();
        let mut out = Array3::zeros((n_windows, self.length, n_features));

        for i in 0..n_windows {
            out.slice_mut(s![i, .., ..])
                .assign(&x.slice(s![i..i + self.length, ..]));
        }
        out
    }

    /// Targets paired with each window, as `[samples, 1]`
    pub fn targets(&self, y: &[f64]) -> Array2<f64> {
        let n = self.n_windows(y.len());
        Array2::from_shape_fn((n, 1), |(i, _)| y[i + self.length])
    }

    /// Windows and their targets
    pub fn prepare(&self, x: &Array2<f64>, y: &[f64]) -> Result<(Array3<f64>, Array2<f64>)> {
        if x.nrows() != y.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} feature rows but {} targets",
                x.nrows(),
                y.len()
            )));
        }
        Ok((self.windows(x), self.targets(y)))
    }

    /// Split samples into consecutive minibatches; the last may be short
    pub fn batches(&self, x: &Array3<f64>, y: &Array2<f64>) -> Vec<(Array3<f64>, Array2<f64>)> {
        let n_samples = x.shape()[0];
        let batch_size = self.batch_size.max(1);

        (0..n_samples)
            .step_by(batch_size)
            .map(|start| {
                let end = (start + batch_size).min(n_samples);
                (
                    x.slice(s![start..end, .., ..]).to_owned(),
                    y.slice(s![start..end, ..]).to_owned(),
                )
            })
            .collect()
    }
}
