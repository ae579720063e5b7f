//! Mean imputation followed by standard scaling
//!
//! Fitted once on the training features and then reused unchanged for
//! evaluation and inference data. A `Preprocessor` is never refit in place.

use crate::error::{Error, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature mean and standard deviation learned from training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    means: Array1<f64>,
    stds: Array1<f64>,
}

impl Preprocessor {
    /// Learn imputation means and scaling parameters.
    ///
    /// NaN cells are ignored for the mean and replaced by it before the
    /// variance is taken. Constant features get a unit scale.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(Error::InsufficientData(
                "cannot fit preprocessor on zero rows".into(),
            ));
        }

        let mut means = Array1::zeros(x.ncols());
        let mut stds = Array1::ones(x.ncols());

        for (j, column) in x.axis_iter(Axis(1)).enumerate() {
            let present: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
            if present.is_empty() {
                return Err(Error::InsufficientData(format!(
                    "feature {} has no values in the training data",
                    j
                )));
            }

            let mean = present.iter().sum::<f64>() / present.len() as f64;
            // imputed cells sit at the mean and contribute zero deviation
            let variance =
                present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / x.nrows() as f64;
            let std = variance.sqrt();

            means[j] = mean;
            stds[j] = if std > 1e-12 { std } else { 1.0 };
        }

        Ok(Self { means, stds })
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn stds(&self) -> &Array1<f64> {
        &self.stds
    }

    /// Impute and scale with the fitted parameters
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(Error::ShapeMismatch(format!(
                "preprocessor fitted on {} features, got {}",
                self.n_features(),
                x.ncols()
            )));
        }

        let mut out = x.clone();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, std) = (self.means[j], self.stds[j]);
            column.mapv_inplace(|v| if v.is_nan() { 0.0 } else { (v - mean) / std });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_standard_scaling() {
        let x = array![[1.0, 10.0], [3.0, 10.0]];
        let pre = Preprocessor::fit(&x).unwrap();

        assert_eq!(pre.means(), &array![2.0, 10.0]);
        assert_eq!(pre.stds(), &array![1.0, 1.0]);

        let scaled = pre.transform(&x).unwrap();
        assert_eq!(scaled, array![[-1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_nan_imputed_with_training_mean() {
        let x = array![[1.0], [f64::NAN], [5.0]];
        let pre = Preprocessor::fit(&x).unwrap();
        assert_relative_eq!(pre.means()[0], 3.0);

        let scaled = pre.transform(&array![[f64::NAN], [3.0]]).unwrap();
        assert_eq!(scaled[[0, 0]], 0.0);
        assert_eq!(scaled[[1, 0]], 0.0);
    }

    #[test]
    fn test_parameters_not_refit_on_new_data() {
        let train = array![[0.0], [2.0]];
        let pre = Preprocessor::fit(&train).unwrap();

        let other = array![[100.0], [200.0]];
        let scaled = pre.transform(&other).unwrap();
        assert_relative_eq!(scaled[[0, 0]], 99.0);
        assert_relative_eq!(scaled[[1, 0]], 199.0);
    }

    #[test]
    fn test_shape_and_empty_errors() {
        let pre = Preprocessor::fit(&array![[1.0, 2.0]]).unwrap();
        assert!(matches!(
            pre.transform(&array![[1.0]]),
            Err(Error::ShapeMismatch(_))
        ));
        assert!(Preprocessor::fit(&Array2::zeros((0, 2))).is_err());
        assert!(Preprocessor::fit(&array![[f64::NAN]]).is_err());
    }
}
