//! IQR-fence outlier replacement

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default IQR fence multiplier
pub const DEFAULT_FENCE_MULTIPLIER: f64 = 1.5;

/// Central statistic written over outliers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierStrategy {
    Median,
    Mean,
}

impl FromStr for OutlierStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "median" => Ok(OutlierStrategy::Median),
            "mean" => Ok(OutlierStrategy::Mean),
            other => Err(Error::InvalidConfig(format!(
                "outlier strategy must be 'median' or 'mean', got {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for OutlierStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutlierStrategy::Median => write!(f, "median"),
            OutlierStrategy::Mean => write!(f, "mean"),
        }
    }
}

/// Percentile of pre-sorted data with linear interpolation between ranks
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Outcome of clipping one series
#[derive(Debug, Clone, PartialEq)]
pub struct ClippedSeries {
    pub values: Vec<f64>,
    pub lower_fence: f64,
    pub upper_fence: f64,
    /// Statistic written over outliers
    pub fill_value: f64,
    /// Number of values replaced
    pub replaced: usize,
}

/// Replaces values outside `[Q1 - k·IQR, Q3 + k·IQR]`
#[derive(Debug, Clone, Copy)]
pub struct OutlierClipper {
    pub strategy: OutlierStrategy,
    pub multiplier: f64,
}

impl Default for OutlierClipper {
    fn default() -> Self {
        Self::new(OutlierStrategy::Median, DEFAULT_FENCE_MULTIPLIER)
    }
}

impl OutlierClipper {
    pub fn new(strategy: OutlierStrategy, multiplier: f64) -> Self {
        Self {
            strategy,
            multiplier,
        }
    }

    /// Clip a series. Quartiles and the fill statistic all come from the
    /// unclipped input; the output has the same length.
    pub fn clip(&self, data: &[f64]) -> ClippedSeries {
        if data.is_empty() {
            return ClippedSeries {
                values: Vec::new(),
                lower_fence: f64::NAN,
                upper_fence: f64::NAN,
                fill_value: f64::NAN,
                replaced: 0,
            };
        }

        let mut sorted = data.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let q1 = percentile_sorted(&sorted, 25.0);
        let q3 = percentile_sorted(&sorted, 75.0);
        let iqr = q3 - q1;
        let lower_fence = q1 - self.multiplier * iqr;
        let upper_fence = q3 + self.multiplier * iqr;

        let fill_value = match self.strategy {
            OutlierStrategy::Median => percentile_sorted(&sorted, 50.0),
            OutlierStrategy::Mean => data.iter().sum::<f64>() / data.len() as f64,
        };

        let mut replaced = 0;
        let values = data
            .iter()
            .map(|&x| {
                if x < lower_fence || x > upper_fence {
                    replaced += 1;
                    fill_value
                } else {
                    x
                }
            })
            .collect();

        ClippedSeries {
            values,
            lower_fence,
            upper_fence,
            fill_value,
            replaced,
        }
    }
}

/// Clip with a strategy given by name; unknown names fail
pub fn impute_outliers(data: &[f64], strategy: &str, multiplier: f64) -> Result<Vec<f64>> {
    let strategy: OutlierStrategy = strategy.parse()?;
    Ok(OutlierClipper::new(strategy, multiplier).clip(data).values)
}
