//! Evaluation metrics

mod metrics;

pub use metrics::{mae, mse, r2_score, rmse};
