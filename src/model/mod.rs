//! # Models
//!
//! The two regressors of the ensemble and the pieces they are built from.
//!
//! ## Example
//!
//! ```rust,no_run
//! use climate_ml::model::{CellActivation, LSTMConfig, LSTM};
//!
//! let config = LSTMConfig::new(5, 50)
//!     .with_learning_rate(0.001)
//!     .with_activation(CellActivation::Relu);
//!
//! let lstm = LSTM::new(config);
//! // lstm.train(&batches, 50, None)?;
//! ```

mod config;
mod forest;
mod lstm;
mod optimizer;
mod tree;

pub use config::{CellActivation, LSTMConfig};
pub use forest::{ForestConfig, RandomForest};
pub use lstm::LSTM;
pub use optimizer::{Adam, Moments};
pub use tree::{DecisionTree, TreeConfig, TreeNode};
