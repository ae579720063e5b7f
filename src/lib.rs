//! # Climate ML - weather station forecasting
//!
//! This library cleans hourly weather-station observations and forecasts a
//! target measurement (wet-bulb temperature by default) with an ensemble of
//! a Random Forest and an LSTM.
//!
//! ## Modules
//!
//! - `cleaning` - Sentinel normalization, neighborhood imputation, outlier clipping
//! - `data` - Observation tables, CSV I/O, time index and datasets
//! - `preprocessing` - Scaling and sliding windows
//! - `model` - Decision Tree, Random Forest and LSTM implementations
//! - `ensemble` - Training, alignment and evaluation of the combined forecast
//! - `config` - TOML configuration
//! - `utils` - Regression metrics

pub mod cleaning;
pub mod config;
pub mod data;
pub mod ensemble;
pub mod error;
pub mod model;
pub mod preprocessing;
pub mod utils;

pub use cleaning::CleaningPipeline;
pub use config::Config;
pub use data::{CleanTable, Dataset, RawTable};
pub use ensemble::{EnsembleModel, Evaluation, Metrics};
pub use error::{Error, Result};
pub use model::{RandomForest, LSTM};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cleaning::{CleaningPipeline, CleaningReport, OutlierStrategy};
    pub use crate::config::{Config, SplitMode};
    pub use crate::data::{
        inference_features, load_clean_csv, load_raw_csv, save_clean_csv, CleanTable, Dataset,
        RawTable, Split,
    };
    pub use crate::ensemble::{combine, EnsembleModel, Evaluation, Metrics};
    pub use crate::error::{Error, Result};
    pub use crate::model::{LSTMConfig, RandomForest, LSTM};
    pub use crate::preprocessing::{Preprocessor, SequenceGenerator};
}
