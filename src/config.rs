//! Configuration handling.

use crate::cleaning::OutlierStrategy;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Input table layout
    pub data: DataConfig,
    /// Imputation and outlier settings
    pub cleaning: CleaningConfig,
    /// Train/test split
    pub split: SplitConfig,
    /// Sequence model (LSTM) settings
    pub sequence: SequenceConfig,
    /// Row-wise model (random forest) settings
    pub forest: ForestSettings,
}

impl Config {
    /// Load configuration from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        self.cleaning.strategy()?;

        if !(self.cleaning.fence_multiplier >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "fence_multiplier must be non-negative, got {}",
                self.cleaning.fence_multiplier
            )));
        }
        if !(self.split.test_ratio > 0.0 && self.split.test_ratio < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "test_ratio must be in (0, 1), got {}",
                self.split.test_ratio
            )));
        }
        if self.sequence.time_steps == 0 {
            return Err(Error::InvalidConfig("time_steps must be at least 1".into()));
        }
        if self.sequence.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be at least 1".into()));
        }
        if self.sequence.hidden_size == 0 {
            return Err(Error::InvalidConfig("hidden_size must be at least 1".into()));
        }
        if self.forest.n_trees == 0 {
            return Err(Error::InvalidConfig("n_trees must be at least 1".into()));
        }
        Ok(())
    }
}

/// Column layout of the observation table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Name of the timestamp column
    pub timestamp_column: String,
    /// Numeric column predicted by the ensemble
    pub target_column: String,
    /// Columns with fewer non-null cells than this one are dropped
    pub threshold_column: Option<String>,
    /// Identifier columns removed before cleaning
    pub drop_columns: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            timestamp_column: "DATE".to_string(),
            target_column: "HourlyWetBulbTemperature".to_string(),
            threshold_column: Some("HourlySeaLevelPressure".to_string()),
            drop_columns: [
                "STATION",
                "REPORT_TYPE",
                "REPORT_TYPE.1",
                "SOURCE",
                "SOURCE.1",
                "REM",
                "WindEquipmentChangeDate",
                "NAME",
                "HourlySkyConditions",
                "HourlyPresentWeatherType",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Imputation and outlier clipping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CleaningConfig {
    /// Half-width of the imputation window in rows
    pub window: usize,
    /// IQR fence multiplier
    pub fence_multiplier: f64,
    /// Replacement statistic for outliers: "median" or "mean"
    pub strategy: String,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            window: 10,
            fence_multiplier: 1.5,
            strategy: "median".to_string(),
        }
    }
}

impl CleaningConfig {
    /// Parsed outlier strategy; unknown names are a configuration error.
    pub fn strategy(&self) -> Result<OutlierStrategy> {
        self.strategy.parse()
    }
}

/// How rows are assigned to the train and test partitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Seeded random selection, each partition kept in chronological order
    Shuffled,
    /// Leading rows train, trailing rows test
    Chronological,
}

/// Train/test split.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows held out for evaluation
    pub test_ratio: f64,
    /// Seed for the shuffled split
    pub seed: u64,
    /// Split mode
    pub mode: SplitMode,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            seed: 42,
            mode: SplitMode::Shuffled,
        }
    }
}

/// Sequence model settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SequenceConfig {
    /// Window length T
    pub time_steps: usize,
    /// Training epochs
    pub epochs: usize,
    /// Minibatch size
    pub batch_size: usize,
    /// LSTM hidden units
    pub hidden_size: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Weight initialization seed
    pub seed: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            time_steps: 10,
            epochs: 50,
            batch_size: 32,
            hidden_size: 50,
            learning_rate: 0.001,
            seed: 42,
        }
    }
}

/// Random forest settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForestSettings {
    /// Number of trees
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Bootstrap and feature-sampling seed
    pub seed: u64,
}

impl Default for ForestSettings {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 12,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}
