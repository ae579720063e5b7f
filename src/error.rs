//! Error types for the climate-ml library

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value (programmer error, never defaulted)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A timestamp could not be parsed as ISO 8601
    #[error("Row {row}: cannot parse timestamp {value:?}")]
    Timestamp { row: usize, value: String },

    /// A required column is absent from the table header
    #[error("Column not found: {0}")]
    MissingColumn(String),

    /// Columns still contain missing cells after imputation
    #[error("Columns still incomplete after imputation: {}", columns.join(", "))]
    IncompleteColumns { columns: Vec<String> },

    /// Row-wise and sequence prediction streams do not line up
    #[error(
        "Prediction streams misaligned: {row_len} row-wise predictions minus {time_steps} \
         time steps does not match {seq_len} sequence predictions"
    )]
    Alignment {
        row_len: usize,
        seq_len: usize,
        time_steps: usize,
    },

    /// Arrays with incompatible shapes
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Not enough rows for the requested operation
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A model or preprocessor was used before being fitted
    #[error("Not fitted: {0}")]
    NotFitted(String),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Binary artifact (de)serialization error
    #[error("Artifact encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML write error
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors caused by the input data rather than by configuration
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Error::Timestamp { .. }
                | Error::MissingColumn(_)
                | Error::IncompleteColumns { .. }
                | Error::InsufficientData(_)
        )
    }
}
