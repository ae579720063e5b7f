//! Data cleaning: sentinel normalization, imputation, outlier clipping
//!
//! ## Example
//!
//! ```rust
//! use climate_ml::cleaning::{normalize_cell, NeighborhoodImputer};
//!
//! assert_eq!(normalize_cell("T"), Some(0.0025));
//! assert_eq!(normalize_cell("M"), None);
//!
//! let fill = NeighborhoodImputer::new(1).impute_column(&[Some(1.0), None, Some(3.0)]);
//! assert_eq!(fill.values, vec![Some(1.0), Some(2.0), Some(3.0)]);
//! ```

pub mod impute;
pub mod outlier;
pub mod pipeline;
pub mod sentinel;

pub use impute::{ColumnFill, ImputationReport, NeighborhoodImputer};
pub use outlier::{impute_outliers, ClippedSeries, OutlierClipper, OutlierStrategy};
pub use pipeline::{CleaningPipeline, CleaningReport};
pub use sentinel::{normalize_cell, normalize_column, Sentinel, TRACE_AMOUNT};
