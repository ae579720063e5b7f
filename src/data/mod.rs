//! Observation tables, CSV I/O, time index and ML datasets

mod dataset;
mod loader;
mod table;
mod time_index;

pub use dataset::{inference_features, Dataset, Split};
pub use loader::{load_clean_csv, load_raw_csv, read_raw_csv, save_clean_csv, write_clean_csv};
pub use table::{
    CleanRow, CleanTable, CompleteRow, CompleteTable, Observation, ObservationTable, RawRow,
    RawTable,
};
pub use time_index::{build_time_index, chronological_order, format_timestamp, parse_timestamp};
