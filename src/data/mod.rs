//! Data acquisition
//!
//! - `types`: the raw record and its fixed column schema
//! - `source`: the `DataSource` pull interface with CSV and synthetic sources

mod source;
mod types;

pub use source::{save_records_csv, CsvSource, DataSource, SyntheticSource};
pub use types::{
    records_to_matrix, RawRecord, DAY_OF_WEEK_COLUMN, FEATURE_COLUMNS, RAW_COLUMNS,
    SCALED_BLOCK_START, SNAPSHOT_COLUMNS,
};
