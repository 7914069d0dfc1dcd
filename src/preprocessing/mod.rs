//! # Preprocessing
//!
//! Preparing the equipment history for training:
//! - Min-max scaling of the feature block
//! - Sliding history windows paired with the days-to-maintenance label
//! - Seeded train/validation/test split
//!
//! ## Example
//!
//! ```rust
//! use maintenance_rnn::data::{DataSource, SyntheticSource};
//! use maintenance_rnn::preprocessing::{split, DataProcessor};
//!
//! let raw = SyntheticSource::new(120, 1).pull().unwrap();
//!
//! // 60 days of history, one day between windows
//! let mut processor = DataProcessor::new(60, 1);
//! let prepared = processor.prepare(&raw).unwrap();
//! let windows = processor.windows(&prepared).unwrap();
//! assert_eq!(windows.len(), 61);
//!
//! let parts = split(&windows, 0.8, 0.1, 42).unwrap();
//! assert_eq!(parts.train.len(), 49);
//! ```

mod normalizer;
mod processor;
mod split;
mod windows;

pub use normalizer::MinMaxNormalizer;
pub use processor::{DataProcessor, PreparedData};
pub use split::{split, split_indices, Partitions, SplitIndices};
pub use windows::{build_windows, window_count, WindowedDataset};
