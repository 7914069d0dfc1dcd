//! Training module
//!
//! This module provides:
//! - Training loop with early stopping and profiling
//! - Batch streams over windowed datasets
//! - Regression losses
//! - Per-epoch metrics

mod batches;
mod callbacks;
mod losses;
mod metrics;
mod trainer;

pub use batches::{Batch, BatchStream};
pub use callbacks::{Callback, EarlyStopping, EarlyStoppingConfig};
pub use losses::Loss;
pub use metrics::{EpochMetrics, StepProfile, TrainingHistory};
pub use trainer::{TestReport, Trainer, TrainingConfig};
