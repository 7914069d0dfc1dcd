//! # Maintenance interval RNN sweep
//!
//! Trains LSTM regressors that predict how many days remain until a piece of
//! equipment's next scheduled maintenance, sweeping a grid of depths, widths
//! and optimizers and logging each run for comparison.
//!
//! ## Modules
//!
//! - `data`: raw record schema, CSV and synthetic data sources
//! - `preprocessing`: min-max scaling, sliding windows, train/validation/test split
//! - `model`: LSTM and dense layers, optimizers, the model factory
//! - `training`: batch streams, losses, early stopping, the training loop
//! - `sweep`: hyperparameter grid enumeration and the sequential sweep runner
//! - `tracking`: per-run log directories and the sweep summary
//! - `utils`: configuration, logging and regression metrics
//!
//! ## Example
//!
//! ```no_run
//! use maintenance_rnn::data::{DataSource, SyntheticSource};
//! use maintenance_rnn::preprocessing::{split, DataProcessor};
//! use maintenance_rnn::{Config, SweepRunner};
//!
//! fn main() -> maintenance_rnn::Result<()> {
//!     let config = Config::default();
//!
//!     let raw = SyntheticSource::new(720, 7).pull()?;
//!     let mut processor = DataProcessor::new(config.data.history_length, config.data.stride);
//!     let prepared = processor.prepare(&raw)?;
//!     let windows = processor.windows(&prepared)?;
//!     let partitions = split(&windows, 0.8, 0.1, 42)?;
//!
//!     let runner =
//!         SweepRunner::new(config.sweep, config.grid, config.training, config.early_stopping);
//!     let report = runner.run(&partitions)?;
//!     println!(
//!         "{} sessions, summary at {}",
//!         report.outcomes.len(),
//!         report.summary_path.display()
//!     );
//!     Ok(())
//! }
//! ```

pub mod data;
pub mod error;
pub mod model;
pub mod preprocessing;
pub mod sweep;
pub mod tracking;
pub mod training;
pub mod utils;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use model::{build_model, HyperParams, OptimizerKind, RecurrentNetwork, Topology};
pub use preprocessing::{DataProcessor, Partitions, WindowedDataset};
pub use sweep::{Grid, SweepConfig, SweepReport, SweepRunner};
pub use training::{EarlyStopping, Trainer, TrainingConfig};
pub use utils::{setup_logging, Config};
