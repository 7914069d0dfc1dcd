//! Experiment tracking
//!
//! - `RunLogger`: per-session hyperparameters, scalars, histograms and profiling
//! - `summary`: one CSV row per session for the whole sweep

mod run_logger;
mod summary;

pub use run_logger::{HParamsRecord, MetricInfo, RunLogger};
pub use summary::{read_summary, write_summary, SummaryRow};
