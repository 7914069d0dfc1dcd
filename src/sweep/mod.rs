//! # Hyperparameter sweep
//!
//! Enumerates a declarative grid (or a list of named topologies) and trains
//! one model per point on partitions shared by the whole sweep.
//!
//! ## Example
//!
//! ```rust
//! use maintenance_rnn::sweep::Grid;
//!
//! let grid = Grid::default_grid().unwrap();
//! assert_eq!(grid.len(), 24);
//!
//! let first = grid.iter().next().unwrap();
//! assert_eq!(first.session, 0);
//! assert_eq!(first.to_string(), "{hidden_num_layers: 0, optimizer: nadam, output_units: 50}");
//! ```

mod grid;
mod runner;

pub use grid::{
    default_hparams, Domain, Grid, HParam, HParamValue, IntervalVisit, Trial, HP_HIDDEN_LAYERS,
    HP_OPTIMIZER, HP_OUTPUT_UNITS,
};
pub use runner::{
    FailurePolicy, GridConfig, SessionOutcome, SessionPlan, SweepConfig, SweepMode, SweepReport,
    SweepRunner,
};
