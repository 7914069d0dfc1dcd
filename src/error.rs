//! Error types for the maintenance sweep library

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Two inputs that must line up row-for-row do not
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Input matrix has no rows
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// Not enough rows or examples to continue
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A train/validation/test partition came out empty
    #[error("Degenerate partition: {0}")]
    DegeneratePartition(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Optimizer name outside nadam/adam/rmsprop/sgd
    #[error("Unknown optimizer: {0}")]
    UnknownOptimizer(String),

    /// Numeric failure during training (loss diverged to NaN/inf)
    #[error("Numeric backend failure: {0}")]
    Backend(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Whether the sweep may move on to the next session after this error.
    ///
    /// IO and configuration problems affect every session equally, so they
    /// always abort regardless of the failure policy.
    pub fn is_session_local(&self) -> bool {
        matches!(self, Error::Backend(_) | Error::DegeneratePartition(_))
    }
}
