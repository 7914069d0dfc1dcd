//! Utility module
//!
//! This module provides:
//! - Configuration management
//! - Logging setup
//! - Regression metrics

mod config;
mod logging;
pub mod metrics;

pub use config::{Config, DataConfig, LoggingConfig, SplitConfig};
pub use logging::{setup_logging, LogLevel};
