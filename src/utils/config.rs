//! Configuration management
//!
//! One TOML file drives the whole sweep. Every section falls back to its
//! defaults, so a partial file only needs the keys it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::sweep::{GridConfig, SweepConfig};
use crate::training::{EarlyStoppingConfig, TrainingConfig};

/// Data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Raw history CSV. Synthetic data is generated when unset.
    pub csv_path: Option<PathBuf>,
    pub synthetic_rows: usize,
    pub synthetic_seed: u64,
    /// Days of history in each window
    pub history_length: usize,
    /// Days between consecutive window starts
    pub stride: usize,
    /// Where the scaled training matrix is written, if anywhere
    pub snapshot_path: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: None,
            synthetic_rows: 720,
            synthetic_seed: 7,
            history_length: 60,
            stride: 1,
            snapshot_path: Some(PathBuf::from("models/train.csv")),
        }
    }
}

/// Train/validation/test split configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub train_fraction: f64,
    pub validation_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            validation_fraction: 0.1,
            seed: 42,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub split: SplitConfig,
    pub training: TrainingConfig,
    pub early_stopping: EarlyStoppingConfig,
    pub sweep: SweepConfig,
    pub grid: GridConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file or use default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Using default configuration, could not load {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create default configuration file
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        Config::default().save(path)
    }

    /// Reject settings no session could run with
    pub fn validate(&self) -> Result<()> {
        if self.data.history_length == 0 {
            return Err(Error::InvalidConfig("data.history_length must be positive".into()));
        }
        if self.data.stride == 0 {
            return Err(Error::InvalidConfig("data.stride must be positive".into()));
        }

        let (train, val) = (self.split.train_fraction, self.split.validation_fraction);
        if !(train > 0.0 && val > 0.0 && train + val < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "split fractions must be positive with train + validation < 1 (got {} and {})",
                train, val
            )));
        }

        if self.training.batch_size == 0 {
            return Err(Error::InvalidConfig("training.batch_size must be positive".into()));
        }
        if self.training.max_epochs == 0 {
            return Err(Error::InvalidConfig("training.max_epochs must be positive".into()));
        }
        if let Some(lr) = self.training.learning_rate {
            if !(lr.is_finite() && lr > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "training.learning_rate must be positive, got {}",
                    lr
                )));
            }
        }

        if self.early_stopping.patience == 0 {
            return Err(Error::InvalidConfig("early_stopping.patience must be positive".into()));
        }
        if self.early_stopping.min_delta < 0.0 {
            return Err(Error::InvalidConfig(
                "early_stopping.min_delta must not be negative".into(),
            ));
        }

        self.grid.build()?;
        Ok(())
    }
}
