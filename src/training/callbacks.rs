//! Training callbacks
//!
//! Hooks the trainer calls around a fit. Early stopping lives here; run
//! logging implements the same trait in `tracking`.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::metrics::{EpochMetrics, TrainingHistory};
use crate::error::Result;
use crate::model::{RecurrentNetwork, WeightSnapshot};

/// Observer of a single training run
pub trait Callback {
    /// Called once before the first epoch
    fn on_train_begin(&mut self, _model: &RecurrentNetwork) -> Result<()> {
        Ok(())
    }

    /// Called after each epoch's validation pass. Return `false` to stop.
    fn on_epoch_end(&mut self, _metrics: &EpochMetrics, _model: &RecurrentNetwork) -> Result<bool> {
        Ok(true)
    }

    /// Called once after the last epoch
    fn on_train_end(
        &mut self,
        _history: &TrainingHistory,
        _model: &mut RecurrentNetwork,
    ) -> Result<()> {
        Ok(())
    }
}

/// Early stopping settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyStoppingConfig {
    /// Epochs without improvement before stopping
    pub patience: usize,
    /// Minimum drop in validation loss that counts as improvement
    pub min_delta: f64,
    /// Put the best epoch's weights back when training ends
    pub restore_best_weights: bool,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        Self {
            patience: 10,
            min_delta: 0.01,
            restore_best_weights: false,
        }
    }
}

/// Stop once `val_loss` has not improved by `min_delta` for `patience` epochs
pub struct EarlyStopping {
    config: EarlyStoppingConfig,
    best: f64,
    best_epoch: usize,
    wait: usize,
    best_weights: Option<WeightSnapshot>,
    stopped_epoch: Option<usize>,
}

impl EarlyStopping {
    pub fn new(config: EarlyStoppingConfig) -> Self {
        Self {
            config,
            best: f64::INFINITY,
            best_epoch: 0,
            wait: 0,
            best_weights: None,
            stopped_epoch: None,
        }
    }

    /// Epoch at which training was halted, if it was
    pub fn stopped_epoch(&self) -> Option<usize> {
        self.stopped_epoch
    }

    pub fn best(&self) -> f64 {
        self.best
    }
}

impl Callback for EarlyStopping {
    fn on_train_begin(&mut self, _model: &RecurrentNetwork) -> Result<()> {
        self.best = f64::INFINITY;
        self.best_epoch = 0;
        self.wait = 0;
        self.best_weights = None;
        self.stopped_epoch = None;
        Ok(())
    }

    fn on_epoch_end(&mut self, metrics: &EpochMetrics, model: &RecurrentNetwork) -> Result<bool> {
        let current = metrics.val_loss;

        if current < self.best - self.config.min_delta {
            self.best = current;
            self.best_epoch = metrics.epoch;
            self.wait = 0;
            if self.config.restore_best_weights {
                self.best_weights = Some(model.snapshot_weights());
            }
            return Ok(true);
        }

        self.wait += 1;
        if self.wait >= self.config.patience {
            self.stopped_epoch = Some(metrics.epoch);
            info!(
                "Early stopping at epoch {} (best val_loss {:.4} at epoch {})",
                metrics.epoch, self.best, self.best_epoch
            );
            return Ok(false);
        }
        Ok(true)
    }

    fn on_train_end(
        &mut self,
        _history: &TrainingHistory,
        model: &mut RecurrentNetwork,
    ) -> Result<()> {
        if let Some(weights) = self.best_weights.take() {
            info!("Restoring weights from epoch {}", self.best_epoch);
            model.restore_weights(&weights)?;
        }
        Ok(())
    }
}
