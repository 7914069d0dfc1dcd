//! Per-epoch training records

use std::fmt;

use serde::{Deserialize, Serialize};

/// Wall-clock breakdown of one profiled training step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepProfile {
    /// 1-based step within the epoch
    pub step: usize,
    pub forward_secs: f64,
    pub backward_secs: f64,
    pub update_secs: f64,
}

impl StepProfile {
    pub fn total_secs(&self) -> f64 {
        self.forward_secs + self.backward_secs + self.update_secs
    }
}

/// Metrics for a single epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch number
    pub epoch: usize,
    /// Mean training loss over the epoch's steps
    pub loss: f64,
    /// Mean validation loss
    pub val_loss: f64,
    pub duration_secs: f64,
    pub profile: Option<StepProfile>,
}

impl fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Epoch {}: loss={:.4}, val_loss={:.4} ({:.1}s)",
            self.epoch, self.loss, self.val_loss, self.duration_secs
        )
    }
}

/// Everything recorded while fitting one model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
    /// A callback asked to stop before `max_epochs`
    pub stopped_early: bool,
}

impl TrainingHistory {
    pub fn epochs_run(&self) -> usize {
        self.epochs.len()
    }

    /// Epoch with the lowest validation loss (first one on ties)
    pub fn best_epoch(&self) -> Option<&EpochMetrics> {
        self.epochs.iter().fold(None, |best: Option<&EpochMetrics>, m| match best {
            Some(b) if b.val_loss <= m.val_loss => Some(b),
            _ => Some(m),
        })
    }

    pub fn best_val_loss(&self) -> Option<f64> {
        self.best_epoch().map(|m| m.val_loss)
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.epochs.last().map(|m| m.loss)
    }
}
