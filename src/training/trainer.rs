//! Training loop for the recurrent regressor
//!
//! Fits one model against train/validation partitions, running callbacks
//! (early stopping, run logging) after every epoch.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::batches::BatchStream;
use super::callbacks::Callback;
use super::losses::Loss;
use super::metrics::{EpochMetrics, StepProfile, TrainingHistory};
use crate::error::{Error, Result};
use crate::model::{Optimizer, RecurrentNetwork};
use crate::preprocessing::WindowedDataset;
use crate::utils::metrics::{exact_hits, mae, r2_score, rmse, rounded_mae};

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Examples per gradient step
    pub batch_size: usize,
    /// Upper bound on epochs
    pub max_epochs: usize,
    /// Shuffle buffer for the training and validation streams
    pub shuffle_buffer: usize,
    /// 1-based training step timed each epoch (0 disables profiling)
    pub profile_batch: usize,
    /// Overrides the optimizer's default learning rate
    pub learning_rate: Option<f64>,
    /// Seed for weight init and shuffling
    pub seed: u64,
    /// Draw a progress bar per run
    pub show_progress: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            max_epochs: 100,
            shuffle_buffer: 10_000,
            profile_batch: 4,
            learning_rate: None,
            seed: 42,
            show_progress: true,
        }
    }
}

/// Held-out evaluation of a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub count: usize,
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    /// MAE after rounding predictions to whole days
    pub rounded_mae: f64,
    /// Rounded predictions equal to the label
    pub exact_hits: usize,
}

/// Trainer for recurrent models
pub struct Trainer {
    config: TrainingConfig,
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit `model` on `train`, validating on `validation` after each epoch.
    ///
    /// Each epoch runs `train.len()` steps from an endless shuffled stream and
    /// `validation.len()` validation steps. A non-finite loss aborts the run.
    pub fn fit(
        &self,
        model: &mut RecurrentNetwork,
        train: &WindowedDataset,
        validation: &WindowedDataset,
        optimizer: &mut dyn Optimizer,
        loss: Loss,
        callbacks: &mut [&mut dyn Callback],
    ) -> Result<TrainingHistory> {
        if train.is_empty() || validation.is_empty() {
            return Err(Error::InsufficientData(format!(
                "training needs examples in both partitions (train {}, validation {})",
                train.len(),
                validation.len()
            )));
        }
        if self.config.batch_size == 0 || self.config.max_epochs == 0 {
            return Err(Error::InvalidConfig("batch_size and max_epochs must be positive".into()));
        }

        let steps_per_epoch = train.len();
        let validation_steps = validation.len();
        let mut train_stream =
            BatchStream::cyclic(
                train,
                self.config.batch_size,
                self.config.shuffle_buffer,
                self.config.seed,
            );
        let mut val_stream = BatchStream::cyclic(
            validation,
            self.config.batch_size,
            self.config.shuffle_buffer,
            self.config.seed.wrapping_add(1),
        );

        info!(
            "Fitting {} ({} params) with {} for up to {} epochs, {} steps per epoch",
            model.name(),
            model.num_parameters(),
            optimizer.kind(),
            self.config.max_epochs,
            steps_per_epoch
        );

        for callback in callbacks.iter_mut() {
            callback.on_train_begin(model)?;
        }

        let mut history = TrainingHistory::default();
        let pb = progress_bar(self.config.max_epochs, self.config.show_progress);

        for epoch in 1..=self.config.max_epochs {
            let started = Instant::now();
            let mut total_loss = 0.0;
            let mut profile = None;

            for step in 1..=steps_per_epoch {
                let batch = train_stream
                    .next()
                    .ok_or_else(|| Error::Backend("training stream ran dry".into()))?;

                let t0 = Instant::now();
                model.zero_grad();
                let predictions = model.forward(batch.x.view(), true)?;
                let value = loss.value(&predictions, &batch.y)?;
                if !value.is_finite() {
                    return Err(Error::Backend(format!(
                        "{} became {} at epoch {} step {}",
                        loss, value, epoch, step
                    )));
                }
                let grad = loss.gradient(&predictions, &batch.y)?;

                let t1 = Instant::now();
                model.backward(&grad)?;
                let t2 = Instant::now();
                optimizer.step(&mut model.parameters())?;

                if step == self.config.profile_batch {
                    profile = Some(StepProfile {
                        step,
                        forward_secs: (t1 - t0).as_secs_f64(),
                        backward_secs: (t2 - t1).as_secs_f64(),
                        update_secs: t2.elapsed().as_secs_f64(),
                    });
                }
                total_loss += value;
            }

            let mut val_total = 0.0;
            for _ in 0..validation_steps {
                let batch = val_stream
                    .next()
                    .ok_or_else(|| Error::Backend("validation stream ran dry".into()))?;
                let predictions = model.forward(batch.x.view(), false)?;
                val_total += loss.value(&predictions, &batch.y)?;
            }
            let val_loss = val_total / validation_steps as f64;
            if !val_loss.is_finite() {
                return Err(Error::Backend(format!(
                    "val_loss became {} at epoch {}",
                    val_loss, epoch
                )));
            }

            let metrics = EpochMetrics {
                epoch,
                loss: total_loss / steps_per_epoch as f64,
                val_loss,
                duration_secs: started.elapsed().as_secs_f64(),
                profile,
            };
            debug!("{}", metrics);
            pb.set_message(format!("loss {:.4} val_loss {:.4}", metrics.loss, metrics.val_loss));
            pb.inc(1);

            let mut keep_going = true;
            for callback in callbacks.iter_mut() {
                keep_going &= callback.on_epoch_end(&metrics, model)?;
            }
            history.epochs.push(metrics);

            if !keep_going {
                history.stopped_early = epoch < self.config.max_epochs;
                break;
            }
        }

        pb.finish_and_clear();

        for callback in callbacks.iter_mut() {
            callback.on_train_end(&history, model)?;
        }

        if let Some(best) = history.best_epoch() {
            info!(
                "Finished {} after {} epochs, best val_loss {:.4} at epoch {}",
                model.name(),
                history.epochs_run(),
                best.val_loss,
                best.epoch
            );
        }

        Ok(history)
    }

    /// Predict every example of `dataset` in order and score against its labels
    pub fn evaluate(
        &self,
        model: &mut RecurrentNetwork,
        dataset: &WindowedDataset,
    ) -> Result<TestReport> {
        if dataset.is_empty() {
            return Err(Error::InsufficientData("cannot evaluate on an empty partition".into()));
        }

        let mut predictions = Vec::with_capacity(dataset.len());
        for batch in BatchStream::finite(dataset, self.config.batch_size) {
            predictions.extend(model.predict(batch.x.view())?.iter().copied());
        }
        let predictions = Array1::from(predictions);

        let labels = dataset.labels();
        let report = TestReport {
            count: labels.len(),
            mae: mae(labels, &predictions),
            rmse: rmse(labels, &predictions),
            r2: r2_score(labels, &predictions),
            rounded_mae: rounded_mae(labels, &predictions),
            exact_hits: exact_hits(labels, &predictions),
        };

        info!(
            "Test MAE {:.3} days, rounded MAE {:.3} days, {} of {} exact",
            report.mae, report.rounded_mae, report.exact_hits, report.count
        );
        Ok(report)
    }
}
