//! Sequential sweep driver
//!
//! Enumerates sessions (grid points or named topologies), builds a fresh
//! model for each, trains it on the shared partitions and logs the run.

use std::convert::TryFrom;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::grid::{
    default_hparams, Grid, HParam, HParamValue, IntervalVisit, HP_HIDDEN_LAYERS, HP_OPTIMIZER,
    HP_OUTPUT_UNITS,
};
use crate::error::{Error, Result};
use crate::model::{build_model, HyperParams, OptimizerKind, Topology};
use crate::preprocessing::Partitions;
use crate::tracking::{write_summary, HParamsRecord, RunLogger, SummaryRow};
use crate::training::{
    EarlyStopping, EarlyStoppingConfig, Loss, TestReport, Trainer, TrainingConfig, TrainingHistory,
};

/// Where the sessions of a sweep come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepMode {
    /// Cartesian product of the `[grid]` domains
    #[default]
    Grid,
    /// The named topologies in `variants`
    Variants,
}

/// What to do when a session fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the sweep on the first failed session
    #[default]
    Abort,
    /// Record the failure and move on to the next session
    Continue,
}

/// Sweep settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub mode: SweepMode,
    /// Topologies trained in `variants` mode
    pub variants: Vec<Topology>,
    /// Optimizer for `variants` mode
    pub variant_optimizer: OptimizerKind,
    pub failure_policy: FailurePolicy,
    /// Score each trained model on the test partition
    pub evaluate_on_test: bool,
    pub log_dir: PathBuf,
    /// Subdirectory of `log_dir` grouping this sweep's runs
    pub model_version: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            mode: SweepMode::Grid,
            variants: Topology::ALL.to_vec(),
            variant_optimizer: OptimizerKind::Nadam,
            failure_policy: FailurePolicy::Abort,
            evaluate_on_test: false,
            log_dir: PathBuf::from("logs"),
            model_version: 10,
        }
    }
}

impl SweepConfig {
    /// `<log_dir>/<model_version>`
    pub fn log_root(&self) -> PathBuf {
        self.log_dir.join(self.model_version.to_string())
    }
}

/// Hyperparameter grid settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub visit: IntervalVisit,
    pub params: Vec<HParam>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            visit: IntervalVisit::Endpoints,
            params: default_hparams(),
        }
    }
}

impl GridConfig {
    pub fn build(&self) -> Result<Grid> {
        Grid::new(&self.params, self.visit)
    }
}

/// One session to run
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    pub session: usize,
    pub run_name: String,
    pub hparams: HyperParams,
    /// Values recorded in `hparams.json`
    pub assignment: Vec<(String, HParamValue)>,
}

/// Result of one session
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub plan: SessionPlan,
    pub history: Option<TrainingHistory>,
    pub test: Option<TestReport>,
    pub error: Option<String>,
}

impl SessionOutcome {
    fn failed(plan: SessionPlan, error: &Error) -> Self {
        Self {
            plan,
            history: None,
            test: None,
            error: Some(error.to_string()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    fn summary_row(&self) -> SummaryRow {
        let history = self.history.as_ref();
        SummaryRow {
            session: self.plan.session,
            run_name: self.plan.run_name.clone(),
            hidden_layers: self.plan.hparams.hidden_layers,
            output_units: self.plan.hparams.output_units,
            optimizer: self.plan.hparams.optimizer.to_string(),
            epochs_run: history.map_or(0, TrainingHistory::epochs_run),
            best_val_loss: history.and_then(TrainingHistory::best_val_loss),
            stopped_early: history.map_or(false, |h| h.stopped_early),
            test_mae: self.test.as_ref().map(|t| t.mae),
            status: match &self.error {
                None => "completed".to_string(),
                Some(e) => format!("failed: {}", e),
            },
        }
    }
}

fn write_outcomes(outcomes: &[SessionOutcome], path: &Path) -> Result<()> {
    let rows: Vec<SummaryRow> = outcomes.iter().map(SessionOutcome::summary_row).collect();
    write_summary(&rows, path)
}

/// Everything a sweep produced
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub outcomes: Vec<SessionOutcome>,
    pub summary_path: PathBuf,
}

impl SweepReport {
    /// Completed session with the lowest best validation loss
    pub fn best(&self) -> Option<&SessionOutcome> {
        self.outcomes
            .iter()
            .filter_map(|o| {
                o.history
                    .as_ref()
                    .and_then(TrainingHistory::best_val_loss)
                    .map(|loss| (o, loss))
            })
            .fold(None, |best: Option<(&SessionOutcome, f64)>, (o, loss)| match best {
                Some((_, b)) if b <= loss => best,
                _ => Some((o, loss)),
            })
            .map(|(o, _)| o)
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }
}

/// Runs every session of a sweep, one after another
pub struct SweepRunner {
    sweep: SweepConfig,
    grid: GridConfig,
    trainer: Trainer,
    early_stopping: EarlyStoppingConfig,
    loss: Loss,
}

impl SweepRunner {
    pub fn new(
        sweep: SweepConfig,
        grid: GridConfig,
        training: TrainingConfig,
        early_stopping: EarlyStoppingConfig,
    ) -> Self {
        Self {
            sweep,
            grid,
            trainer: Trainer::new(training),
            early_stopping,
            loss: Loss::default(),
        }
    }

    pub fn with_loss(mut self, loss: Loss) -> Self {
        self.loss = loss;
        self
    }

    /// Sessions in run order
    pub fn plan(&self) -> Result<Vec<SessionPlan>> {
        match self.sweep.mode {
            SweepMode::Grid => {
                let grid = self.grid.build()?;
                grid.iter()
                    .map(|trial| -> Result<SessionPlan> {
                        Ok(SessionPlan {
                            session: trial.session,
                            run_name: trial.session.to_string(),
                            hparams: HyperParams::try_from(&trial)?,
                            assignment: trial.assignment,
                        })
                    })
                    .collect()
            }
            SweepMode::Variants => {
                if self.sweep.variants.is_empty() {
                    return Err(Error::InvalidConfig(
                        "variants mode needs at least one topology".into(),
                    ));
                }
                Ok(self
                    .sweep
                    .variants
                    .iter()
                    .enumerate()
                    .map(|(session, topology)| {
                        let hparams = topology.hyperparams(self.sweep.variant_optimizer);
                        SessionPlan {
                            session,
                            run_name: topology.name().to_string(),
                            hparams,
                            assignment: vec![
                                (
                                    HP_HIDDEN_LAYERS.to_string(),
                                    HParamValue::Int(hparams.hidden_layers as i64),
                                ),
                                (
                                    HP_OPTIMIZER.to_string(),
                                    HParamValue::Text(hparams.optimizer.to_string()),
                                ),
                                (
                                    HP_OUTPUT_UNITS.to_string(),
                                    HParamValue::Int(hparams.output_units as i64),
                                ),
                            ],
                        }
                    })
                    .collect())
            }
        }
    }

    /// Train every planned session on `partitions` and write the sweep summary
    pub fn run(&self, partitions: &Partitions) -> Result<SweepReport> {
        let plans = self.plan()?;
        let log_root = self.sweep.log_root();
        let (n_train, n_val, n_test) = partitions.sizes();
        info!(
            "Sweeping {} sessions on {} train / {} validation / {} test examples, logging to {}",
            plans.len(),
            n_train,
            n_val,
            n_test,
            log_root.display()
        );

        let summary_path = log_root.join("sweep_summary.csv");
        let mut outcomes = Vec::with_capacity(plans.len());
        for plan in plans {
            info!("Starting session: {} {}", plan.session, plan.hparams);

            match self.run_session(&plan, partitions, &log_root) {
                Ok((history, test)) => outcomes.push(SessionOutcome {
                    plan,
                    history: Some(history),
                    test,
                    error: None,
                }),
                Err(e) if self.continues_after(&e) => {
                    warn!("Session {} failed, continuing: {}", plan.session, e);
                    outcomes.push(SessionOutcome::failed(plan, &e));
                }
                Err(e) => {
                    error!("Session {} failed: {}", plan.session, e);
                    outcomes.push(SessionOutcome::failed(plan, &e));
                    // Keep what finished before the failure
                    if let Err(write_err) = write_outcomes(&outcomes, &summary_path) {
                        warn!("Could not write {}: {}", summary_path.display(), write_err);
                    }
                    return Err(e);
                }
            }
        }

        write_outcomes(&outcomes, &summary_path)?;

        let report = SweepReport { outcomes, summary_path };
        if let Some(best) = report.best() {
            info!(
                "Best session: {} {} (val_loss {:.4})",
                best.plan.session,
                best.plan.hparams,
                best.history.as_ref().and_then(TrainingHistory::best_val_loss).unwrap_or(f64::NAN)
            );
        }
        Ok(report)
    }

    fn continues_after(&self, error: &Error) -> bool {
        self.sweep.failure_policy == FailurePolicy::Continue && error.is_session_local()
    }

    fn run_session(
        &self,
        plan: &SessionPlan,
        partitions: &Partitions,
        log_root: &Path,
    ) -> Result<(TrainingHistory, Option<TestReport>)> {
        let seed = self.trainer.config().seed.wrapping_add(plan.session as u64);
        let mut model = build_model(
            plan.run_name.as_str(),
            &plan.hparams,
            partitions.train.n_features(),
            seed,
        )?;
        info!("\n{}", model.summary());

        let mut optimizer = plan.hparams.optimizer.build(self.trainer.config().learning_rate);
        let mut stopper = EarlyStopping::new(self.early_stopping.clone());
        let mut logger = RunLogger::create(
            log_root,
            HParamsRecord::new(&plan.run_name, plan.session, &plan.assignment),
        )?;

        let history = self.trainer.fit(
            &mut model,
            &partitions.train,
            &partitions.validation,
            optimizer.as_mut(),
            self.loss,
            &mut [&mut stopper, &mut logger],
        )?;

        let test = if self.sweep.evaluate_on_test {
            let report = self.trainer.evaluate(&mut model, &partitions.test)?;
            logger.write_test_report(&report)?;
            Some(report)
        } else {
            None
        };

        Ok((history, test))
    }
}
