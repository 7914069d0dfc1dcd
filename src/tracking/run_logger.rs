//! Per-run experiment log
//!
//! Each session gets `<log_dir>/<model_version>/<run_name>/` holding:
//! - `hparams.json`: hyperparameter values, the declared metric and the model summary
//! - `scalars.csv`: loss and val_loss per epoch
//! - `histograms.csv`: weight statistics per tensor per epoch
//! - `profile.csv`: timing of the profiled training step

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::Writer;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::model::RecurrentNetwork;
use crate::sweep::HParamValue;
use crate::training::{Callback, EpochMetrics, TestReport, TrainingHistory};

/// Metric every run reports against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricInfo {
    pub tag: String,
    pub display_name: String,
}

impl Default for MetricInfo {
    fn default() -> Self {
        Self {
            tag: "mae".to_string(),
            display_name: "Mean Absolute Error".to_string(),
        }
    }
}

/// Contents of `hparams.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HParamsRecord {
    pub run_name: String,
    pub session: usize,
    pub hparams: BTreeMap<String, HParamValue>,
    pub metrics: Vec<MetricInfo>,
    pub started_at: String,
    pub model_summary: Option<String>,
}

impl HParamsRecord {
    pub fn new(run_name: &str, session: usize, assignment: &[(String, HParamValue)]) -> Self {
        Self {
            run_name: run_name.to_string(),
            session,
            hparams: assignment.iter().cloned().collect(),
            metrics: vec![MetricInfo::default()],
            started_at: Utc::now().to_rfc3339(),
            model_summary: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ScalarRow {
    epoch: usize,
    loss: f64,
    val_loss: f64,
    duration_secs: f64,
}

#[derive(Debug, Serialize)]
struct HistogramRow<'a> {
    epoch: usize,
    tensor: &'a str,
    count: usize,
    min: f64,
    max: f64,
    mean: f64,
    std: f64,
}

#[derive(Debug, Serialize)]
struct ProfileRow {
    epoch: usize,
    step: usize,
    forward_secs: f64,
    backward_secs: f64,
    update_secs: f64,
    total_secs: f64,
}

/// Writes one run's logs; plugs into the trainer as a callback
pub struct RunLogger {
    dir: PathBuf,
    record: HParamsRecord,
    scalars: Writer<File>,
    histograms: Writer<File>,
    profile: Writer<File>,
}

impl RunLogger {
    /// Create the run directory under `log_root` and write `hparams.json`
    pub fn create<P: AsRef<Path>>(log_root: P, record: HParamsRecord) -> Result<Self> {
        let dir = log_root.as_ref().join(&record.run_name);
        fs::create_dir_all(&dir)?;

        let logger = Self {
            scalars: Writer::from_path(dir.join("scalars.csv"))?,
            histograms: Writer::from_path(dir.join("histograms.csv"))?,
            profile: Writer::from_path(dir.join("profile.csv"))?,
            dir,
            record,
        };
        logger.write_hparams()?;
        debug!("Logging run {} to {}", logger.record.run_name, logger.dir.display());
        Ok(logger)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_hparams(&self) -> Result<()> {
        let file = File::create(self.dir.join("hparams.json"))?;
        serde_json::to_writer_pretty(file, &self.record)?;
        Ok(())
    }

    /// Save a held-out evaluation next to the training logs
    pub fn write_test_report(&self, report: &TestReport) -> Result<()> {
        let file = File::create(self.dir.join("test_report.json"))?;
        serde_json::to_writer_pretty(file, report)?;
        Ok(())
    }
}

impl Callback for RunLogger {
    fn on_train_begin(&mut self, model: &RecurrentNetwork) -> Result<()> {
        self.record.model_summary = Some(model.summary());
        self.write_hparams()
    }

    fn on_epoch_end(&mut self, metrics: &EpochMetrics, model: &RecurrentNetwork) -> Result<bool> {
        self.scalars.serialize(ScalarRow {
            epoch: metrics.epoch,
            loss: metrics.loss,
            val_loss: metrics.val_loss,
            duration_secs: metrics.duration_secs,
        })?;
        self.scalars.flush()?;

        for hist in model.weight_histograms() {
            self.histograms.serialize(HistogramRow {
                epoch: metrics.epoch,
                tensor: &hist.name,
                count: hist.count,
                min: hist.min,
                max: hist.max,
                mean: hist.mean,
                std: hist.std,
            })?;
        }
        self.histograms.flush()?;

        if let Some(p) = metrics.profile {
            self.profile.serialize(ProfileRow {
                epoch: metrics.epoch,
                step: p.step,
                forward_secs: p.forward_secs,
                backward_secs: p.backward_secs,
                update_secs: p.update_secs,
                total_secs: p.total_secs(),
            })?;
            self.profile.flush()?;
        }

        Ok(true)
    }

    fn on_train_end(
        &mut self,
        _history: &TrainingHistory,
        _model: &mut RecurrentNetwork,
    ) -> Result<()> {
        self.scalars.flush()?;
        self.histograms.flush()?;
        self.profile.flush()?;
        Ok(())
    }
}
