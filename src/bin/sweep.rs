//! Run a hyperparameter sweep
//!
//! Loads (or generates) the maintenance history, windows and splits it once,
//! then trains one model per grid point or named topology.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use maintenance_rnn::data::{CsvSource, DataSource, SyntheticSource};
use maintenance_rnn::preprocessing::{split, DataProcessor};
use maintenance_rnn::sweep::FailurePolicy;
use maintenance_rnn::{setup_logging, Config, SweepRunner};

#[derive(Parser)]
#[command(name = "sweep")]
#[command(about = "Train LSTM regressors over a hyperparameter grid")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Raw history CSV (overrides config)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Generate this many synthetic days instead of reading a CSV
    #[arg(long, conflicts_with = "data")]
    synthetic_rows: Option<usize>,

    /// Maximum epochs per session (overrides config)
    #[arg(short = 'e', long)]
    max_epochs: Option<usize>,

    /// Training seed (overrides config)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Record failed sessions and keep going
    #[arg(long)]
    continue_on_failure: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = setup_logging("info");
    let mut config = Config::load_or_default(&args.config);
    log_level.set(&config.logging.level);

    if let Some(path) = args.data {
        config.data.csv_path = Some(path);
    }
    if let Some(rows) = args.synthetic_rows {
        config.data.csv_path = None;
        config.data.synthetic_rows = rows;
    }
    if let Some(epochs) = args.max_epochs {
        config.training.max_epochs = epochs;
    }
    if let Some(seed) = args.seed {
        config.training.seed = seed;
    }
    if args.continue_on_failure {
        config.sweep.failure_policy = FailurePolicy::Continue;
    }
    config.validate().context("invalid configuration")?;

    let source: Box<dyn DataSource> = match &config.data.csv_path {
        Some(path) => Box::new(CsvSource::new(path)),
        None => Box::new(SyntheticSource::new(
            config.data.synthetic_rows,
            config.data.synthetic_seed,
        )),
    };
    info!("Pulling data from {}", source.describe());
    let raw = source.pull().context("pulling raw data")?;

    let mut processor = DataProcessor::new(config.data.history_length, config.data.stride);
    let prepared = processor.prepare(&raw).context("preparing features")?;
    if let Some(path) = &config.data.snapshot_path {
        prepared
            .write_snapshot(path)
            .with_context(|| format!("writing snapshot to {}", path.display()))?;
    }

    let windows = processor.windows(&prepared).context("building windows")?;
    let partitions = split(
        &windows,
        config.split.train_fraction,
        config.split.validation_fraction,
        config.split.seed,
    )
    .context("splitting windows")?;

    let runner = SweepRunner::new(
        config.sweep,
        config.grid,
        config.training,
        config.early_stopping,
    );
    let report = runner.run(&partitions).context("running sweep")?;

    info!(
        "Finished {} sessions ({} failed), summary written to {}",
        report.outcomes.len(),
        report.failures(),
        report.summary_path.display()
    );
    if let Some(best) = report.best() {
        println!("Best session: {} {}", best.plan.run_name, best.plan.hparams);
    }

    Ok(())
}
