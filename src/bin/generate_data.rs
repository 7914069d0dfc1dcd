//! Generate a synthetic maintenance history
//!
//! Writes a headered CSV that `sweep --data` reads back.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use maintenance_rnn::data::{save_records_csv, SyntheticSource};
use maintenance_rnn::setup_logging;

#[derive(Parser)]
#[command(name = "generate_data")]
#[command(about = "Generate a synthetic equipment maintenance history")]
struct Args {
    /// Number of days to generate
    #[arg(short, long, default_value = "720")]
    rows: usize,

    /// RNG seed
    #[arg(short, long, default_value = "7")]
    seed: u64,

    /// Shortest gap between maintenance events, in days
    #[arg(long, default_value = "20")]
    min_interval: usize,

    /// Longest gap between maintenance events, in days
    #[arg(long, default_value = "45")]
    max_interval: usize,

    /// Output CSV path
    #[arg(short, long, default_value = "data/maintenance.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging("info");

    let records = SyntheticSource::new(args.rows, args.seed)
        .with_interval(args.min_interval, args.max_interval)
        .generate()
        .context("generating records")?;

    save_records_csv(&records, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!("Saved {} records to {}", records.len(), args.output.display());

    Ok(())
}
