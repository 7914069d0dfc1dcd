//! Integration tests for the maintenance sweep pipeline

use std::fs;
use std::path::Path;

use maintenance_rnn::data::{DataSource, SyntheticSource, FEATURE_COLUMNS, SNAPSHOT_COLUMNS};
use maintenance_rnn::model::Topology;
use maintenance_rnn::preprocessing::{split, DataProcessor, Partitions};
use maintenance_rnn::sweep::{
    Domain, GridConfig, HParam, IntervalVisit, SweepMode, HP_HIDDEN_LAYERS, HP_OPTIMIZER,
    HP_OUTPUT_UNITS,
};
use maintenance_rnn::tracking::read_summary;
use maintenance_rnn::training::EarlyStoppingConfig;
use maintenance_rnn::{Config, SweepConfig, SweepRunner, TrainingConfig};
use tempfile::tempdir;

fn partitions(rows: usize) -> Partitions {
    let raw = SyntheticSource::new(rows, 3).pull().unwrap();
    let mut processor = DataProcessor::new(60, 1);
    let prepared = processor.prepare(&raw).unwrap();
    let windows = processor.windows(&prepared).unwrap();
    split(&windows, 0.8, 0.1, 42).unwrap()
}

fn quick_training() -> TrainingConfig {
    TrainingConfig {
        max_epochs: 2,
        show_progress: false,
        ..Default::default()
    }
}

/// 120 days with 60 days of history gives 61 windows split 49/6/6
#[test]
fn test_windowing_and_split_sizes() {
    let raw = SyntheticSource::new(120, 3).pull().unwrap();
    let mut processor = DataProcessor::new(60, 1);
    let prepared = processor.prepare(&raw).unwrap();
    assert_eq!(prepared.features.ncols(), FEATURE_COLUMNS);

    let windows = processor.windows(&prepared).unwrap();
    assert_eq!(windows.len(), 61);
    assert_eq!(windows.history_length(), 60);

    let parts = split(&windows, 0.8, 0.1, 42).unwrap();
    assert_eq!(parts.sizes(), (49, 6, 6));
}

#[test]
fn test_shipped_config_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
    let config = Config::load(&path).unwrap();

    assert_eq!(config.grid.build().unwrap().len(), 24);
    assert_eq!(config.data.history_length, 60);
    assert_eq!(config.training.batch_size, 1);
    assert_eq!(config.sweep.variants, Topology::ALL.to_vec());
    assert!(config.data.csv_path.is_none());
}

#[test]
fn test_snapshot_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("models/train.csv");

    let raw = SyntheticSource::new(90, 1).pull().unwrap();
    let prepared = DataProcessor::new(60, 1).prepare(&raw).unwrap();
    prepared.write_snapshot(&path).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next().unwrap(), SNAPSHOT_COLUMNS.join(","));
    assert_eq!(lines.count(), 90);
}

#[test]
fn test_small_grid_sweep() {
    let dir = tempdir().unwrap();
    let sweep = SweepConfig {
        log_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let grid = GridConfig {
        visit: IntervalVisit::Endpoints,
        params: vec![
            HParam::new(HP_OUTPUT_UNITS, Domain::discrete([2i64])),
            HParam::new(HP_HIDDEN_LAYERS, Domain::IntInterval { min: 0, max: 1 }),
            HParam::new(HP_OPTIMIZER, Domain::discrete(["adam", "sgd"])),
        ],
    };

    let runner = SweepRunner::new(sweep, grid, quick_training(), EarlyStoppingConfig::default());
    let report = runner.run(&partitions(120)).unwrap();

    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(report.failures(), 0);
    assert!(report.best().is_some());

    let root = dir.path().join("10");
    assert_eq!(report.summary_path, root.join("sweep_summary.csv"));

    let rows = read_summary(&report.summary_path).unwrap();
    assert_eq!(rows.len(), 4);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.session, i);
        assert_eq!(row.run_name, i.to_string());
        assert_eq!(row.output_units, 2);
        assert_eq!(row.status, "completed");
        assert!(row.epochs_run >= 1 && row.epochs_run <= 2);
        assert!(row.best_val_loss.unwrap().is_finite());
        assert!(row.test_mae.is_none());
    }
    // Optimizer varies fastest, then depth
    assert_eq!(rows[1].optimizer, "sgd");
    assert_eq!(rows[2].hidden_layers, 1);

    for session in 0..4 {
        let run_dir = root.join(session.to_string());
        for file in ["hparams.json", "scalars.csv", "histograms.csv", "profile.csv"] {
            assert!(run_dir.join(file).exists(), "missing {}/{}", session, file);
        }
    }

    let hparams: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(root.join("3/hparams.json")).unwrap()).unwrap();
    assert_eq!(hparams["hparams"]["hidden_num_layers"], 1);
    assert_eq!(hparams["hparams"]["optimizer"], "sgd");
    assert_eq!(hparams["metrics"][0]["tag"], "mae");
}

#[test]
fn test_variant_sweep_with_test_report() {
    let dir = tempdir().unwrap();
    let sweep = SweepConfig {
        mode: SweepMode::Variants,
        variants: vec![Topology::Shallow],
        evaluate_on_test: true,
        log_dir: dir.path().to_path_buf(),
        model_version: 1,
        ..Default::default()
    };
    let training = TrainingConfig {
        max_epochs: 1,
        ..quick_training()
    };

    let runner = SweepRunner::new(
        sweep,
        GridConfig::default(),
        training,
        EarlyStoppingConfig::default(),
    );
    let report = runner.run(&partitions(120)).unwrap();

    assert_eq!(report.outcomes.len(), 1);
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.plan.run_name, "shallow");

    let test = outcome.test.as_ref().unwrap();
    assert_eq!(test.count, 6);
    assert!(test.mae.is_finite());
    assert!(test.exact_hits <= test.count);

    let run_dir = dir.path().join("1").join("shallow");
    assert!(run_dir.join("test_report.json").exists());

    let rows = read_summary(&report.summary_path).unwrap();
    assert_eq!(rows[0].test_mae, Some(test.mae));
}
