//! Sweep-level summary, one CSV row per session

use std::fs;
use std::path::Path;

use csv::{Reader, Writer};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One finished (or failed) session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub session: usize,
    pub run_name: String,
    pub hidden_layers: usize,
    pub output_units: usize,
    pub optimizer: String,
    pub epochs_run: usize,
    pub best_val_loss: Option<f64>,
    pub stopped_early: bool,
    pub test_mae: Option<f64>,
    /// `completed` or `failed: <reason>`
    pub status: String,
}

/// Write `rows` to `path`, creating parent directories
pub fn write_summary<P: AsRef<Path>>(rows: &[SummaryRow], path: P) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a summary written by `write_summary`
pub fn read_summary<P: AsRef<Path>>(path: P) -> Result<Vec<SummaryRow>> {
    let mut reader = Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_summary_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("10/sweep_summary.csv");
        let rows = vec![
            SummaryRow {
                session: 0,
                run_name: "0".into(),
                hidden_layers: 0,
                output_units: 50,
                optimizer: "nadam".into(),
                epochs_run: 12,
                best_val_loss: Some(3.25),
                stopped_early: true,
                test_mae: None,
                status: "completed".into(),
            },
            SummaryRow {
                session: 1,
                run_name: "1".into(),
                hidden_layers: 0,
                output_units: 50,
                optimizer: "adam".into(),
                epochs_run: 0,
                best_val_loss: None,
                stopped_early: false,
                test_mae: None,
                status: "failed: loss became NaN".into(),
            },
        ];

        write_summary(&rows, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("session,run_name,hidden_layers,output_units,optimizer"));

        assert_eq!(read_summary(&path).unwrap(), rows);
    }
}
