//! Turns the raw equipment matrix into scaled features and windowed examples

use std::path::Path;

use csv::Writer;
use ndarray::{concatenate, s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::normalizer::MinMaxNormalizer;
use super::windows::{build_windows, WindowedDataset};
use crate::data::{DAY_OF_WEEK_COLUMN, RAW_COLUMNS, SCALED_BLOCK_START, SNAPSHOT_COLUMNS};
use crate::error::{Error, Result};

/// Scaled feature matrix plus the raw label column
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// `[N, 5]`: scaled maintenance_day, produced_today, times_down_today,
    /// amount_down_today, then raw day_of_week
    pub features: Array2<f64>,
    /// `[N]`: days_to_maintenance, unscaled
    pub labels: Array1<f64>,
}

impl PreparedData {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Write features and label to CSV with the fixed snapshot header
    pub fn write_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = Writer::from_path(path.as_ref())?;
        writer.write_record(SNAPSHOT_COLUMNS)?;

        for (row, label) in self.features.rows().into_iter().zip(self.labels.iter()) {
            let mut record: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            record.push(label.to_string());
            writer.write_record(&record)?;
        }

        writer.flush()?;
        info!("Wrote scaled snapshot of {} rows to {}", self.len(), path.as_ref().display());
        Ok(())
    }
}

/// Scales the raw matrix and cuts it into history windows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataProcessor {
    /// Days of history per window
    pub history_length: usize,
    /// Days between consecutive window starts
    pub stride: usize,
    scaler: MinMaxNormalizer,
}

impl DataProcessor {
    pub fn new(history_length: usize, stride: usize) -> Self {
        Self {
            history_length,
            stride,
            scaler: MinMaxNormalizer::new(),
        }
    }

    /// The scaler, fitted after `prepare`
    pub fn scaler(&self) -> &MinMaxNormalizer {
        &self.scaler
    }

    /// Scale columns `2..end-1` over the whole dataset and append column 1
    /// unscaled. The last column becomes the label.
    ///
    /// The scaler sees every row, including rows that later land in the
    /// validation and test partitions.
    pub fn prepare(&mut self, raw: &Array2<f64>) -> Result<PreparedData> {
        if raw.nrows() == 0 {
            return Err(Error::EmptyDataset("raw matrix has no rows".into()));
        }
        if raw.ncols() != RAW_COLUMNS {
            return Err(Error::ShapeMismatch(format!(
                "raw matrix has {} columns, expected {}",
                raw.ncols(),
                RAW_COLUMNS
            )));
        }

        let label_column = raw.ncols() - 1;
        let block = raw.slice(s![.., SCALED_BLOCK_START..label_column]);
        let scaled = self.scaler.fit_transform(&block)?;
        let day_of_week = raw.slice(s![.., DAY_OF_WEEK_COLUMN..DAY_OF_WEEK_COLUMN + 1]);

        let features = concatenate(Axis(1), &[scaled.view(), day_of_week])
            .map_err(|e| Error::ShapeMismatch(e.to_string()))?;
        let labels = raw.column(label_column).to_owned();

        Ok(PreparedData { features, labels })
    }

    /// Window prepared data with this processor's history length and stride
    pub fn windows(&self, data: &PreparedData) -> Result<WindowedDataset> {
        info!(
            "Making timestep sets (step size: {}, history: {} days, target size: 1 day)",
            self.stride, self.history_length
        );

        let dataset = build_windows(
            data.features.view(),
            data.labels.view(),
            self.history_length,
            self.stride,
        )?;

        if dataset.is_empty() {
            return Err(Error::InsufficientData(format!(
                "{} rows cannot fill a single {}-day window",
                data.len(),
                self.history_length
            )));
        }
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{records_to_matrix, RawRecord, FEATURE_COLUMNS};
    use approx::assert_abs_diff_eq;
    use tempfile::NamedTempFile;

    fn raw(n: usize) -> Array2<f64> {
        let records: Vec<RawRecord> = (0..n)
            .map(|i| RawRecord {
                id: i as f64,
                day_of_week: (i % 7) as f64,
                maintenance_day: (i % 30) as f64,
                produced_today: 500.0 + i as f64,
                times_down_today: (i % 3) as f64,
                amount_down_today: (i % 5) as f64 * 10.0,
                days_to_maintenance: (30 - i % 30) as f64,
            })
            .collect();
        records_to_matrix(&records)
    }

    #[test]
    fn test_prepare_layout() {
        let mut processor = DataProcessor::new(10, 1);
        let data = processor.prepare(&raw(40)).unwrap();

        assert_eq!(data.features.dim(), (40, FEATURE_COLUMNS));
        // produced_today ramps 500..539 so it scales linearly
        assert_abs_diff_eq!(data.features[[0, 1]], 0.0);
        assert_abs_diff_eq!(data.features[[39, 1]], 1.0);
        // day_of_week passes through unscaled, last feature column
        assert_eq!(data.features[[6, 4]], 6.0);
        assert_eq!(data.labels[0], 30.0);
        assert!(processor.scaler().is_fitted());
    }

    #[test]
    fn test_prepare_rejects_wrong_width() {
        let mut processor = DataProcessor::new(10, 1);
        let result = processor.prepare(&Array2::zeros((20, 4)));
        assert!(matches!(result, Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn test_windows_insufficient_rows() {
        let mut processor = DataProcessor::new(60, 1);
        let data = processor.prepare(&raw(30)).unwrap();
        assert!(matches!(
            processor.windows(&data),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn test_snapshot_header() {
        let mut processor = DataProcessor::new(5, 1);
        let data = processor.prepare(&raw(8)).unwrap();
        let temp_file = NamedTempFile::new().unwrap();

        data.write_snapshot(temp_file.path()).unwrap();
        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        let mut lines = content.lines();

        assert_eq!(
            lines.next().unwrap(),
            "maintenance_day,produced_today,times_down_today,amount_down_today,day_of_week,days_to_maintenance"
        );
        assert_eq!(lines.count(), 8);
    }
}
