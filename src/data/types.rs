//! Raw equipment history records and the fixed column schema

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Number of columns in the raw matrix pulled from a data source
pub const RAW_COLUMNS: usize = 7;

/// Raw column holding the day of week (passed through unscaled)
pub const DAY_OF_WEEK_COLUMN: usize = 1;

/// First raw column of the min-max scaled block
pub const SCALED_BLOCK_START: usize = 2;

/// Header of the scaled snapshot CSV, in feature order, label last
pub const SNAPSHOT_COLUMNS: [&str; 6] = [
    "maintenance_day",
    "produced_today",
    "times_down_today",
    "amount_down_today",
    "day_of_week",
    "days_to_maintenance",
];

/// Number of model input features after scaling (snapshot columns minus the label)
pub const FEATURE_COLUMNS: usize = SNAPSHOT_COLUMNS.len() - 1;

/// One day of operational history for a single piece of equipment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Row id (ignored by the model)
    pub id: f64,
    /// Day of week, 0 = Monday
    pub day_of_week: f64,
    /// Days since the last maintenance event
    pub maintenance_day: f64,
    /// Units produced today
    pub produced_today: f64,
    /// Number of stoppages today
    pub times_down_today: f64,
    /// Total downtime today, in minutes
    pub amount_down_today: f64,
    /// Days until the next maintenance event (label)
    pub days_to_maintenance: f64,
}

impl RawRecord {
    /// Row in raw matrix column order
    pub fn to_row(&self) -> [f64; RAW_COLUMNS] {
        [
            self.id,
            self.day_of_week,
            self.maintenance_day,
            self.produced_today,
            self.times_down_today,
            self.amount_down_today,
            self.days_to_maintenance,
        ]
    }
}

/// Stack records into the raw `[N, 7]` matrix expected by the preprocessing stage
pub fn records_to_matrix(records: &[RawRecord]) -> Array2<f64> {
    let mut matrix = Array2::zeros((records.len(), RAW_COLUMNS));
    for (i, record) in records.iter().enumerate() {
        for (j, value) in record.to_row().iter().enumerate() {
            matrix[[i, j]] = *value;
        }
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: f64) -> RawRecord {
        RawRecord {
            id,
            day_of_week: 3.0,
            maintenance_day: 12.0,
            produced_today: 840.0,
            times_down_today: 2.0,
            amount_down_today: 35.0,
            days_to_maintenance: 9.0,
        }
    }

    #[test]
    fn test_records_to_matrix_column_order() {
        let matrix = records_to_matrix(&[record(0.0), record(1.0)]);

        assert_eq!(matrix.dim(), (2, RAW_COLUMNS));
        assert_eq!(matrix[[1, 0]], 1.0);
        assert_eq!(matrix[[0, DAY_OF_WEEK_COLUMN]], 3.0);
        assert_eq!(matrix[[0, SCALED_BLOCK_START]], 12.0);
        assert_eq!(matrix[[0, RAW_COLUMNS - 1]], 9.0);
    }

    #[test]
    fn test_feature_count() {
        assert_eq!(FEATURE_COLUMNS, 5);
    }
}
