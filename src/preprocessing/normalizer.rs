//! Min-max scaling of feature columns

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Min-max scaler, fit once and then applied to any matrix with the same columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinMaxNormalizer {
    min: Option<Array1<f64>>,
    range: Option<Array1<f64>>,
    feature_range: (f64, f64),
}

impl Default for MinMaxNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MinMaxNormalizer {
    /// Scaler targeting [0, 1]
    pub fn new() -> Self {
        Self {
            min: None,
            range: None,
            feature_range: (0.0, 1.0),
        }
    }

    /// Set a custom output range
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.feature_range = (min, max);
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.min.is_some()
    }

    /// Record per-column minimum and range
    pub fn fit(&mut self, data: &ArrayView2<f64>) -> Result<()> {
        if data.nrows() == 0 {
            return Err(Error::EmptyDataset("cannot fit scaler on 0 rows".into()));
        }

        let min = data.fold_axis(Axis(0), f64::INFINITY, |&a, &b| a.min(b));
        let max = data.fold_axis(Axis(0), f64::NEG_INFINITY, |&a, &b| a.max(b));

        // constant columns map to the lower bound
        let range = (&max - &min).mapv(|v| if v.abs() < 1e-12 { 1.0 } else { v });

        self.min = Some(min);
        self.range = Some(range);
        Ok(())
    }

    /// Scale `data` with the fitted parameters
    pub fn transform(&self, data: &ArrayView2<f64>) -> Result<Array2<f64>> {
        let (min, range) = match (&self.min, &self.range) {
            (Some(min), Some(range)) => (min, range),
            _ => return Err(Error::InvalidConfig("scaler used before fit".into())),
        };
        if data.ncols() != min.len() {
            return Err(Error::ShapeMismatch(format!(
                "scaler fit on {} columns, got {}",
                min.len(),
                data.ncols()
            )));
        }

        let (out_min, out_max) = self.feature_range;
        let out_range = out_max - out_min;

        let mut result = Array2::zeros(data.raw_dim());
        for (mut out, row) in result.rows_mut().into_iter().zip(data.rows()) {
            let scaled = (&row - min) / range * out_range + out_min;
            out.assign(&scaled);
        }
        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, data: &ArrayView2<f64>) -> Result<Array2<f64>> {
        self.fit(data)?;
        self.transform(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_fit_transform_unit_range() {
        let data = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let mut scaler = MinMaxNormalizer::new();
        let scaled = scaler.fit_transform(&data.view()).unwrap();

        assert_abs_diff_eq!(scaled[[0, 0]], 0.0);
        assert_abs_diff_eq!(scaled[[1, 0]], 0.5);
        assert_abs_diff_eq!(scaled[[2, 1]], 1.0);
    }

    #[test]
    fn test_constant_column() {
        let data = array![[5.0], [5.0]];
        let mut scaler = MinMaxNormalizer::new();
        let scaled = scaler.fit_transform(&data.view()).unwrap();

        assert_eq!(scaled, array![[0.0], [0.0]]);
    }

    #[test]
    fn test_transform_before_fit() {
        let scaler = MinMaxNormalizer::new();
        let data = array![[1.0]];
        assert!(scaler.transform(&data.view()).is_err());
    }
}
