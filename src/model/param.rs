//! Trainable parameter handles shared between layers and optimizers

use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD};
use serde::Serialize;

/// A weight tensor paired with its accumulated gradient
pub struct Parameter<'a> {
    /// `layer/tensor` name, used in diagnostics
    pub name: String,
    pub value: ArrayViewMutD<'a, f64>,
    pub grad: ArrayViewD<'a, f64>,
}

impl<'a> Parameter<'a> {
    pub fn new(name: String, value: ArrayViewMutD<'a, f64>, grad: ArrayViewD<'a, f64>) -> Self {
        Self { name, value, grad }
    }
}

/// Summary statistics of one weight tensor, logged once per epoch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightHistogram {
    pub name: String,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl WeightHistogram {
    pub fn from_view(name: &str, values: &ArrayViewD<'_, f64>) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                name: name.to_string(),
                count,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                std: 0.0,
            };
        }

        let min = values.fold(f64::INFINITY, |a, &b| a.min(b));
        let max = values.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let mean = values.sum() / count as f64;
        let var = values.fold(0.0, |acc, &v| acc + (v - mean).powi(2)) / count as f64;

        Self {
            name: name.to_string(),
            count,
            min,
            max,
            mean,
            std: var.sqrt(),
        }
    }
}

/// Owned copy of every weight tensor, in `parameters()` order
pub type WeightSnapshot = Vec<ArrayD<f64>>;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_histogram() {
        let values = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        let hist = WeightHistogram::from_view("dense/kernel", &values.view());

        assert_eq!(hist.count, 4);
        assert_eq!(hist.min, 1.0);
        assert_eq!(hist.max, 4.0);
        assert_abs_diff_eq!(hist.mean, 2.5);
        assert_abs_diff_eq!(hist.std, 1.25f64.sqrt(), epsilon = 1e-12);
    }
}
