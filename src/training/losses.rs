//! Regression loss functions

use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Loss minimised during training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    #[default]
    MeanAbsoluteError,
    MeanSquaredError,
}

impl Loss {
    fn check(predictions: &Array2<f64>, targets: &Array2<f64>) -> Result<()> {
        if predictions.dim() != targets.dim() {
            return Err(Error::ShapeMismatch(format!(
                "predictions {:?} vs targets {:?}",
                predictions.dim(),
                targets.dim()
            )));
        }
        if predictions.is_empty() {
            return Err(Error::EmptyDataset("loss over an empty batch".into()));
        }
        Ok(())
    }

    /// Mean loss over the batch
    pub fn value(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> Result<f64> {
        Self::check(predictions, targets)?;
        let n = predictions.len() as f64;
        let diff = predictions - targets;

        Ok(match self {
            Loss::MeanAbsoluteError => diff.mapv(f64::abs).sum() / n,
            Loss::MeanSquaredError => diff.mapv(|d| d * d).sum() / n,
        })
    }

    /// Gradient of `value` with respect to the predictions
    pub fn gradient(
        &self,
        predictions: &Array2<f64>,
        targets: &Array2<f64>,
    ) -> Result<Array2<f64>> {
        Self::check(predictions, targets)?;
        let n = predictions.len() as f64;
        let diff = predictions - targets;

        Ok(match self {
            // sign(0) taken as 0
            Loss::MeanAbsoluteError => diff.mapv(|d| {
                if d > 0.0 {
                    1.0 / n
                } else if d < 0.0 {
                    -1.0 / n
                } else {
                    0.0
                }
            }),
            Loss::MeanSquaredError => diff * (2.0 / n),
        })
    }

    /// Short metric name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Loss::MeanAbsoluteError => "mae",
            Loss::MeanSquaredError => "mse",
        }
    }
}

impl fmt::Display for Loss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
