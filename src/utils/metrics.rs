//! Regression metrics for held-out evaluation

use ndarray::Array1;

/// Mean Squared Error
pub fn mse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let diff = y_true - y_pred;
    diff.mapv(|x| x * x).mean().unwrap_or(0.0)
}

/// Root Mean Squared Error
pub fn rmse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    mse(y_true, y_pred).sqrt()
}

/// Mean Absolute Error
pub fn mae(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let diff = y_true - y_pred;
    diff.mapv(f64::abs).mean().unwrap_or(0.0)
}

/// MAE with predictions rounded to whole days first
pub fn rounded_mae(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    mae(y_true, &y_pred.mapv(f64::round))
}

/// Count of rounded predictions that hit the label exactly
pub fn exact_hits(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> usize {
    y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (p.round() - **t).abs() < 1e-9)
        .count()
}

/// R² score (coefficient of determination)
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);

    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - (ss_res / ss_tot)
    }
}
