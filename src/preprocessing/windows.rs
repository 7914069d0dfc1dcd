//! Sliding-window construction over a time-ordered feature matrix

use ndarray::{s, Array1, Array3, ArrayView1, ArrayView2, Axis};

use crate::error::{Error, Result};

/// Number of windows of length `history` with step `stride` over `n` rows
pub fn window_count(n: usize, history: usize, stride: usize) -> usize {
    if history == 0 || stride == 0 || n < history {
        return 0;
    }
    (n - history) / stride + 1
}

/// Windowed examples: `windows[i]` is `history` consecutive feature rows and
/// `labels[i]` the label observed on the last of those rows
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedDataset {
    windows: Array3<f64>,
    labels: Array1<f64>,
}

impl WindowedDataset {
    /// Wrap prebuilt windows. Shapes must agree on the example axis.
    pub fn new(windows: Array3<f64>, labels: Array1<f64>) -> Result<Self> {
        if windows.len_of(Axis(0)) != labels.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} windows vs {} labels",
                windows.len_of(Axis(0)),
                labels.len()
            )));
        }
        Ok(Self { windows, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Window length (time steps per example)
    pub fn history_length(&self) -> usize {
        self.windows.len_of(Axis(1))
    }

    /// Features per time step
    pub fn n_features(&self) -> usize {
        self.windows.len_of(Axis(2))
    }

    pub fn windows(&self) -> &Array3<f64> {
        &self.windows
    }

    pub fn labels(&self) -> &Array1<f64> {
        &self.labels
    }

    /// Example `i` as (window, label)
    pub fn example(&self, i: usize) -> (ArrayView2<'_, f64>, f64) {
        (self.windows.index_axis(Axis(0), i), self.labels[i])
    }

    /// Iterate examples in order
    pub fn iter(&self) -> impl Iterator<Item = (ArrayView2<'_, f64>, f64)> + '_ {
        self.windows
            .axis_iter(Axis(0))
            .zip(self.labels.iter().copied())
    }

    /// Gather the examples at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            windows: self.windows.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
        }
    }
}

/// Cut `features` into overlapping windows of `history` rows, `stride` apart.
///
/// Window `i` starts at row `i * stride` and its label is
/// `labels[i * stride + history - 1]`. Windows only exist where a full
/// `history`-row run fits, so fewer than `history` rows yields no windows.
pub fn build_windows(
    features: ArrayView2<'_, f64>,
    labels: ArrayView1<'_, f64>,
    history: usize,
    stride: usize,
) -> Result<WindowedDataset> {
    if history == 0 {
        return Err(Error::InvalidConfig("history length must be at least 1".into()));
    }
    if stride == 0 {
        return Err(Error::InvalidConfig("stride must be at least 1".into()));
    }
    if features.nrows() != labels.len() {
        return Err(Error::ShapeMismatch(format!(
            "{} feature rows vs {} labels",
            features.nrows(),
            labels.len()
        )));
    }
    if features.nrows() == 0 {
        return Err(Error::EmptyDataset("no feature rows to window".into()));
    }

    let n = features.nrows();
    let count = window_count(n, history, stride);
    let mut windows = Array3::zeros((count, history, features.ncols()));
    let mut targets = Array1::zeros(count);

    for (i, start) in (0..count).map(|i| (i, i * stride)) {
        windows
            .slice_mut(s![i, .., ..])
            .assign(&features.slice(s![start..start + history, ..]));
        targets[i] = labels[start + history - 1];
    }

    Ok(WindowedDataset {
        windows,
        labels: targets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn ramp(n: usize, features: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, features), |(i, j)| (i * 10 + j) as f64);
        let y = Array1::from_shape_fn(n, |i| i as f64);
        (x, y)
    }

    #[test]
    fn test_window_count_formula() {
        for n in 0..40 {
            for h in 1..8 {
                for s in 1..5 {
                    let expected = if n >= h { (n - h) / s + 1 } else { 0 };
                    assert_eq!(window_count(n, h, s), expected, "n={} h={} s={}", n, h, s);
                }
            }
        }
    }

    #[test]
    fn test_windows_and_labels_align() {
        let (x, y) = ramp(25, 3);
        for stride in 1..4 {
            let history = 6;
            let ds = build_windows(x.view(), y.view(), history, stride).unwrap();
            assert_eq!(ds.len(), window_count(25, history, stride));
            assert_eq!(ds.history_length(), history);

            for (i, (window, label)) in ds.iter().enumerate() {
                let start = i * stride;
                assert_eq!(window.nrows(), history);
                assert_eq!(window[[0, 0]], x[[start, 0]]);
                assert_eq!(window[[history - 1, 2]], x[[start + history - 1, 2]]);
                assert_eq!(label, y[start + history - 1]);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let (x, y) = ramp(30, 2);
        let a = build_windows(x.view(), y.view(), 5, 2).unwrap();
        let b = build_windows(x.view(), y.view(), 5, 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_series_yields_no_windows() {
        let (x, y) = ramp(4, 2);
        let ds = build_windows(x.view(), y.view(), 5, 1).unwrap();
        assert!(ds.is_empty());
    }

    #[test]
    fn test_length_mismatch_fails() {
        let (x, _) = ramp(10, 2);
        let y = Array1::zeros(9);
        let result = build_windows(x.view(), y.view(), 3, 1);
        assert!(matches!(result, Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn test_empty_and_zero_params_fail() {
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        assert!(matches!(
            build_windows(x.view(), y.view(), 3, 1),
            Err(Error::EmptyDataset(_))
        ));

        let (x, y) = ramp(10, 2);
        assert!(build_windows(x.view(), y.view(), 0, 1).is_err());
        assert!(build_windows(x.view(), y.view(), 3, 0).is_err());
    }

    #[test]
    fn test_select_keeps_order() {
        let (x, y) = ramp(12, 1);
        let ds = build_windows(x.view(), y.view(), 3, 1).unwrap();
        let picked = ds.select(&[4, 0, 7]);

        assert_eq!(picked.labels().to_vec(), vec![6.0, 2.0, 9.0]);
    }
}
