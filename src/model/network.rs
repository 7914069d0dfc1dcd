//! Stacked LSTM regressor
//!
//! A stack of LSTM layers (all but the last returning sequences) followed
//! by a single-unit dense projection.

use ndarray::{Array1, Array2, Array3, ArrayView3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use super::config::{HyperParams, LayerSpec, ModelSpec};
use super::layers::Dense;
use super::lstm::{LstmLayer, RecurrentOutput};
use super::param::{Parameter, WeightHistogram, WeightSnapshot};
use crate::error::{Error, Result};

/// Recurrent network predicting one value per window
#[derive(Debug, Clone)]
pub struct RecurrentNetwork {
    name: String,
    spec: ModelSpec,
    recurrent: Vec<LstmLayer>,
    head: Dense,
}

impl RecurrentNetwork {
    /// Build the layers described by `spec`, drawing weights from `seed`
    pub fn from_spec(name: impl Into<String>, spec: ModelSpec, seed: u64) -> Result<Self> {
        spec.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut recurrent = Vec::with_capacity(spec.recurrent_layers());
        let mut input_size = spec.input_features;
        let mut head = None;

        for layer in &spec.layers {
            match *layer {
                LayerSpec::Lstm { units, return_mode } => {
                    recurrent.push(LstmLayer::new(input_size, units, return_mode, &mut rng));
                    input_size = units;
                }
                LayerSpec::Dense { units } => {
                    head = Some(Dense::new(input_size, units, &mut rng));
                    input_size = units;
                }
            }
        }

        let head = head.ok_or_else(|| Error::InvalidConfig("model has no dense head".into()))?;
        let name = name.into();
        debug!("Built model {} with {} LSTM layers", name, recurrent.len());

        Ok(Self {
            name,
            spec,
            recurrent,
            head,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description of the layer stack
    pub fn topology(&self) -> &ModelSpec {
        &self.spec
    }

    /// Forward pass over a batch of windows `[batch, history, features]`,
    /// returning `[batch, 1]` predictions
    pub fn forward(&mut self, x: ArrayView3<'_, f64>, train: bool) -> Result<Array2<f64>> {
        let mut sequence: Option<Array3<f64>> = None;
        let mut last_state: Option<Array2<f64>> = None;

        for layer in self.recurrent.iter_mut() {
            let input = match &sequence {
                Some(seq) => seq.view(),
                None => x.view(),
            };
            match layer.forward(input, train)? {
                RecurrentOutput::Sequence(seq) => sequence = Some(seq),
                RecurrentOutput::Final(h) => {
                    last_state = Some(h);
                    break;
                }
            }
        }

        let state = last_state
            .ok_or_else(|| Error::Backend("recurrent stack did not produce a final state".into()))?;
        self.head.forward(state.view(), train)
    }

    /// Inference-mode predictions, one per window
    pub fn predict(&mut self, x: ArrayView3<'_, f64>) -> Result<Array1<f64>> {
        let output = self.forward(x, false)?;
        Ok(output.column(0).to_owned())
    }

    /// Backpropagate `d_output` (`[batch, 1]`) through the whole stack,
    /// accumulating gradients in every layer
    pub fn backward(&mut self, d_output: &Array2<f64>) -> Result<()> {
        let d_state = self.head.backward(d_output)?;

        let mut grad = RecurrentOutput::Final(d_state);
        for layer in self.recurrent.iter_mut().rev() {
            let d_input = layer.backward(&grad)?;
            grad = RecurrentOutput::Sequence(d_input);
        }
        Ok(())
    }

    pub fn zero_grad(&mut self) {
        for layer in self.recurrent.iter_mut() {
            layer.zero_grad();
        }
        self.head.zero_grad();
    }

    /// Every trainable tensor with its gradient, in a fixed order
    pub fn parameters(&mut self) -> Vec<Parameter<'_>> {
        let mut params = Vec::new();
        for (i, layer) in self.recurrent.iter_mut().enumerate() {
            params.extend(layer.parameters(&format!("lstm_{}", i)));
        }
        params.extend(self.head.parameters("dense"));
        params
    }

    /// Parameter names in `parameters()` order
    pub fn parameter_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for i in 0..self.recurrent.len() {
            for tensor in ["kernel", "recurrent_kernel", "bias"] {
                names.push(format!("lstm_{}/{}", i, tensor));
            }
        }
        names.push("dense/kernel".to_string());
        names.push("dense/bias".to_string());
        names
    }

    /// Owned copy of all weights
    pub fn snapshot_weights(&self) -> WeightSnapshot {
        let mut snapshot: WeightSnapshot =
            self.recurrent.iter().flat_map(|l| l.weights()).collect();
        snapshot.extend(self.head.weights());
        snapshot
    }

    /// Overwrite all weights from a snapshot taken on this network
    pub fn restore_weights(&mut self, snapshot: &WeightSnapshot) -> Result<()> {
        let mut params = self.parameters();
        if params.len() != snapshot.len() {
            return Err(Error::ShapeMismatch(format!(
                "snapshot has {} tensors, model has {}",
                snapshot.len(),
                params.len()
            )));
        }

        for (param, saved) in params.iter_mut().zip(snapshot) {
            if param.value.shape() != saved.shape() {
                return Err(Error::ShapeMismatch(format!(
                    "snapshot tensor for {} has shape {:?}, expected {:?}",
                    param.name,
                    saved.shape(),
                    param.value.shape()
                )));
            }
            param.value.assign(saved);
        }
        Ok(())
    }

    /// Summary statistics of every weight tensor
    pub fn weight_histograms(&self) -> Vec<WeightHistogram> {
        self.parameter_names()
            .iter()
            .zip(self.snapshot_weights())
            .map(|(name, values)| WeightHistogram::from_view(name, &values.view()))
            .collect()
    }

    pub fn num_parameters(&self) -> usize {
        self.recurrent
            .iter()
            .map(LstmLayer::num_parameters)
            .sum::<usize>()
            + self.head.num_parameters()
    }

    /// Keras-style layer table
    pub fn summary(&self) -> String {
        format!(
            "Model: \"{}\"\n{}Total params: {}",
            self.name,
            self.spec,
            self.num_parameters()
        )
    }
}

/// Build the recurrent regressor for one grid point.
///
/// `hidden_layers = 0` gives a single LSTM emitting its final state;
/// `hidden_layers = k` gives `k + 1` LSTMs where only the last collapses
/// the sequence. Either way a `Dense(1)` head follows.
pub fn build_model(
    name: impl Into<String>,
    hparams: &HyperParams,
    input_features: usize,
    seed: u64,
) -> Result<RecurrentNetwork> {
    if hparams.output_units == 0 {
        return Err(Error::InvalidConfig("output_units must be at least 1".into()));
    }
    let spec = ModelSpec::from_hyperparams(hparams, input_features);
    RecurrentNetwork::from_spec(name, spec, seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::ReturnMode;
    use crate::model::optimizer::OptimizerKind;
    use approx::assert_abs_diff_eq;

    fn windows(batch: usize, history: usize, features: usize) -> Array3<f64> {
        Array3::from_shape_fn((batch, history, features), |(b, t, f)| {
            ((b + 2 * t + 3 * f) as f64 * 0.1).cos()
        })
    }

    #[test]
    fn test_build_model_layers() {
        for hidden in [0, 1, 4] {
            let hp = HyperParams::new(hidden, 8, OptimizerKind::Adam);
            let model = build_model("m", &hp, 5, 1).unwrap();

            assert_eq!(model.recurrent.len(), hidden + 1);
            assert_eq!(model.topology().recurrent_layers(), hidden + 1);
            let finals: Vec<_> = model
                .recurrent
                .iter()
                .map(|l| l.return_mode() == ReturnMode::Final)
                .collect();
            assert_eq!(finals.iter().filter(|f| **f).count(), 1);
            assert!(finals[hidden]);
            assert_eq!(model.head.output_size(), 1);
        }
    }

    #[test]
    fn test_forward_shape() {
        let hp = HyperParams::new(1, 6, OptimizerKind::Sgd);
        let mut model = build_model("m", &hp, 5, 7).unwrap();
        let out = model.forward(windows(3, 10, 5).view(), false).unwrap();

        assert_eq!(out.dim(), (3, 1));
        assert_eq!(model.predict(windows(3, 10, 5).view()).unwrap().len(), 3);
    }

    #[test]
    fn test_forward_feeds_sequences_through_deep_stacks() {
        let x = windows(2, 8, 5);
        for hidden in [0, 2, 4] {
            let hp = HyperParams::new(hidden, 3, OptimizerKind::Nadam);
            let mut model = build_model("m", &hp, 5, 11).unwrap();

            let train_out = model.forward(x.view(), true).unwrap();
            let eval_out = model.forward(x.view(), false).unwrap();
            assert_eq!(train_out.dim(), (2, 1));
            assert!(eval_out.iter().all(|v| v.is_finite()));
            for (a, b) in train_out.iter().zip(eval_out.iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_same_seed_same_weights() {
        let hp = HyperParams::new(1, 4, OptimizerKind::Adam);
        let a = build_model("a", &hp, 5, 11).unwrap();
        let b = build_model("b", &hp, 5, 11).unwrap();
        assert_eq!(a.snapshot_weights(), b.snapshot_weights());
    }

    #[test]
    fn test_parameters_match_names_and_count() {
        let hp = HyperParams::new(2, 4, OptimizerKind::Adam);
        let mut model = build_model("m", &hp, 5, 0).unwrap();
        let names = model.parameter_names();
        let expected = model.num_parameters();

        let params = model.parameters();
        assert_eq!(params.len(), names.len());
        for (p, n) in params.iter().zip(&names) {
            assert_eq!(&p.name, n);
        }
        assert_eq!(params.iter().map(|p| p.value.len()).sum::<usize>(), expected);
    }

    #[test]
    fn test_restore_weights() {
        let hp = HyperParams::new(0, 3, OptimizerKind::Adam);
        let mut model = build_model("m", &hp, 5, 0).unwrap();
        let saved = model.snapshot_weights();

        for mut p in model.parameters() {
            p.value.fill(0.5);
        }
        assert_ne!(model.snapshot_weights(), saved);

        model.restore_weights(&saved).unwrap();
        assert_eq!(model.snapshot_weights(), saved);
    }

    #[test]
    fn test_training_step_reduces_loss() {
        let hp = HyperParams::new(1, 4, OptimizerKind::Adam);
        let mut model = build_model("m", &hp, 5, 3).unwrap();
        let mut optimizer = hp.optimizer.build(Some(0.01));
        let x = windows(4, 6, 5);
        let target = Array2::from_elem((4, 1), 0.7);

        let mse = |pred: &Array2<f64>| (pred - &target).mapv(|d| d * d).mean().unwrap_or(0.0);
        let before = mse(&model.forward(x.view(), false).unwrap());

        for _ in 0..50 {
            model.zero_grad();
            let pred = model.forward(x.view(), true).unwrap();
            let grad = (&pred - &target) * (2.0 / 4.0);
            model.backward(&grad).unwrap();
            optimizer.step(&mut model.parameters()).unwrap();
        }

        let after = mse(&model.forward(x.view(), false).unwrap());
        assert!(after < before, "loss went from {} to {}", before, after);
    }

    #[test]
    fn test_histograms_cover_all_tensors() {
        let hp = HyperParams::new(0, 2, OptimizerKind::Adam);
        let model = build_model("m", &hp, 5, 0).unwrap();
        let hists = model.weight_histograms();

        assert_eq!(hists.len(), 5);
        assert_eq!(hists[2].name, "lstm_0/bias");
        // Forget gate bias starts at 1, the other gates at 0
        assert_abs_diff_eq!(hists[2].max, 1.0);
        assert_abs_diff_eq!(hists[2].min, 0.0);
    }

    #[test]
    fn test_summary_mentions_totals() {
        let hp = HyperParams::new(0, 50, OptimizerKind::Adam);
        let model = build_model("shallow", &hp, 5, 0).unwrap();
        let summary = model.summary();

        assert!(summary.contains("Model: \"shallow\""));
        assert!(summary.contains(&format!("Total params: {}", 11200 + 51)));
    }

    #[test]
    fn test_zero_units_rejected() {
        let hp = HyperParams::new(0, 0, OptimizerKind::Adam);
        assert!(build_model("m", &hp, 5, 0).is_err());
    }
}
