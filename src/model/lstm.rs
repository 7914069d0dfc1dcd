//! LSTM layer with full backpropagation through time

use ndarray::{concatenate, s, Array1, Array2, Array3, ArrayD, ArrayView2, ArrayView3, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

use super::config::ReturnMode;
use super::param::Parameter;
use crate::error::{Error, Result};

/// Output of a recurrent layer, also used for the gradient flowing back into it
#[derive(Debug, Clone)]
pub enum RecurrentOutput {
    /// `[batch, seq_len, units]`
    Sequence(Array3<f64>),
    /// `[batch, units]`
    Final(Array2<f64>),
}

#[derive(Debug, Clone)]
struct LstmGradients {
    w_x: Array2<f64>,
    w_h: Array2<f64>,
    b: Array1<f64>,
}

/// Activations kept from the last training forward pass, time-major
#[derive(Debug, Clone)]
struct LstmCache {
    x: Array3<f64>,
    h_prev: Array3<f64>,
    c_prev: Array3<f64>,
    gates: Array3<f64>,
    c: Array3<f64>,
}

/// LSTM layer. Gates are packed `[input, forget, cell, output]` along the
/// last weight axis.
#[derive(Debug, Clone)]
pub struct LstmLayer {
    input_size: usize,
    units: usize,
    return_mode: ReturnMode,

    /// `[input_size, 4 * units]`
    w_x: Array2<f64>,
    /// `[units, 4 * units]`
    w_h: Array2<f64>,
    /// `[4 * units]`, forget gate bias starts at 1
    b: Array1<f64>,

    grads: LstmGradients,
    cache: Option<LstmCache>,
}

fn sigmoid(z: ArrayView2<'_, f64>) -> Array2<f64> {
    z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

impl LstmLayer {
    /// Glorot-uniform weights drawn from `rng`
    pub fn new<R: Rng>(
        input_size: usize,
        units: usize,
        return_mode: ReturnMode,
        rng: &mut R,
    ) -> Self {
        let gate_width = 4 * units;
        let limit_x = (6.0 / (input_size + gate_width) as f64).sqrt();
        let limit_h = (6.0 / (units + gate_width) as f64).sqrt();

        let mut b = Array1::zeros(gate_width);
        b.slice_mut(s![units..2 * units]).fill(1.0);

        Self {
            input_size,
            units,
            return_mode,
            w_x: Array2::random_using(
                (input_size, gate_width),
                Uniform::new(-limit_x, limit_x),
                rng,
            ),
            w_h: Array2::random_using((units, gate_width), Uniform::new(-limit_h, limit_h), rng),
            b,
            grads: LstmGradients {
                w_x: Array2::zeros((input_size, gate_width)),
                w_h: Array2::zeros((units, gate_width)),
                b: Array1::zeros(gate_width),
            },
            cache: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn return_mode(&self) -> ReturnMode {
        self.return_mode
    }

    pub fn num_parameters(&self) -> usize {
        self.w_x.len() + self.w_h.len() + self.b.len()
    }

    /// Run the layer over `x` (`[batch, seq_len, input_size]`).
    ///
    /// With `train` set, activations are cached for `backward`.
    pub fn forward(&mut self, x: ArrayView3<'_, f64>, train: bool) -> Result<RecurrentOutput> {
        let (batch, seq_len, features) = x.dim();
        if features != self.input_size {
            return Err(Error::ShapeMismatch(format!(
                "LSTM expects {} features per step, got {}",
                self.input_size, features
            )));
        }

        let u = self.units;
        let mut h = Array2::zeros((batch, u));
        let mut c = Array2::zeros((batch, u));
        let mut outputs = match self.return_mode {
            ReturnMode::Sequence => Some(Array3::zeros((batch, seq_len, u))),
            ReturnMode::Final => None,
        };
        let mut cache = if train {
            Some(LstmCache {
                x: Array3::zeros((seq_len, batch, features)),
                h_prev: Array3::zeros((seq_len, batch, u)),
                c_prev: Array3::zeros((seq_len, batch, u)),
                gates: Array3::zeros((seq_len, batch, 4 * u)),
                c: Array3::zeros((seq_len, batch, u)),
            })
        } else {
            None
        };

        for t in 0..seq_len {
            let x_t = x.slice(s![.., t, ..]);
            let z = x_t.dot(&self.w_x) + h.dot(&self.w_h) + &self.b;

            let input_gate = sigmoid(z.slice(s![.., 0..u]));
            let forget_gate = sigmoid(z.slice(s![.., u..2 * u]));
            let cell_gate = z.slice(s![.., 2 * u..3 * u]).mapv(f64::tanh);
            let output_gate = sigmoid(z.slice(s![.., 3 * u..]));

            let c_next = &forget_gate * &c + &input_gate * &cell_gate;
            let h_next = &output_gate * &c_next.mapv(f64::tanh);

            if let Some(cache) = cache.as_mut() {
                cache.x.slice_mut(s![t, .., ..]).assign(&x_t);
                cache.h_prev.slice_mut(s![t, .., ..]).assign(&h);
                cache.c_prev.slice_mut(s![t, .., ..]).assign(&c);
                let mut gates = cache.gates.slice_mut(s![t, .., ..]);
                gates.slice_mut(s![.., 0..u]).assign(&input_gate);
                gates.slice_mut(s![.., u..2 * u]).assign(&forget_gate);
                gates.slice_mut(s![.., 2 * u..3 * u]).assign(&cell_gate);
                gates.slice_mut(s![.., 3 * u..]).assign(&output_gate);
                cache.c.slice_mut(s![t, .., ..]).assign(&c_next);
            }

            if let Some(outputs) = outputs.as_mut() {
                outputs.slice_mut(s![.., t, ..]).assign(&h_next);
            }

            h = h_next;
            c = c_next;
        }

        self.cache = cache;

        Ok(match outputs {
            Some(sequence) => RecurrentOutput::Sequence(sequence),
            None => RecurrentOutput::Final(h),
        })
    }

    /// Accumulate weight gradients for `d_output` and return the gradient
    /// with respect to the layer input (`[batch, seq_len, input_size]`).
    pub fn backward(&mut self, d_output: &RecurrentOutput) -> Result<Array3<f64>> {
        let cache = self
            .cache
            .as_ref()
            .ok_or_else(|| {
                Error::Backend("LSTM backward called without a training forward pass".into())
            })?;

        let (seq_len, batch, features) = cache.x.dim();
        let u = self.units;

        match (d_output, self.return_mode) {
            (RecurrentOutput::Sequence(d), ReturnMode::Sequence)
                if d.dim() == (batch, seq_len, u) => {}
            (RecurrentOutput::Final(d), ReturnMode::Final) if d.dim() == (batch, u) => {}
            _ => {
                return Err(Error::ShapeMismatch(format!(
                    "gradient does not match LSTM output (batch {}, seq {}, units {}, {:?})",
                    batch, seq_len, u, self.return_mode
                )))
            }
        }

        let mut d_x = Array3::zeros((batch, seq_len, features));
        let mut dh_next = Array2::<f64>::zeros((batch, u));
        let mut dc_next = Array2::<f64>::zeros((batch, u));

        for t in (0..seq_len).rev() {
            let mut dh = dh_next;
            match d_output {
                RecurrentOutput::Sequence(d) => dh += &d.slice(s![.., t, ..]),
                RecurrentOutput::Final(d) if t + 1 == seq_len => dh += d,
                RecurrentOutput::Final(_) => {}
            }

            let gates = cache.gates.slice(s![t, .., ..]);
            let input_gate = gates.slice(s![.., 0..u]);
            let forget_gate = gates.slice(s![.., u..2 * u]);
            let cell_gate = gates.slice(s![.., 2 * u..3 * u]);
            let output_gate = gates.slice(s![.., 3 * u..]);
            let c_prev = cache.c_prev.slice(s![t, .., ..]);
            let tanh_c = cache.c.slice(s![t, .., ..]).mapv(f64::tanh);

            let d_output_gate = &dh * &tanh_c;
            let dc = &dh * &output_gate * &tanh_c.mapv(|v| 1.0 - v * v) + &dc_next;

            let dz_input = &dc * &cell_gate * &input_gate.mapv(|v| v * (1.0 - v));
            let dz_forget = &dc * &c_prev * &forget_gate.mapv(|v| v * (1.0 - v));
            let dz_cell = &dc * &input_gate * &cell_gate.mapv(|v| 1.0 - v * v);
            let dz_output = &d_output_gate * &output_gate.mapv(|v| v * (1.0 - v));
            dc_next = &dc * &forget_gate;

            let dz = concatenate(
                Axis(1),
                &[dz_input.view(), dz_forget.view(), dz_cell.view(), dz_output.view()],
            )
            .map_err(|e| Error::Backend(e.to_string()))?;

            self.grads.w_x += &cache.x.slice(s![t, .., ..]).reversed_axes().dot(&dz);
            self.grads.w_h += &cache.h_prev.slice(s![t, .., ..]).reversed_axes().dot(&dz);
            self.grads.b += &dz.sum_axis(Axis(0));

            d_x.slice_mut(s![.., t, ..]).assign(&dz.dot(&self.w_x.t()));
            dh_next = dz.dot(&self.w_h.t());
        }

        Ok(d_x)
    }

    pub fn zero_grad(&mut self) {
        self.grads.w_x.fill(0.0);
        self.grads.w_h.fill(0.0);
        self.grads.b.fill(0.0);
    }

    /// Weights and gradients for the optimizer
    pub fn parameters(&mut self, prefix: &str) -> Vec<Parameter<'_>> {
        let Self { w_x, w_h, b, grads, .. } = self;
        vec![
            Parameter::new(
                format!("{}/kernel", prefix),
                w_x.view_mut().into_dyn(),
                grads.w_x.view().into_dyn(),
            ),
            Parameter::new(
                format!("{}/recurrent_kernel", prefix),
                w_h.view_mut().into_dyn(),
                grads.w_h.view().into_dyn(),
            ),
            Parameter::new(
                format!("{}/bias", prefix),
                b.view_mut().into_dyn(),
                grads.b.view().into_dyn(),
            ),
        ]
    }

    /// Owned copies of the weights, in `parameters` order
    pub fn weights(&self) -> Vec<ArrayD<f64>> {
        vec![
            self.w_x.clone().into_dyn(),
            self.w_h.clone().into_dyn(),
            self.b.clone().into_dyn(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn layer(input: usize, units: usize, mode: ReturnMode) -> LstmLayer {
        LstmLayer::new(input, units, mode, &mut StdRng::seed_from_u64(3))
    }

    fn input(batch: usize, seq: usize, features: usize) -> Array3<f64> {
        Array3::from_shape_fn((batch, seq, features), |(b, t, f)| {
            ((b * 7 + t * 3 + f) as f64 * 0.37).sin()
        })
    }

    #[test]
    fn test_output_shapes() {
        let x = input(2, 6, 5);

        match layer(5, 4, ReturnMode::Sequence).forward(x.view(), false).unwrap() {
            RecurrentOutput::Sequence(out) => assert_eq!(out.dim(), (2, 6, 4)),
            other => panic!("expected sequence, got {:?}", other),
        }
        match layer(5, 4, ReturnMode::Final).forward(x.view(), false).unwrap() {
            RecurrentOutput::Final(out) => assert_eq!(out.dim(), (2, 4)),
            other => panic!("expected final, got {:?}", other),
        }
    }

    #[test]
    fn test_final_equals_last_sequence_step() {
        let x = input(1, 5, 3);
        let mut seq_layer = layer(3, 4, ReturnMode::Sequence);
        let mut final_layer = seq_layer.clone();
        final_layer.return_mode = ReturnMode::Final;

        let seq = match seq_layer.forward(x.view(), false).unwrap() {
            RecurrentOutput::Sequence(s) => s,
            _ => unreachable!(),
        };
        let last = match final_layer.forward(x.view(), false).unwrap() {
            RecurrentOutput::Final(h) => h,
            _ => unreachable!(),
        };
        assert_eq!(seq.slice(s![.., 4, ..]), last);
    }

    #[test]
    fn test_feature_mismatch() {
        let x = input(1, 3, 2);
        assert!(layer(5, 4, ReturnMode::Final).forward(x.view(), false).is_err());
    }

    #[test]
    fn test_backward_requires_forward() {
        let mut lstm = layer(3, 2, ReturnMode::Final);
        let grad = RecurrentOutput::Final(Array2::ones((1, 2)));
        assert!(lstm.backward(&grad).is_err());
    }

    /// Compare analytic input gradients of sum(h_T) against central differences
    #[test]
    fn test_input_gradient_matches_finite_difference() {
        let x = input(1, 4, 3);
        let mut lstm = layer(3, 2, ReturnMode::Final);

        lstm.forward(x.view(), true).unwrap();
        let d_x = lstm.backward(&RecurrentOutput::Final(Array2::ones((1, 2)))).unwrap();

        let loss = |lstm: &mut LstmLayer, x: &Array3<f64>| -> f64 {
            match lstm.forward(x.view(), false).unwrap() {
                RecurrentOutput::Final(h) => h.sum(),
                _ => unreachable!(),
            }
        };

        let eps = 1e-6;
        for t in 0..4 {
            for f in 0..3 {
                let mut plus = x.clone();
                plus[[0, t, f]] += eps;
                let mut minus = x.clone();
                minus[[0, t, f]] -= eps;
                let numeric = (loss(&mut lstm, &plus) - loss(&mut lstm, &minus)) / (2.0 * eps);
                assert!(
                    (numeric - d_x[[0, t, f]]).abs() < 1e-6,
                    "t={} f={} numeric={} analytic={}",
                    t,
                    f,
                    numeric,
                    d_x[[0, t, f]]
                );
            }
        }
    }

    #[test]
    fn test_zero_grad() {
        let x = input(2, 3, 3);
        let mut lstm = layer(3, 2, ReturnMode::Final);
        lstm.forward(x.view(), true).unwrap();
        lstm.backward(&RecurrentOutput::Final(Array2::ones((2, 2)))).unwrap();
        assert!(lstm.grads.w_x.iter().any(|g| *g != 0.0));

        lstm.zero_grad();
        assert!(lstm.grads.w_x.iter().all(|g| *g == 0.0));
        assert!(lstm.grads.b.iter().all(|g| *g == 0.0));
    }

    #[test]
    fn test_parameter_count() {
        let lstm = layer(5, 50, ReturnMode::Final);
        assert_eq!(lstm.num_parameters(), 4 * 50 * (5 + 50 + 1));
    }
}
