//! Dense (Fully Connected) Layer
//!
//! Linear projection `output = input * weights + bias`, used as the
//! regression head after the recurrent stack.

use ndarray::{Array1, Array2, ArrayD, ArrayView2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

use super::param::Parameter;
use crate::error::{Error, Result};

/// Dense layer with linear activation
#[derive(Debug, Clone)]
pub struct Dense {
    /// Weight matrix (input_size x output_size)
    weights: Array2<f64>,
    /// Bias vector (output_size)
    biases: Array1<f64>,

    grad_weights: Array2<f64>,
    grad_biases: Array1<f64>,

    // Cached for backpropagation
    last_input: Option<Array2<f64>>,
}

impl Dense {
    /// Create a new dense layer with Xavier initialization
    pub fn new<R: Rng>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (input_size + output_size) as f64).sqrt();

        Self {
            weights: Array2::random_using(
                (input_size, output_size),
                Uniform::new(-limit, limit),
                rng,
            ),
            biases: Array1::zeros(output_size),
            grad_weights: Array2::zeros((input_size, output_size)),
            grad_biases: Array1::zeros(output_size),
            last_input: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    pub fn num_parameters(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    /// Forward pass, caching the input when `training`
    pub fn forward(&mut self, input: ArrayView2<'_, f64>, training: bool) -> Result<Array2<f64>> {
        if input.ncols() != self.input_size() {
            return Err(Error::ShapeMismatch(format!(
                "dense layer expects {} inputs, got {}",
                self.input_size(),
                input.ncols()
            )));
        }

        self.last_input = if training { Some(input.to_owned()) } else { None };
        Ok(input.dot(&self.weights) + &self.biases)
    }

    /// Accumulate weight gradients and return the input gradient
    pub fn backward(&mut self, output_gradient: &Array2<f64>) -> Result<Array2<f64>> {
        let input = self
            .last_input
            .as_ref()
            .ok_or_else(|| {
                Error::Backend("dense backward called without a training forward pass".into())
            })?;

        if output_gradient.dim() != (input.nrows(), self.output_size()) {
            return Err(Error::ShapeMismatch(format!(
                "dense gradient has shape {:?}, expected ({}, {})",
                output_gradient.dim(),
                input.nrows(),
                self.output_size()
            )));
        }

        self.grad_weights += &input.t().dot(output_gradient);
        self.grad_biases += &output_gradient.sum_axis(Axis(0));

        Ok(output_gradient.dot(&self.weights.t()))
    }

    pub fn zero_grad(&mut self) {
        self.grad_weights.fill(0.0);
        self.grad_biases.fill(0.0);
    }

    pub fn parameters(&mut self, prefix: &str) -> Vec<Parameter<'_>> {
        let Self {
            weights,
            biases,
            grad_weights,
            grad_biases,
            ..
        } = self;
        vec![
            Parameter::new(
                format!("{}/kernel", prefix),
                weights.view_mut().into_dyn(),
                grad_weights.view().into_dyn(),
            ),
            Parameter::new(
                format!("{}/bias", prefix),
                biases.view_mut().into_dyn(),
                grad_biases.view().into_dyn(),
            ),
        ]
    }

    pub fn weights(&self) -> Vec<ArrayD<f64>> {
        vec![self.weights.clone().into_dyn(), self.biases.clone().into_dyn()]
    }
}
