//! Optimization Algorithms
//!
//! Gradient-based weight updates with the usual Keras defaults:
//! - SGD (learning rate 0.01)
//! - Adam (Adaptive Moment Estimation)
//! - Nadam (Adam with Nesterov momentum)
//! - RMSprop

use std::fmt;
use std::str::FromStr;

use ndarray::{ArrayD, Zip};
use serde::{Deserialize, Serialize};

use super::param::Parameter;
use crate::error::{Error, Result};

/// Optimizer trait for weight updates
pub trait Optimizer: Send {
    /// Apply one update to every parameter using its accumulated gradient
    fn step(&mut self, params: &mut [Parameter<'_>]) -> Result<()>;

    /// Reset optimizer state (for new training run)
    fn reset(&mut self);

    fn kind(&self) -> OptimizerKind;

    fn learning_rate(&self) -> f64;
}

/// Lazily allocate per-parameter state, or check it still matches
fn ensure_state(state: &mut Vec<ArrayD<f64>>, params: &[Parameter<'_>]) -> Result<()> {
    if state.is_empty() {
        *state = params.iter().map(|p| ArrayD::zeros(p.value.raw_dim())).collect();
        return Ok(());
    }

    if state.len() != params.len() {
        return Err(Error::ShapeMismatch(format!(
            "optimizer tracks {} tensors, got {}",
            state.len(),
            params.len()
        )));
    }
    for (s, p) in state.iter().zip(params) {
        if s.shape() != p.value.shape() || p.grad.shape() != p.value.shape() {
            return Err(Error::ShapeMismatch(format!(
                "optimizer state for {} has shape {:?}, parameter {:?}, gradient {:?}",
                p.name,
                s.shape(),
                p.value.shape(),
                p.grad.shape()
            )));
        }
    }
    Ok(())
}

/// Plain stochastic gradient descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }
}

impl Default for Sgd {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut [Parameter<'_>]) -> Result<()> {
        let lr = self.learning_rate;
        for p in params.iter_mut() {
            if p.grad.shape() != p.value.shape() {
                return Err(Error::ShapeMismatch(format!("gradient shape differs for {}", p.name)));
            }
            Zip::from(&mut p.value).and(&p.grad).for_each(|w, &g| *w -= lr * g);
        }
        Ok(())
    }

    fn reset(&mut self) {}

    fn kind(&self) -> OptimizerKind {
        OptimizerKind::Sgd
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

/// Adam optimizer (Adaptive Moment Estimation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    #[serde(skip)]
    t: i32,
    #[serde(skip)]
    m: Vec<ArrayD<f64>>,
    #[serde(skip)]
    v: Vec<ArrayD<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(1e-3)
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [Parameter<'_>]) -> Result<()> {
        ensure_state(&mut self.m, params)?;
        ensure_state(&mut self.v, params)?;
        self.t += 1;

        let (lr, b1, b2, eps) = (self.learning_rate, self.beta1, self.beta2, self.epsilon);
        let m_correction = 1.0 - b1.powi(self.t);
        let v_correction = 1.0 - b2.powi(self.t);

        for ((p, m), v) in params.iter_mut().zip(&mut self.m).zip(&mut self.v) {
            Zip::from(&mut p.value)
                .and(&p.grad)
                .and(m)
                .and(v)
                .for_each(|w, &g, m, v| {
                    *m = b1 * *m + (1.0 - b1) * g;
                    *v = b2 * *v + (1.0 - b2) * g * g;
                    let m_hat = *m / m_correction;
                    let v_hat = *v / v_correction;
                    *w -= lr * m_hat / (v_hat.sqrt() + eps);
                });
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.t = 0;
        self.m.clear();
        self.v.clear();
    }

    fn kind(&self) -> OptimizerKind {
        OptimizerKind::Adam
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

/// Adam with Nesterov momentum and the Keras momentum schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nadam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    #[serde(skip)]
    t: i32,
    #[serde(skip)]
    m_schedule: f64,
    #[serde(skip)]
    m: Vec<ArrayD<f64>>,
    #[serde(skip)]
    v: Vec<ArrayD<f64>>,
}

impl Nadam {
    const SCHEDULE_DECAY: f64 = 0.004;

    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            t: 0,
            m_schedule: 1.0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    fn momentum_cache(&self, t: i32) -> f64 {
        self.beta1 * (1.0 - 0.5 * 0.96f64.powf(f64::from(t) * Self::SCHEDULE_DECAY))
    }
}

impl Default for Nadam {
    fn default() -> Self {
        Self::new(1e-3)
    }
}

impl Optimizer for Nadam {
    fn step(&mut self, params: &mut [Parameter<'_>]) -> Result<()> {
        ensure_state(&mut self.m, params)?;
        ensure_state(&mut self.v, params)?;
        self.t += 1;

        let mu_t = self.momentum_cache(self.t);
        let mu_next = self.momentum_cache(self.t + 1);
        let schedule = self.m_schedule * mu_t;
        let schedule_next = schedule * mu_next;
        self.m_schedule = schedule;

        let (lr, b1, b2, eps) = (self.learning_rate, self.beta1, self.beta2, self.epsilon);
        let v_correction = 1.0 - b2.powi(self.t);

        for ((p, m), v) in params.iter_mut().zip(&mut self.m).zip(&mut self.v) {
            Zip::from(&mut p.value)
                .and(&p.grad)
                .and(m)
                .and(v)
                .for_each(|w, &g, m, v| {
                    let g_prime = g / (1.0 - schedule);
                    *m = b1 * *m + (1.0 - b1) * g;
                    *v = b2 * *v + (1.0 - b2) * g * g;
                    let m_prime = *m / (1.0 - schedule_next);
                    let v_prime = *v / v_correction;
                    let m_bar = (1.0 - mu_t) * g_prime + mu_next * m_prime;
                    *w -= lr * m_bar / (v_prime.sqrt() + eps);
                });
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.t = 0;
        self.m_schedule = 1.0;
        self.m.clear();
        self.v.clear();
    }

    fn kind(&self) -> OptimizerKind {
        OptimizerKind::Nadam
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

/// RMSprop: scale steps by a running average of squared gradients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RmsProp {
    pub learning_rate: f64,
    pub rho: f64,
    pub epsilon: f64,
    #[serde(skip)]
    mean_square: Vec<ArrayD<f64>>,
}

impl RmsProp {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            rho: 0.9,
            epsilon: 1e-7,
            mean_square: Vec::new(),
        }
    }
}

impl Default for RmsProp {
    fn default() -> Self {
        Self::new(1e-3)
    }
}

impl Optimizer for RmsProp {
    fn step(&mut self, params: &mut [Parameter<'_>]) -> Result<()> {
        ensure_state(&mut self.mean_square, params)?;
        let (lr, rho, eps) = (self.learning_rate, self.rho, self.epsilon);

        for (p, ms) in params.iter_mut().zip(&mut self.mean_square) {
            Zip::from(&mut p.value)
                .and(&p.grad)
                .and(ms)
                .for_each(|w, &g, ms| {
                    *ms = rho * *ms + (1.0 - rho) * g * g;
                    *w -= lr * g / (ms.sqrt() + eps);
                });
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.mean_square.clear();
    }

    fn kind(&self) -> OptimizerKind {
        OptimizerKind::RmsProp
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

/// Optimizer names accepted in the grid and the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Nadam,
    Adam,
    #[serde(rename = "rmsprop")]
    RmsProp,
    Sgd,
}

impl OptimizerKind {
    /// Grid order
    pub const ALL: [OptimizerKind; 4] = [
        OptimizerKind::Nadam,
        OptimizerKind::Adam,
        OptimizerKind::RmsProp,
        OptimizerKind::Sgd,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OptimizerKind::Nadam => "nadam",
            OptimizerKind::Adam => "adam",
            OptimizerKind::RmsProp => "rmsprop",
            OptimizerKind::Sgd => "sgd",
        }
    }

    /// Fresh optimizer with default settings, optionally overriding the learning rate
    pub fn build(&self, learning_rate: Option<f64>) -> Box<dyn Optimizer> {
        match (self, learning_rate) {
            (OptimizerKind::Nadam, Some(lr)) => Box::new(Nadam::new(lr)),
            (OptimizerKind::Nadam, None) => Box::new(Nadam::default()),
            (OptimizerKind::Adam, Some(lr)) => Box::new(Adam::new(lr)),
            (OptimizerKind::Adam, None) => Box::new(Adam::default()),
            (OptimizerKind::RmsProp, Some(lr)) => Box::new(RmsProp::new(lr)),
            (OptimizerKind::RmsProp, None) => Box::new(RmsProp::default()),
            (OptimizerKind::Sgd, Some(lr)) => Box::new(Sgd::new(lr)),
            (OptimizerKind::Sgd, None) => Box::new(Sgd::default()),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OptimizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nadam" => Ok(OptimizerKind::Nadam),
            "adam" => Ok(OptimizerKind::Adam),
            "rmsprop" => Ok(OptimizerKind::RmsProp),
            "sgd" => Ok(OptimizerKind::Sgd),
            other => Err(Error::UnknownOptimizer(other.to_string())),
        }
    }
}
