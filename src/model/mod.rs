//! Recurrent model architecture
//!
//! This module provides:
//! - LSTM and dense layers with backpropagation
//! - Optimizers (SGD, Adam, Nadam, RMSprop)
//! - The model factory turning a hyperparameter point into a layer stack

mod config;
mod layers;
mod lstm;
mod network;
pub mod optimizer;
mod param;

pub use config::{HyperParams, LayerSpec, ModelSpec, ReturnMode, Topology};
pub use layers::Dense;
pub use lstm::{LstmLayer, RecurrentOutput};
pub use network::{build_model, RecurrentNetwork};
pub use optimizer::{Optimizer, OptimizerKind};
pub use param::{Parameter, WeightHistogram, WeightSnapshot};
