//! Model hyperparameters, named topologies, and the layer-stack description

use std::fmt;

use serde::{Deserialize, Serialize};

use super::optimizer::OptimizerKind;
use crate::error::{Error, Result};

/// One point of the hyperparameter grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HyperParams {
    /// Recurrent layers stacked after the first one
    pub hidden_layers: usize,
    /// Width of every recurrent layer
    pub output_units: usize,
    /// Optimizer used to fit the model
    pub optimizer: OptimizerKind,
}

impl HyperParams {
    pub fn new(hidden_layers: usize, output_units: usize, optimizer: OptimizerKind) -> Self {
        Self {
            hidden_layers,
            output_units,
            optimizer,
        }
    }
}

impl fmt::Display for HyperParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{hidden_num_layers: {}, optimizer: {}, output_units: {}}}",
            self.hidden_layers, self.optimizer, self.output_units
        )
    }
}

/// Hand-picked topologies, selectable instead of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// 2 x LSTM(50)
    Shallow,
    /// 2 x LSTM(300)
    Wide,
    /// 2 x LSTM(600)
    MegaWide,
    /// 5 x LSTM(50)
    Deep,
    /// 3 x LSTM(50)
    ShallowDeep,
    /// 5 x LSTM(300)
    WideDeep,
}

impl Topology {
    pub const ALL: [Topology; 6] = [
        Topology::Shallow,
        Topology::Wide,
        Topology::MegaWide,
        Topology::Deep,
        Topology::ShallowDeep,
        Topology::WideDeep,
    ];

    /// Recurrent layers after the first
    pub fn hidden_layers(&self) -> usize {
        match self {
            Topology::Shallow | Topology::Wide | Topology::MegaWide => 1,
            Topology::ShallowDeep => 2,
            Topology::Deep | Topology::WideDeep => 4,
        }
    }

    /// Width of every recurrent layer
    pub fn units(&self) -> usize {
        match self {
            Topology::Shallow | Topology::Deep | Topology::ShallowDeep => 50,
            Topology::Wide | Topology::WideDeep => 300,
            Topology::MegaWide => 600,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Topology::Shallow => "shallow",
            Topology::Wide => "wide",
            Topology::MegaWide => "mega_wide",
            Topology::Deep => "deep",
            Topology::ShallowDeep => "shallow_deep",
            Topology::WideDeep => "wide_deep",
        }
    }

    /// Hyperparameters equivalent to this topology
    pub fn hyperparams(&self, optimizer: OptimizerKind) -> HyperParams {
        HyperParams::new(self.hidden_layers(), self.units(), optimizer)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a recurrent layer hands the next layer every time step or only the last
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnMode {
    /// Emit the hidden state at every time step
    Sequence,
    /// Emit only the final hidden state
    Final,
}

impl ReturnMode {
    /// Mode of the recurrent layer at `position` in a stack of `count`:
    /// the last one emits its final state, all others emit sequences.
    pub fn for_position(position: usize, count: usize) -> Self {
        if position + 1 == count {
            ReturnMode::Final
        } else {
            ReturnMode::Sequence
        }
    }
}

/// One layer of the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerSpec {
    Lstm { units: usize, return_mode: ReturnMode },
    Dense { units: usize },
}

/// Layer stack of a recurrent regressor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Features per time step
    pub input_features: usize,
    pub layers: Vec<LayerSpec>,
}

impl ModelSpec {
    /// `hidden_layers + 1` LSTMs of `output_units`, then a scalar dense projection
    pub fn from_hyperparams(hparams: &HyperParams, input_features: usize) -> Self {
        let recurrent = hparams.hidden_layers + 1;
        let mut layers: Vec<LayerSpec> = (0..recurrent)
            .map(|position| LayerSpec::Lstm {
                units: hparams.output_units,
                return_mode: ReturnMode::for_position(position, recurrent),
            })
            .collect();
        layers.push(LayerSpec::Dense { units: 1 });

        Self {
            input_features,
            layers,
        }
    }

    /// Number of LSTM layers
    pub fn recurrent_layers(&self) -> usize {
        self.layers
            .iter()
            .filter(|l| matches!(l, LayerSpec::Lstm { .. }))
            .count()
    }

    /// Check the stack can be built: at least one LSTM, only the last LSTM
    /// emitting a final state, and a single dense head at the end
    pub fn validate(&self) -> Result<()> {
        if self.input_features == 0 {
            return Err(Error::InvalidConfig("model needs at least one input feature".into()));
        }

        let body = match self.layers.split_last() {
            Some((LayerSpec::Dense { units }, body)) if *units > 0 => body,
            _ => {
                return Err(Error::InvalidConfig(
                    "model must end in a dense projection layer".into(),
                ))
            }
        };
        if body.is_empty() {
            return Err(Error::InvalidConfig("model needs at least one LSTM layer".into()));
        }

        for (position, layer) in body.iter().enumerate() {
            match layer {
                LayerSpec::Lstm { units, return_mode } => {
                    if *units == 0 {
                        return Err(Error::InvalidConfig(format!(
                            "LSTM layer {} has 0 units",
                            position
                        )));
                    }
                    if *return_mode != ReturnMode::for_position(position, body.len()) {
                        return Err(Error::InvalidConfig(format!(
                            "LSTM layer {} of {} has return mode {:?}",
                            position,
                            body.len(),
                            return_mode
                        )));
                    }
                }
                LayerSpec::Dense { .. } => {
                    return Err(Error::InvalidConfig(
                        "dense layers are only supported as the output head".into(),
                    ))
                }
            }
        }

        Ok(())
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut input = self.input_features;
        for (i, layer) in self.layers.iter().enumerate() {
            match layer {
                LayerSpec::Lstm { units, return_mode } => {
                    let params = 4 * units * (input + units + 1);
                    let shape = match return_mode {
                        ReturnMode::Sequence => format!("(None, None, {})", units),
                        ReturnMode::Final => format!("(None, {})", units),
                    };
                    writeln!(f, "lstm_{:<3} {:<20} {:>10}", i, shape, params)?;
                    input = *units;
                }
                LayerSpec::Dense { units } => {
                    let params = units * (input + 1);
                    writeln!(
                        f,
                        "dense_{:<2} {:<20} {:>10}",
                        i,
                        format!("(None, {})", units),
                        params
                    )?;
                    input = *units;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn final_positions(spec: &ModelSpec) -> Vec<usize> {
        spec.layers
            .iter()
            .enumerate()
            .filter_map(|(i, l)| match l {
                LayerSpec::Lstm {
                    return_mode: ReturnMode::Final,
                    ..
                } => Some(i),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_spec_for_every_depth() {
        for hidden in 0..6 {
            let hp = HyperParams::new(hidden, 50, OptimizerKind::Adam);
            let spec = ModelSpec::from_hyperparams(&hp, 5);

            assert_eq!(spec.recurrent_layers(), hidden + 1);
            assert_eq!(spec.layers.len(), hidden + 2);
            assert_eq!(spec.layers.last(), Some(&LayerSpec::Dense { units: 1 }));
            assert_eq!(final_positions(&spec), vec![hidden]);
            spec.validate().unwrap();
        }
    }

    #[test]
    fn test_zero_hidden_is_single_final_lstm() {
        let hp = HyperParams::new(0, 300, OptimizerKind::Nadam);
        let spec = ModelSpec::from_hyperparams(&hp, 5);

        assert_eq!(
            spec.layers[0],
            LayerSpec::Lstm {
                units: 300,
                return_mode: ReturnMode::Final
            }
        );
    }

    #[test]
    fn test_validate_rejects_final_in_middle() {
        let spec = ModelSpec {
            input_features: 5,
            layers: vec![
                LayerSpec::Lstm {
                    units: 8,
                    return_mode: ReturnMode::Final,
                },
                LayerSpec::Lstm {
                    units: 8,
                    return_mode: ReturnMode::Final,
                },
                LayerSpec::Dense { units: 1 },
            ],
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_topologies() {
        assert_eq!(Topology::Deep.hidden_layers() + 1, 5);
        assert_eq!(Topology::ShallowDeep.hidden_layers() + 1, 3);
        assert_eq!(Topology::MegaWide.units(), 600);

        let hp = Topology::WideDeep.hyperparams(OptimizerKind::Sgd);
        assert_eq!(hp, HyperParams::new(4, 300, OptimizerKind::Sgd));
    }

    #[test]
    fn test_summary_param_counts() {
        let hp = HyperParams::new(0, 50, OptimizerKind::Adam);
        let summary = ModelSpec::from_hyperparams(&hp, 5).to_string();

        // 4 * 50 * (5 + 50 + 1) and 50 + 1
        assert!(summary.contains("11200"));
        assert!(summary.contains("51"));
    }
}
