//! Declarative hyperparameter domains and their Cartesian product
//!
//! A grid is an ordered list of named domains. Enumeration treats the list
//! as a mixed-radix counter: the last domain varies fastest, the first
//! slowest. Every point gets a session index starting at 0.

use std::collections::HashSet;
use std::convert::TryFrom;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{HyperParams, OptimizerKind};

/// Width of every recurrent layer
pub const HP_OUTPUT_UNITS: &str = "output_units";
/// Recurrent layers after the first
pub const HP_HIDDEN_LAYERS: &str = "hidden_num_layers";
/// Optimizer name
pub const HP_OPTIMIZER: &str = "optimizer";

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HParamValue {
    Int(i64),
    Text(String),
}

impl HParamValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HParamValue::Int(v) => Some(*v),
            HParamValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HParamValue::Text(s) => Some(s),
            HParamValue::Int(_) => None,
        }
    }
}

impl fmt::Display for HParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HParamValue::Int(v) => write!(f, "{}", v),
            HParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for HParamValue {
    fn from(v: i64) -> Self {
        HParamValue::Int(v)
    }
}

impl From<&str> for HParamValue {
    fn from(s: &str) -> Self {
        HParamValue::Text(s.to_string())
    }
}

/// Which points of an integer interval the grid visits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalVisit {
    /// Only `min` and `max`
    #[default]
    Endpoints,
    /// Every integer in `min..=max`
    Full,
}

/// Values a hyperparameter may take
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Domain {
    Discrete { values: Vec<HParamValue> },
    IntInterval { min: i64, max: i64 },
}

impl Domain {
    pub fn discrete<V: Into<HParamValue>>(values: impl IntoIterator<Item = V>) -> Self {
        Domain::Discrete {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Points visited under `visit`, in ascending order for intervals
    pub fn points(&self, visit: IntervalVisit) -> Vec<HParamValue> {
        match (self, visit) {
            (Domain::Discrete { values }, _) => values.clone(),
            (Domain::IntInterval { min, max }, IntervalVisit::Endpoints) => {
                if min == max {
                    vec![HParamValue::Int(*min)]
                } else {
                    vec![HParamValue::Int(*min), HParamValue::Int(*max)]
                }
            }
            (Domain::IntInterval { min, max }, IntervalVisit::Full) => {
                (*min..=*max).map(HParamValue::Int).collect()
            }
        }
    }
}

/// A named hyperparameter domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HParam {
    pub name: String,
    pub domain: Domain,
}

impl HParam {
    pub fn new(name: impl Into<String>, domain: Domain) -> Self {
        Self {
            name: name.into(),
            domain,
        }
    }
}

/// Widths, depth interval, then optimizers, outermost first
pub fn default_hparams() -> Vec<HParam> {
    vec![
        HParam::new(HP_OUTPUT_UNITS, Domain::discrete([50i64, 300, 600])),
        HParam::new(HP_HIDDEN_LAYERS, Domain::IntInterval { min: 0, max: 4 }),
        HParam::new(
            HP_OPTIMIZER,
            Domain::discrete(OptimizerKind::ALL.iter().map(|k| k.name())),
        ),
    ]
}

/// One grid point with its session index
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub session: usize,
    /// `(name, value)` in grid order
    pub assignment: Vec<(String, HParamValue)>,
}

impl Trial {
    pub fn get(&self, name: &str) -> Option<&HParamValue> {
        self.assignment.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl fmt::Display for Trial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sorted: Vec<_> = self.assignment.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        f.write_str("{")?;
        for (i, (name, value)) in sorted.into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        f.write_str("}")
    }
}

impl TryFrom<&Trial> for HyperParams {
    type Error = Error;

    fn try_from(trial: &Trial) -> Result<Self> {
        let int = |name: &str| -> Result<i64> {
            trial
                .get(name)
                .ok_or_else(|| Error::InvalidConfig(format!("grid point has no `{}`", name)))?
                .as_i64()
                .ok_or_else(|| Error::InvalidConfig(format!("`{}` must be an integer", name)))
        };

        let hidden = int(HP_HIDDEN_LAYERS)?;
        let units = int(HP_OUTPUT_UNITS)?;
        if hidden < 0 || units < 1 {
            return Err(Error::InvalidConfig(format!(
                "{} = {} and {} = {} are out of range",
                HP_HIDDEN_LAYERS, hidden, HP_OUTPUT_UNITS, units
            )));
        }

        let optimizer = trial
            .get(HP_OPTIMIZER)
            .ok_or_else(|| Error::InvalidConfig(format!("grid point has no `{}`", HP_OPTIMIZER)))?
            .as_str()
            .ok_or_else(|| Error::InvalidConfig(format!("`{}` must be a name", HP_OPTIMIZER)))?
            .parse::<OptimizerKind>()?;

        Ok(HyperParams::new(hidden as usize, units as usize, optimizer))
    }
}

/// Finite, restartable Cartesian product over a list of domains
#[derive(Debug, Clone)]
pub struct Grid {
    names: Vec<String>,
    axes: Vec<Vec<HParamValue>>,
}

impl Grid {
    pub fn new(params: &[HParam], visit: IntervalVisit) -> Result<Self> {
        if params.is_empty() {
            return Err(Error::InvalidConfig("hyperparameter grid has no domains".into()));
        }

        let mut seen = HashSet::new();
        for param in params {
            if !seen.insert(param.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate hyperparameter `{}`",
                    param.name
                )));
            }
            match &param.domain {
                Domain::Discrete { values } if values.is_empty() => {
                    return Err(Error::InvalidConfig(format!("`{}` has no values", param.name)))
                }
                Domain::IntInterval { min, max } if min > max => {
                    return Err(Error::InvalidConfig(format!(
                        "`{}` interval [{}, {}] is empty",
                        param.name, min, max
                    )))
                }
                _ => {}
            }
        }

        Ok(Self {
            names: params.iter().map(|p| p.name.clone()).collect(),
            axes: params.iter().map(|p| p.domain.points(visit)).collect(),
        })
    }

    /// The default 3 x 2 x 4 grid
    pub fn default_grid() -> Result<Self> {
        Self::new(&default_hparams(), IntervalVisit::Endpoints)
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.axes.iter().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Point at `session`, decoding the index with the last axis fastest
    pub fn get(&self, session: usize) -> Option<Trial> {
        if session >= self.len() {
            return None;
        }

        let mut rest = session;
        let mut picks = vec![0; self.axes.len()];
        for (axis, pick) in self.axes.iter().zip(picks.iter_mut()).rev() {
            *pick = rest % axis.len();
            rest /= axis.len();
        }

        let assignment = self
            .names
            .iter()
            .zip(&self.axes)
            .zip(picks)
            .map(|((name, axis), pick)| (name.clone(), axis[pick].clone()))
            .collect();
        Some(Trial { session, assignment })
    }

    /// Every point in session order; each call starts from session 0
    pub fn iter(&self) -> impl Iterator<Item = Trial> + '_ {
        (0..self.len()).filter_map(move |session| self.get(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grid_size_and_order() {
        let grid = Grid::default_grid().unwrap();
        let trials: Vec<Trial> = grid.iter().collect();

        assert_eq!(grid.len(), 24);
        assert_eq!(trials.len(), 24);
        for (i, t) in trials.iter().enumerate() {
            assert_eq!(t.session, i);
        }

        let hp = |t: &Trial| HyperParams::try_from(t).unwrap();
        assert_eq!(hp(&trials[0]), HyperParams::new(0, 50, OptimizerKind::Nadam));
        assert_eq!(hp(&trials[1]), HyperParams::new(0, 50, OptimizerKind::Adam));
        assert_eq!(hp(&trials[3]), HyperParams::new(0, 50, OptimizerKind::Sgd));
        assert_eq!(hp(&trials[4]), HyperParams::new(4, 50, OptimizerKind::Nadam));
        assert_eq!(hp(&trials[8]), HyperParams::new(0, 300, OptimizerKind::Nadam));
        assert_eq!(hp(&trials[23]), HyperParams::new(4, 600, OptimizerKind::Sgd));
    }

    #[test]
    fn test_endpoints_skip_interior() {
        let grid = Grid::default_grid().unwrap();
        let depths: HashSet<i64> = grid
            .iter()
            .filter_map(|t| t.get(HP_HIDDEN_LAYERS).and_then(HParamValue::as_i64))
            .collect();
        assert_eq!(depths, [0, 4].into_iter().collect());
    }

    #[test]
    fn test_full_interval() {
        let grid = Grid::new(&default_hparams(), IntervalVisit::Full).unwrap();
        assert_eq!(grid.len(), 3 * 5 * 4);
    }

    #[test]
    fn test_restartable() {
        let grid = Grid::default_grid().unwrap();
        let first: Vec<Trial> = grid.iter().take(5).collect();
        let second: Vec<Trial> = grid.iter().take(5).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_degenerate_interval_visited_once() {
        let params = vec![HParam::new("depth", Domain::IntInterval { min: 2, max: 2 })];
        let grid = Grid::new(&params, IntervalVisit::Endpoints).unwrap();
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn test_invalid_grids() {
        assert!(Grid::new(&[], IntervalVisit::Endpoints).is_err());
        assert!(Grid::new(
            &[HParam::new("x", Domain::Discrete { values: vec![] })],
            IntervalVisit::Endpoints
        )
        .is_err());
        assert!(Grid::new(
            &[HParam::new("x", Domain::IntInterval { min: 3, max: 1 })],
            IntervalVisit::Full
        )
        .is_err());
        assert!(Grid::new(
            &[
                HParam::new("x", Domain::discrete([1i64])),
                HParam::new("x", Domain::discrete([2i64]))
            ],
            IntervalVisit::Full
        )
        .is_err());
    }

    #[test]
    fn test_trial_conversion_errors() {
        let trial = Trial {
            session: 0,
            assignment: vec![
                (HP_OUTPUT_UNITS.into(), 50i64.into()),
                (HP_HIDDEN_LAYERS.into(), 1i64.into()),
                (HP_OPTIMIZER.into(), "adagrad".into()),
            ],
        };
        assert!(matches!(HyperParams::try_from(&trial), Err(Error::UnknownOptimizer(_))));

        let missing = Trial {
            session: 0,
            assignment: vec![(HP_OUTPUT_UNITS.into(), 50i64.into())],
        };
        assert!(matches!(HyperParams::try_from(&missing), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_trial_display_sorted() {
        let trial = Grid::default_grid().unwrap().get(5).unwrap();
        assert_eq!(trial.to_string(), "{hidden_num_layers: 4, optimizer: adam, output_units: 50}");
    }

    #[test]
    fn test_domain_toml_roundtrip() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            params: Vec<HParam>,
        }
        let text = toml::to_string(&Wrapper {
            params: default_hparams(),
        })
        .unwrap();
        let parsed: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(parsed.params, default_hparams());
    }
}
