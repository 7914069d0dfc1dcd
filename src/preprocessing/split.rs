//! Random train/validation/test partitioning of windowed examples
//!
//! Two sequential shuffle-splits: the held-out pool (`1 - train_frac`) is
//! peeled off first, then divided into validation and test. The split is
//! over examples, not time, so overlapping windows can land in different
//! partitions.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use super::windows::WindowedDataset;
use crate::error::{Error, Result};

/// Example indices assigned to each partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

impl SplitIndices {
    pub fn sizes(&self) -> (usize, usize, usize) {
        (self.train.len(), self.validation.len(), self.test.len())
    }
}

/// The three partitions, shared read-only by every session of a sweep
#[derive(Debug, Clone)]
pub struct Partitions {
    pub train: WindowedDataset,
    pub validation: WindowedDataset,
    pub test: WindowedDataset,
}

impl Partitions {
    pub fn sizes(&self) -> (usize, usize, usize) {
        (self.train.len(), self.validation.len(), self.test.len())
    }
}

fn check_fractions(train_frac: f64, val_frac: f64) -> Result<()> {
    let valid = train_frac > 0.0
        && train_frac < 1.0
        && val_frac > 0.0
        && train_frac + val_frac < 1.0 + 1e-12;
    if !valid {
        return Err(Error::InvalidConfig(format!(
            "split fractions train={} validation={} must be positive with train + validation <= 1",
            train_frac, val_frac
        )));
    }
    Ok(())
}

/// Assign `n` example indices to train/validation/test.
///
/// Train gets `round(train_frac * n)`; the rest forms a pool of which
/// validation takes `round(pool * val_frac / (1 - train_frac))` and test the remainder.
pub fn split_indices(n: usize, train_frac: f64, val_frac: f64, seed: u64) -> Result<SplitIndices> {
    check_fractions(train_frac, val_frac)?;

    let mut rng = StdRng::seed_from_u64(seed);

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);
    let n_train = ((train_frac * n as f64).round() as usize).min(n);
    let pool = indices.split_off(n_train);
    let train = indices;

    let mut pool = pool;
    pool.shuffle(&mut rng);
    let share = (val_frac / (1.0 - train_frac)).min(1.0);
    let n_val = ((share * pool.len() as f64).round() as usize).min(pool.len());
    let test = pool.split_off(n_val);
    let validation = pool;

    let split = SplitIndices {
        train,
        validation,
        test,
    };

    let (tr, va, te) = split.sizes();
    if tr == 0 || va == 0 || te == 0 {
        return Err(Error::DegeneratePartition(format!(
            "{} examples split into train={} validation={} test={}; every partition needs at least one",
            n, tr, va, te
        )));
    }

    Ok(split)
}

/// Split a windowed dataset into train/validation/test
pub fn split(
    dataset: &WindowedDataset,
    train_frac: f64,
    val_frac: f64,
    seed: u64,
) -> Result<Partitions> {
    let indices = split_indices(dataset.len(), train_frac, val_frac, seed)?;

    let partitions = Partitions {
        train: dataset.select(&indices.train),
        validation: dataset.select(&indices.validation),
        test: dataset.select(&indices.test),
    };

    let (tr, va, te) = partitions.sizes();
    info!("Made {} datasets total", dataset.len());
    info!("Made {} train datasets", tr);
    info!("Made {} validation datasets", va);
    info!("Made {} test datasets", te);

    Ok(partitions)
}
