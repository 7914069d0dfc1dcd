//! Lazy batch streams over a windowed dataset
//!
//! A finite stream makes one ordered pass (test data). A cyclic stream
//! reshuffles and starts over whenever a pass is exhausted, so the trainer
//! decides where epochs end.

use ndarray::{Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::preprocessing::WindowedDataset;

/// One batch of windows and their labels
#[derive(Debug, Clone)]
pub struct Batch {
    /// `[batch, history, features]`
    pub x: Array3<f64>,
    /// `[batch, 1]`
    pub y: Array2<f64>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.y.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.y.nrows() == 0
    }
}

/// Visit order for one pass using a bounded shuffle buffer: the buffer is
/// filled in dataset order and each emitted element is drawn uniformly
/// from it. A buffer at least as large as the dataset is a full shuffle.
fn buffered_order<R: Rng>(n: usize, buffer_size: usize, rng: &mut R) -> Vec<usize> {
    if buffer_size <= 1 {
        return (0..n).collect();
    }

    let mut source = 0..n;
    let mut buffer: Vec<usize> = source.by_ref().take(buffer_size).collect();
    let mut order = Vec::with_capacity(n);

    while !buffer.is_empty() {
        let pick = rng.gen_range(0..buffer.len());
        match source.next() {
            Some(next) => order.push(std::mem::replace(&mut buffer[pick], next)),
            None => order.push(buffer.swap_remove(pick)),
        }
    }
    order
}

/// Batches drawn lazily from a borrowed dataset
pub struct BatchStream<'a> {
    dataset: &'a WindowedDataset,
    batch_size: usize,
    shuffle_buffer: usize,
    cyclic: bool,
    rng: StdRng,
    order: Vec<usize>,
    position: usize,
    passes: usize,
}

impl<'a> BatchStream<'a> {
    /// One ordered pass, then `None`
    pub fn finite(dataset: &'a WindowedDataset, batch_size: usize) -> Self {
        Self::new(dataset, batch_size, 0, false, 0)
    }

    /// Endless stream, reshuffled through a buffer of `shuffle_buffer` on every pass
    pub fn cyclic(
        dataset: &'a WindowedDataset,
        batch_size: usize,
        shuffle_buffer: usize,
        seed: u64,
    ) -> Self {
        Self::new(dataset, batch_size, shuffle_buffer, true, seed)
    }

    fn new(
        dataset: &'a WindowedDataset,
        batch_size: usize,
        shuffle_buffer: usize,
        cyclic: bool,
        seed: u64,
    ) -> Self {
        let mut stream = Self {
            dataset,
            batch_size: batch_size.max(1),
            shuffle_buffer,
            cyclic,
            rng: StdRng::seed_from_u64(seed),
            order: Vec::new(),
            position: 0,
            passes: 0,
        };
        stream.start_pass();
        stream
    }

    fn start_pass(&mut self) {
        self.order = buffered_order(self.dataset.len(), self.shuffle_buffer, &mut self.rng);
        self.position = 0;
        self.passes += 1;
    }

    /// Start over from a fresh pass
    pub fn reset(&mut self) {
        self.start_pass();
    }

    /// Batches in one full pass
    pub fn batches_per_pass(&self) -> usize {
        (self.dataset.len() + self.batch_size - 1) / self.batch_size
    }

    /// Passes started so far, including the current one
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl Iterator for BatchStream<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.dataset.is_empty() {
            return None;
        }
        if self.position >= self.order.len() {
            if !self.cyclic {
                return None;
            }
            self.start_pass();
        }

        let end = (self.position + self.batch_size).min(self.order.len());
        let selected = self.dataset.select(&self.order[self.position..end]);
        self.position = end;

        let x = selected.windows().clone();
        let y = selected.labels().clone().insert_axis(Axis(1));
        Some(Batch { x, y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array3};
    use rand::rngs::StdRng;

    fn dataset(n: usize) -> WindowedDataset {
        let windows = Array3::from_shape_fn((n, 2, 1), |(i, t, _)| (i * 10 + t) as f64);
        let labels = Array1::from_iter((0..n).map(|i| i as f64));
        WindowedDataset::new(windows, labels).unwrap()
    }

    fn labels_of(batches: &[Batch]) -> Vec<usize> {
        batches
            .iter()
            .flat_map(|b| b.y.column(0).to_vec())
            .map(|v| v as usize)
            .collect()
    }

    #[test]
    fn test_finite_stream_in_order() {
        let data = dataset(7);
        let batches: Vec<Batch> = BatchStream::finite(&data, 3).collect();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].len(), 1);
        assert_eq!(batches[0].x.dim(), (3, 2, 1));
        assert_eq!(labels_of(&batches), (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_finite_stream_restarts() {
        let data = dataset(4);
        let mut stream = BatchStream::finite(&data, 1);
        assert_eq!(stream.by_ref().count(), 4);
        assert!(stream.next().is_none());

        stream.reset();
        assert_eq!(stream.count(), 4);
    }

    #[test]
    fn test_cyclic_covers_every_example_each_pass() {
        let data = dataset(10);
        let mut stream = BatchStream::cyclic(&data, 1, 10_000, 5);

        for _ in 0..3 {
            let pass: Vec<Batch> = stream.by_ref().take(10).collect();
            let mut seen = labels_of(&pass);
            seen.sort_unstable();
            assert_eq!(seen, (0..10).collect::<Vec<_>>());
        }
        assert_eq!(stream.passes(), 3);
    }

    #[test]
    fn test_cyclic_is_seeded() {
        let data = dataset(20);
        let a: Vec<Batch> = BatchStream::cyclic(&data, 2, 100, 9).take(15).collect();
        let b: Vec<Batch> = BatchStream::cyclic(&data, 2, 100, 9).take(15).collect();
        assert_eq!(labels_of(&a), labels_of(&b));
    }

    #[test]
    fn test_buffered_order_is_permutation() {
        let mut rng = StdRng::seed_from_u64(1);
        for buffer in [0, 1, 3, 50] {
            let mut order = buffered_order(25, buffer, &mut rng);
            order.sort_unstable();
            assert_eq!(order, (0..25).collect::<Vec<_>>());
        }
        assert_eq!(buffered_order(5, 1, &mut rng), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_small_buffer_limits_displacement() {
        // With a buffer of 2, element k can be emitted no earlier than position k - 1
        let mut rng = StdRng::seed_from_u64(4);
        let order = buffered_order(30, 2, &mut rng);
        for (position, &index) in order.iter().enumerate() {
            assert!(index <= position + 1);
        }
    }

    #[test]
    fn test_batches_per_pass() {
        let data = dataset(10);
        assert_eq!(BatchStream::finite(&data, 1).batches_per_pass(), 10);
        assert_eq!(BatchStream::finite(&data, 4).batches_per_pass(), 3);
    }
}
