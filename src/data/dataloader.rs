use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::Dataset;
use crate::error::{GanError, Result};
use crate::math::Matrix;
use crate::tensor::Tensor;

/// Batching options for [`DataLoader`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderOptions {
    pub batch_size: usize,
    /// Use only the first `max_samples` items in enumeration order.
    pub max_samples: Option<usize>,
    pub shuffle: bool,
    pub num_workers: usize,
    /// Recorded for reporting. Host memory is the only memory on CPU.
    pub pin_memory: bool,
    pub drop_last: bool,
}

impl LoaderOptions {
    /// Shuffled, incomplete trailing batch dropped.
    pub fn training(batch_size: usize, max_samples: Option<usize>) -> Self {
        Self {
            batch_size,
            max_samples,
            shuffle: true,
            num_workers: 0,
            pin_memory: false,
            drop_last: true,
        }
    }

    /// First `n` samples in order, trailing batch kept.
    pub fn evaluation(batch_size: usize, n: usize) -> Self {
        Self {
            batch_size,
            max_samples: Some(n),
            shuffle: false,
            num_workers: 0,
            pin_memory: false,
            drop_last: false,
        }
    }

    pub fn with_workers(mut self, num_workers: usize, pin_memory: bool) -> Self {
        self.num_workers = num_workers;
        self.pin_memory = pin_memory;
        self
    }
}

/// A stacked batch of images, one flattened `[3, s, s]` sample per row.
#[derive(Debug, Clone)]
pub struct Batch {
    pub images: Matrix,
    /// `[batch, channels, height, width]`.
    pub shape: [usize; 4],
}

impl Batch {
    pub fn len(&self) -> usize {
        self.shape[0]
    }

    pub fn is_empty(&self) -> bool {
        self.shape[0] == 0
    }

    fn stack(samples: Vec<Tensor>) -> Result<Self> {
        let first = samples.first().ok_or(GanError::EmptyDataset)?;
        let [c, h, w] = match first.shape.as_slice() {
            &[c, h, w] => [c, h, w],
            other => {
                return Err(GanError::Shape {
                    expected: vec![3, 0, 0],
                    actual: other.to_vec(),
                })
            }
        };
        let width = c * h * w;
        let mut data = Vec::with_capacity(samples.len() * width);
        for s in &samples {
            if s.shape != first.shape {
                return Err(GanError::Shape {
                    expected: first.shape.clone(),
                    actual: s.shape.clone(),
                });
            }
            data.extend_from_slice(&s.data);
        }
        let rows = samples.len();
        Ok(Self {
            images: Matrix::from_vec(rows, width, data),
            shape: [rows, c, h, w],
        })
    }
}

/// Iterates a [`Dataset`] in batches.
///
/// Each call to [`Iterator::next`] decodes one batch. With more than one
/// worker the samples of a batch are decoded on a dedicated rayon pool.
pub struct DataLoader {
    dataset: Arc<dyn Dataset>,
    options: LoaderOptions,
    indices: Vec<usize>,
    cursor: usize,
    rng: StdRng,
    pool: Option<ThreadPool>,
}

impl DataLoader {
    pub fn new(dataset: Arc<dyn Dataset>, options: LoaderOptions, rng: StdRng) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(GanError::Config("batch_size must be positive".into()));
        }
        let n = options
            .max_samples
            .map_or(dataset.len(), |cap| cap.min(dataset.len()));
        let pool = if options.num_workers > 1 {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(options.num_workers)
                    .thread_name(|i| format!("loader-{i}"))
                    .build()?,
            )
        } else {
            None
        };
        log::debug!(
            "data loader: {n} samples, batch {}, shuffle {}, workers {}, pin_memory {}",
            options.batch_size,
            options.shuffle,
            options.num_workers,
            options.pin_memory
        );
        let mut loader = Self {
            dataset,
            options,
            indices: (0..n).collect(),
            cursor: 0,
            rng,
            pool,
        };
        loader.reset();
        Ok(loader)
    }

    /// Number of usable samples, `min(len, max_samples)`.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn num_batches(&self) -> usize {
        let n = self.indices.len();
        let bs = self.options.batch_size;
        if self.options.drop_last {
            n / bs
        } else {
            n.div_ceil(bs)
        }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Rewind to the first batch, reshuffling when enabled.
    pub fn reset(&mut self) {
        self.cursor = 0;
        if self.options.shuffle {
            self.indices.shuffle(&mut self.rng);
        }
    }

    fn load(&self, indices: &[usize]) -> Result<Vec<Tensor>> {
        match &self.pool {
            Some(pool) => pool.install(|| {
                indices
                    .par_iter()
                    .map(|&i| self.dataset.get(i))
                    .collect::<Result<Vec<_>>>()
            }),
            None => indices.iter().map(|&i| self.dataset.get(i)).collect(),
        }
    }
}

impl Iterator for DataLoader {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let bs = self.options.batch_size;
        let remaining = self.indices.len().saturating_sub(self.cursor);
        if remaining == 0 || (self.options.drop_last && remaining < bs) {
            return None;
        }
        let end = self.cursor + remaining.min(bs);
        let batch = self
            .load(&self.indices[self.cursor..end])
            .and_then(Batch::stack);
        self.cursor = end;
        Some(batch)
    }
}
