use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::layers::ConvError;

/// Errors produced while loading data, training or evaluating a GAN.
///
/// Nothing in the crate retries on error; every variant aborts the current
/// run and is handed to the caller unchanged.
#[derive(Debug, Error)]
pub enum GanError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("image error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("checkpoint serialisation failed: {0}")]
    Checkpoint(#[from] bincode::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("image directory {0} does not exist")]
    MissingDirectory(PathBuf),

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("data loader yields no batches (samples {samples}, batch size {batch_size})")]
    EmptyLoader { samples: usize, batch_size: usize },

    #[error("index {index} out of bounds for dataset of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    Shape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error(transparent)]
    Conv(#[from] ConvError),

    #[error("state dict mismatch: {0}")]
    StateDict(String),

    #[error("worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("plot rendering failed: {0}")]
    Plot(String),

    #[error("FID computation failed: {0}")]
    Fid(String),
}

impl GanError {
    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        GanError::Image {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, GanError>;
