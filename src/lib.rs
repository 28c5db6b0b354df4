//! Adversarial training of image generators on folders of face images.
//!
//! [`train::Trainer`] drives the loop: it pulls batches from a
//! [`data::DataLoader`], alternates discriminator and generator updates,
//! writes previews and checkpoints after every epoch and periodically scores
//! the generator with an [`eval::Evaluator`].

pub mod checkpoint;
pub mod config;
pub mod data;
pub mod device;
pub mod error;
pub mod eval;
pub mod fid;
pub mod layers;
pub mod logging;
pub mod math;
pub mod memory;
pub mod models;
pub mod optim;
pub mod render;
pub mod rng;
pub mod tensor;
pub mod train;
pub mod util;

pub use checkpoint::Checkpoint;
pub use config::{OptimizerKind, TrainConfig};
pub use error::{GanError, Result};
pub use train::Trainer;
