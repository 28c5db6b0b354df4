use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::layers::StateDict;
use crate::optim::OptimizerState;

/// Everything needed to resume training after `epoch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: usize,
    pub generator: StateDict,
    pub discriminator: StateDict,
    pub g_optimizer: OptimizerState,
    pub d_optimizer: OptimizerState,
    pub g_losses: Vec<f32>,
    pub d_losses: Vec<f32>,
}

impl Checkpoint {
    /// Write the checkpoint with bincode, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        log::debug!("saved checkpoint for epoch {} to {}", self.epoch, path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let ckpt: Checkpoint = bincode::deserialize_from(reader)?;
        log::debug!("loaded checkpoint for epoch {} from {}", ckpt.epoch, path.display());
        Ok(ckpt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    #[test]
    fn missing_file_is_io_error() {
        let err = Checkpoint::load("/no/such/ckpt.bin").unwrap_err();
        assert!(matches!(err, crate::error::GanError::Io(_)));
    }

    #[test]
    fn garbage_is_checkpoint_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        fs::write(&path, [1u8, 2, 3]).unwrap();
        let err = Checkpoint::load(&path).unwrap_err();
        assert!(matches!(err, crate::error::GanError::Checkpoint(_)));
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/ckpt_epoch_1.bin");
        let mut g = StateDict::new();
        g.insert("layers.0.weight", Tensor::new(vec![1.0, 2.0], vec![2]));
        let ckpt = Checkpoint {
            epoch: 1,
            generator: g,
            discriminator: StateDict::new(),
            g_optimizer: OptimizerState::Sgd { lr: 0.1, weight_decay: 0.0 },
            d_optimizer: OptimizerState::Sgd { lr: 0.1, weight_decay: 0.0 },
            g_losses: vec![0.7],
            d_losses: vec![1.3],
        };
        ckpt.save(&path).unwrap();
        assert_eq!(Checkpoint::load(&path).unwrap(), ckpt);
    }
}
