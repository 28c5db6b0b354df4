use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GanError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    Sgd,
}

/// Training configuration loaded from a TOML or JSON file.
///
/// Every field has a default, so a config file only needs to name the
/// values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Directory holding the training images.
    pub image_dir: PathBuf,
    /// Root for samples, checkpoints, metrics and FID scratch space.
    pub results_dir: PathBuf,
    /// File extensions accepted by the dataset, matched case-insensitively.
    pub extensions: Vec<String>,
    /// Edge length every image is resized to. Must be divisible by 4.
    pub image_size: usize,
    /// Use at most this many images (the first ones in enumeration order).
    pub max_images: Option<usize>,

    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub optimizer: OptimizerKind,

    pub noise_dim: usize,
    pub generator_hidden: usize,
    pub discriminator_channels: usize,

    /// Discriminator target for real images. Kept below 1.0 (one-sided label
    /// smoothing).
    pub real_label: f32,
    pub fake_label: f32,

    pub num_workers: usize,
    pub pin_memory: bool,

    pub fid_batch_size: usize,
    pub fid_num_images: usize,
    /// Run the evaluator after every `fid_every`-th epoch.
    pub fid_every: usize,
    pub fid_dims: usize,

    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("./data/faces"),
            results_dir: PathBuf::from("./results"),
            extensions: vec!["png".to_string()],
            image_size: 64,
            max_images: None,
            batch_size: 16,
            epochs: 50,
            learning_rate: 2e-4,
            beta1: 0.5,
            beta2: 0.999,
            optimizer: OptimizerKind::Adam,
            noise_dim: 100,
            generator_hidden: 256,
            discriminator_channels: 16,
            real_label: 0.9,
            fake_label: 0.0,
            num_workers: 4,
            pin_memory: true,
            fid_batch_size: 50,
            fid_num_images: 1000,
            fid_every: 5,
            fid_dims: 64,
            seed: 42,
        }
    }
}

impl TrainConfig {
    /// Load configuration from the given path. Supports TOML or JSON based
    /// on the file extension. The result is validated.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let cfg: TrainConfig = if is_json {
            serde_json::from_str(&content)
                .map_err(|e| GanError::Config(format!("{}: {e}", path.display())))?
        } else {
            toml::from_str(&content)
                .map_err(|e| GanError::Config(format!("{}: {e}", path.display())))?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(GanError::Config(msg));
        // Batch normalisation needs at least two rows per training batch.
        if self.batch_size < 2 {
            return fail(format!("batch_size must be at least 2, got {}", self.batch_size));
        }
        if self.epochs == 0 {
            return fail("epochs must be positive".into());
        }
        if self.fid_every == 0 {
            return fail("fid_every must be positive".into());
        }
        if self.fid_batch_size == 0 {
            return fail("fid_batch_size must be positive".into());
        }
        if self.fid_dims == 0 {
            return fail("fid_dims must be positive".into());
        }
        if !(self.learning_rate > 0.0) {
            return fail(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        for (name, v) in [("real_label", self.real_label), ("fake_label", self.fake_label)] {
            if !(0.0..=1.0).contains(&v) {
                return fail(format!("{name} must lie in [0, 1], got {v}"));
            }
        }
        if self.image_size == 0 || self.image_size % 4 != 0 {
            return fail(format!(
                "image_size must be a positive multiple of 4, got {}",
                self.image_size
            ));
        }
        if self.noise_dim == 0 || self.generator_hidden == 0 || self.discriminator_channels == 0 {
            return fail("network dimensions must be positive".into());
        }
        if self.extensions.is_empty() {
            return fail("at least one image extension is required".into());
        }
        Ok(())
    }

    pub fn samples_dir(&self) -> PathBuf {
        self.results_dir.join("samples")
    }

    pub fn fid_dir(&self) -> PathBuf {
        self.results_dir.join("fid")
    }

    pub fn checkpoint_path(&self, epoch: usize) -> PathBuf {
        self.results_dir.join(format!("ckpt_epoch_{epoch}.bin"))
    }

    pub fn preview_path(&self, epoch: usize) -> PathBuf {
        self.samples_dir().join(format!("gen_epoch_{epoch}.png"))
    }

    pub fn loss_plot_path(&self) -> PathBuf {
        self.results_dir.join("training_loss.png")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = TrainConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.real_label, 0.9);
        assert_eq!(cfg.fake_label, 0.0);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: TrainConfig = toml::from_str("epochs = 3\nfid_every = 1\n").unwrap();
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.fid_every, 1);
        assert_eq!(cfg.batch_size, TrainConfig::default().batch_size);
    }

    #[test]
    fn rejects_bad_values() {
        let mut cfg = TrainConfig::default();
        cfg.fid_every = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainConfig::default();
        cfg.real_label = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainConfig::default();
        cfg.image_size = 30;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn single_sample_batches_are_rejected() {
        let mut cfg = TrainConfig::default();
        cfg.batch_size = 1;
        assert!(matches!(cfg.validate(), Err(GanError::Config(_))));
        cfg.batch_size = 2;
        cfg.validate().unwrap();
    }

    #[test]
    fn output_paths_follow_layout() {
        let mut cfg = TrainConfig::default();
        cfg.results_dir = PathBuf::from("out");
        assert_eq!(cfg.checkpoint_path(3), PathBuf::from("out/ckpt_epoch_3.bin"));
        assert_eq!(cfg.preview_path(2), PathBuf::from("out/samples/gen_epoch_2.png"));
        assert_eq!(cfg.fid_dir(), PathBuf::from("out/fid"));
    }
}
