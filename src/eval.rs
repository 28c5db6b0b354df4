use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::TrainConfig;
use crate::data::{DataLoader, Dataset, LoaderOptions};
use crate::device::Device;
use crate::error::Result;
use crate::fid::FidCalculator;
use crate::math::Matrix;
use crate::models::{Discriminator, Generator};
use crate::render;
use crate::rng::{normal_noise, stream_rng, streams};
use crate::util::logging::format_fid;

/// Periodic FID evaluation against a fixed real subset and fixed noise.
///
/// The real subset is the first `min(fid_num_images, len)` samples of the
/// dataset in enumeration order. Both the subset and the noise matrix stay
/// the same for every evaluation of a run.
pub struct Evaluator {
    dataset: Arc<dyn Dataset>,
    calculator: Box<dyn FidCalculator>,
    fid_dir: PathBuf,
    subset_len: usize,
    batch_size: usize,
    dims: usize,
    num_workers: usize,
    noise: Matrix,
}

impl Evaluator {
    pub fn new(
        config: &TrainConfig,
        dataset: Arc<dyn Dataset>,
        noise_dim: usize,
        calculator: Box<dyn FidCalculator>,
    ) -> Self {
        let subset_len = config.fid_num_images.min(dataset.len());
        let mut rng = stream_rng(config.seed, streams::FID_NOISE);
        let noise = normal_noise(&mut rng, subset_len, noise_dim);
        Self {
            dataset,
            calculator,
            fid_dir: config.fid_dir(),
            subset_len,
            batch_size: config.fid_batch_size,
            dims: config.fid_dims,
            num_workers: config.num_workers,
            noise,
        }
    }

    pub fn subset_len(&self) -> usize {
        self.subset_len
    }

    pub fn noise(&self) -> &Matrix {
        &self.noise
    }

    pub fn fid_dir(&self) -> &Path {
        &self.fid_dir
    }

    /// Score the generator. Models are left in training mode afterwards.
    ///
    /// On error the scratch directory is left in place and the models may
    /// still be in evaluation mode.
    pub fn evaluate(
        &self,
        generator: &mut dyn Generator,
        discriminator: &mut dyn Discriminator,
        device: &dyn Device,
    ) -> Result<f64> {
        generator.set_training(false);
        discriminator.set_training(false);
        device.release_cache();

        let real_dir = self.fid_dir.join("real");
        let fake_dir = self.fid_dir.join("fake");
        if self.fid_dir.exists() {
            fs::remove_dir_all(&self.fid_dir)?;
        }
        fs::create_dir_all(&real_dir)?;
        fs::create_dir_all(&fake_dir)?;

        let written = self.write_real(&real_dir)?;
        log::debug!("wrote {written} real images to {}", real_dir.display());
        let written = self.write_fake(&*generator, device, &fake_dir)?;
        log::debug!("wrote {written} generated images to {}", fake_dir.display());

        let fid = self
            .calculator
            .compute(&real_dir, &fake_dir, self.batch_size, device, self.dims)?;
        log::info!("{}", format_fid(fid));

        fs::remove_dir_all(&self.fid_dir)?;
        generator.set_training(true);
        discriminator.set_training(true);
        Ok(fid)
    }

    fn write_real(&self, dir: &Path) -> Result<usize> {
        let options = LoaderOptions::evaluation(self.batch_size, self.subset_len)
            .with_workers(self.num_workers, false);
        let loader = DataLoader::new(
            Arc::clone(&self.dataset),
            options,
            stream_rng(0, streams::SHUFFLE),
        )?;
        let mut index = 0;
        for batch in loader {
            let batch = batch?;
            let [_, _, h, w] = batch.shape;
            for r in 0..batch.len() {
                let path = dir.join(format!("{index:06}.png"));
                render::save_image(batch.images.row(r), h, w, &path)?;
                index += 1;
            }
        }
        Ok(index)
    }

    fn write_fake(
        &self,
        generator: &dyn Generator,
        device: &dyn Device,
        dir: &Path,
    ) -> Result<usize> {
        let [_, h, w] = generator.image_shape();
        let mut index = 0;
        let mut start = 0;
        while start < self.noise.rows {
            let end = (start + self.batch_size).min(self.noise.rows);
            let images = generator.generate(&self.noise.slice_rows(start, end))?;
            for r in 0..images.rows {
                let path = dir.join(format!("{index:06}.png"));
                render::save_image(images.row(r), h, w, &path)?;
                index += 1;
            }
            device.release_cache();
            start = end;
        }
        Ok(index)
    }
}
