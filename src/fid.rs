//! Fréchet distance between feature distributions of two image folders.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::FilterType;
use image::RgbImage;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

use crate::device::Device;
use crate::error::{GanError, Result};
use crate::math::{matmul_f64, symmetric_eigen, symmetric_sqrt};
use crate::rng::{stream_rng, streams};

/// Scores how far the images in `fake_dir` are from those in `real_dir`.
/// Lower is better.
pub trait FidCalculator: Send + Sync {
    fn compute(
        &self,
        real_dir: &Path,
        fake_dir: &Path,
        batch_size: usize,
        device: &dyn Device,
        dims: usize,
    ) -> Result<f64>;
}

/// Maps an RGB image to a fixed-length feature vector.
pub trait FeatureExtractor: Send + Sync {
    fn dims(&self) -> usize;

    fn extract(&self, image: &RgbImage) -> Vec<f64>;
}

/// Edge length images are resized to before projection.
pub const PROJECTION_SIDE: u32 = 32;

/// Fixed random Gaussian projection of a downsampled image followed by ReLU.
///
/// The projection matrix is drawn from a seeded generator so features are
/// comparable across evaluations of the same run.
pub struct RandomProjection {
    dims: usize,
    /// `input × dims`, row-major.
    weights: Vec<f32>,
}

impl RandomProjection {
    pub fn new(dims: usize, seed: u64) -> Self {
        let input = (3 * PROJECTION_SIDE * PROJECTION_SIDE) as usize;
        let mut rng = stream_rng(seed, streams::FID_FEATURES);
        let scale = 1.0 / (input as f32).sqrt();
        let weights = (0..input * dims)
            .map(|_| -> f32 {
                let z: f32 = StandardNormal.sample(&mut rng);
                z * scale
            })
            .collect();
        Self { dims, weights }
    }

    fn pixels(image: &RgbImage) -> Vec<f32> {
        let small = image::imageops::resize(
            image,
            PROJECTION_SIDE,
            PROJECTION_SIDE,
            FilterType::Triangle,
        );
        small.as_raw().iter().map(|&v| v as f32 / 255.0).collect()
    }
}

impl FeatureExtractor for RandomProjection {
    fn dims(&self) -> usize {
        self.dims
    }

    fn extract(&self, image: &RgbImage) -> Vec<f64> {
        let x = Self::pixels(image);
        let mut out = vec![0.0f32; self.dims];
        for (xi, row) in x.iter().zip(self.weights.chunks(self.dims)) {
            if *xi == 0.0 {
                continue;
            }
            for (o, w) in out.iter_mut().zip(row) {
                *o += xi * w;
            }
        }
        out.into_iter().map(|v| v.max(0.0) as f64).collect()
    }
}

/// Running mean and covariance of feature vectors.
#[derive(Debug, Clone)]
pub struct FeatureStats {
    dims: usize,
    count: usize,
    sum: Vec<f64>,
    /// Sum of outer products, `dims × dims`.
    sum_sq: Vec<f64>,
}

impl FeatureStats {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            count: 0,
            sum: vec![0.0; dims],
            sum_sq: vec![0.0; dims * dims],
        }
    }

    pub fn push(&mut self, feature: &[f64]) -> Result<()> {
        if feature.len() != self.dims {
            return Err(GanError::Fid(format!(
                "feature has {} values, expected {}",
                feature.len(),
                self.dims
            )));
        }
        self.count += 1;
        for (i, &a) in feature.iter().enumerate() {
            self.sum[i] += a;
            if a == 0.0 {
                continue;
            }
            let row = &mut self.sum_sq[i * self.dims..(i + 1) * self.dims];
            for (s, &b) in row.iter_mut().zip(feature) {
                *s += a * b;
            }
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> Vec<f64> {
        let n = self.count.max(1) as f64;
        self.sum.iter().map(|s| s / n).collect()
    }

    /// Unbiased sample covariance. Needs at least two samples.
    pub fn covariance(&self) -> Result<Vec<f64>> {
        if self.count < 2 {
            return Err(GanError::Fid(format!(
                "need at least 2 images for a covariance, got {}",
                self.count
            )));
        }
        let n = self.count as f64;
        let mu = self.mean();
        let d = self.dims;
        let mut cov = vec![0.0; d * d];
        for i in 0..d {
            for j in 0..d {
                cov[i * d + j] = (self.sum_sq[i * d + j] - n * mu[i] * mu[j]) / (n - 1.0);
            }
        }
        Ok(cov)
    }
}

/// `‖μ₁−μ₂‖² + tr Σ₁ + tr Σ₂ − 2 tr (Σ₁^½ Σ₂ Σ₁^½)^½`
pub fn frechet_distance(mu1: &[f64], cov1: &[f64], mu2: &[f64], cov2: &[f64], dims: usize) -> f64 {
    let mean_term: f64 = mu1.iter().zip(mu2).map(|(a, b)| (a - b) * (a - b)).sum();
    let trace = |m: &[f64]| (0..dims).map(|i| m[i * dims + i]).sum::<f64>();
    let root1 = symmetric_sqrt(cov1, dims);
    let inner = matmul_f64(&matmul_f64(&root1, cov2, dims), &root1, dims);
    // symmetrise away round-off before the eigen solve
    let mut sym = inner.clone();
    for i in 0..dims {
        for j in 0..dims {
            sym[i * dims + j] = 0.5 * (inner[i * dims + j] + inner[j * dims + i]);
        }
    }
    let (vals, _) = symmetric_eigen(&sym, dims);
    let tr_covmean: f64 = vals.iter().map(|&l| l.max(0.0).sqrt()).sum();
    (mean_term + trace(cov1) + trace(cov2) - 2.0 * tr_covmean).max(0.0)
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(GanError::MissingDirectory(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Default [`FidCalculator`]: decodes both folders in batches, extracts
/// features and compares their Gaussian statistics.
pub struct FrechetDistance {
    seed: u64,
    extractor: Option<Arc<dyn FeatureExtractor>>,
}

impl FrechetDistance {
    /// Use a [`RandomProjection`] seeded with `seed`, sized per call.
    pub fn new(seed: u64) -> Self {
        Self { seed, extractor: None }
    }

    pub fn with_extractor(extractor: Arc<dyn FeatureExtractor>) -> Self {
        Self {
            seed: 0,
            extractor: Some(extractor),
        }
    }

    pub fn folder_stats(
        &self,
        dir: &Path,
        batch_size: usize,
        extractor: &dyn FeatureExtractor,
    ) -> Result<FeatureStats> {
        let files = list_images(dir)?;
        let mut stats = FeatureStats::new(extractor.dims());
        for chunk in files.chunks(batch_size.max(1)) {
            let features = chunk
                .par_iter()
                .map(|path| -> Result<Vec<f64>> {
                    let img = image::open(path).map_err(|e| GanError::image(path, e))?;
                    Ok(extractor.extract(&img.to_rgb8()))
                })
                .collect::<Result<Vec<_>>>()?;
            for f in &features {
                stats.push(f)?;
            }
        }
        Ok(stats)
    }
}

impl FidCalculator for FrechetDistance {
    fn compute(
        &self,
        real_dir: &Path,
        fake_dir: &Path,
        batch_size: usize,
        device: &dyn Device,
        dims: usize,
    ) -> Result<f64> {
        let extractor: Arc<dyn FeatureExtractor> = match &self.extractor {
            Some(e) if e.dims() == dims => Arc::clone(e),
            Some(e) => {
                return Err(GanError::Fid(format!(
                    "extractor produces {} features, {dims} requested",
                    e.dims()
                )))
            }
            None => Arc::new(RandomProjection::new(dims, self.seed)),
        };
        log::debug!("computing FID with {dims} features on {}", device.name());
        let real = self.folder_stats(real_dir, batch_size, extractor.as_ref())?;
        device.release_cache();
        let fake = self.folder_stats(fake_dir, batch_size, extractor.as_ref())?;
        let (cov_r, cov_f) = (real.covariance()?, fake.covariance()?);
        Ok(frechet_distance(&real.mean(), &cov_r, &fake.mean(), &cov_f, dims))
    }
}
