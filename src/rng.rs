use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use crate::math::Matrix;

/// Create a [`StdRng`] for one named stream of a run.
///
/// Streams derived from the same base seed are deterministic but distinct,
/// so the data shuffle, the training noise and weight initialisation do not
/// share a sequence.
pub fn stream_rng(seed: u64, stream: u64) -> StdRng {
    StdRng::seed_from_u64(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(stream))
}

/// Draw a `rows × dim` matrix of independent standard normal samples.
pub fn normal_noise<R: rand::Rng + ?Sized>(rng: &mut R, rows: usize, dim: usize) -> Matrix {
    let data = (0..rows * dim)
        .map(|_| -> f32 { StandardNormal.sample(&mut *rng) })
        .collect();
    Matrix::from_vec(rows, dim, data)
}

pub mod streams {
    pub const INIT_GENERATOR: u64 = 1;
    pub const INIT_DISCRIMINATOR: u64 = 2;
    pub const SHUFFLE: u64 = 3;
    pub const TRAIN_NOISE: u64 = 4;
    pub const FID_NOISE: u64 = 5;
    pub const FID_FEATURES: u64 = 6;
}
