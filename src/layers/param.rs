use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::tensor::Tensor;

/// Trainable tensor together with its accumulated gradient.
///
/// Optimiser statistics are not stored here; they live in the optimiser so
/// that they can be checkpointed separately from the model.
#[derive(Clone, Debug)]
pub struct Param {
    pub value: Tensor,
    pub grad: Vec<f32>,
}

impl Param {
    pub fn new(value: Tensor) -> Self {
        let grad = vec![0.0; value.numel()];
        Self { value, grad }
    }

    pub fn filled(shape: Vec<usize>, fill: f32) -> Self {
        let len = shape.iter().product();
        Self::new(Tensor::new(vec![fill; len], shape))
    }

    /// DCGAN-style initialisation: `N(mean, std)` for every element.
    pub fn normal<R: Rng + ?Sized>(shape: Vec<usize>, mean: f32, std: f32, rng: &mut R) -> Self {
        let len: usize = shape.iter().product();
        let data = (0..len)
            .map(|_| {
                let z: f32 = StandardNormal.sample(&mut *rng);
                mean + std * z
            })
            .collect();
        Self::new(Tensor::new(data, shape))
    }

    pub fn data(&self) -> &[f32] {
        &self.value.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.value.data
    }

    pub fn numel(&self) -> usize {
        self.value.numel()
    }

    pub fn zero_grad(&mut self) {
        self.grad.iter_mut().for_each(|g| *g = 0.0);
    }

    /// Accumulate `delta` into the gradient buffer.
    pub fn accumulate(&mut self, delta: &[f32]) {
        assert_eq!(delta.len(), self.grad.len());
        for (g, d) in self.grad.iter_mut().zip(delta) {
            *g += d;
        }
    }
}
