use super::layer::Layer;
use crate::error::Result;
use crate::math::Matrix;

pub const DEFAULT_SLOPE: f32 = 0.2;

/// Apply leaky ReLU activation in place on a matrix and return derivative mask.
pub fn forward_matrix(m: &mut Matrix, slope: f32) -> Vec<f32> {
    let mut mask = vec![0.0; m.data.len()];
    for (i, v) in m.data.iter_mut().enumerate() {
        if *v < 0.0 {
            *v *= slope;
            mask[i] = slope;
        } else {
            mask[i] = 1.0;
        }
    }
    mask
}

/// Apply derivative mask to gradient matrix.
pub fn backward(grad: &mut Matrix, mask: &[f32]) {
    for (g, &m) in grad.data.iter_mut().zip(mask.iter()) {
        *g *= m;
    }
}

pub struct LeakyReLU {
    slope: f32,
    mask: Vec<f32>,
}

impl LeakyReLU {
    pub fn new(slope: f32) -> Self {
        Self {
            slope,
            mask: Vec::new(),
        }
    }
}

impl Default for LeakyReLU {
    fn default() -> Self {
        Self::new(DEFAULT_SLOPE)
    }
}

impl Layer for LeakyReLU {
    fn forward(&self, x: &Matrix) -> Result<Matrix> {
        let mut out = x.clone();
        forward_matrix(&mut out, self.slope);
        Ok(out)
    }

    fn forward_train(&mut self, x: &Matrix) -> Result<Matrix> {
        let mut out = x.clone();
        self.mask = forward_matrix(&mut out, self.slope);
        Ok(out)
    }

    fn backward(&mut self, grad_out: &Matrix) -> Matrix {
        let mut grad = grad_out.clone();
        backward(&mut grad, &self.mask);
        grad
    }
}
