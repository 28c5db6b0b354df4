use super::layer::Layer;
use crate::error::Result;
use crate::math::Matrix;

/// Apply ReLU activation in place on a matrix and return a mask for backward.
pub fn forward_matrix(m: &mut Matrix) -> Vec<f32> {
    let mut mask = vec![0.0; m.data.len()];
    for (i, v) in m.data.iter_mut().enumerate() {
        if *v < 0.0 {
            *v = 0.0;
        } else {
            mask[i] = 1.0;
        }
    }
    mask
}

/// Apply the stored ReLU mask to the gradient matrix.
pub fn backward(grad: &mut Matrix, mask: &[f32]) {
    for (g, &m) in grad.data.iter_mut().zip(mask.iter()) {
        *g *= m;
    }
}

/// ReLU activation layer.
#[derive(Default)]
pub struct ReLU {
    mask: Vec<f32>,
}

impl ReLU {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for ReLU {
    fn forward(&self, x: &Matrix) -> Result<Matrix> {
        let mut out = x.clone();
        forward_matrix(&mut out);
        Ok(out)
    }

    fn forward_train(&mut self, x: &Matrix) -> Result<Matrix> {
        let mut out = x.clone();
        self.mask = forward_matrix(&mut out);
        Ok(out)
    }

    fn backward(&mut self, grad_out: &Matrix) -> Matrix {
        let mut grad = grad_out.clone();
        backward(&mut grad, &self.mask);
        grad
    }
}
