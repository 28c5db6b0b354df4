use super::layer::Layer;
use crate::error::Result;
use crate::math::Matrix;

/// Apply tanh activation in place on a matrix.
pub fn forward_matrix(m: &mut Matrix) {
    for v in m.data.iter_mut() {
        *v = v.tanh();
    }
}

/// Multiply gradient with derivative of tanh using activated values.
pub fn backward(grad: &mut Matrix, activated: &Matrix) {
    for (g, &h) in grad.data.iter_mut().zip(activated.data.iter()) {
        *g *= 1.0 - h * h;
    }
}

/// Tanh output layer; keeps its activated output for the backward pass.
pub struct Tanh {
    out_cache: Matrix,
}

impl Tanh {
    pub fn new() -> Self {
        Self {
            out_cache: Matrix::zeros(0, 0),
        }
    }
}

impl Default for Tanh {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for Tanh {
    fn forward(&self, x: &Matrix) -> Result<Matrix> {
        let mut out = x.clone();
        forward_matrix(&mut out);
        Ok(out)
    }

    fn forward_train(&mut self, x: &Matrix) -> Result<Matrix> {
        let mut out = x.clone();
        forward_matrix(&mut out);
        self.out_cache = out.clone();
        Ok(out)
    }

    fn backward(&mut self, grad_out: &Matrix) -> Matrix {
        let mut grad = grad_out.clone();
        backward(&mut grad, &self.out_cache);
        grad
    }
}
