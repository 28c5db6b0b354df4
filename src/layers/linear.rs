use rand::Rng;

use super::layer::Layer;
use super::param::Param;
use super::state::StateDict;
use crate::error::{GanError, Result};
use crate::math::Matrix;

// Fully connected layer `y = x·W + b` with `W` stored as `in × out`. During
// training the last input is kept so that the backward pass can compute the
// weight gradient.
pub struct Linear {
    pub weight: Param,
    pub bias: Param,
    in_dim: usize,
    out_dim: usize,
    last_x: Matrix,
}

impl Linear {
    pub fn new<R: Rng + ?Sized>(in_dim: usize, out_dim: usize, rng: &mut R) -> Self {
        Self {
            weight: Param::normal(vec![in_dim, out_dim], 0.0, 0.02, rng),
            bias: Param::filled(vec![out_dim], 0.0),
            in_dim,
            out_dim,
            last_x: Matrix::zeros(0, 0),
        }
    }

    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    fn weight_matrix(&self) -> Matrix {
        Matrix::from_vec(self.in_dim, self.out_dim, self.weight.data().to_vec())
    }

    fn check_input(&self, x: &Matrix) -> Result<()> {
        if x.cols != self.in_dim {
            return Err(GanError::Shape {
                expected: vec![x.rows, self.in_dim],
                actual: vec![x.rows, x.cols],
            });
        }
        Ok(())
    }

    fn affine(&self, x: &Matrix) -> Matrix {
        let mut out = Matrix::matmul(x, &self.weight_matrix());
        out.add_row_vector(self.bias.data());
        out
    }
}

impl Layer for Linear {
    fn forward(&self, x: &Matrix) -> Result<Matrix> {
        self.check_input(x)?;
        Ok(self.affine(x))
    }

    fn forward_train(&mut self, x: &Matrix) -> Result<Matrix> {
        self.check_input(x)?;
        self.last_x = x.clone();
        Ok(self.affine(x))
    }

    fn backward(&mut self, grad_out: &Matrix) -> Matrix {
        let grad_w = Matrix::matmul(&self.last_x.transpose(), grad_out);
        self.weight.accumulate(&grad_w.data);
        self.bias.accumulate(&grad_out.column_sums());
        Matrix::matmul(grad_out, &self.weight_matrix().transpose())
    }

    fn parameters_mut(&mut self) -> Vec<&mut Param> {
        vec![&mut self.weight, &mut self.bias]
    }

    fn save_state(&self, prefix: &str, out: &mut StateDict) {
        out.insert(format!("{prefix}.weight"), self.weight.value.clone());
        out.insert(format!("{prefix}.bias"), self.bias.value.clone());
    }

    fn load_state(&mut self, prefix: &str, state: &StateDict) -> Result<()> {
        let w = state.require(&format!("{prefix}.weight"), &[self.in_dim, self.out_dim])?;
        let b = state.require(&format!("{prefix}.bias"), &[self.out_dim])?;
        self.weight.value = w.clone();
        self.bias.value = b.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::stream_rng;

    #[test]
    fn backward_matches_finite_difference() {
        let mut rng = stream_rng(3, 0);
        let mut lin = Linear::new(3, 2, &mut rng);
        let x = Matrix::from_vec(2, 3, vec![0.5, -1.0, 2.0, 1.5, 0.3, -0.7]);
        // loss = sum(y)
        let y = lin.forward_train(&x).unwrap();
        let grad_in = lin.backward(&Matrix::from_vec(y.rows, y.cols, vec![1.0; y.data.len()]));

        let eps = 1e-3;
        for i in 0..x.data.len() {
            let mut xp = x.clone();
            xp.data[i] += eps;
            let mut xm = x.clone();
            xm.data[i] -= eps;
            let fp: f32 = lin.forward(&xp).unwrap().data.iter().sum();
            let fm: f32 = lin.forward(&xm).unwrap().data.iter().sum();
            let numeric = (fp - fm) / (2.0 * eps);
            assert!((numeric - grad_in.data[i]).abs() < 1e-2);
        }
        // bias gradient is the batch size for a sum loss
        assert!(lin.bias.grad.iter().all(|&g| (g - 2.0).abs() < 1e-6));
    }

    #[test]
    fn rejects_wrong_width() {
        let lin = Linear::new(4, 1, &mut stream_rng(0, 0));
        let x = Matrix::zeros(1, 3);
        assert!(matches!(lin.forward(&x), Err(GanError::Shape { .. })));
    }
}
