use super::layer::Layer;
use super::param::Param;
use super::state::StateDict;
use crate::error::{GanError, Result};
use crate::math::Matrix;
use crate::tensor::Tensor;

/// Batch normalization over feature columns with learnable scale (`gamma`)
/// and shift (`beta`).
///
/// In training mode each batch is normalised with its own statistics and the
/// running estimates are updated with `momentum`. In inference mode the
/// running estimates are used.
pub struct BatchNorm1d {
    pub gamma: Param,
    pub beta: Param,
    dim: usize,
    eps: f32,
    momentum: f32,
    running_mean: Vec<f32>,
    running_var: Vec<f32>,
    training: bool,
    x_hat: Matrix,
    var: Vec<f32>,
}

impl BatchNorm1d {
    pub fn new(dim: usize) -> Self {
        Self::with_options(dim, 1e-5, 0.1)
    }

    pub fn with_options(dim: usize, eps: f32, momentum: f32) -> Self {
        Self {
            gamma: Param::filled(vec![dim], 1.0),
            beta: Param::filled(vec![dim], 0.0),
            dim,
            eps,
            momentum,
            running_mean: vec![0.0; dim],
            running_var: vec![1.0; dim],
            training: true,
            x_hat: Matrix::zeros(0, 0),
            var: vec![1.0; dim],
        }
    }

    pub fn running_mean(&self) -> &[f32] {
        &self.running_mean
    }

    pub fn running_var(&self) -> &[f32] {
        &self.running_var
    }

    fn check_input(&self, x: &Matrix) -> Result<()> {
        if x.cols != self.dim {
            return Err(GanError::Shape {
                expected: vec![x.rows, self.dim],
                actual: vec![x.rows, x.cols],
            });
        }
        Ok(())
    }

    /// Per-column mean and biased variance of `x`.
    fn batch_stats(x: &Matrix) -> (Vec<f32>, Vec<f32>) {
        let n = x.rows.max(1) as f32;
        let mean: Vec<f32> = x.column_sums().into_iter().map(|s| s / n).collect();
        let mut var = vec![0.0; x.cols];
        for row in x.data.chunks(x.cols.max(1)) {
            for ((v, &m), &val) in var.iter_mut().zip(&mean).zip(row) {
                let d = val - m;
                *v += d * d;
            }
        }
        for v in var.iter_mut() {
            *v /= n;
        }
        (mean, var)
    }

    fn normalise(
        &self,
        x: &Matrix,
        mean: &[f32],
        var: &[f32],
        x_hat: Option<&mut Matrix>,
    ) -> Matrix {
        let mut out = Matrix::zeros(x.rows, x.cols);
        let mut cache = x_hat;
        for r in 0..x.rows {
            for c in 0..x.cols {
                let idx = r * x.cols + c;
                let xh = (x.data[idx] - mean[c]) / (var[c] + self.eps).sqrt();
                if let Some(cache) = cache.as_deref_mut() {
                    cache.data[idx] = xh;
                }
                out.data[idx] = self.gamma.data()[c] * xh + self.beta.data()[c];
            }
        }
        out
    }
}

impl Layer for BatchNorm1d {
    fn forward(&self, x: &Matrix) -> Result<Matrix> {
        self.check_input(x)?;
        if self.training && x.rows > 1 {
            let (mean, var) = Self::batch_stats(x);
            Ok(self.normalise(x, &mean, &var, None))
        } else {
            Ok(self.normalise(x, &self.running_mean, &self.running_var, None))
        }
    }

    /// Fails with [`GanError::Shape`] on fewer than two rows: a single row
    /// has zero variance and would normalise every feature to zero.
    fn forward_train(&mut self, x: &Matrix) -> Result<Matrix> {
        self.check_input(x)?;
        if x.rows < 2 {
            return Err(GanError::Shape {
                expected: vec![2, self.dim],
                actual: vec![x.rows, x.cols],
            });
        }
        let (mean, var) = Self::batch_stats(x);
        let n = x.rows as f32;
        // Running variance tracks the unbiased estimate.
        let unbias = n / (n - 1.0);
        for c in 0..self.dim {
            self.running_mean[c] =
                (1.0 - self.momentum) * self.running_mean[c] + self.momentum * mean[c];
            self.running_var[c] =
                (1.0 - self.momentum) * self.running_var[c] + self.momentum * var[c] * unbias;
        }
        let mut x_hat = Matrix::zeros(x.rows, x.cols);
        let out = self.normalise(x, &mean, &var, Some(&mut x_hat));
        self.x_hat = x_hat;
        self.var = var;
        Ok(out)
    }

    fn backward(&mut self, grad_out: &Matrix) -> Matrix {
        let rows = grad_out.rows;
        let cols = grad_out.cols;
        let n = rows as f32;
        let mut grad_input = Matrix::zeros(rows, cols);
        let mut grad_gamma = vec![0.0; cols];
        let mut grad_beta = vec![0.0; cols];
        for c in 0..cols {
            let gamma = self.gamma.data()[c];
            let mut sum_dxhat = 0.0;
            let mut sum_dxhat_xhat = 0.0;
            for r in 0..rows {
                let idx = r * cols + c;
                let dy = grad_out.data[idx];
                grad_beta[c] += dy;
                grad_gamma[c] += dy * self.x_hat.data[idx];
                let dxhat = dy * gamma;
                sum_dxhat += dxhat;
                sum_dxhat_xhat += dxhat * self.x_hat.data[idx];
            }
            let inv_std = 1.0 / (self.var[c] + self.eps).sqrt();
            for r in 0..rows {
                let idx = r * cols + c;
                let dxhat = grad_out.data[idx] * gamma;
                grad_input.data[idx] =
                    (dxhat * n - sum_dxhat - self.x_hat.data[idx] * sum_dxhat_xhat) * inv_std / n;
            }
        }
        self.gamma.accumulate(&grad_gamma);
        self.beta.accumulate(&grad_beta);
        grad_input
    }

    fn parameters_mut(&mut self) -> Vec<&mut Param> {
        vec![&mut self.gamma, &mut self.beta]
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn save_state(&self, prefix: &str, out: &mut StateDict) {
        out.insert(format!("{prefix}.weight"), self.gamma.value.clone());
        out.insert(format!("{prefix}.bias"), self.beta.value.clone());
        out.insert(
            format!("{prefix}.running_mean"),
            Tensor::new(self.running_mean.clone(), vec![self.dim]),
        );
        out.insert(
            format!("{prefix}.running_var"),
            Tensor::new(self.running_var.clone(), vec![self.dim]),
        );
    }

    fn load_state(&mut self, prefix: &str, state: &StateDict) -> Result<()> {
        let shape = [self.dim];
        self.gamma.value = state.require(&format!("{prefix}.weight"), &shape)?.clone();
        self.beta.value = state.require(&format!("{prefix}.bias"), &shape)?.clone();
        self.running_mean = state
            .require(&format!("{prefix}.running_mean"), &shape)?
            .data
            .clone();
        self.running_var = state
            .require(&format!("{prefix}.running_var"), &shape)?
            .data
            .clone();
        Ok(())
    }
}
