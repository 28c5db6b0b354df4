pub mod adam;
pub mod sgd;

pub use adam::{Adam, AdamState};
pub use sgd::Sgd;

use serde::{Deserialize, Serialize};

use crate::config::{OptimizerKind, TrainConfig};
use crate::error::Result;
use crate::layers::Param;
use crate::math::Matrix;

/// Serialisable optimiser internals, stored in checkpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OptimizerState {
    Adam(AdamState),
    Sgd { lr: f32, weight_decay: f32 },
}

impl OptimizerState {
    pub fn kind(&self) -> &'static str {
        match self {
            OptimizerState::Adam(_) => "adam",
            OptimizerState::Sgd { .. } => "sgd",
        }
    }
}

/// Common interface for optimizers operating on [`Param`]s.
pub trait Optimizer: Send {
    /// Update the provided parameters in-place from their gradients.
    fn step(&mut self, params: &mut [&mut Param]) -> Result<()>;

    fn state(&self) -> OptimizerState;

    fn load_state(&mut self, state: &OptimizerState) -> Result<()>;
}

/// Build the optimiser selected in `config`.
pub fn from_config(config: &TrainConfig) -> Box<dyn Optimizer> {
    match config.optimizer {
        OptimizerKind::Adam => Box::new(Adam::new(
            config.learning_rate,
            config.beta1,
            config.beta2,
            1e-8,
            0.0,
        )),
        OptimizerKind::Sgd => Box::new(Sgd::new(config.learning_rate, 0.0)),
    }
}

/// Loss over a batch of logits against a constant target value.
pub trait Loss {
    /// Mean loss and its gradient with respect to `logits`.
    fn loss_and_grad(&self, logits: &Matrix, target: f32) -> (f32, Matrix);
}

/// Binary cross-entropy on raw logits, averaged over elements.
///
/// Uses `max(x, 0) - x·t + ln(1 + e^{-|x|})` so large logits neither
/// overflow nor lose precision.
#[derive(Clone, Copy, Debug, Default)]
pub struct BceWithLogits;

impl Loss for BceWithLogits {
    fn loss_and_grad(&self, logits: &Matrix, target: f32) -> (f32, Matrix) {
        let n = logits.data.len().max(1) as f32;
        let mut grad = Matrix::zeros(logits.rows, logits.cols);
        let mut total = 0.0f32;
        for (g, &x) in grad.data.iter_mut().zip(logits.data.iter()) {
            total += x.max(0.0) - x * target + (-x.abs()).exp().ln_1p();
            *g = (crate::math::sigmoid(x) - target) / n;
        }
        (total / n, grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bce_matches_probability_form() {
        let logits = Matrix::from_vec(2, 1, vec![0.3, -1.2]);
        let (loss, grad) = BceWithLogits.loss_and_grad(&logits, 0.9);
        let mut expected = 0.0;
        for &x in &logits.data {
            let p = crate::math::sigmoid(x);
            expected += -(0.9 * p.ln() + 0.1 * (1.0 - p).ln());
        }
        expected /= 2.0;
        assert!((loss - expected).abs() < 1e-5);
        let p0 = crate::math::sigmoid(0.3);
        assert!((grad.data[0] - (p0 - 0.9) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn bce_is_finite_for_extreme_logits() {
        let logits = Matrix::from_vec(1, 2, vec![80.0, -80.0]);
        let (loss, grad) = BceWithLogits.loss_and_grad(&logits, 0.0);
        assert!(loss.is_finite() && loss >= 0.0);
        assert!(grad.data.iter().all(|g| g.is_finite()));
    }
}
