use super::{Optimizer, OptimizerState};
use crate::error::{GanError, Result};
use crate::layers::Param;

pub struct Sgd {
    pub lr: f32,
    pub weight_decay: f32,
}

impl Sgd {
    pub fn new(lr: f32, weight_decay: f32) -> Self {
        Self { lr, weight_decay }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut [&mut Param]) -> Result<()> {
        for p in params.iter_mut() {
            let Param { value, grad } = &mut **p;
            for (w, g) in value.data.iter_mut().zip(grad.iter()) {
                *w -= self.lr * (g + self.weight_decay * *w);
            }
        }
        Ok(())
    }

    fn state(&self) -> OptimizerState {
        OptimizerState::Sgd {
            lr: self.lr,
            weight_decay: self.weight_decay,
        }
    }

    fn load_state(&mut self, state: &OptimizerState) -> Result<()> {
        match state {
            OptimizerState::Sgd { lr, weight_decay } => {
                self.lr = *lr;
                self.weight_decay = *weight_decay;
                Ok(())
            }
            other => Err(GanError::StateDict(format!(
                "expected sgd optimizer state, found {}",
                other.kind()
            ))),
        }
    }
}
