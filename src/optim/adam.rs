use serde::{Deserialize, Serialize};

use super::{Optimizer, OptimizerState};
use crate::error::{GanError, Result};
use crate::layers::Param;

/// Internal Adam statistics, one moment buffer pair per parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdamState {
    pub lr: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
    pub weight_decay: f32,
    pub step: u64,
    pub m: Vec<Vec<f32>>,
    pub v: Vec<Vec<f32>>,
}

pub struct Adam {
    pub lr: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
    pub weight_decay: f32,
    step: u64,
    m: Vec<Vec<f32>>,
    v: Vec<Vec<f32>>,
}

impl Adam {
    pub fn new(lr: f32, beta1: f32, beta2: f32, eps: f32, weight_decay: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            eps,
            weight_decay,
            step: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Number of updates applied so far.
    pub fn steps(&self) -> u64 {
        self.step
    }

    fn ensure_slots(&mut self, params: &[&mut Param]) -> Result<()> {
        if self.m.is_empty() {
            self.m = params.iter().map(|p| vec![0.0; p.numel()]).collect();
            self.v = self.m.clone();
            return Ok(());
        }
        if self.m.len() != params.len() {
            return Err(GanError::StateDict(format!(
                "optimizer tracks {} parameters, model has {}",
                self.m.len(),
                params.len()
            )));
        }
        for (i, (slot, p)) in self.m.iter().zip(params).enumerate() {
            if slot.len() != p.numel() {
                return Err(GanError::StateDict(format!(
                    "optimizer slot {i} has {} values, parameter has {}",
                    slot.len(),
                    p.numel()
                )));
            }
        }
        Ok(())
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [&mut Param]) -> Result<()> {
        self.ensure_slots(params)?;
        self.step += 1;
        let t = self.step as i32;
        let bias1 = 1.0 - self.beta1.powi(t);
        let bias2 = 1.0 - self.beta2.powi(t);
        for ((p, m), v) in params.iter_mut().zip(self.m.iter_mut()).zip(self.v.iter_mut()) {
            let Param { value, grad } = &mut **p;
            for i in 0..grad.len() {
                let g = grad[i] + self.weight_decay * value.data[i];
                m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
                v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;
                let m_hat = m[i] / bias1;
                let v_hat = v[i] / bias2;
                value.data[i] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
            }
        }
        Ok(())
    }

    fn state(&self) -> OptimizerState {
        OptimizerState::Adam(AdamState {
            lr: self.lr,
            beta1: self.beta1,
            beta2: self.beta2,
            eps: self.eps,
            weight_decay: self.weight_decay,
            step: self.step,
            m: self.m.clone(),
            v: self.v.clone(),
        })
    }

    fn load_state(&mut self, state: &OptimizerState) -> Result<()> {
        match state {
            OptimizerState::Adam(s) => {
                if s.m.len() != s.v.len() {
                    return Err(GanError::StateDict("adam moment buffers disagree".into()));
                }
                self.lr = s.lr;
                self.beta1 = s.beta1;
                self.beta2 = s.beta2;
                self.eps = s.eps;
                self.weight_decay = s.weight_decay;
                self.step = s.step;
                self.m = s.m.clone();
                self.v = s.v.clone();
                Ok(())
            }
            other => Err(GanError::StateDict(format!(
                "expected adam optimizer state, found {}",
                other.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    #[test]
    fn first_step_moves_by_lr() {
        let mut p = Param::new(Tensor::new(vec![1.0, -1.0], vec![2]));
        p.grad = vec![0.5, -2.0];
        let mut adam = Adam::new(0.1, 0.9, 0.999, 1e-8, 0.0);
        adam.step(&mut [&mut p]).unwrap();
        // bias-corrected first step is lr * sign(g)
        assert!((p.data()[0] - 0.9).abs() < 1e-4);
        assert!((p.data()[1] + 0.9).abs() < 1e-4);
        assert_eq!(adam.steps(), 1);
    }

    #[test]
    fn state_round_trip_restores_moments() {
        let mut p = Param::new(Tensor::new(vec![0.0; 3], vec![3]));
        p.grad = vec![1.0, 2.0, 3.0];
        let mut adam = Adam::new(0.01, 0.5, 0.999, 1e-8, 0.0);
        adam.step(&mut [&mut p]).unwrap();
        let state = adam.state();
        let mut fresh = Adam::new(1.0, 0.0, 0.0, 0.0, 0.0);
        fresh.load_state(&state).unwrap();
        assert_eq!(fresh.state(), state);
    }

    #[test]
    fn mismatched_slots_are_an_error() {
        let mut a = Param::new(Tensor::zeros(vec![2]));
        let mut b = Param::new(Tensor::zeros(vec![3]));
        let mut adam = Adam::new(0.01, 0.5, 0.999, 1e-8, 0.0);
        adam.step(&mut [&mut a]).unwrap();
        assert!(adam.step(&mut [&mut a, &mut b]).is_err());
    }
}
