use crate::error::{GanError, Result};
use crate::layers::{Layer, Param, StateDict};
use crate::math::Matrix;

/// A simple container that applies layers sequentially.
///
/// State-dict keys are `layers.<index>.<name>`.
pub struct Sequential {
    /// Ordered list of layers.
    pub layers: Vec<Box<dyn Layer>>,
    training: bool,
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequential {
    /// Create an empty sequential model in training mode.
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            training: true,
        }
    }

    /// Append a layer to the sequence.
    pub fn add_layer(&mut self, layer: Box<dyn Layer>) {
        self.layers.push(layer);
    }

    /// Builder-style [`Sequential::add_layer`].
    pub fn with<L: Layer + 'static>(mut self, layer: L) -> Self {
        self.add_layer(Box::new(layer));
        self
    }

    /// Forward pass used during inference.
    pub fn forward(&self, x: &Matrix) -> Result<Matrix> {
        let mut out = x.clone();
        for layer in &self.layers {
            out = layer.forward(&out)?;
        }
        Ok(out)
    }

    /// Forward pass used during training.
    pub fn forward_train(&mut self, x: &Matrix) -> Result<Matrix> {
        let mut out = x.clone();
        for layer in self.layers.iter_mut() {
            out = layer.forward_train(&out)?;
        }
        Ok(out)
    }

    /// Backward pass returning gradient with respect to the input.
    pub fn backward(&mut self, grad_out: &Matrix) -> Matrix {
        let mut grad = grad_out.clone();
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(&grad);
        }
        grad
    }

    /// Zero any accumulated gradients in all layers.
    pub fn zero_grad(&mut self) {
        for layer in self.layers.iter_mut() {
            layer.zero_grad();
        }
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Param> {
        self.layers
            .iter_mut()
            .flat_map(|l| l.parameters_mut())
            .collect()
    }

    pub fn parameter_count(&mut self) -> usize {
        self.parameters_mut().iter().map(|p| p.numel()).sum()
    }

    pub fn set_training(&mut self, training: bool) {
        self.training = training;
        for layer in self.layers.iter_mut() {
            layer.set_training(training);
        }
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn state_dict(&self) -> StateDict {
        let mut out = StateDict::new();
        for (i, layer) in self.layers.iter().enumerate() {
            layer.save_state(&format!("layers.{i}"), &mut out);
        }
        out
    }

    pub fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        let expected = self.state_dict();
        if let Some(extra) = state.entries.keys().find(|k| expected.get(k).is_none()) {
            return Err(GanError::StateDict(format!("unexpected key {extra}")));
        }
        for (i, layer) in self.layers.iter_mut().enumerate() {
            layer.load_state(&format!("layers.{i}"), state)?;
        }
        Ok(())
    }
}
