use super::param::Param;
use super::state::StateDict;
use crate::error::Result;
use crate::math::Matrix;

/// Common interface for network layers.
///
/// Inputs and outputs are batches with one flattened sample per row.
pub trait Layer: Send {
    /// Forward pass used during inference. Caches nothing.
    fn forward(&self, x: &Matrix) -> Result<Matrix>;

    /// Forward pass used during training, caching what [`Layer::backward`]
    /// needs.
    fn forward_train(&mut self, x: &Matrix) -> Result<Matrix>;

    /// Backward pass accumulating parameter gradients and returning the
    /// gradient with respect to the input of the last `forward_train`.
    fn backward(&mut self, grad_out: &Matrix) -> Matrix;

    /// Zero any accumulated gradients.
    fn zero_grad(&mut self) {
        for p in self.parameters_mut() {
            p.zero_grad();
        }
    }

    /// Trainable parameters in a stable order.
    fn parameters_mut(&mut self) -> Vec<&mut Param> {
        Vec::new()
    }

    /// Switch between training and inference behaviour.
    fn set_training(&mut self, _training: bool) {}

    /// Export parameters and buffers under `prefix`.
    fn save_state(&self, _prefix: &str, _out: &mut StateDict) {}

    /// Restore parameters and buffers exported by [`Layer::save_state`].
    fn load_state(&mut self, _prefix: &str, _state: &StateDict) -> Result<()> {
        Ok(())
    }
}
