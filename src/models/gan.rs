use rand::Rng;

use super::sequential::Sequential;
use crate::error::{GanError, Result};
use crate::layers::{BatchNorm1d, Conv2d, LeakyReLU, Linear, Param, ReLU, StateDict, Tanh};
use crate::math::Matrix;

/// Behaviour shared by both adversaries: gradients, parameters, mode and
/// (de)serialisation.
pub trait Network: Send {
    fn zero_grad(&mut self);

    /// Trainable parameters in a stable order. The optimiser relies on the
    /// order to match its per-parameter state.
    fn parameters_mut(&mut self) -> Vec<&mut Param>;

    fn set_training(&mut self, training: bool);

    fn is_training(&self) -> bool;

    fn state_dict(&self) -> StateDict;

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()>;
}

/// Maps noise rows of width [`Generator::noise_dim`] to flattened images in
/// `[-1, 1]` of shape [`Generator::image_shape`].
pub trait Generator: Network {
    fn noise_dim(&self) -> usize;

    /// `[channels, height, width]` of one generated sample.
    fn image_shape(&self) -> [usize; 3];

    /// Forward pass keeping activations for [`Generator::backward`].
    fn forward_train(&mut self, z: &Matrix) -> Result<Matrix>;

    /// Accumulate parameter gradients given the gradient of the output
    /// images.
    fn backward(&mut self, grad_out: &Matrix);

    /// Inference forward pass. No activations are kept and no parameters or
    /// buffers change.
    fn generate(&self, z: &Matrix) -> Result<Matrix>;
}

/// Maps flattened images to one realness logit per row.
pub trait Discriminator: Network {
    fn forward_train(&mut self, x: &Matrix) -> Result<Matrix>;

    /// Accumulate parameter gradients and return the gradient with respect to
    /// the input images.
    fn backward(&mut self, grad_out: &Matrix) -> Matrix;

    fn predict(&self, x: &Matrix) -> Result<Matrix>;
}

/// Fully connected generator: `Linear → BatchNorm → ReLU → Linear → Tanh`.
pub struct MlpGenerator {
    net: Sequential,
    noise_dim: usize,
    image_size: usize,
}

impl MlpGenerator {
    pub fn new<R: Rng + ?Sized>(
        noise_dim: usize,
        hidden_dim: usize,
        image_size: usize,
        rng: &mut R,
    ) -> Self {
        let out_dim = 3 * image_size * image_size;
        let net = Sequential::new()
            .with(Linear::new(noise_dim, hidden_dim, rng))
            .with(BatchNorm1d::new(hidden_dim))
            .with(ReLU::new())
            .with(Linear::new(hidden_dim, out_dim, rng))
            .with(Tanh::new());
        Self {
            net,
            noise_dim,
            image_size,
        }
    }

    pub fn parameter_count(&mut self) -> usize {
        self.net.parameter_count()
    }

    fn check_noise(&self, z: &Matrix) -> Result<()> {
        if z.cols != self.noise_dim {
            return Err(GanError::Shape {
                expected: vec![z.rows, self.noise_dim],
                actual: vec![z.rows, z.cols],
            });
        }
        Ok(())
    }
}

impl Network for MlpGenerator {
    fn zero_grad(&mut self) {
        self.net.zero_grad();
    }

    fn parameters_mut(&mut self) -> Vec<&mut Param> {
        self.net.parameters_mut()
    }

    fn set_training(&mut self, training: bool) {
        self.net.set_training(training);
    }

    fn is_training(&self) -> bool {
        self.net.is_training()
    }

    fn state_dict(&self) -> StateDict {
        self.net.state_dict()
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        self.net.load_state_dict(state)
    }
}

impl Generator for MlpGenerator {
    fn noise_dim(&self) -> usize {
        self.noise_dim
    }

    fn image_shape(&self) -> [usize; 3] {
        [3, self.image_size, self.image_size]
    }

    fn forward_train(&mut self, z: &Matrix) -> Result<Matrix> {
        self.check_noise(z)?;
        self.net.forward_train(z)
    }

    fn backward(&mut self, grad_out: &Matrix) {
        self.net.backward(grad_out);
    }

    fn generate(&self, z: &Matrix) -> Result<Matrix> {
        self.check_noise(z)?;
        self.net.forward(z)
    }
}

/// Strided convolutional discriminator:
/// `Conv(3→c) → LeakyReLU → Conv(c→2c) → LeakyReLU → Linear(→1)`.
///
/// Both convolutions use kernel 4, stride 2, padding 1, halving the edge
/// length each time.
pub struct ConvDiscriminator {
    net: Sequential,
    image_size: usize,
}

impl ConvDiscriminator {
    pub fn new<R: Rng + ?Sized>(image_size: usize, base_channels: usize, rng: &mut R) -> Self {
        let conv1 = Conv2d::new(3, base_channels, 4, 2, 1, rng);
        let s1 = conv1.output_size(image_size);
        let conv2 = Conv2d::new(base_channels, base_channels * 2, 4, 2, 1, rng);
        let s2 = conv2.output_size(s1);
        let net = Sequential::new()
            .with(conv1)
            .with(LeakyReLU::default())
            .with(conv2)
            .with(LeakyReLU::default())
            .with(Linear::new(base_channels * 2 * s2 * s2, 1, rng));
        Self { net, image_size }
    }

    pub fn parameter_count(&mut self) -> usize {
        self.net.parameter_count()
    }

    fn check_images(&self, x: &Matrix) -> Result<()> {
        let width = 3 * self.image_size * self.image_size;
        if x.cols != width {
            return Err(GanError::Shape {
                expected: vec![x.rows, width],
                actual: vec![x.rows, x.cols],
            });
        }
        Ok(())
    }
}

impl Network for ConvDiscriminator {
    fn zero_grad(&mut self) {
        self.net.zero_grad();
    }

    fn parameters_mut(&mut self) -> Vec<&mut Param> {
        self.net.parameters_mut()
    }

    fn set_training(&mut self, training: bool) {
        self.net.set_training(training);
    }

    fn is_training(&self) -> bool {
        self.net.is_training()
    }

    fn state_dict(&self) -> StateDict {
        self.net.state_dict()
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        self.net.load_state_dict(state)
    }
}

impl Discriminator for ConvDiscriminator {
    fn forward_train(&mut self, x: &Matrix) -> Result<Matrix> {
        self.check_images(x)?;
        self.net.forward_train(x)
    }

    fn backward(&mut self, grad_out: &Matrix) -> Matrix {
        self.net.backward(grad_out)
    }

    fn predict(&self, x: &Matrix) -> Result<Matrix> {
        self.check_images(x)?;
        self.net.forward(x)
    }
}
