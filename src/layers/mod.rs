pub mod conv;
pub mod layer;
pub mod leaky_relu;
pub mod linear;
pub mod normalization;
pub mod param;
pub mod relu;
pub mod sigmoid;
pub mod state;
pub mod tanh;

pub use conv::{Conv2d, ConvError};
pub use layer::Layer;
pub use leaky_relu::LeakyReLU;
pub use linear::Linear;
pub use normalization::BatchNorm1d;
pub use param::Param;
pub use relu::ReLU;
pub use state::StateDict;
pub use tanh::Tanh;
