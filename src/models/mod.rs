pub mod gan;
pub mod sequential;

pub use gan::{ConvDiscriminator, Discriminator, Generator, MlpGenerator, Network};
pub use sequential::Sequential;
