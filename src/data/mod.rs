pub mod dataloader;
pub mod image_folder;

pub use dataloader::{Batch, DataLoader, LoaderOptions};
pub use image_folder::ImageFolder;

use crate::error::Result;
use crate::tensor::Tensor;

/// Indexed collection of image samples.
///
/// Implementations return one `[3, s, s]` tensor per index with values in
/// `[-1, 1]`. `get` may be called from several worker threads at once.
pub trait Dataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Result<Tensor>;
}
