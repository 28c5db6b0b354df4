use std::fmt;

use crate::memory;

/// Abstraction over the compute device the models run on.
///
/// Training and evaluation call [`Device::release_cache`] at fixed points
/// (epoch boundaries, around evaluation, after each generated sub-batch) so
/// that a device with a caching allocator can hand memory back.
pub trait Device: fmt::Debug + Send + Sync {
    /// Short identifier passed to collaborators such as the FID calculator.
    fn name(&self) -> &str;

    /// Return cached allocations to the system.
    fn release_cache(&self);
}

/// Default CPU implementation of [`Device`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Cpu;

impl Device for Cpu {
    fn name(&self) -> &str {
        "cpu"
    }

    fn release_cache(&self) {
        // The CPU path allocates directly; only report the high-water mark.
        log::debug!("peak memory {:.2} MB", memory::peak_memory_mb());
    }
}
