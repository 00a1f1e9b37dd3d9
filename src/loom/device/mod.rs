use derive_more::Display;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use allocator::{
    AllocError, Allocator, SystemAllocator, TrackingAllocator, default_allocator,
    normalize_alignment, set_default_allocator,
};
pub use arena::{Arena, Buffer, BufferId};
pub use sync::{CopyDirection, Stream, copy_direction, synchronize};

pub mod allocator;
pub mod arena;
pub mod sync;

/// Execution target of a tensor buffer.
///
/// Only [`Device::Cpu`] is backed by this crate. The other variants are reserved for
/// downstream backends: anything targeting them fails or is a no-op.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Device {
    #[default]
    #[display("cpu")]
    Cpu,
    #[display("gpu")]
    Gpu,
    #[display("npu")]
    Npu,
}

impl Device {
    #[inline]
    pub fn is_cpu(self) -> bool {
        matches!(self, Device::Cpu)
    }

    /// Whether a backend for this device is present.
    #[inline]
    pub fn is_available(self) -> bool {
        self.is_cpu()
    }
}

#[cfg(test)]
mod tests {
    use super::Device;

    #[test]
    fn test_device() {
        assert_eq!(Device::default(), Device::Cpu);
        assert!(Device::Cpu.is_available());
        assert!(!Device::Gpu.is_available());
        assert!(!Device::Npu.is_available());
        assert_eq!(Device::Npu.to_string(), "npu");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde() -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string(&Device::Gpu)?;
        let device: Device = serde_json::from_str(&json)?;
        assert_eq!(device, Device::Gpu);
        Ok(())
    }
}
