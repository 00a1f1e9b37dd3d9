use derive_more::{Deref, Display};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Device;
use crate::loom::tensor::TensorError;

/// Direction of a transfer between two devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CopyDirection {
    #[display("host to host")]
    HostToHost,
    #[display("host to device")]
    HostToDevice,
    #[display("device to host")]
    DeviceToHost,
    #[display("device to device")]
    DeviceToDevice,
}

impl CopyDirection {
    /// Whether a backend for this direction is present.
    #[inline]
    pub fn is_supported(self) -> bool {
        matches!(self, CopyDirection::HostToHost)
    }
}

pub fn copy_direction(src: Device, dst: Device) -> CopyDirection {
    match (src.is_cpu(), dst.is_cpu()) {
        (true, true) => CopyDirection::HostToHost,
        (true, false) => CopyDirection::HostToDevice,
        (false, true) => CopyDirection::DeviceToHost,
        (false, false) => CopyDirection::DeviceToDevice,
    }
}

/// Blocks until all work queued on `device` has completed.
///
/// The host executes synchronously, so this is a no-op for [`Device::Cpu`].
pub fn synchronize(device: Device) -> Result<(), TensorError> {
    match device {
        Device::Cpu => Ok(()),
        device => Err(TensorError::Device(device)),
    }
}

#[derive(Debug, Default, Display, Clone, Copy, PartialEq, Eq, Hash, Deref)]
pub struct StreamId(uid::Id<StreamId>);

/// An ordered queue of work on one device.
#[derive(Debug, PartialEq, Eq)]
pub struct Stream {
    id: StreamId,
    device: Device,
}

impl Stream {
    pub fn create(device: Device) -> Result<Self, TensorError> {
        if !device.is_available() {
            return Err(TensorError::Device(device));
        }
        let id = StreamId(uid::Id::new());
        log::debug!("created stream {id} on {device}");
        Ok(Self { id, device })
    }

    #[inline]
    pub fn id(&self) -> StreamId {
        self.id
    }

    #[inline]
    pub fn device(&self) -> Device {
        self.device
    }

    pub fn sync(&self) -> Result<(), TensorError> {
        synchronize(self.device)
    }

    pub fn destroy(self) {
        log::debug!("destroyed stream {} on {}", self.id, self.device);
    }
}
