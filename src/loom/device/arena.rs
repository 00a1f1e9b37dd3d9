use std::{ptr::NonNull, sync::Arc};

use derive_more::{Deref, DerefMut, Display};
use rustc_hash::FxHashMap as HashMap;

use super::{AllocError, Allocator, Device};
use crate::loom::tensor::TensorError;

/// Handle of a [`Buffer`] inside an [`Arena`]. Ids are never reused.
#[derive(Debug, Default, Display, Clone, Copy, PartialEq, Eq, Hash, Deref, DerefMut)]
pub struct BufferId(uid::Id<BufferId>);

impl BufferId {
    #[inline]
    pub fn new() -> Self {
        Self(uid::Id::new())
    }
}

#[derive(Debug, Clone)]
enum Origin {
    /// Freed through the allocator on drop.
    Owned(Arc<dyn Allocator>),
    /// Caller-provided memory; never freed here.
    Foreign,
}

/// A contiguous block of device memory.
#[derive(Debug)]
pub struct Buffer {
    ptr: NonNull<u8>,
    len: usize,
    alignment: usize,
    device: Device,
    origin: Origin,
}

// SAFETY: a `Buffer` is the unique handle of its memory; owned memory comes from a
// `Send + Sync` allocator and foreign memory is vouched for by the caller of `foreign`.
unsafe impl Send for Buffer {}

impl Buffer {
    /// Allocates `len` zero-filled bytes from `allocator`.
    pub fn allocate(
        allocator: Arc<dyn Allocator>,
        len: usize,
        alignment: usize,
        device: Device,
    ) -> Result<Self, AllocError> {
        if len == 0 {
            return Err(AllocError::Empty);
        }
        if !device.is_available() {
            return Err(AllocError::Device(device));
        }
        let Some(ptr) = allocator.allocate_zeroed(len, alignment, device) else {
            log::error!(
                "allocator {} failed: {len} bytes aligned to {alignment} on {device}",
                allocator.name()
            );
            return Err(AllocError::Exhausted {
                name: allocator.name(),
                size: len,
                alignment,
            });
        };
        log::debug!("allocated {len} bytes on {device} from {}", allocator.name());
        let origin = Origin::Owned(allocator);
        Ok(Self {
            ptr,
            len,
            alignment,
            device,
            origin,
        })
    }

    /// Adopts caller-provided memory without taking ownership of it.
    ///
    /// # Safety
    /// For as long as the buffer lives, `ptr` must be valid for reads and writes of `len`
    /// initialized bytes and must not be accessed through any other path.
    pub unsafe fn foreign(ptr: NonNull<u8>, len: usize, device: Device) -> Self {
        let alignment = 1 << ptr.as_ptr().addr().trailing_zeros().min(12);
        Self {
            ptr,
            len,
            alignment,
            device,
            origin: Origin::Foreign,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn device(&self) -> Device {
        self.device
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Whether dropping the buffer returns its memory to an allocator.
    #[inline]
    pub fn is_owned(&self) -> bool {
        matches!(self.origin, Origin::Owned(_))
    }

    /// Host view of the contents. Fails for memory that does not live on the host.
    pub fn bytes(&self) -> Result<&[u8], TensorError> {
        if !self.device.is_cpu() {
            return Err(TensorError::Device(self.device));
        }
        // SAFETY: host memory, valid and initialized for `len` bytes (zero-filled on
        // allocation, or guaranteed by the caller of `foreign`).
        Ok(unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) })
    }

    pub fn bytes_mut(&mut self) -> Result<&mut [u8], TensorError> {
        if !self.device.is_cpu() {
            return Err(TensorError::Device(self.device));
        }
        // SAFETY: as in `bytes`, and `&mut self` makes the access unique.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) })
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Origin::Owned(allocator) = &self.origin {
            log::debug!("freeing {} bytes on {}", self.len, self.device);
            // SAFETY: `ptr` came from this allocator with these exact parameters.
            unsafe {
                allocator.free(self.ptr.as_ptr(), self.len, self.alignment, self.device);
            }
        }
    }
}

/// Slot map of the buffers a context has handed out.
#[derive(Debug, Default)]
pub struct Arena {
    buffers: HashMap<BufferId, Buffer>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, buffer: Buffer) -> BufferId {
        let id = BufferId::new();
        self.buffers.insert(id, buffer);
        id
    }

    #[inline]
    pub fn get(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: BufferId) -> Option<&mut Buffer> {
        self.buffers.get_mut(&id)
    }

    #[inline]
    pub fn contains(&self, id: BufferId) -> bool {
        self.buffers.contains_key(&id)
    }

    /// Takes the buffer out of the arena. Dropping it frees owned memory.
    #[inline]
    pub fn remove(&mut self, id: BufferId) -> Option<Buffer> {
        self.buffers.remove(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Total bytes held by the arena's buffers.
    pub fn bytes(&self) -> usize {
        self.buffers.values().map(Buffer::len).sum()
    }

    /// Runs `f` with mutable access to buffer `id` and shared access to every other buffer.
    ///
    /// The buffer is detached from the map for the duration of the call, so `f` cannot
    /// look it up through the arena. Returns `None` if `id` is not present.
    pub fn with_output<R>(
        &mut self,
        id: BufferId,
        f: impl FnOnce(&Arena, &mut Buffer) -> R,
    ) -> Option<R> {
        let mut buffer = self.buffers.remove(&id)?;
        let output = f(self, &mut buffer);
        self.buffers.insert(id, buffer);
        Some(output)
    }
}
