use std::{
    alloc::Layout,
    fmt::Debug,
    ptr::NonNull,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

use super::Device;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("zero-sized allocation")]
    Empty,
    #[error("no allocator backend for device {0}")]
    Device(Device),
    #[error("allocator {name} failed to provide {size} bytes aligned to {alignment}")]
    Exhausted {
        name: &'static str,
        size: usize,
        alignment: usize,
    },
}

/// Rounds `alignment` up to a power of two no smaller than pointer width.
#[inline]
pub fn normalize_alignment(alignment: usize) -> usize {
    alignment
        .max(size_of::<*const u8>())
        .checked_next_power_of_two()
        .unwrap_or(usize::MAX)
}

/// A pluggable, device-aware memory provider.
///
/// # Safety
/// A successful [`allocate`](Allocator::allocate) must return memory that is valid for
/// reads and writes of `size` bytes, aligned to [`normalize_alignment`]`(alignment)`, and
/// not handed out again until it is passed back to [`free`](Allocator::free).
pub unsafe trait Allocator: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Returns `None` for zero sizes, devices without a backend, or platform failure.
    /// Contents are unspecified.
    fn allocate(&self, size: usize, alignment: usize, device: Device) -> Option<NonNull<u8>>;

    /// Like [`allocate`](Allocator::allocate) but zero-filled.
    fn allocate_zeroed(&self, size: usize, alignment: usize, device: Device) -> Option<NonNull<u8>> {
        let ptr = self.allocate(size, alignment, device)?;
        // SAFETY: the allocator contract makes `ptr` valid for `size` byte writes.
        unsafe { ptr.as_ptr().write_bytes(0, size) };
        Some(ptr)
    }

    /// Returns memory to the allocator. A null `ptr` or a non-CPU `device` is a no-op.
    ///
    /// # Safety
    /// `ptr` must come from this allocator with the same `size`, `alignment` and `device`,
    /// and must not be freed twice.
    unsafe fn free(&self, ptr: *mut u8, size: usize, alignment: usize, device: Device);
}

/// Host allocator backed by the platform's aligned allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl SystemAllocator {
    fn layout(size: usize, alignment: usize, device: Device) -> Option<Layout> {
        if size == 0 || !device.is_cpu() {
            return None;
        }
        Layout::from_size_align(size, normalize_alignment(alignment)).ok()
    }
}

unsafe impl Allocator for SystemAllocator {
    fn name(&self) -> &'static str {
        "system"
    }

    fn allocate(&self, size: usize, alignment: usize, device: Device) -> Option<NonNull<u8>> {
        let layout = Self::layout(size, alignment, device)?;
        // SAFETY: `layout` has a non-zero size.
        NonNull::new(unsafe { std::alloc::alloc(layout) })
    }

    fn allocate_zeroed(&self, size: usize, alignment: usize, device: Device) -> Option<NonNull<u8>> {
        let layout = Self::layout(size, alignment, device)?;
        // SAFETY: `layout` has a non-zero size.
        NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) })
    }

    unsafe fn free(&self, ptr: *mut u8, size: usize, alignment: usize, device: Device) {
        if ptr.is_null() || !device.is_cpu() {
            return;
        }
        if let Some(layout) = Self::layout(size, alignment, device) {
            // SAFETY: the caller passes back a pointer obtained with this exact layout.
            unsafe { std::alloc::dealloc(ptr, layout) }
        }
    }
}

#[derive(Debug, Default)]
struct Ledger {
    live: HashMap<usize, usize>,
    allocations: usize,
    frees: usize,
}

/// Wraps another allocator and keeps a ledger of live allocations.
#[derive(Debug, Default)]
pub struct TrackingAllocator<A = SystemAllocator> {
    inner: A,
    ledger: Mutex<Ledger>,
}

impl<A: Allocator> TrackingAllocator<A> {
    pub fn new(inner: A) -> Self {
        let ledger = Default::default();
        Self { inner, ledger }
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, ptr: Option<NonNull<u8>>, size: usize) -> Option<NonNull<u8>> {
        let ptr = ptr?;
        let mut ledger = self.ledger();
        ledger.live.insert(ptr.as_ptr() as usize, size);
        ledger.allocations += 1;
        Some(ptr)
    }

    /// Number of allocations not yet freed.
    pub fn live(&self) -> usize {
        self.ledger().live.len()
    }

    /// Bytes held by allocations not yet freed.
    pub fn live_bytes(&self) -> usize {
        self.ledger().live.values().sum()
    }

    /// Number of successful allocations so far.
    pub fn allocations(&self) -> usize {
        self.ledger().allocations
    }

    pub fn frees(&self) -> usize {
        self.ledger().frees
    }
}

unsafe impl<A: Allocator> Allocator for TrackingAllocator<A> {
    fn name(&self) -> &'static str {
        "tracking"
    }

    fn allocate(&self, size: usize, alignment: usize, device: Device) -> Option<NonNull<u8>> {
        self.record(self.inner.allocate(size, alignment, device), size)
    }

    fn allocate_zeroed(&self, size: usize, alignment: usize, device: Device) -> Option<NonNull<u8>> {
        self.record(self.inner.allocate_zeroed(size, alignment, device), size)
    }

    unsafe fn free(&self, ptr: *mut u8, size: usize, alignment: usize, device: Device) {
        if ptr.is_null() {
            return;
        }
        {
            let mut ledger = self.ledger();
            if ledger.live.remove(&(ptr as usize)).is_none() {
                log::error!("tracking allocator: free of unknown pointer {ptr:p}");
                return;
            }
            ledger.frees += 1;
        }
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.free(ptr, size, alignment, device) }
    }
}

static DEFAULT_ALLOCATOR: RwLock<Option<Arc<dyn Allocator>>> = RwLock::new(None);

/// The process-wide allocator new contexts capture when none is supplied.
pub fn default_allocator() -> Arc<dyn Allocator> {
    let binding = DEFAULT_ALLOCATOR
        .read()
        .unwrap_or_else(PoisonError::into_inner);
    match binding.as_ref() {
        Some(allocator) => allocator.clone(),
        None => Arc::new(SystemAllocator),
    }
}

/// Replaces the process-wide default and returns the previous one.
///
/// Contexts already built keep the allocator they captured, so buffers are always freed
/// by the allocator that produced them.
pub fn set_default_allocator(allocator: Arc<dyn Allocator>) -> Arc<dyn Allocator> {
    let mut binding = DEFAULT_ALLOCATOR
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    log::debug!("default allocator set to {}", allocator.name());
    match binding.replace(allocator) {
        Some(previous) => previous,
        None => Arc::new(SystemAllocator),
    }
}
