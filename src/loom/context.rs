use std::{ptr::NonNull, sync::Arc};

use derive_more::{Deref, Display};

use super::{
    device::{
        AllocError, Allocator, Arena, Buffer, Device, copy_direction, default_allocator,
        normalize_alignment,
    },
    layout::{IntoShape, Shape, byte_size},
    num::{DataType, Element},
    scalar::Scalar,
    tensor::{Tensor, TensorError},
};

/// Alignment of every allocation unless configured otherwise, one cache line.
pub const DEFAULT_ALIGNMENT: usize = 64;

#[derive(Debug, Default, Display, Clone, Copy, PartialEq, Eq, Hash, Deref)]
pub struct ContextId(uid::Id<ContextId>);

#[derive(Debug, Clone)]
pub struct ContextBuilder {
    allocator: Option<Arc<dyn Allocator>>,
    strict: bool,
    alignment: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            allocator: None,
            strict: cfg!(feature = "strict"),
            alignment: DEFAULT_ALIGNMENT,
        }
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The allocator backing every buffer of the context. Defaults to [`default_allocator`]
    /// at the time of [`build`](Self::build).
    pub fn allocator(mut self, allocator: Arc<dyn Allocator>) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// Whether kernel precondition failures are errors (`true`) or logged no-ops (`false`).
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Minimum alignment of allocations, rounded up to a power of two.
    pub fn alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn build(self) -> Context {
        let allocator = self.allocator.unwrap_or_else(default_allocator);
        let alignment = normalize_alignment(self.alignment);
        let id = ContextId(uid::Id::new());
        log::debug!(
            "context {id}: allocator {}, alignment {alignment}, strict {}",
            allocator.name(),
            self.strict
        );
        Context {
            id,
            allocator,
            arena: Arena::new(),
            strict: self.strict,
            alignment,
        }
    }
}

/// Owner of tensor memory.
///
/// Every buffer a tensor refers to lives in the context's [`Arena`] and is allocated by the
/// allocator captured at construction. Dropping the context frees all of its buffers.
#[derive(Debug)]
pub struct Context {
    id: ContextId,
    allocator: Arc<dyn Allocator>,
    arena: Arena,
    strict: bool,
    alignment: usize,
}

impl Default for Context {
    fn default() -> Self {
        ContextBuilder::new().build()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn id(&self) -> ContextId {
        self.id
    }

    #[inline]
    pub fn allocator(&self) -> &Arc<dyn Allocator> {
        &self.allocator
    }

    #[inline]
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    #[inline]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Allocates an owning, zero-filled, canonically strided tensor.
    ///
    /// A shape with zero elements yields a non-owning tensor with no buffer.
    pub fn alloc(
        &mut self,
        shape: impl IntoShape,
        r#type: DataType,
        device: Device,
    ) -> Result<Tensor, TensorError> {
        let shape = shape.into_shape()?;
        if !device.is_available() {
            return Err(AllocError::Device(device).into());
        }
        if shape.numel() == 0 {
            return Ok(Tensor::borrowed(None, shape, r#type, device));
        }
        let len = byte_size(&shape, r#type);
        let alignment = self.alignment.max(r#type.alignment());
        let buffer = Buffer::allocate(self.allocator.clone(), len, alignment, device)?;
        let id = self.arena.insert(buffer);
        Ok(Tensor::owned(id, shape, r#type, device))
    }

    /// Same as [`alloc`](Self::alloc): allocations are always zero-filled.
    #[inline]
    pub fn zeros(
        &mut self,
        shape: impl IntoShape,
        r#type: DataType,
        device: Device,
    ) -> Result<Tensor, TensorError> {
        self.alloc(shape, r#type, device)
    }

    /// Returns an owning tensor's buffer to the allocator and nulls the handle.
    ///
    /// Releasing a view, a null tensor or an already released tensor does nothing. A tensor
    /// whose buffer belongs to another context is left untouched. Views of a released buffer
    /// keep their handle but every access through them fails.
    pub fn release(&mut self, tensor: &mut Tensor) {
        match tensor.buffer() {
            Some(id) if tensor.ownership() && !self.arena.contains(id) => {
                log::warn!("context {}: buffer {id} is not held here", self.id);
            }
            _ => {
                if let Some(id) = tensor.disown() {
                    self.arena.remove(id);
                    log::debug!("context {}: released buffer {id}", self.id);
                }
            }
        }
    }

    /// Wraps caller-owned memory in a non-owning tensor with canonical strides.
    ///
    /// # Safety
    /// Until the buffer is [`detach`](Self::detach)ed or the context is dropped, `ptr` must
    /// stay valid for reads and writes of `len` initialized bytes, and must not be accessed
    /// by anything but this context.
    pub unsafe fn wrap(
        &mut self,
        ptr: NonNull<u8>,
        len: usize,
        shape: impl IntoShape,
        r#type: DataType,
        device: Device,
    ) -> Result<Tensor, TensorError> {
        let shape = shape.into_shape()?;
        let nbytes = byte_size(&shape, r#type);
        if nbytes > len {
            return Err(TensorError::Bounds(0..nbytes, len));
        }
        // SAFETY: forwarded caller contract.
        let buffer = unsafe { Buffer::foreign(ptr, len, device) };
        let id = self.arena.insert(buffer);
        Ok(Tensor::borrowed(Some(id), shape, r#type, device))
    }

    /// Hands wrapped memory back to the caller. Tensors over it become invalid.
    pub fn detach(&mut self, tensor: &Tensor) -> Result<(), TensorError> {
        let id = tensor.buffer().ok_or(TensorError::Null)?;
        let buffer = self.arena.get(id).ok_or(TensorError::Released(id))?;
        if buffer.is_owned() {
            return Err(TensorError::Detach(id));
        }
        self.arena.remove(id);
        Ok(())
    }

    /// Whether the tensor's buffer is still held by this context.
    pub fn is_live(&self, tensor: &Tensor) -> bool {
        tensor.buffer().is_some_and(|id| self.arena.contains(id))
    }

    fn check(&self, tensor: &Tensor) -> Result<Option<&Buffer>, TensorError> {
        tensor.validate()?;
        let Some(id) = tensor.buffer() else {
            return Ok(None);
        };
        let buffer = self.arena.get(id).ok_or(TensorError::Released(id))?;
        if buffer.device() != tensor.device() {
            return Err(TensorError::DeviceMismatch(tensor.device(), buffer.device()));
        }
        let span = tensor.span()?;
        if span.end > buffer.len() {
            return Err(TensorError::Bounds(span, buffer.len()));
        }
        Ok(Some(buffer))
    }

    /// Checks the tensor's metadata, that its buffer is live, and that every addressed byte
    /// lies inside the buffer.
    pub fn validate(&self, tensor: &Tensor) -> Result<(), TensorError> {
        self.check(tensor).map(|_| ())
    }

    /// Host bytes of the whole buffer behind a validated tensor. Empty if it has none.
    pub(crate) fn host(&self, tensor: &Tensor) -> Result<&[u8], TensorError> {
        match self.check(tensor)? {
            Some(buffer) => buffer.bytes(),
            None => Ok(&[]),
        }
    }

    pub(crate) fn host_mut(&mut self, tensor: &Tensor) -> Result<&mut [u8], TensorError> {
        self.check(tensor)?;
        let Some(id) = tensor.buffer() else {
            return Ok(&mut []);
        };
        match self.arena.get_mut(id) {
            Some(buffer) => buffer.bytes_mut(),
            None => Err(TensorError::Released(id)),
        }
    }

    /// Runs `f` with the whole buffer of `output` borrowed mutably and every other buffer
    /// readable through the arena.
    pub(crate) fn with_output<R>(
        &mut self,
        output: &Tensor,
        f: impl FnOnce(&Arena, &mut [u8]) -> Result<R, TensorError>,
    ) -> Result<R, TensorError> {
        self.check(output)?;
        let id = output.buffer().ok_or(TensorError::Null)?;
        self.arena
            .with_output(id, |arena, buffer| f(arena, buffer.bytes_mut()?))
            .ok_or(TensorError::Released(id))?
    }

    /// Turns kernel precondition failures into logged no-ops unless the context is strict.
    pub(crate) fn lenient<R: Default>(
        &self,
        kernel: &str,
        result: Result<R, TensorError>,
    ) -> Result<R, TensorError> {
        match result {
            Err(err) if !self.strict && err.is_precondition() => {
                log::warn!("context {}: skipped {kernel}: {err}", self.id);
                Ok(R::default())
            }
            result => result,
        }
    }

    /// Allocates a tensor holding a copy of `data`.
    pub fn from_slice<T: Element>(
        &mut self,
        data: &[T],
        shape: impl IntoShape,
        device: Device,
    ) -> Result<Tensor, TensorError> {
        let shape = shape.into_shape()?;
        if shape.numel() != data.len() {
            return Err(TensorError::Count(data.len(), shape.numel()));
        }
        let mut tensor = self.alloc(shape, T::DATA_TYPE, device)?;
        let bytes: &[u8] = bytemuck::cast_slice(data);
        match self.host_mut(&tensor) {
            Ok(host) => {
                host[..bytes.len()].copy_from_slice(bytes);
                Ok(tensor)
            }
            Err(err) => {
                self.release(&mut tensor);
                Err(err)
            }
        }
    }

    /// Reads every element in row-major order.
    pub fn to_vec<T: Element>(&self, tensor: &Tensor) -> Result<Vec<T>, TensorError> {
        if tensor.data_type() != T::DATA_TYPE {
            return Err(TensorError::Type(tensor.data_type(), T::DATA_TYPE));
        }
        let host = self.host(tensor)?;
        let size = T::DATA_TYPE.size();
        let data = tensor
            .offsets()
            .map(|offset| bytemuck::pod_read_unaligned(&host[offset..offset + size]))
            .collect();
        Ok(data)
    }

    pub fn get(&self, tensor: &Tensor, index: &[usize]) -> Result<Scalar, TensorError> {
        let offset = tensor.element_offset(index)?;
        let host = self.host(tensor)?;
        let size = tensor.data_type().size();
        Scalar::from_bytes(&host[offset..offset + size], tensor.data_type())
    }

    /// Writes one element. `value` is converted to the tensor's type.
    pub fn set(
        &mut self,
        tensor: &Tensor,
        index: &[usize],
        value: impl Into<Scalar>,
    ) -> Result<(), TensorError> {
        let offset = tensor.element_offset(index)?;
        let value = value.into().cast(tensor.data_type());
        let host = self.host_mut(tensor)?;
        value.write_bytes(&mut host[offset..offset + tensor.data_type().size()])
    }

    /// Writes `value`, converted to the tensor's type, to every element.
    pub fn fill(&mut self, tensor: &Tensor, value: impl Into<Scalar>) -> Result<(), TensorError> {
        let bytes = value.into().cast(tensor.data_type()).to_bytes();
        let host = self.host_mut(tensor)?;
        for offset in tensor.offsets() {
            host[offset..offset + bytes.len()].copy_from_slice(&bytes);
        }
        Ok(())
    }

    /// Allocates a rank-0 tensor holding `scalar`.
    pub fn from_scalar(&mut self, scalar: Scalar, device: Device) -> Result<Tensor, TensorError> {
        let tensor = self.alloc(Shape::empty(), scalar.data_type(), device)?;
        self.fill(&tensor, scalar)?;
        Ok(tensor)
    }

    /// Reads a rank-0 tensor.
    pub fn to_scalar(&self, tensor: &Tensor) -> Result<Scalar, TensorError> {
        if !tensor.is_scalar() {
            return Err(TensorError::Shape(tensor.shape(), Shape::empty()));
        }
        self.get(tensor, &[])
    }

    /// Copies elements between two tensors of equal shape and type, honoring both layouts.
    pub fn copy(&mut self, src: &Tensor, dst: &Tensor) -> Result<(), TensorError> {
        if src.data_type() != dst.data_type() {
            return Err(TensorError::Type(src.data_type(), dst.data_type()));
        }
        if !src.same_shape(dst) {
            return Err(TensorError::Shape(src.shape(), dst.shape()));
        }
        if !copy_direction(src.device(), dst.device()).is_supported() {
            return Err(TensorError::Device(match src.device().is_cpu() {
                true => dst.device(),
                false => src.device(),
            }));
        }

        let size = src.data_type().size();
        // gathered first: `src` and `dst` may share a buffer
        let staged: Vec<u8> = {
            let host = self.host(src)?;
            src.offsets()
                .flat_map(|offset| &host[offset..offset + size])
                .copied()
                .collect()
        };
        let host = self.host_mut(dst)?;
        for (offset, chunk) in dst.offsets().zip(staged.chunks_exact(size)) {
            host[offset..offset + size].copy_from_slice(chunk);
        }
        Ok(())
    }

    /// A freshly allocated, canonically strided copy.
    pub fn contiguous(&mut self, src: &Tensor) -> Result<Tensor, TensorError> {
        self.duplicate(src, src.device())
    }

    fn duplicate(&mut self, src: &Tensor, device: Device) -> Result<Tensor, TensorError> {
        let mut output = self.alloc(src.shape(), src.data_type(), device)?;
        if let Err(err) = self.copy(src, &output) {
            self.release(&mut output);
            return Err(err);
        }
        Ok(output)
    }

    /// Moves data to `device`. On the same device this is a non-owning view.
    pub fn to_device(&mut self, src: &Tensor, device: Device) -> Result<Tensor, TensorError> {
        if src.device() == device {
            return Ok(src.view());
        }
        if !copy_direction(src.device(), device).is_supported() {
            return Err(TensorError::Device(device));
        }
        self.duplicate(src, device)
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, ptr::NonNull, sync::Arc};

    use half::f16;

    use super::{Context, ContextBuilder};
    use crate::loom::{
        device::{Allocator, Device, SystemAllocator, TrackingAllocator},
        num::DataType,
        scalar::Scalar,
        status::StatusCode,
        tensor::TensorError,
    };

    fn tracked() -> (Arc<TrackingAllocator>, Context) {
        let tracking = Arc::new(TrackingAllocator::new(SystemAllocator));
        let allocator: Arc<dyn Allocator> = tracking.clone();
        let context = ContextBuilder::new().allocator(allocator).build();
        (tracking, context)
    }

    #[test]
    fn test_builder() {
        let context = ContextBuilder::new()
            .allocator(Arc::new(SystemAllocator))
            .alignment(3)
            .strict(false)
            .build();
        assert_eq!(context.alignment(), size_of::<usize>());
        assert!(!context.is_strict());
        assert_eq!(context.allocator().name(), "system");
        assert_ne!(Context::new().id(), context.id());
    }

    #[test]
    fn test_alloc_release() -> Result<(), Box<dyn Error>> {
        let (tracking, mut context) = tracked();
        let mut t = context.alloc([2, 3], DataType::F32, Device::Cpu)?;
        assert!(t.ownership());
        assert!(t.is_contiguous());
        assert_eq!(t.nbytes(), 24);
        assert!(context.is_live(&t));
        assert_eq!(tracking.live_bytes(), 24);
        assert_eq!(context.to_vec::<f32>(&t)?, [0.0; 6]);

        let view = t.view();
        context.release(&mut t);
        assert!(t.is_null());
        assert!(!t.ownership());
        assert_eq!(tracking.live(), 0);

        context.release(&mut t);
        assert_eq!(tracking.frees(), 1);

        let err = context.to_vec::<f32>(&view).unwrap_err();
        assert!(matches!(err, TensorError::Released(_)));
        assert_eq!(err.status(), StatusCode::InvalidState);
        Ok(())
    }

    #[test]
    fn test_release_foreign() -> Result<(), Box<dyn Error>> {
        let (tracking, mut a) = tracked();
        let mut b = Context::new();
        let mut t = a.from_slice(&[1.0f32, 2.0, 3.0], [3], Device::Cpu)?;

        b.release(&mut t);
        assert!(t.ownership());
        assert!(!t.is_null());
        assert!(a.is_live(&t));
        assert_eq!(tracking.frees(), 0);
        assert_eq!(a.to_vec::<f32>(&t)?, [1.0, 2.0, 3.0]);

        a.release(&mut t);
        assert!(t.is_null());
        assert_eq!(tracking.frees(), 1);
        assert_eq!(tracking.live(), 0);
        Ok(())
    }

    #[test]
    fn test_alloc_edge_cases() -> Result<(), Box<dyn Error>> {
        let (tracking, mut context) = tracked();
        let t = context.alloc([4, 0], DataType::F64, Device::Cpu)?;
        assert!(t.is_null());
        assert!(!t.ownership());
        assert_eq!(tracking.allocations(), 0);
        assert!(context.to_vec::<f64>(&t)?.is_empty());

        let err = context.alloc([2], DataType::F32, Device::Gpu).unwrap_err();
        assert_eq!(err.status(), StatusCode::NotImplemented);

        let err = context.alloc([1; 9], DataType::F32, Device::Cpu).unwrap_err();
        assert_eq!(err.status(), StatusCode::InvalidArgument);

        let t = context.alloc([3], DataType::F16, Device::Cpu)?;
        let addr = context.host(&t)?.as_ptr() as usize;
        assert_eq!(addr % context.alignment(), 0);
        Ok(())
    }

    #[test]
    fn test_host_access() -> Result<(), Box<dyn Error>> {
        let mut context = Context::new();
        let data: Vec<f32> = (0..6).map(|x| x as f32).collect();
        let t = context.from_slice(&data, [2, 3], Device::Cpu)?;
        assert_eq!(context.to_vec::<f32>(&t)?, data);
        assert_eq!(context.get(&t, &[1, 2])?, Scalar::F32(5.0));

        context.set(&t, &[0, 1], 10i32)?;
        assert_eq!(context.get(&t, &[0, 1])?, Scalar::F32(10.0));
        assert!(context.set(&t, &[2, 0], 1.0f32).is_err());
        assert!(matches!(context.to_vec::<f64>(&t), Err(TensorError::Type(..))));
        assert!(context.from_slice(&data, [4], Device::Cpu).is_err());

        let column = t.slice(1, 1, 2)?;
        context.fill(&column, 7.0f32)?;
        assert_eq!(context.to_vec::<f32>(&t)?, [0.0, 7.0, 2.0, 3.0, 7.0, 5.0]);
        assert_eq!(context.to_vec::<f32>(&t.transpose())?, [0.0, 3.0, 7.0, 7.0, 2.0, 5.0]);
        Ok(())
    }

    #[test]
    fn test_scalar_bridge() -> Result<(), Box<dyn Error>> {
        let mut context = Context::new();
        for scalar in [
            Scalar::from(2.5f64),
            Scalar::from(-7i16),
            Scalar::from(f16::from_f32(0.25)),
            Scalar::TRUE,
        ] {
            let t = context.from_scalar(scalar, Device::Cpu)?;
            assert!(t.is_scalar());
            assert_eq!(t.data_type(), scalar.data_type());
            assert_eq!(context.to_scalar(&t)?, scalar);
        }

        let v = context.alloc([2], DataType::I32, Device::Cpu)?;
        assert!(matches!(context.to_scalar(&v), Err(TensorError::Shape(..))));
        Ok(())
    }

    #[test]
    fn test_copy() -> Result<(), Box<dyn Error>> {
        let mut context = Context::new();
        let data: Vec<i32> = (0..6).collect();
        let a = context.from_slice(&data, [2, 3], Device::Cpu)?;
        let b = context.alloc([3, 2], DataType::I32, Device::Cpu)?;
        context.copy(&a.transpose(), &b)?;
        assert_eq!(context.to_vec::<i32>(&b)?, [0, 3, 1, 4, 2, 5]);

        let c = context.contiguous(&a.transpose())?;
        assert!(c.ownership());
        assert!(c.is_contiguous());
        assert_eq!(context.to_vec::<i32>(&c)?, [0, 3, 1, 4, 2, 5]);

        let row = context.alloc([3], DataType::I32, Device::Cpu)?;
        context.copy(&a.slice(0, 1, 2)?.squeeze(), &row)?;
        assert_eq!(context.to_vec::<i32>(&row)?, [3, 4, 5]);

        // overlapping views of one buffer
        let head = a.flatten()?.slice(0, 0, 3)?;
        let tail = a.flatten()?.slice(0, 1, 4)?;
        context.copy(&head, &tail)?;
        assert_eq!(context.to_vec::<i32>(&a)?, [0, 0, 1, 2, 4, 5]);

        assert!(matches!(context.copy(&a, &b), Err(TensorError::Shape(..))));
        assert!(matches!(context.copy(&a, &c), Err(TensorError::Shape(..))));
        Ok(())
    }

    #[test]
    fn test_to_device() -> Result<(), Box<dyn Error>> {
        let mut context = Context::new();
        let a = context.alloc([4], DataType::U8, Device::Cpu)?;
        let view = context.to_device(&a, Device::Cpu)?;
        assert!(!view.ownership());
        assert_eq!(view.buffer(), a.buffer());

        let err = context.to_device(&a, Device::Gpu).unwrap_err();
        assert_eq!(err.status(), StatusCode::NotImplemented);
        Ok(())
    }

    #[test]
    fn test_wrap() -> Result<(), Box<dyn Error>> {
        let (tracking, mut context) = tracked();
        let mut data = [1.0f32, 2.0, 3.0, 4.0];
        let ptr = NonNull::new(data.as_mut_ptr().cast::<u8>()).ok_or("null")?;

        {
            let mut t = unsafe { context.wrap(ptr, 16, [2, 2], DataType::F32, Device::Cpu)? };
            assert!(!t.ownership());
            context.set(&t, &[1, 1], 8.0f32)?;
            assert_eq!(context.to_vec::<f32>(&t)?, [1.0, 2.0, 3.0, 8.0]);

            context.release(&mut t);
            assert!(context.is_live(&t));
            context.detach(&t)?;
            assert!(!context.is_live(&t));
        }
        assert_eq!(data, [1.0, 2.0, 3.0, 8.0]);
        assert_eq!(tracking.allocations(), 0);

        let err = unsafe { context.wrap(ptr, 8, [2, 2], DataType::F32, Device::Cpu) };
        assert!(matches!(err, Err(TensorError::Bounds(..))));

        let owned = context.alloc([1], DataType::F32, Device::Cpu)?;
        assert!(matches!(context.detach(&owned), Err(TensorError::Detach(_))));
        Ok(())
    }

    #[test]
    fn test_validate() -> Result<(), Box<dyn Error>> {
        let mut context = Context::new();
        let t = context.alloc([2, 2], DataType::F32, Device::Cpu)?;
        context.validate(&t)?;
        context.validate(&t.expand([3, 2, 2])?)?;

        let past = t.as_strided([2, 2], &[8, 4], 4)?;
        let err = context.validate(&past).unwrap_err();
        assert!(matches!(err, TensorError::Bounds(..)));
        assert_eq!(err.status(), StatusCode::OutOfBounds);

        let other = Context::new();
        assert!(other.validate(&t).is_err());
        Ok(())
    }

    #[test]
    fn test_drop_frees() -> Result<(), Box<dyn Error>> {
        let (tracking, mut context) = tracked();
        for _ in 0..4 {
            context.alloc([8], DataType::F64, Device::Cpu)?;
        }
        assert_eq!(tracking.live(), 4);
        drop(context);
        assert_eq!(tracking.live(), 0);
        Ok(())
    }
}
