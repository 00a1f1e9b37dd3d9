use std::ops::Range;

use thiserror::Error;

use super::{
    device::{AllocError, BufferId, Device},
    layout::{
        IntoShape, MAX_DIMS, Shape, Strides, broadcast_shape, can_broadcast, canonical_strides,
    },
    num::DataType,
    status::StatusCode,
};

#[derive(Debug, Error)]
pub enum TensorError {
    #[error("tensor rank error: rank {0} exceeds {max}", max = MAX_DIMS)]
    Rank(usize),
    #[error("tensor dim error: dim {0} out of range for rank {1}")]
    Dim(usize, usize),
    #[error("tensor reshape error: shape {0}'s size not match shape {1}'s")]
    Reshape(Shape, Shape),
    #[error("tensor layout error: strides {1} of shape {0} are not contiguous")]
    NonContiguous(Shape, Strides),
    #[error("tensor slice error: range {1}..{2} not in dim {0} of shape {3}")]
    Slice(usize, usize, usize, Shape),
    #[error("tensor permute error: {0:?} is not a permutation of rank {1}")]
    Permute(Vec<usize>, usize),
    #[error("tensor expand error: shape {0} cannot expand to {1}")]
    Expand(Shape, Shape),
    #[error("tensor broadcast error: shape {0} not compatible with shape {1}")]
    Broadcast(Shape, Shape),
    #[error("tensor shape error: shape {0} not match shape {1}")]
    Shape(Shape, Shape),
    #[error("tensor count error: element count {0} not match {1}")]
    Count(usize, usize),
    #[error("tensor layout error: extent {1} at dim {0} of an owning tensor has zero stride")]
    ZeroStride(usize, usize),
    #[error("tensor layout error: addressed span overflows")]
    Overflow,
    #[error("tensor type error: data type {0} mismatches {1}")]
    Type(DataType, DataType),
    #[error("tensor type error: expected a float type, got {0}")]
    Float(DataType),
    #[error("tensor type error: expected an index type (i32 or i64), got {0}")]
    IndexType(DataType),
    #[error("tensor device error: device {0} is not available")]
    Device(Device),
    #[error("tensor device error: device {0} mismatches {1}")]
    DeviceMismatch(Device, Device),
    #[error("tensor alloc error: {0}")]
    Alloc(#[from] AllocError),
    #[error("tensor state error: tensor has no buffer")]
    Null,
    #[error("tensor state error: buffer {0} has been released")]
    Released(BufferId),
    #[error("tensor state error: buffer {0} is owned and cannot be detached")]
    Detach(BufferId),
    #[error("tensor bounds error: bytes {0:?} exceed buffer of {1} bytes")]
    Bounds(Range<usize>, usize),
    #[error("tensor index error: index {0:?} out of bounds for shape {1}")]
    Index(Vec<usize>, Shape),
    #[error("tensor alignment error: data is not aligned for {0}")]
    Misaligned(DataType),
    #[error("scalar error: division by zero")]
    DivisionByZero,
    #[error("scalar error: {1} bytes cannot hold a {0} value")]
    Bytes(DataType, usize),
}

impl TensorError {
    pub fn status(&self) -> StatusCode {
        match self {
            TensorError::Rank(_)
            | TensorError::Dim(..)
            | TensorError::Reshape(..)
            | TensorError::NonContiguous(..)
            | TensorError::Permute(..)
            | TensorError::Expand(..)
            | TensorError::Broadcast(..)
            | TensorError::Shape(..)
            | TensorError::Count(..)
            | TensorError::ZeroStride(..)
            | TensorError::Overflow
            | TensorError::DivisionByZero
            | TensorError::Bytes(..) => StatusCode::InvalidArgument,
            TensorError::Slice(..) | TensorError::Bounds(..) | TensorError::Index(..) => {
                StatusCode::OutOfBounds
            }
            TensorError::Type(..)
            | TensorError::Float(_)
            | TensorError::IndexType(_)
            | TensorError::DeviceMismatch(..) => StatusCode::TypeMismatch,
            TensorError::Device(_) | TensorError::Alloc(AllocError::Device(_)) => {
                StatusCode::NotImplemented
            }
            TensorError::Alloc(_) => StatusCode::AllocationFailed,
            TensorError::Null
            | TensorError::Released(_)
            | TensorError::Detach(_)
            | TensorError::Misaligned(_) => StatusCode::InvalidState,
        }
    }

    /// Shape, type and device mismatches between kernel operands.
    ///
    /// These are the only failures a lenient context turns into no-ops.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            TensorError::Rank(_)
                | TensorError::Dim(..)
                | TensorError::NonContiguous(..)
                | TensorError::Shape(..)
                | TensorError::Count(..)
                | TensorError::Type(..)
                | TensorError::Float(_)
                | TensorError::IndexType(_)
                | TensorError::Device(_)
                | TensorError::DeviceMismatch(..)
        )
    }
}

/// A strided view onto (part of) a device buffer.
///
/// The buffer is named by a [`BufferId`] in the arena of the [`Context`](super::context::Context)
/// that produced the tensor. At most one tensor owns a buffer: `Tensor` is deliberately not
/// [`Clone`], and every view derived from it is non-owning. All view operations are O(1)
/// metadata transforms that never touch the data.
#[derive(Debug, PartialEq, Eq)]
pub struct Tensor {
    buffer: Option<BufferId>,
    /// Byte offset of the first element inside the buffer.
    offset: usize,
    r#type: DataType,
    device: Device,
    shape: Shape,
    strides: Strides,
    ownership: bool,
}

impl Tensor {
    /// An owning, canonically strided tensor over a freshly allocated buffer.
    pub(crate) fn owned(buffer: BufferId, shape: Shape, r#type: DataType, device: Device) -> Self {
        let strides = canonical_strides(&shape, r#type);
        Self {
            buffer: Some(buffer),
            offset: 0,
            r#type,
            device,
            shape,
            strides,
            ownership: true,
        }
    }

    /// A non-owning, canonically strided tensor over `buffer`.
    pub(crate) fn borrowed(
        buffer: Option<BufferId>,
        shape: Shape,
        r#type: DataType,
        device: Device,
    ) -> Self {
        let strides = canonical_strides(&shape, r#type);
        Self {
            buffer,
            offset: 0,
            r#type,
            device,
            shape,
            strides,
            ownership: false,
        }
    }

    /// Metadata without any memory behind it.
    ///
    /// This is what allocating zero elements yields. With a non-zero element count it only
    /// describes a layout; every data access fails.
    pub fn null(shape: impl IntoShape, r#type: DataType, device: Device) -> Result<Self, TensorError> {
        let shape = shape.into_shape()?;
        Ok(Self::borrowed(None, shape, r#type, device))
    }

    /// Nulls an owning tensor and hands back its buffer handle. Views are left untouched.
    pub(crate) fn disown(&mut self) -> Option<BufferId> {
        if !self.ownership {
            return None;
        }
        self.ownership = false;
        self.buffer.take()
    }

    #[inline]
    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.r#type
    }

    #[inline]
    pub fn device(&self) -> Device {
        self.device
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    pub fn strides(&self) -> Strides {
        self.strides
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Whether releasing this tensor frees its buffer.
    #[inline]
    pub fn ownership(&self) -> bool {
        self.ownership
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.buffer.is_none()
    }

    #[inline]
    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    /// Bytes of data the tensor describes, `numel × size`.
    #[inline]
    pub fn nbytes(&self) -> usize {
        self.numel() * self.r#type.size()
    }

    /// The range of buffer bytes the tensor addresses. Empty for zero elements.
    pub fn span(&self) -> Result<Range<usize>, TensorError> {
        if self.numel() == 0 {
            return Ok(self.offset..self.offset);
        }
        let last = self
            .shape
            .iter()
            .zip(self.strides.iter())
            .try_fold(0usize, |acc, (&extent, &stride)| {
                (extent - 1).checked_mul(stride)?.checked_add(acc)
            })
            .ok_or(TensorError::Overflow)?;
        let end = self
            .offset
            .checked_add(last)
            .and_then(|x| x.checked_add(self.r#type.size()))
            .ok_or(TensorError::Overflow)?;
        Ok(self.offset..end)
    }

    /// Byte offset of the element at `index` inside the buffer.
    pub fn element_offset(&self, index: &[usize]) -> Result<usize, TensorError> {
        let in_bounds = index.len() == self.rank()
            && index.iter().zip(self.shape.iter()).all(|(i, n)| i < n);
        if !in_bounds {
            return Err(TensorError::Index(index.to_vec(), self.shape));
        }
        let offset = index
            .iter()
            .zip(self.strides.iter())
            .map(|(i, stride)| i * stride)
            .sum::<usize>();
        Ok(self.offset + offset)
    }

    /// Byte offsets of every element in row-major order.
    pub fn offsets(&self) -> Offsets {
        Offsets {
            shape: self.shape,
            strides: self.strides,
            index: [0; MAX_DIMS],
            offset: self.offset,
            remaining: self.numel(),
        }
    }

    /// A non-owning copy of this tensor's metadata.
    #[inline]
    pub fn view(&self) -> Tensor {
        Tensor {
            ownership: false,
            ..*self
        }
    }

    fn with_layout(&self, shape: Shape, strides: Strides) -> Tensor {
        Tensor {
            shape,
            strides,
            ownership: false,
            ..*self
        }
    }

    /// A view with explicit extents, byte strides and byte offset over the same buffer.
    pub fn as_strided(
        &self,
        shape: impl IntoShape,
        strides: &[usize],
        offset: usize,
    ) -> Result<Tensor, TensorError> {
        let shape = shape.into_shape()?;
        let strides = Strides::new(strides)?;
        if strides.rank() != shape.rank() {
            return Err(TensorError::Dim(strides.rank(), shape.rank()));
        }
        Ok(Tensor {
            offset,
            ..self.with_layout(shape, strides)
        })
    }

    /// Reinterprets a contiguous tensor with a new shape of the same element count.
    ///
    /// Fails on non-contiguous input rather than producing a view with wrong strides.
    pub fn reshape(&self, shape: impl IntoShape) -> Result<Tensor, TensorError> {
        let shape = shape.into_shape()?;
        if shape.numel() != self.numel() {
            return Err(TensorError::Reshape(self.shape, shape));
        }
        if !self.is_contiguous() {
            return Err(TensorError::NonContiguous(self.shape, self.strides));
        }
        let strides = canonical_strides(&shape, self.r#type);
        Ok(self.with_layout(shape, strides))
    }

    pub fn can_reshape(&self, shape: impl IntoShape) -> bool {
        match shape.into_shape() {
            Ok(shape) => shape.numel() == self.numel() && self.is_contiguous(),
            Err(_) => false,
        }
    }

    /// Reshapes into rank 1.
    pub fn flatten(&self) -> Result<Tensor, TensorError> {
        self.reshape(self.numel())
    }

    /// Swaps the last two dimensions. Tensors of rank below 2 come back unchanged.
    pub fn transpose(&self) -> Tensor {
        let rank = self.rank();
        if rank < 2 {
            return self.view();
        }
        let (mut shape, mut strides) = (self.shape, self.strides);
        shape.swap(rank - 2, rank - 1);
        strides.swap(rank - 2, rank - 1);
        self.with_layout(shape, strides)
    }

    /// Restricts dimension `dim` to `start..end`.
    pub fn slice(&self, dim: usize, start: usize, end: usize) -> Result<Tensor, TensorError> {
        if !self.can_slice(dim, start, end) {
            return Err(TensorError::Slice(dim, start, end, self.shape));
        }
        let mut shape = self.shape;
        shape[dim] = end - start;
        Ok(Tensor {
            offset: self.offset + start * self.strides[dim],
            ..self.with_layout(shape, self.strides)
        })
    }

    #[inline]
    pub fn can_slice(&self, dim: usize, start: usize, end: usize) -> bool {
        dim < self.rank() && start <= end && end <= self.shape[dim]
    }

    /// Removes every dimension of extent 1.
    pub fn squeeze(&self) -> Tensor {
        let (mut shape, mut strides) = (self.shape, self.strides);
        for dim in (0..self.rank()).rev() {
            if shape[dim] == 1 {
                shape.remove(dim);
                strides.remove(dim);
            }
        }
        self.with_layout(shape, strides)
    }

    /// Removes dimension `dim` if its extent is 1; otherwise returns an unchanged view.
    pub fn squeeze_dim(&self, dim: usize) -> Result<Tensor, TensorError> {
        if dim >= self.rank() {
            return Err(TensorError::Dim(dim, self.rank()));
        }
        if self.shape[dim] != 1 {
            return Ok(self.view());
        }
        let (mut shape, mut strides) = (self.shape, self.strides);
        shape.remove(dim);
        strides.remove(dim);
        Ok(self.with_layout(shape, strides))
    }

    /// Inserts a dimension of extent 1 at `dim`, `0 ≤ dim ≤ rank`.
    ///
    /// The new stride is that of the dimension it displaces, or the element size when
    /// appended at the end.
    pub fn unsqueeze(&self, dim: usize) -> Result<Tensor, TensorError> {
        let rank = self.rank();
        if dim > rank {
            return Err(TensorError::Dim(dim, rank + 1));
        }
        let stride = match dim < rank {
            true => self.strides[dim],
            false => self.r#type.size(),
        };
        let (mut shape, mut strides) = (self.shape, self.strides);
        shape.insert(dim, 1)?;
        strides.insert(dim, stride)?;
        Ok(self.with_layout(shape, strides))
    }

    /// Reorders dimensions: output dimension `i` is input dimension `perm[i]`.
    pub fn permute(&self, perm: &[usize]) -> Result<Tensor, TensorError> {
        let rank = self.rank();
        let mut seen = [false; MAX_DIMS];
        let valid = perm.len() == rank
            && perm
                .iter()
                .all(|&dim| dim < rank && !std::mem::replace(&mut seen[dim], true));
        if !valid {
            return Err(TensorError::Permute(perm.to_vec(), rank));
        }
        let (mut shape, mut strides) = (self.shape, self.strides);
        for (index, &dim) in perm.iter().enumerate() {
            shape[index] = self.shape[dim];
            strides[index] = self.strides[dim];
        }
        Ok(self.with_layout(shape, strides))
    }

    /// Broadcasts to `shape` without copying.
    ///
    /// Stretched extent-1 dimensions and new leading dimensions get stride 0, so repeated
    /// reads along them hit the same bytes.
    pub fn expand(&self, shape: impl IntoShape) -> Result<Tensor, TensorError> {
        let target = shape.into_shape()?;
        let rank = self.rank();
        if target.rank() < rank {
            return Err(TensorError::Expand(self.shape, target));
        }
        let lead = target.rank() - rank;
        let mut strides = Strides::new(&[0; MAX_DIMS][..target.rank()])?;
        for dim in 0..rank {
            strides[lead + dim] = match (self.shape[dim], target[lead + dim]) {
                (x, y) if x == y => self.strides[dim],
                (1, _) => 0,
                _ => return Err(TensorError::Expand(self.shape, target)),
            };
        }
        Ok(self.with_layout(target, strides))
    }

    fn is_packed(&self, order: impl Iterator<Item = usize>) -> bool {
        if self.numel() == 0 {
            return true;
        }
        let mut expected = self.r#type.size();
        for dim in order {
            let extent = self.shape[dim];
            if extent == 1 {
                continue;
            }
            if self.strides[dim] != expected {
                return false;
            }
            expected *= extent;
        }
        true
    }

    /// Row-major and gap free. Dimensions of extent 1 place no constraint on their stride.
    pub fn is_contiguous(&self) -> bool {
        self.is_packed((0..self.rank()).rev())
    }

    /// Column-major and gap free. Dimensions of extent 1 place no constraint on their stride.
    pub fn is_column_major(&self) -> bool {
        self.is_packed(0..self.rank())
    }

    #[inline]
    pub fn is_dense(&self) -> bool {
        self.is_contiguous() || self.is_column_major()
    }

    #[inline]
    pub fn same_shape(&self, other: &Tensor) -> bool {
        self.shape == other.shape
    }

    #[inline]
    pub fn broadcastable_with(&self, other: &Tensor) -> bool {
        can_broadcast(&self.shape, &other.shape)
    }

    /// The shape both tensors broadcast to.
    pub fn broadcast_shape_with(&self, other: &Tensor) -> Result<Shape, TensorError> {
        broadcast_shape(&self.shape, &other.shape)
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.rank() == 0
    }

    /// Whether some dimension repeats the same bytes (stride 0 on an extent above 1).
    pub fn is_broadcast(&self) -> bool {
        self.shape
            .iter()
            .zip(self.strides.iter())
            .any(|(&extent, &stride)| extent > 1 && stride == 0)
    }

    /// Checks the metadata invariants. Bounds against the buffer are checked by the context.
    pub fn validate(&self) -> Result<(), TensorError> {
        if !self.device.is_available() {
            return Err(TensorError::Device(self.device));
        }
        if self.buffer.is_none() && (self.ownership || self.numel() > 0) {
            return Err(TensorError::Null);
        }
        if self.ownership {
            let zero = self
                .shape
                .iter()
                .zip(self.strides.iter())
                .position(|(&extent, &stride)| extent > 1 && stride == 0);
            if let Some(dim) = zero {
                return Err(TensorError::ZeroStride(dim, self.shape[dim]));
            }
        }
        self.span().map(|_| ())
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Iterator over the byte offsets of a tensor's elements, see [`Tensor::offsets`].
#[derive(Debug, Clone)]
pub struct Offsets {
    shape: Shape,
    strides: Strides,
    index: [usize; MAX_DIMS],
    offset: usize,
    remaining: usize,
}

impl Iterator for Offsets {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.offset;

        for dim in (0..self.shape.rank()).rev() {
            self.index[dim] += 1;
            if self.index[dim] < self.shape[dim] {
                self.offset += self.strides[dim];
                break;
            }
            self.offset -= (self.index[dim] - 1) * self.strides[dim];
            self.index[dim] = 0;
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Offsets {}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::{Tensor, TensorError};
    use crate::loom::{device::Device, num::DataType, status::StatusCode};

    fn tensor(shape: &[usize]) -> Result<Tensor, TensorError> {
        Tensor::null(shape, DataType::F32, Device::Cpu)
    }

    #[test]
    fn test_canonical_layout() -> Result<(), Box<dyn Error>> {
        let t = tensor(&[2, 3, 4])?;
        assert_eq!(&*t.strides(), &[48, 16, 4]);
        assert!(t.is_contiguous());
        assert!(!t.is_column_major());
        assert!(t.is_dense());
        assert_eq!(t.numel(), 24);
        assert_eq!(t.nbytes(), 96);
        assert_eq!(t.span()?, 0..96);

        let t = tensor(&[])?;
        assert!(t.is_scalar());
        assert_eq!(t.numel(), 1);
        assert!(t.is_contiguous());
        Ok(())
    }

    #[test]
    fn test_reshape() -> Result<(), Box<dyn Error>> {
        let t = tensor(&[2, 3, 4])?;
        let r = t.reshape([6, 4])?;
        assert_eq!(&*r.shape(), &[6, 4]);
        assert_eq!(&*r.strides(), &[16, 4]);
        assert!(!r.ownership());

        let back = r.reshape(t.shape())?;
        assert_eq!(back.shape(), t.shape());
        assert_eq!(back.strides(), t.strides());

        assert!(matches!(t.reshape([5, 5]), Err(TensorError::Reshape(..))));
        assert!(!t.can_reshape([5, 5]));
        assert!(t.can_reshape([24]));
        assert_eq!(&*t.flatten()?.shape(), &[24]);
        Ok(())
    }

    #[test]
    fn test_reshape_non_contiguous() -> Result<(), Box<dyn Error>> {
        let t = tensor(&[2, 3])?.transpose();
        assert!(!t.is_contiguous());
        assert!(!t.can_reshape([6]));
        let err = t.reshape([6]).unwrap_err();
        assert!(matches!(err, TensorError::NonContiguous(..)));
        assert_eq!(err.status(), StatusCode::InvalidArgument);
        Ok(())
    }

    #[test]
    fn test_transpose() -> Result<(), Box<dyn Error>> {
        let t = tensor(&[2, 3, 4])?;
        let tt = t.transpose();
        assert_eq!(&*tt.shape(), &[2, 4, 3]);
        assert_eq!(&*tt.strides(), &[48, 4, 16]);
        assert!(!tt.is_contiguous());

        let back = tt.transpose();
        assert_eq!(back.shape(), t.shape());
        assert_eq!(back.strides(), t.strides());

        let v = tensor(&[5])?;
        assert_eq!(v.transpose(), v.view());

        let m = tensor(&[2, 3])?.transpose();
        assert!(m.is_column_major());
        Ok(())
    }

    #[test]
    fn test_slice() -> Result<(), Box<dyn Error>> {
        let t = tensor(&[4, 6])?;
        let s = t.slice(1, 2, 5)?;
        assert_eq!(&*s.shape(), &[4, 3]);
        assert_eq!(s.strides(), t.strides());
        assert_eq!(s.offset(), 8);
        assert_eq!(s.element_offset(&[0, 0])?, t.element_offset(&[0, 2])?);
        assert_eq!(s.element_offset(&[3, 2])?, t.element_offset(&[3, 4])?);
        assert!(!s.is_contiguous());

        let r = t.slice(0, 1, 3)?;
        assert_eq!(r.offset(), 24);
        assert!(r.is_contiguous());

        assert_eq!(t.slice(1, 3, 3)?.numel(), 0);
        for (dim, start, end) in [(2, 0, 1), (0, 3, 2), (1, 0, 7)] {
            assert!(!t.can_slice(dim, start, end));
            let err = t.slice(dim, start, end).unwrap_err();
            assert_eq!(err.status(), StatusCode::OutOfBounds);
        }
        Ok(())
    }

    #[test]
    fn test_squeeze() -> Result<(), Box<dyn Error>> {
        let t = tensor(&[1, 3, 1, 2])?;
        let s = t.squeeze();
        assert_eq!(&*s.shape(), &[3, 2]);
        assert_eq!(&*s.strides(), &[8, 4]);

        let s = t.squeeze_dim(2)?;
        assert_eq!(&*s.shape(), &[1, 3, 2]);
        let s = t.squeeze_dim(1)?;
        assert_eq!(s.shape(), t.shape());
        assert!(t.squeeze_dim(4).is_err());
        Ok(())
    }

    #[test]
    fn test_unsqueeze() -> Result<(), Box<dyn Error>> {
        let t = tensor(&[3, 2])?;
        let u = t.unsqueeze(0)?;
        assert_eq!(&*u.shape(), &[1, 3, 2]);
        assert_eq!(&*u.strides(), &[8, 8, 4]);
        assert!(u.is_contiguous());

        let u = t.unsqueeze(2)?;
        assert_eq!(&*u.shape(), &[3, 2, 1]);
        assert_eq!(&*u.strides(), &[8, 4, 4]);
        assert!(u.is_contiguous());
        assert_eq!(u.squeeze().shape(), t.shape());

        assert!(matches!(t.unsqueeze(3), Err(TensorError::Dim(3, 3))));
        let full = tensor(&[1; 8])?;
        assert!(matches!(full.unsqueeze(0), Err(TensorError::Rank(9))));
        Ok(())
    }

    #[test]
    fn test_permute() -> Result<(), Box<dyn Error>> {
        let t = tensor(&[2, 3, 4])?;
        let p = t.permute(&[2, 0, 1])?;
        assert_eq!(&*p.shape(), &[4, 2, 3]);
        assert_eq!(&*p.strides(), &[4, 48, 16]);

        for perm in [&[0, 1][..], &[0, 1, 1], &[0, 1, 3], &[2, 1, 0, 3]] {
            let err = t.permute(perm).unwrap_err();
            assert!(matches!(err, TensorError::Permute(..)));
        }
        Ok(())
    }

    #[test]
    fn test_expand() -> Result<(), Box<dyn Error>> {
        let t = tensor(&[3, 1])?;
        let e = t.expand([2, 3, 4])?;
        assert_eq!(&*e.shape(), &[2, 3, 4]);
        assert_eq!(&*e.strides(), &[0, 4, 0]);
        assert!(e.is_broadcast());
        assert!(!e.ownership());
        assert!(!e.is_contiguous());
        assert_eq!(e.element_offset(&[1, 2, 3])?, 8);

        assert!(!t.is_broadcast());
        assert!(matches!(t.expand([3, 2, 2]), Err(TensorError::Expand(..))));
        assert!(matches!(t.expand([4]), Err(TensorError::Expand(..))));
        Ok(())
    }

    #[test]
    fn test_predicates() -> Result<(), Box<dyn Error>> {
        let a = tensor(&[3, 1])?;
        let b = tensor(&[1, 4])?;
        let c = tensor(&[4, 5])?;
        assert!(a.broadcastable_with(&b));
        assert_eq!(&*a.broadcast_shape_with(&b)?, &[3, 4]);
        assert!(!a.broadcastable_with(&c));
        assert!(!a.same_shape(&b));
        assert!(a.same_shape(&a.view()));

        let empty = tensor(&[0, 3])?;
        assert!(empty.is_contiguous());
        assert!(empty.is_column_major());
        assert!(empty.is_valid());
        Ok(())
    }

    #[test]
    fn test_validate() -> Result<(), Box<dyn Error>> {
        let t = tensor(&[2, 2])?;
        assert!(matches!(t.validate(), Err(TensorError::Null)));

        let g = Tensor::null([0], DataType::F32, Device::Gpu)?;
        assert_eq!(g.validate().unwrap_err().status(), StatusCode::NotImplemented);

        let huge = tensor(&[0])?.as_strided([2, 2], &[usize::MAX, 4], 0)?;
        assert!(matches!(huge.span(), Err(TensorError::Overflow)));
        Ok(())
    }

    #[test]
    fn test_offsets() -> Result<(), Box<dyn Error>> {
        let t = tensor(&[2, 3])?;
        let offsets: Vec<_> = t.offsets().collect();
        assert_eq!(offsets, [0, 4, 8, 12, 16, 20]);

        let offsets: Vec<_> = t.transpose().offsets().collect();
        assert_eq!(offsets, [0, 12, 4, 16, 8, 20]);

        let offsets: Vec<_> = tensor(&[2])?.expand([3, 2])?.offsets().collect();
        assert_eq!(offsets, [0, 4, 0, 4, 0, 4]);

        let offsets: Vec<_> = tensor(&[4, 6])?.slice(1, 4, 6)?.offsets().collect();
        assert_eq!(offsets, [16, 20, 40, 44, 64, 68, 88, 92]);

        assert_eq!(tensor(&[])?.offsets().collect::<Vec<_>>(), [0]);
        assert_eq!(tensor(&[0, 2])?.offsets().len(), 0);
        Ok(())
    }

    #[test]
    fn test_element_offset() -> Result<(), Box<dyn Error>> {
        let t = tensor(&[2, 3])?;
        assert_eq!(t.element_offset(&[1, 2])?, 20);
        let err = t.element_offset(&[2, 0]).unwrap_err();
        assert_eq!(err.status(), StatusCode::OutOfBounds);
        assert!(t.element_offset(&[1]).is_err());
        Ok(())
    }
}
