//! Shape and stride bookkeeping for row-major byte layouts.
//!
//! Shapes and strides are bounded, stack-allocated arrays of at most [`MAX_DIMS`] entries.
//! Building one with more dimensions is an error, never a truncation.

use std::ops::{Deref, DerefMut};

use itertools::Itertools;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{num::DataType, tensor::TensorError};

/// Maximum tensor rank.
pub const MAX_DIMS: usize = 8;

macro_rules! impl_dims {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name {
            len: u8,
            data: [usize; MAX_DIMS],
        }

        impl $name {
            /// Fails with [`TensorError::Rank`] if `dims` has more than [`MAX_DIMS`] entries.
            pub fn new(dims: &[usize]) -> Result<Self, TensorError> {
                if dims.len() > MAX_DIMS {
                    return Err(TensorError::Rank(dims.len()));
                }
                let mut data = [0; MAX_DIMS];
                data[..dims.len()].copy_from_slice(dims);
                let len = dims.len() as u8;
                Ok(Self { len, data })
            }

            /// Zero entries, the shape of a scalar.
            #[inline]
            pub const fn empty() -> Self {
                Self {
                    len: 0,
                    data: [0; MAX_DIMS],
                }
            }

            #[inline]
            pub fn rank(&self) -> usize {
                self.len as usize
            }

            pub fn push(&mut self, value: usize) -> Result<(), TensorError> {
                self.insert(self.rank(), value)
            }

            /// Inserts `value` at `index`, shifting later entries right.
            pub fn insert(&mut self, index: usize, value: usize) -> Result<(), TensorError> {
                let len = self.rank();
                if len == MAX_DIMS {
                    return Err(TensorError::Rank(len + 1));
                }
                if index > len {
                    return Err(TensorError::Dim(index, len + 1));
                }
                self.data.copy_within(index..len, index + 1);
                self.data[index] = value;
                self.len += 1;
                Ok(())
            }

            /// Removes the entry at `index`, shifting later entries left.
            ///
            /// # Panics
            /// Panics if `index` is not below the rank.
            pub fn remove(&mut self, index: usize) -> usize {
                let len = self.rank();
                assert!(index < len, "index {index} out of range for rank {len}");
                let value = self.data[index];
                self.data.copy_within(index + 1..len, index);
                self.data[len - 1] = 0;
                self.len -= 1;
                value
            }
        }

        impl Deref for $name {
            type Target = [usize];

            #[inline]
            fn deref(&self) -> &[usize] {
                &self.data[..self.len as usize]
            }
        }

        impl DerefMut for $name {
            #[inline]
            fn deref_mut(&mut self) -> &mut [usize] {
                &mut self.data[..self.len as usize]
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.deref())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "[{}]", self.iter().format(", "))
            }
        }
    };
}

impl_dims!(
    /// Per-dimension extents.
    Shape
);
impl_dims!(
    /// Per-dimension byte strides.
    Strides
);

impl Shape {
    /// Number of elements. A rank-0 shape holds one element.
    #[inline]
    pub fn numel(&self) -> usize {
        self.iter().product()
    }
}

pub trait IntoShape {
    fn into_shape(self) -> Result<Shape, TensorError>;
}

impl IntoShape for Shape {
    #[inline]
    fn into_shape(self) -> Result<Shape, TensorError> {
        Ok(self)
    }
}

impl IntoShape for &Shape {
    #[inline]
    fn into_shape(self) -> Result<Shape, TensorError> {
        Ok(*self)
    }
}

impl IntoShape for &[usize] {
    #[inline]
    fn into_shape(self) -> Result<Shape, TensorError> {
        Shape::new(self)
    }
}

impl<const N: usize> IntoShape for [usize; N] {
    #[inline]
    fn into_shape(self) -> Result<Shape, TensorError> {
        Shape::new(&self)
    }
}

impl<const N: usize> IntoShape for &[usize; N] {
    #[inline]
    fn into_shape(self) -> Result<Shape, TensorError> {
        Shape::new(self)
    }
}

impl IntoShape for Vec<usize> {
    #[inline]
    fn into_shape(self) -> Result<Shape, TensorError> {
        Shape::new(&self)
    }
}

impl IntoShape for &Vec<usize> {
    #[inline]
    fn into_shape(self) -> Result<Shape, TensorError> {
        Shape::new(self)
    }
}

impl IntoShape for usize {
    #[inline]
    fn into_shape(self) -> Result<Shape, TensorError> {
        Shape::new(&[self])
    }
}

/// Bytes needed to hold `shape` densely: `size × Π shape`, or `size` for rank 0.
///
/// The product is not overflow checked; callers keep shapes within the address space.
#[inline]
pub fn byte_size(shape: &Shape, r#type: DataType) -> usize {
    shape.numel() * r#type.size()
}

/// Row-major strides: the last dimension advances by one element.
pub fn canonical_strides(shape: &Shape, r#type: DataType) -> Strides {
    let mut strides = Strides::empty();
    strides.len = shape.len;
    let mut stride = r#type.size();
    for index in (0..shape.rank()).rev() {
        strides.data[index] = stride;
        stride *= shape[index];
    }
    strides
}

/// Column-major strides: the first dimension advances by one element.
pub fn column_major_strides(shape: &Shape, r#type: DataType) -> Strides {
    let mut strides = Strides::empty();
    strides.len = shape.len;
    let mut stride = r#type.size();
    for index in 0..shape.rank() {
        strides.data[index] = stride;
        stride *= shape[index];
    }
    strides
}

/// Right-aligned NumPy broadcasting of two shapes.
///
/// Walking from the trailing dimension, paired extents must be equal or one of them 1;
/// missing leading dimensions count as 1.
pub fn broadcast_shape(a: &Shape, b: &Shape) -> Result<Shape, TensorError> {
    let rank = a.rank().max(b.rank());
    let mut output = Shape::empty();
    output.len = rank as u8;

    for index in 0..rank {
        let x = match a.rank().checked_sub(index + 1) {
            Some(index) => a[index],
            None => 1,
        };
        let y = match b.rank().checked_sub(index + 1) {
            Some(index) => b[index],
            None => 1,
        };
        output.data[rank - 1 - index] = match (x, y) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return Err(TensorError::Broadcast(*a, *b)),
        };
    }
    Ok(output)
}

#[inline]
pub fn can_broadcast(a: &Shape, b: &Shape) -> bool {
    broadcast_shape(a, b).is_ok()
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::{
        IntoShape, MAX_DIMS, Shape, Strides, broadcast_shape, byte_size, canonical_strides,
        column_major_strides,
    };
    use crate::loom::{num::DataType, status::StatusCode, tensor::TensorError};

    #[test]
    fn test_byte_size() -> Result<(), Box<dyn Error>> {
        let shape = [2, 3, 4].into_shape()?;
        assert_eq!(byte_size(&shape, DataType::F32), 96);
        assert_eq!(byte_size(&shape, DataType::I8), 24);
        assert_eq!(byte_size(&Shape::empty(), DataType::F64), 8);
        assert_eq!(byte_size(&[3, 0].into_shape()?, DataType::F32), 0);

        for r#type in DataType::ALL {
            let shape = [5, 7].into_shape()?;
            assert_eq!(byte_size(&shape, r#type), 35 * r#type.size());
        }
        Ok(())
    }

    #[test]
    fn test_canonical_strides() -> Result<(), Box<dyn Error>> {
        let shape = [2, 3, 4].into_shape()?;
        assert_eq!(&*canonical_strides(&shape, DataType::F32), &[48, 16, 4]);
        assert_eq!(&*canonical_strides(&shape, DataType::U8), &[12, 4, 1]);
        assert_eq!(&*column_major_strides(&shape, DataType::F32), &[4, 8, 24]);
        assert_eq!(canonical_strides(&Shape::empty(), DataType::F32).rank(), 0);
        Ok(())
    }

    #[test]
    fn test_rank_overflow() {
        let dims = [1; MAX_DIMS + 1];
        let err = Shape::new(&dims).unwrap_err();
        assert!(matches!(err, TensorError::Rank(9)));
        assert_eq!(err.status(), StatusCode::InvalidArgument);

        let mut shape = Shape::new(&[1; MAX_DIMS]).unwrap();
        assert!(shape.push(1).is_err());
        assert_eq!(shape.rank(), MAX_DIMS);
    }

    #[test]
    fn test_insert_remove() -> Result<(), Box<dyn Error>> {
        let mut strides = Strides::new(&[12, 4])?;
        strides.insert(1, 99)?;
        assert_eq!(&*strides, &[12, 99, 4]);
        assert_eq!(strides.remove(0), 12);
        assert_eq!(&*strides, &[99, 4]);
        assert_eq!(strides, Strides::new(&[99, 4])?);
        assert!(strides.insert(3, 0).is_err());
        Ok(())
    }

    #[test]
    fn test_broadcast_shape() -> Result<(), Box<dyn Error>> {
        let shape = broadcast_shape(&[3, 1].into_shape()?, &[1, 4].into_shape()?)?;
        assert_eq!(&*shape, &[3, 4]);

        let shape = broadcast_shape(&[2, 3].into_shape()?, &[3].into_shape()?)?;
        assert_eq!(&*shape, &[2, 3]);

        let shape = broadcast_shape(&[8, 1, 6, 1].into_shape()?, &[7, 1, 5].into_shape()?)?;
        assert_eq!(&*shape, &[8, 7, 6, 5]);

        let shape = broadcast_shape(&Shape::empty(), &[2, 2].into_shape()?)?;
        assert_eq!(&*shape, &[2, 2]);

        let err = broadcast_shape(&[2, 3].into_shape()?, &[4, 5].into_shape()?).unwrap_err();
        assert_eq!(err.status(), StatusCode::InvalidArgument);
        Ok(())
    }

    #[test]
    fn test_display() -> Result<(), Box<dyn Error>> {
        assert_eq!([2, 3].into_shape()?.to_string(), "[2, 3]");
        assert_eq!(Shape::empty().to_string(), "[]");
        assert_eq!(format!("{:?}", Strides::new(&[4])?), "Strides([4])");
        Ok(())
    }
}
