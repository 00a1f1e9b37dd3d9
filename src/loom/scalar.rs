use derive_more::{Display, From};
use half::{bf16, f16};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{num::DataType, tensor::TensorError};

/// A tagged immediate value of any [`DataType`].
///
/// Used for loop bounds, hyperparameters and constants. Cross-type accessors are lossy:
/// the scalar stores a value, it does not decide conversion policy.
#[derive(Debug, Clone, Copy, PartialEq, Display, From)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Scalar {
    #[display("f16({_0})")]
    F16(f16),
    #[display("f32({_0})")]
    F32(f32),
    #[display("f64({_0})")]
    F64(f64),
    #[display("i8({_0})")]
    I8(i8),
    #[display("i16({_0})")]
    I16(i16),
    #[display("i32({_0})")]
    I32(i32),
    #[display("i64({_0})")]
    I64(i64),
    #[display("u8({_0})")]
    U8(u8),
    #[display("u16({_0})")]
    U16(u16),
    #[display("u32({_0})")]
    U32(u32),
    #[display("u64({_0})")]
    U64(u64),
    #[display("bool({_0})")]
    Bool(bool),
    #[display("bf16({_0})")]
    BF16(bf16),
}

impl Default for Scalar {
    fn default() -> Self {
        Self::ZERO_F32
    }
}

impl Scalar {
    pub const ZERO_F32: Scalar = Scalar::F32(0.0);
    pub const ONE_F32: Scalar = Scalar::F32(1.0);
    pub const ZERO_I32: Scalar = Scalar::I32(0);
    pub const ONE_I32: Scalar = Scalar::I32(1);
    pub const TRUE: Scalar = Scalar::Bool(true);
    pub const FALSE: Scalar = Scalar::Bool(false);

    /// The zero of `r#type`.
    pub fn zero(r#type: DataType) -> Self {
        Scalar::I64(0).cast(r#type)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::F16(_) => DataType::F16,
            Scalar::F32(_) => DataType::F32,
            Scalar::F64(_) => DataType::F64,
            Scalar::I8(_) => DataType::I8,
            Scalar::I16(_) => DataType::I16,
            Scalar::I32(_) => DataType::I32,
            Scalar::I64(_) => DataType::I64,
            Scalar::U8(_) => DataType::U8,
            Scalar::U16(_) => DataType::U16,
            Scalar::U32(_) => DataType::U32,
            Scalar::U64(_) => DataType::U64,
            Scalar::Bool(_) => DataType::Bool,
            Scalar::BF16(_) => DataType::BF16,
        }
    }

    #[inline]
    pub fn is_integer(&self) -> bool {
        self.data_type().is_integer()
    }

    #[inline]
    pub fn is_floating(&self) -> bool {
        self.data_type().is_float()
    }

    /// Floats and signed integers.
    #[inline]
    pub fn is_signed(&self) -> bool {
        self.data_type().is_signed() || self.is_floating()
    }

    #[inline]
    pub fn is_logical(&self) -> bool {
        self.data_type().is_bool()
    }

    pub fn to_f32(&self) -> f32 {
        match *self {
            Scalar::F16(x) => x.to_f32(),
            Scalar::BF16(x) => x.to_f32(),
            Scalar::F32(x) => x,
            x => x.to_f64() as f32,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match *self {
            Scalar::F16(x) => x.to_f64(),
            Scalar::F32(x) => x as f64,
            Scalar::F64(x) => x,
            Scalar::I8(x) => x as f64,
            Scalar::I16(x) => x as f64,
            Scalar::I32(x) => x as f64,
            Scalar::I64(x) => x as f64,
            Scalar::U8(x) => x as f64,
            Scalar::U16(x) => x as f64,
            Scalar::U32(x) => x as f64,
            Scalar::U64(x) => x as f64,
            Scalar::Bool(x) => x as u8 as f64,
            Scalar::BF16(x) => x.to_f64(),
        }
    }

    /// Floats truncate toward zero and saturate; `u64` values above `i64::MAX` wrap.
    pub fn to_i64(&self) -> i64 {
        match *self {
            Scalar::I8(x) => x as i64,
            Scalar::I16(x) => x as i64,
            Scalar::I32(x) => x as i64,
            Scalar::I64(x) => x,
            Scalar::U8(x) => x as i64,
            Scalar::U16(x) => x as i64,
            Scalar::U32(x) => x as i64,
            Scalar::U64(x) => x as i64,
            Scalar::Bool(x) => x as i64,
            x => x.to_f64() as i64,
        }
    }

    pub fn to_bool(&self) -> bool {
        match *self {
            Scalar::Bool(x) => x,
            Scalar::U64(x) => x != 0,
            x if x.is_floating() => x.to_f64() != 0.0,
            x => x.to_i64() != 0,
        }
    }

    /// Lossy conversion to another type.
    pub fn cast(self, r#type: DataType) -> Scalar {
        if self.data_type() == r#type {
            return self;
        }
        let (x, i) = (self.to_f64(), self.to_i64());
        match r#type {
            DataType::F16 => Scalar::F16(f16::from_f64(x)),
            DataType::BF16 => Scalar::BF16(bf16::from_f64(x)),
            DataType::F32 => Scalar::F32(self.to_f32()),
            DataType::F64 => Scalar::F64(x),
            DataType::I8 => Scalar::I8(i as i8),
            DataType::I16 => Scalar::I16(i as i16),
            DataType::I32 => Scalar::I32(i as i32),
            DataType::I64 => Scalar::I64(i),
            DataType::U8 => Scalar::U8(i as u8),
            DataType::U16 => Scalar::U16(i as u16),
            DataType::U32 => Scalar::U32(i as u32),
            DataType::U64 => match self {
                Scalar::F16(_) | Scalar::BF16(_) | Scalar::F32(_) | Scalar::F64(_) => {
                    Scalar::U64(x as u64)
                }
                _ => Scalar::U64(i as u64),
            },
            DataType::Bool => Scalar::Bool(self.to_bool()),
        }
    }

    /// Reinterprets `bytes` as a value of `r#type`. The length must match exactly.
    pub fn from_bytes(bytes: &[u8], r#type: DataType) -> Result<Scalar, TensorError> {
        if bytes.len() != r#type.size() {
            return Err(TensorError::Bytes(r#type, bytes.len()));
        }
        use bytemuck::pod_read_unaligned as read;
        let scalar = match r#type {
            DataType::F16 => Scalar::F16(read(bytes)),
            DataType::F32 => Scalar::F32(read(bytes)),
            DataType::F64 => Scalar::F64(read(bytes)),
            DataType::I8 => Scalar::I8(read(bytes)),
            DataType::I16 => Scalar::I16(read(bytes)),
            DataType::I32 => Scalar::I32(read(bytes)),
            DataType::I64 => Scalar::I64(read(bytes)),
            DataType::U8 => Scalar::U8(read(bytes)),
            DataType::U16 => Scalar::U16(read(bytes)),
            DataType::U32 => Scalar::U32(read(bytes)),
            DataType::U64 => Scalar::U64(read(bytes)),
            DataType::Bool => Scalar::Bool(bytes[0] != 0),
            DataType::BF16 => Scalar::BF16(read(bytes)),
        };
        Ok(scalar)
    }

    /// Writes the native-endian representation into `dst`, which must be exactly
    /// [`DataType::size`] bytes long.
    pub fn write_bytes(&self, dst: &mut [u8]) -> Result<(), TensorError> {
        let r#type = self.data_type();
        if dst.len() != r#type.size() {
            return Err(TensorError::Bytes(r#type, dst.len()));
        }
        use bytemuck::bytes_of;
        match self {
            Scalar::F16(x) => dst.copy_from_slice(bytes_of(x)),
            Scalar::F32(x) => dst.copy_from_slice(bytes_of(x)),
            Scalar::F64(x) => dst.copy_from_slice(bytes_of(x)),
            Scalar::I8(x) => dst.copy_from_slice(bytes_of(x)),
            Scalar::I16(x) => dst.copy_from_slice(bytes_of(x)),
            Scalar::I32(x) => dst.copy_from_slice(bytes_of(x)),
            Scalar::I64(x) => dst.copy_from_slice(bytes_of(x)),
            Scalar::U8(x) => dst.copy_from_slice(bytes_of(x)),
            Scalar::U16(x) => dst.copy_from_slice(bytes_of(x)),
            Scalar::U32(x) => dst.copy_from_slice(bytes_of(x)),
            Scalar::U64(x) => dst.copy_from_slice(bytes_of(x)),
            Scalar::Bool(x) => dst[0] = *x as u8,
            Scalar::BF16(x) => dst.copy_from_slice(bytes_of(x)),
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0; self.data_type().size()];
        // the buffer is sized from the tag, so this cannot fail
        let _ = self.write_bytes(&mut bytes);
        bytes
    }

    /// Float operands promote to `f64`, integer operands to `i64`. Mixed classes and
    /// booleans are a type error.
    fn promote(
        self,
        rhs: Scalar,
        float: impl FnOnce(f64, f64) -> f64,
        int: impl FnOnce(i64, i64) -> i64,
    ) -> Result<Scalar, TensorError> {
        match (self.is_floating(), rhs.is_floating()) {
            (true, true) => Ok(Scalar::F64(float(self.to_f64(), rhs.to_f64()))),
            _ if self.is_integer() && rhs.is_integer() => {
                Ok(Scalar::I64(int(self.to_i64(), rhs.to_i64())))
            }
            _ => Err(TensorError::Type(self.data_type(), rhs.data_type())),
        }
    }

    pub fn add(self, rhs: Scalar) -> Result<Scalar, TensorError> {
        self.promote(rhs, |x, y| x + y, i64::wrapping_add)
    }

    pub fn sub(self, rhs: Scalar) -> Result<Scalar, TensorError> {
        self.promote(rhs, |x, y| x - y, i64::wrapping_sub)
    }

    pub fn mul(self, rhs: Scalar) -> Result<Scalar, TensorError> {
        self.promote(rhs, |x, y| x * y, i64::wrapping_mul)
    }

    pub fn div(self, rhs: Scalar) -> Result<Scalar, TensorError> {
        // checked before promotion: the integer division below panics on zero
        let zero = match rhs.is_floating() {
            true => rhs.to_f64() == 0.0,
            false => rhs.to_i64() == 0,
        };
        let same_class = (self.is_floating() && rhs.is_floating())
            || (self.is_integer() && rhs.is_integer());
        if zero && same_class {
            return Err(TensorError::DivisionByZero);
        }
        self.promote(rhs, |x, y| x / y, i64::wrapping_div)
    }
}
