use bytemuck::Pod;
use derive_more::Display;
use half::{bf16, f16};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Element kinds a [`Tensor`](super::tensor::Tensor) or [`Scalar`](super::scalar::Scalar) can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataType {
    #[display("f16")]
    F16,
    #[display("f32")]
    F32,
    #[display("f64")]
    F64,
    #[display("i8")]
    I8,
    #[display("i16")]
    I16,
    #[display("i32")]
    I32,
    #[display("i64")]
    I64,
    #[display("u8")]
    U8,
    #[display("u16")]
    U16,
    #[display("u32")]
    U32,
    #[display("u64")]
    U64,
    #[display("bool")]
    Bool,
    #[display("bf16")]
    BF16,
}

/// Numeric classification of a [`DataType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TypeClass {
    Float,
    Signed,
    Unsigned,
    Bool,
}

impl DataType {
    pub const ALL: [DataType; 13] = [
        DataType::F16,
        DataType::F32,
        DataType::F64,
        DataType::I8,
        DataType::I16,
        DataType::I32,
        DataType::I64,
        DataType::U8,
        DataType::U16,
        DataType::U32,
        DataType::U64,
        DataType::Bool,
        DataType::BF16,
    ];

    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            DataType::F16 | DataType::BF16 => 2,
            DataType::F32 => 4,
            DataType::F64 => 8,
            DataType::I8 | DataType::U8 | DataType::Bool => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::U32 => 4,
            DataType::I64 | DataType::U64 => 8,
        }
    }

    /// Natural alignment, always equal to [`size`](Self::size).
    #[inline]
    pub const fn alignment(self) -> usize {
        self.size()
    }

    pub const fn class(self) -> TypeClass {
        match self {
            DataType::F16 | DataType::F32 | DataType::F64 | DataType::BF16 => TypeClass::Float,
            DataType::I8 | DataType::I16 | DataType::I32 | DataType::I64 => TypeClass::Signed,
            DataType::U8 | DataType::U16 | DataType::U32 | DataType::U64 => TypeClass::Unsigned,
            DataType::Bool => TypeClass::Bool,
        }
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self.class(), TypeClass::Float)
    }

    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(self.class(), TypeClass::Signed)
    }

    #[inline]
    pub const fn is_unsigned(self) -> bool {
        matches!(self.class(), TypeClass::Unsigned)
    }

    #[inline]
    pub const fn is_bool(self) -> bool {
        matches!(self.class(), TypeClass::Bool)
    }

    /// Signed or unsigned integer. Booleans are not integers.
    #[inline]
    pub const fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }
}

/// A primitive that can be read from and written to a tensor buffer.
pub trait Element: Sized + Pod + Send + Sync + sealed::Sealed {
    const DATA_TYPE: DataType;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const DATA_TYPE: DataType = DataType::$variant;
        }
    };
}

impl_element!(f16, F16);
impl_element!(bf16, BF16);
impl_element!(f32, F32);
impl_element!(f64, F64);
impl_element!(i8, I8);
impl_element!(i16, I16);
impl_element!(i32, I32);
impl_element!(i64, I64);
impl_element!(u8, U8);
impl_element!(u16, U16);
impl_element!(u32, U32);
impl_element!(u64, U64);

/// Native floating point arithmetic used by the kernels.
pub trait Real: Copy + PartialOrd + Send + Sync {
    const ZERO: Self;
    const ONE: Self;
    const INFINITY: Self;
    const NEG_INFINITY: Self;

    fn from_f64(value: f64) -> Self;
    fn from_usize(value: usize) -> Self;
    fn to_f64(self) -> f64;

    fn add(self, rhs: Self) -> Self;
    fn sub(self, rhs: Self) -> Self;
    fn mul(self, rhs: Self) -> Self;
    fn div(self, rhs: Self) -> Self;

    fn neg(self) -> Self;
    fn abs(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tanh(self) -> Self;
}

macro_rules! impl_real {
    ($ty:ident) => {
        impl Real for $ty {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
            const INFINITY: Self = $ty::INFINITY;
            const NEG_INFINITY: Self = $ty::NEG_INFINITY;

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            #[inline]
            fn from_usize(value: usize) -> Self {
                value as $ty
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn add(self, rhs: Self) -> Self {
                self + rhs
            }

            #[inline]
            fn sub(self, rhs: Self) -> Self {
                self - rhs
            }

            #[inline]
            fn mul(self, rhs: Self) -> Self {
                self * rhs
            }

            #[inline]
            fn div(self, rhs: Self) -> Self {
                self / rhs
            }

            #[inline]
            fn neg(self) -> Self {
                -self
            }

            #[inline]
            fn abs(self) -> Self {
                $ty::abs(self)
            }

            #[inline]
            fn exp(self) -> Self {
                $ty::exp(self)
            }

            #[inline]
            fn ln(self) -> Self {
                $ty::ln(self)
            }

            #[inline]
            fn sqrt(self) -> Self {
                $ty::sqrt(self)
            }

            #[inline]
            fn sin(self) -> Self {
                $ty::sin(self)
            }

            #[inline]
            fn cos(self) -> Self {
                $ty::cos(self)
            }

            #[inline]
            fn tanh(self) -> Self {
                $ty::tanh(self)
            }
        }
    };
}

impl_real!(f32);
impl_real!(f64);

/// A floating point [`Element`]. Kernels compute in [`Float::Acc`] and narrow on store.
pub trait Float: Element {
    type Acc: Real;

    fn widen(self) -> Self::Acc;
    fn narrow(acc: Self::Acc) -> Self;
}

impl Float for f32 {
    type Acc = f32;

    #[inline]
    fn widen(self) -> f32 {
        self
    }

    #[inline]
    fn narrow(acc: f32) -> Self {
        acc
    }
}

impl Float for f64 {
    type Acc = f64;

    #[inline]
    fn widen(self) -> f64 {
        self
    }

    #[inline]
    fn narrow(acc: f64) -> Self {
        acc
    }
}

impl Float for f16 {
    type Acc = f32;

    #[inline]
    fn widen(self) -> f32 {
        self.to_f32()
    }

    #[inline]
    fn narrow(acc: f32) -> Self {
        f16::from_f32(acc)
    }
}

impl Float for bf16 {
    type Acc = f32;

    #[inline]
    fn widen(self) -> f32 {
        self.to_f32()
    }

    #[inline]
    fn narrow(acc: f32) -> Self {
        bf16::from_f32(acc)
    }
}

/// Integer elements an index kernel (e.g. argmax) can write.
pub trait Index: Element {
    fn from_usize(value: usize) -> Self;
}

impl Index for i32 {
    #[inline]
    fn from_usize(value: usize) -> Self {
        value as i32
    }
}

impl Index for i64 {
    #[inline]
    fn from_usize(value: usize) -> Self {
        value as i64
    }
}

mod sealed {
    use half::{bf16, f16};

    pub trait Sealed {}

    impl Sealed for f16 {}
    impl Sealed for bf16 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for i8 {}
    impl Sealed for i16 {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
}
