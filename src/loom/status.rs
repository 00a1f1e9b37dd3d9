use derive_more::Display;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Status taxonomy every [`TensorError`](super::tensor::TensorError) maps onto.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StatusCode {
    #[default]
    #[display("ok")]
    Ok,
    /// Bad shape, rank or index argument.
    #[display("invalid argument")]
    InvalidArgument,
    /// Index or size exceeded.
    #[display("out of bounds")]
    OutOfBounds,
    #[display("allocation failed")]
    AllocationFailed,
    /// Element type or device incompatibility.
    #[display("type mismatch")]
    TypeMismatch,
    #[display("invalid state")]
    InvalidState,
    /// Non-CPU device paths.
    #[display("not implemented")]
    NotImplemented,
}

impl StatusCode {
    #[inline]
    pub fn is_ok(self) -> bool {
        matches!(self, StatusCode::Ok)
    }

    #[inline]
    pub fn is_error(self) -> bool {
        !self.is_ok()
    }
}
