//! Tensor memory model, view algebra and dense CPU kernels.
//!
//! A [`Context`] owns every buffer and hands out [`Tensor`] handles; views share the buffer
//! of the tensor they were made from and never own it. Kernels in [`hal`] are methods on the
//! context that write into caller-supplied outputs.
//!
//! ```
//! use zero_core::{Context, DataType, Device, Scalar};
//!
//! let mut context = Context::new();
//! let a = context.from_slice(&[1.0f32, 2.0, 3.0, 4.0], [2, 2], Device::Cpu)?;
//! let b = context.alloc([2, 2], DataType::F32, Device::Cpu)?;
//! context.add(&a, &a, &b)?;
//! assert_eq!(context.sum_all(&b)?, Scalar::F32(20.0));
//! # Ok::<(), zero_core::TensorError>(())
//! ```

pub mod hal;
pub mod loom;

pub use hal::ops::{BinaryOp, ReduceOp, UnaryOp};
pub use loom::{
    context::{Context, ContextBuilder},
    device::Device,
    layout::{Shape, Strides},
    num::DataType,
    scalar::Scalar,
    status::StatusCode,
    tensor::{Tensor, TensorError},
};
