//! Kernels over context-owned tensors.
//!
//! Kernel entry points are methods on [`Context`](crate::loom::context::Context): the generic
//! ones take an op tag ([`ops`]) and [`frontend`] adds one named method per op.

pub mod cpu;
pub mod frontend;
pub mod ops;
