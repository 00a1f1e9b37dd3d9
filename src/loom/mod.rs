//! The `loom` module provides the memory model every kernel builds on.
//!
//! ## Key Components
//! 1. **Layout** (`layout`): bounded `Shape`/`Strides`, byte sizes, canonical strides and
//!    broadcasting rules.
//! 2. **Devices** (`device`): device tags, the `Allocator` trait with its system and tracking
//!    implementations, the buffer `Arena`, and host-only synchronization hooks.
//! 3. **Tensors** (`tensor`): a non-owning or owning handle into a buffer plus the view algebra
//!    (reshape, slice, transpose, permute, expand, ...). Views never copy.
//! 4. **Context** (`context`): owns the buffers and provides allocation, release, host access
//!    and copies.
//! 5. **Numerics** (`num`, `scalar`, `status`): element types, tagged scalars and the status
//!    taxonomy errors map onto.
//!
//! ## Design Principles
//! - **Safety**: a released buffer is removed from the arena, so stale views fail instead of
//!   reading freed memory.
//! - **Injection**: every context captures its allocator at construction.

pub mod context;
pub mod device;
pub mod layout;
pub mod num;
pub mod scalar;
pub mod status;
pub mod tensor;
