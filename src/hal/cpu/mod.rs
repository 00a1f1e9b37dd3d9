//! Dense host kernels.
//!
//! Every kernel writes into a caller-supplied output tensor and never allocates tensor
//! memory. Operands must be contiguous and live on the host.

use crate::loom::{
    device::Arena,
    num::{DataType, Element},
    tensor::{Tensor, TensorError},
};

pub mod elementwise;
pub mod matmul;
pub mod reduce;

/// Calls `$f::<T>(args..)` with `T` the float element of `$type`.
macro_rules! dispatch_float {
    ($type:expr, $f:ident($($arg:expr),* $(,)?)) => {
        match $type {
            $crate::loom::num::DataType::F16 => $f::<half::f16>($($arg),*),
            $crate::loom::num::DataType::BF16 => $f::<half::bf16>($($arg),*),
            $crate::loom::num::DataType::F32 => $f::<f32>($($arg),*),
            $crate::loom::num::DataType::F64 => $f::<f64>($($arg),*),
            r#type => Err($crate::loom::tensor::TensorError::Float(r#type)),
        }
    };
}
pub(crate) use dispatch_float;

/// A kernel operand as seen while the output buffer is borrowed mutably.
#[derive(Debug)]
pub(crate) enum Input<'a, T> {
    Borrowed(&'a [T]),
    /// Copy of an operand that shares the output's buffer.
    Staged(Vec<T>),
    /// The operand is exactly the output; elements are read before they are written.
    Output,
}

impl<'a, T: Element> Input<'a, T> {
    /// Resolves `input` against the detached `buffer` of `output`.
    ///
    /// With `in_place` an operand covering exactly the output's bytes is read from the output
    /// itself; otherwise any operand sharing the output's buffer is staged.
    pub fn new(
        arena: &'a Arena,
        buffer: &[u8],
        input: &Tensor,
        output: &Tensor,
        in_place: bool,
    ) -> Result<Self, TensorError> {
        let span = input.span()?;
        match input.buffer() {
            Some(_) if input.buffer() == output.buffer() => {
                if in_place && span == output.span()? && input.data_type() == output.data_type() {
                    return Ok(Input::Output);
                }
                let len = buffer.len();
                let bytes = buffer
                    .get(span.clone())
                    .ok_or(TensorError::Bounds(span, len))?;
                Ok(Input::Staged(bytemuck::pod_collect_to_vec(bytes)))
            }
            Some(id) => {
                let buffer = arena.get(id).ok_or(TensorError::Released(id))?;
                cast(&buffer.bytes()?[span]).map(Input::Borrowed)
            }
            None if span.is_empty() => Ok(Input::Borrowed(&[])),
            None => Err(TensorError::Null),
        }
    }

    /// Element `index` of the operand; `output` is consulted only for [`Input::Output`].
    #[inline]
    pub fn get(&self, output: &[T], index: usize) -> T {
        match self {
            Input::Borrowed(data) => data[index],
            Input::Staged(data) => data[index],
            Input::Output => output[index],
        }
    }

    /// The operand as a slice, when it does not alias the output.
    #[inline]
    pub fn as_slice(&self) -> Option<&[T]> {
        match self {
            Input::Borrowed(data) => Some(data),
            Input::Staged(data) => Some(data),
            Input::Output => None,
        }
    }
}

pub(crate) fn cast<T: Element>(bytes: &[u8]) -> Result<&[T], TensorError> {
    bytemuck::try_cast_slice(bytes).map_err(|_| TensorError::Misaligned(T::DATA_TYPE))
}

pub(crate) fn cast_mut<T: Element>(bytes: &mut [u8]) -> Result<&mut [T], TensorError> {
    bytemuck::try_cast_slice_mut(bytes).map_err(|_| TensorError::Misaligned(T::DATA_TYPE))
}

/// The output's own elements inside its detached buffer.
pub(crate) fn output_slice<'a, T: Element>(
    buffer: &'a mut [u8],
    output: &Tensor,
) -> Result<&'a mut [T], TensorError> {
    let span = output.span()?;
    let len = buffer.len();
    let bytes = buffer.get_mut(span.clone()).ok_or(TensorError::Bounds(span, len))?;
    cast_mut(bytes)
}

/// Host residence and row-major layout.
pub(crate) fn check_operand(tensor: &Tensor) -> Result<(), TensorError> {
    if !tensor.device().is_cpu() {
        return Err(TensorError::Device(tensor.device()));
    }
    if !tensor.is_contiguous() {
        return Err(TensorError::NonContiguous(tensor.shape(), tensor.strides()));
    }
    Ok(())
}

pub(crate) fn check_float(tensor: &Tensor) -> Result<(), TensorError> {
    match tensor.data_type() {
        r#type if r#type.is_float() => Ok(()),
        r#type => Err(TensorError::Float(r#type)),
    }
}

pub(crate) fn check_type(a: &Tensor, b: &Tensor) -> Result<(), TensorError> {
    match (a.data_type(), b.data_type()) {
        (x, y) if x == y => Ok(()),
        (x, y) => Err(TensorError::Type(x, y)),
    }
}

pub(crate) fn check_index(tensor: &Tensor) -> Result<(), TensorError> {
    match tensor.data_type() {
        DataType::I32 | DataType::I64 => Ok(()),
        r#type => Err(TensorError::IndexType(r#type)),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::error::Error;

    use super::Input;
    use crate::loom::{context::Context, device::Device, tensor::TensorError};

    macro_rules! assert_approx_eq {
        ($i:expr, $a:expr, $b:expr, $eps:expr) => {
            assert!(
                ($a - $b).abs() < $eps,
                "assertion failed at {}: `(left ~= right)`\n  left: `{}`\n right: `{}`",
                $i,
                $a,
                $b
            )
        };
    }
    pub(crate) use assert_approx_eq;

    #[test]
    fn test_approx_in_match_arm() {
        for (index, x) in [0.25f32, f32::NAN].into_iter().enumerate() {
            match x.is_nan() {
                true => assert!(x.is_nan()),
                false => assert_approx_eq!(index, x * 4.0, 1.0, 1e-6),
            }
        }
    }

    #[test]
    fn test_input_resolution() -> Result<(), Box<dyn Error>> {
        let mut context = Context::new();
        let data: Vec<f32> = (0..8).map(|x| x as f32).collect();
        let a = context.from_slice(&data, [8], Device::Cpu)?;
        let b = context.from_slice(&data, [8], Device::Cpu)?;
        let head = a.slice(0, 0, 4)?;
        let tail = a.slice(0, 4, 8)?;

        context.with_output(&tail, |arena, buffer| {
            let x = Input::<f32>::new(arena, buffer, &b, &tail, true)?;
            assert!(matches!(x, Input::Borrowed(data) if data.len() == 8));

            let x = Input::<f32>::new(arena, buffer, &tail, &tail, true)?;
            assert!(matches!(x, Input::Output));

            let x = Input::<f32>::new(arena, buffer, &tail, &tail, false)?;
            assert!(matches!(&x, Input::Staged(data) if data == &[4.0, 5.0, 6.0, 7.0]));

            let x = Input::<f32>::new(arena, buffer, &head, &tail, true)?;
            assert_eq!(x.as_slice(), Some(&[0.0, 1.0, 2.0, 3.0][..]));
            Ok::<_, TensorError>(())
        })?;
        Ok(())
    }
}
