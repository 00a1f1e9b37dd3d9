use super::{Input, check_float, check_operand, check_type, dispatch_float, output_slice};
use crate::{
    hal::ops::{BinaryOp, UnaryOp},
    loom::{
        context::Context,
        num::{Float, Real},
        scalar::Scalar,
        tensor::{Tensor, TensorError},
    },
};

fn check_unary(x: &Tensor, output: &Tensor) -> Result<(), TensorError> {
    check_operand(x)?;
    check_operand(output)?;
    check_float(x)?;
    check_type(x, output)?;
    if x.numel() != output.numel() {
        return Err(TensorError::Count(x.numel(), output.numel()));
    }
    Ok(())
}

fn unary<T: Float>(
    context: &mut Context,
    op: UnaryOp,
    x: &Tensor,
    output: &Tensor,
) -> Result<(), TensorError> {
    context.validate(x)?;
    context.with_output(output, |arena, buffer| {
        let x = Input::<T>::new(arena, buffer, x, output, true)?;
        let output = output_slice::<T>(buffer, output)?;
        for index in 0..output.len() {
            let value = x.get(output, index).widen();
            output[index] = T::narrow(op.apply(value));
        }
        Ok(())
    })
}

fn binary<T: Float>(
    context: &mut Context,
    op: BinaryOp,
    x: &Tensor,
    y: &Tensor,
    output: &Tensor,
) -> Result<(), TensorError> {
    context.validate(x)?;
    context.validate(y)?;
    let broadcast = y.numel() == 1;
    context.with_output(output, |arena, buffer| {
        let x = Input::<T>::new(arena, buffer, x, output, true)?;
        let y = Input::<T>::new(arena, buffer, y, output, !broadcast)?;
        let output = output_slice::<T>(buffer, output)?;
        // read once: a broadcast rhs stored inside the output would be overwritten
        let rhs = match broadcast {
            true => Some(y.get(output, 0).widen()),
            false => None,
        };
        for index in 0..output.len() {
            let lhs = x.get(output, index).widen();
            let rhs = rhs.unwrap_or_else(|| y.get(output, index).widen());
            output[index] = T::narrow(op.apply(lhs, rhs));
        }
        Ok(())
    })
}

fn scalar_op<T: Float>(
    context: &mut Context,
    op: BinaryOp,
    x: &Tensor,
    rhs: Scalar,
    output: &Tensor,
) -> Result<(), TensorError> {
    context.validate(x)?;
    let rhs = T::Acc::from_f64(rhs.to_f64());
    context.with_output(output, |arena, buffer| {
        let x = Input::<T>::new(arena, buffer, x, output, true)?;
        let output = output_slice::<T>(buffer, output)?;
        for index in 0..output.len() {
            let lhs = x.get(output, index).widen();
            output[index] = T::narrow(op.apply(lhs, rhs));
        }
        Ok(())
    })
}

impl Context {
    /// Applies `op` to every element of `x`, writing `output`.
    ///
    /// `output` may be `x` itself (or a view of exactly the same bytes).
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all, fields(op = %op)))]
    pub fn unary(&mut self, op: UnaryOp, x: &Tensor, output: &Tensor) -> Result<(), TensorError> {
        let result = check_unary(x, output).and_then(|_| {
            if output.numel() == 0 {
                return Ok(());
            }
            dispatch_float!(x.data_type(), unary(self, op, x, output))
        });
        self.lenient("unary", result)
    }

    /// Combines `x` and `y` element by element.
    ///
    /// `y` either has as many elements as `x` or exactly one, which is then applied to every
    /// element of `x`. No other broadcasting is performed.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all, fields(op = %op)))]
    pub fn binary(
        &mut self,
        op: BinaryOp,
        x: &Tensor,
        y: &Tensor,
        output: &Tensor,
    ) -> Result<(), TensorError> {
        let result = check_unary(x, output)
            .and_then(|_| check_operand(y))
            .and_then(|_| check_type(x, y))
            .and_then(|_| match y.numel() {
                n if n == x.numel() || n == 1 => Ok(()),
                n => Err(TensorError::Count(n, x.numel())),
            })
            .and_then(|_| {
                if output.numel() == 0 {
                    return Ok(());
                }
                dispatch_float!(x.data_type(), binary(self, op, x, y, output))
            });
        self.lenient("binary", result)
    }

    /// Combines every element of `x` with `rhs`, converted to the element type.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all, fields(op = %op)))]
    pub fn scalar_op(
        &mut self,
        op: BinaryOp,
        x: &Tensor,
        rhs: Scalar,
        output: &Tensor,
    ) -> Result<(), TensorError> {
        let result = check_unary(x, output).and_then(|_| {
            if output.numel() == 0 {
                return Ok(());
            }
            dispatch_float!(x.data_type(), scalar_op(self, op, x, rhs, output))
        });
        self.lenient("scalar_op", result)
    }
}
