use super::{
    Input, cast, check_float, check_index, check_operand, check_type, dispatch_float,
    output_slice,
};
use crate::{
    hal::ops::ReduceOp,
    loom::{
        context::Context,
        num::{DataType, Float, Index},
        scalar::Scalar,
        tensor::{Tensor, TensorError},
    },
};

/// Splits `x` into `(rows, row length)` around its last axis.
fn rows(x: &Tensor) -> Result<(usize, usize), TensorError> {
    let shape = x.shape();
    match shape.split_last() {
        Some((&inner, outer)) => Ok((outer.iter().product(), inner)),
        None => Err(TensorError::Dim(0, 0)),
    }
}

fn check_rows(x: &Tensor, output: &Tensor) -> Result<(usize, usize), TensorError> {
    check_operand(x)?;
    check_operand(output)?;
    check_float(x)?;
    let (outer, inner) = rows(x)?;
    if output.numel() != outer {
        return Err(TensorError::Count(output.numel(), outer));
    }
    Ok((outer, inner))
}

fn reduce_all<T: Float + Into<Scalar>>(
    context: &Context,
    op: ReduceOp,
    x: &Tensor,
) -> Result<Scalar, TensorError> {
    let host = context.host(x)?;
    let data = cast::<T>(&host[x.span()?])?;
    let value = op.reduce(data.iter().map(|&x| x.widen()));
    Ok(T::narrow(value).into())
}

fn reduce_last_axis<T: Float>(
    context: &mut Context,
    op: ReduceOp,
    x: &Tensor,
    output: &Tensor,
    inner: usize,
) -> Result<(), TensorError> {
    context.validate(x)?;
    context.with_output(output, |arena, buffer| {
        let x = Input::<T>::new(arena, buffer, x, output, false)?;
        let output = output_slice::<T>(buffer, output)?;
        if inner == 0 {
            output.fill(T::zeroed());
            return Ok(());
        }
        let data = x.as_slice().unwrap_or_default();
        for (output, row) in output.iter_mut().zip(data.chunks_exact(inner)) {
            *output = T::narrow(op.reduce(row.iter().map(|&x| x.widen())));
        }
        Ok(())
    })
}

fn argmax<T: Float>(
    context: &mut Context,
    x: &Tensor,
    output: &Tensor,
    inner: usize,
) -> Result<(), TensorError> {
    match output.data_type() {
        DataType::I32 => argmax_into::<T, i32>(context, x, output, inner),
        DataType::I64 => argmax_into::<T, i64>(context, x, output, inner),
        r#type => Err(TensorError::IndexType(r#type)),
    }
}

fn argmax_into<T: Float, I: Index>(
    context: &mut Context,
    x: &Tensor,
    output: &Tensor,
    inner: usize,
) -> Result<(), TensorError> {
    context.validate(x)?;
    context.with_output(output, |arena, buffer| {
        let x = Input::<T>::new(arena, buffer, x, output, false)?;
        let output = output_slice::<I>(buffer, output)?;
        if inner == 0 {
            output.fill(I::zeroed());
            return Ok(());
        }
        let data = x.as_slice().unwrap_or_default();
        for (output, row) in output.iter_mut().zip(data.chunks_exact(inner)) {
            let mut best = (0, row[0].widen());
            for (index, &x) in row.iter().enumerate().skip(1) {
                let x = x.widen();
                // strict comparison: ties keep the first maximum
                if x > best.1 {
                    best = (index, x);
                }
            }
            *output = I::from_usize(best.0);
        }
        Ok(())
    })
}

impl Context {
    /// Reduces every element of `x` to one scalar of its type.
    ///
    /// An empty tensor reduces to zero for every kind.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all, fields(op = %op)))]
    pub fn reduce_all(&self, op: ReduceOp, x: &Tensor) -> Result<Scalar, TensorError> {
        let result = check_operand(x).and_then(|_| check_float(x)).and_then(|_| {
            if x.numel() == 0 {
                return Ok(Scalar::zero(x.data_type()));
            }
            dispatch_float!(x.data_type(), reduce_all(self, op, x))
        });
        self.lenient("reduce_all", result)
    }

    /// Reduces each row along the last axis of `x` into one element of `output`.
    ///
    /// `output` holds one element per row, e.g. `[2, 3] -> [2]`, and must have the type of `x`.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all, fields(op = %op)))]
    pub fn reduce_last_axis(
        &mut self,
        op: ReduceOp,
        x: &Tensor,
        output: &Tensor,
    ) -> Result<(), TensorError> {
        let result = check_rows(x, output).and_then(|(outer, inner)| {
            check_type(x, output)?;
            if outer == 0 {
                return Ok(());
            }
            dispatch_float!(x.data_type(), reduce_last_axis(self, op, x, output, inner))
        });
        self.lenient("reduce_last_axis", result)
    }

    /// Writes the position of the largest element of each last-axis row to an `I32` or `I64`
    /// `output`. Ties resolve to the first occurrence; an empty row yields 0.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub fn argmax(&mut self, x: &Tensor, output: &Tensor) -> Result<(), TensorError> {
        let result = check_rows(x, output).and_then(|(outer, inner)| {
            check_index(output)?;
            if outer == 0 {
                return Ok(());
            }
            dispatch_float!(x.data_type(), argmax(self, x, output, inner))
        });
        self.lenient("argmax", result)
    }
}
