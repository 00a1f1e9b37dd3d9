use super::{Input, check_float, check_operand, check_type, dispatch_float, output_slice};
use crate::loom::{
    context::Context,
    layout::Shape,
    num::{Float, Real},
    tensor::{Tensor, TensorError},
};

/// Checks `A[M, K] · B[K, N] -> C[M, N]` and returns `[M, K, N]`.
fn check_gemm(a: &Tensor, b: &Tensor, c: &Tensor) -> Result<[usize; 3], TensorError> {
    for x in [a, b, c] {
        check_operand(x)?;
    }
    check_float(a)?;
    check_type(a, b)?;
    check_type(a, c)?;

    let (&[m, k], &[k_b, n]) = (&a.shape()[..], &b.shape()[..]) else {
        return Err(TensorError::Shape(a.shape(), b.shape()));
    };
    if k != k_b {
        return Err(TensorError::Shape(a.shape(), b.shape()));
    }
    let expected = Shape::new(&[m, n])?;
    if c.shape() != expected {
        return Err(TensorError::Shape(c.shape(), expected));
    }
    Ok([m, k, n])
}

fn gemm<T: Float>(
    context: &mut Context,
    alpha: f64,
    a: &Tensor,
    b: &Tensor,
    beta: f64,
    c: &Tensor,
    [m, k, n]: [usize; 3],
) -> Result<(), TensorError> {
    context.validate(a)?;
    context.validate(b)?;
    let alpha = T::Acc::from_f64(alpha);
    let beta = (beta != 0.0).then(|| T::Acc::from_f64(beta));

    context.with_output(c, |arena, buffer| {
        let a = Input::<T>::new(arena, buffer, a, c, false)?;
        let b = Input::<T>::new(arena, buffer, b, c, false)?;
        let c = output_slice::<T>(buffer, c)?;
        let a = a.as_slice().unwrap_or_default();
        let b = b.as_slice().unwrap_or_default();

        for (i, j) in itertools::iproduct!(0..m, 0..n) {
            let sum = (0..k).fold(T::Acc::ZERO, |acc, x| {
                acc.add(a[i * k + x].widen().mul(b[x * n + j].widen()))
            });
            let value = alpha.mul(sum);
            // a zero beta ignores the previous contents, even NaN
            let value = match beta {
                Some(beta) => value.add(beta.mul(c[i * n + j].widen())),
                None => value,
            };
            c[i * n + j] = T::narrow(value);
        }
        Ok(())
    })
}

impl Context {
    /// General matrix multiply `C = alpha · A · B + beta · C` of rank-2 row-major operands.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub fn gemm(
        &mut self,
        alpha: f64,
        a: &Tensor,
        b: &Tensor,
        beta: f64,
        c: &Tensor,
    ) -> Result<(), TensorError> {
        let result = check_gemm(a, b, c).and_then(|dims| {
            if c.numel() == 0 {
                return Ok(());
            }
            dispatch_float!(a.data_type(), gemm(self, alpha, a, b, beta, c, dims))
        });
        self.lenient("gemm", result)
    }

    /// `C = A · B`.
    #[inline]
    pub fn matmul(&mut self, a: &Tensor, b: &Tensor, c: &Tensor) -> Result<(), TensorError> {
        self.gemm(1.0, a, b, 0.0, c)
    }
}
