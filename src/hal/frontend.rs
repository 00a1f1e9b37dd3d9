//! Named entry points over the generic kernels, e.g. `context.add(&a, &b, &c)` for
//! `context.binary(BinaryOp::Add, &a, &b, &c)`.

use super::ops::{BinaryOp, ReduceOp, UnaryOp};
use crate::loom::{
    context::Context,
    scalar::Scalar,
    tensor::{Tensor, TensorError},
};

macro_rules! impl_unary {
    ($($name:ident => $op:ident),* $(,)?) => {
        impl Context {
            $(
                #[doc = concat!("Element-wise `", stringify!($name), "` of `x` into `output`.")]
                #[inline]
                pub fn $name(&mut self, x: &Tensor, output: &Tensor) -> Result<(), TensorError> {
                    self.unary(UnaryOp::$op, x, output)
                }
            )*
        }
    };
}

macro_rules! impl_binary {
    ($($name:ident, $scalar:ident => $op:ident),* $(,)?) => {
        impl Context {
            $(
                #[doc = concat!("Element-wise `", stringify!($name), "` of `x` and `y` into `output`.")]
                #[inline]
                pub fn $name(
                    &mut self,
                    x: &Tensor,
                    y: &Tensor,
                    output: &Tensor,
                ) -> Result<(), TensorError> {
                    self.binary(BinaryOp::$op, x, y, output)
                }

                #[doc = concat!("Element-wise `", stringify!($name), "` of `x` and a scalar into `output`.")]
                #[inline]
                pub fn $scalar(
                    &mut self,
                    x: &Tensor,
                    y: impl Into<Scalar>,
                    output: &Tensor,
                ) -> Result<(), TensorError> {
                    self.scalar_op(BinaryOp::$op, x, y.into(), output)
                }
            )*
        }
    };
}

macro_rules! impl_reduce {
    ($($all:ident, $last:ident => $op:ident),* $(,)?) => {
        impl Context {
            $(
                #[doc = concat!("`", stringify!($op), "` of every element of `x`.")]
                #[inline]
                pub fn $all(&self, x: &Tensor) -> Result<Scalar, TensorError> {
                    self.reduce_all(ReduceOp::$op, x)
                }

                #[doc = concat!("`", stringify!($op), "` along the last axis of `x` into `output`.")]
                #[inline]
                pub fn $last(&mut self, x: &Tensor, output: &Tensor) -> Result<(), TensorError> {
                    self.reduce_last_axis(ReduceOp::$op, x, output)
                }
            )*
        }
    };
}

impl_unary!(
    neg => Neg,
    abs => Abs,
    exp => Exp,
    log => Log,
    sqrt => Sqrt,
    sin => Sin,
    cos => Cos,
    tanh => Tanh,
    relu => Relu,
    sigmoid => Sigmoid,
);

impl_binary!(
    add, add_scalar => Add,
    sub, sub_scalar => Sub,
    mul, mul_scalar => Mul,
    div, div_scalar => Div,
);

impl_reduce!(
    sum_all, sum_last => Sum,
    mean_all, mean_last => Mean,
    max_all, max_last => Max,
    min_all, min_last => Min,
    prod_all, prod_last => Prod,
);

#[cfg(test)]
mod tests {
    use std::error::Error;

    use crate::loom::{context::Context, device::Device, num::DataType, scalar::Scalar};

    #[test]
    fn test_chain() -> Result<(), Box<dyn Error>> {
        let mut context = Context::new();
        let x = context.from_slice(&[-1.0f32, 0.0, 1.0, 2.0], [2, 2], Device::Cpu)?;
        let y = context.alloc([2, 2], DataType::F32, Device::Cpu)?;

        context.relu(&x, &y)?;
        context.mul_scalar(&y, 3.0f32, &y)?;
        context.add(&y, &x, &y)?;
        assert_eq!(context.to_vec::<f32>(&y)?, [-1.0, 0.0, 4.0, 8.0]);
        assert_eq!(context.sum_all(&y)?, Scalar::F32(11.0));
        assert_eq!(context.min_all(&y)?, Scalar::F32(-1.0));

        let z = context.alloc([2], DataType::F32, Device::Cpu)?;
        context.max_last(&y, &z)?;
        assert_eq!(context.to_vec::<f32>(&z)?, [0.0, 8.0]);

        context.sigmoid(&z, &z)?;
        assert_eq!(context.get(&z, &[0])?, Scalar::F32(0.5));
        Ok(())
    }
}
