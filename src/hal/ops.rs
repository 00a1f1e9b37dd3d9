use derive_more::Display;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::loom::num::Real;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnaryOp {
    #[display("neg")]
    Neg,
    #[display("abs")]
    Abs,
    #[display("exp")]
    Exp,
    #[display("log")]
    Log,
    #[display("sqrt")]
    Sqrt,
    #[display("sin")]
    Sin,
    #[display("cos")]
    Cos,
    #[display("tanh")]
    Tanh,
    #[display("relu")]
    Relu,
    #[display("sigmoid")]
    Sigmoid,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 10] = [
        UnaryOp::Neg,
        UnaryOp::Abs,
        UnaryOp::Exp,
        UnaryOp::Log,
        UnaryOp::Sqrt,
        UnaryOp::Sin,
        UnaryOp::Cos,
        UnaryOp::Tanh,
        UnaryOp::Relu,
        UnaryOp::Sigmoid,
    ];

    #[inline]
    pub fn apply<R: Real>(self, x: R) -> R {
        match self {
            UnaryOp::Neg => x.neg(),
            UnaryOp::Abs => x.abs(),
            UnaryOp::Exp => x.exp(),
            UnaryOp::Log => x.ln(),
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Sin => x.sin(),
            UnaryOp::Cos => x.cos(),
            UnaryOp::Tanh => x.tanh(),
            UnaryOp::Relu => match x > R::ZERO {
                true => x,
                false => R::ZERO,
            },
            // not clamped: `exp(-x)` saturates to 0 or inf, giving exactly 1 or 0
            UnaryOp::Sigmoid => R::ONE.div(R::ONE.add(x.neg().exp())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BinaryOp {
    #[display("add")]
    Add,
    #[display("sub")]
    Sub,
    #[display("mul")]
    Mul,
    #[display("div")]
    Div,
}

impl BinaryOp {
    #[inline]
    pub fn apply<R: Real>(self, x: R, y: R) -> R {
        match self {
            BinaryOp::Add => x.add(y),
            BinaryOp::Sub => x.sub(y),
            BinaryOp::Mul => x.mul(y),
            BinaryOp::Div => x.div(y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ReduceOp {
    #[display("sum")]
    Sum,
    #[display("mean")]
    Mean,
    #[display("max")]
    Max,
    #[display("min")]
    Min,
    #[display("prod")]
    Prod,
}

impl ReduceOp {
    pub const ALL: [ReduceOp; 5] = [
        ReduceOp::Sum,
        ReduceOp::Mean,
        ReduceOp::Max,
        ReduceOp::Min,
        ReduceOp::Prod,
    ];

    #[inline]
    pub fn identity<R: Real>(self) -> R {
        match self {
            ReduceOp::Sum | ReduceOp::Mean => R::ZERO,
            ReduceOp::Prod => R::ONE,
            ReduceOp::Max => R::NEG_INFINITY,
            ReduceOp::Min => R::INFINITY,
        }
    }

    #[inline]
    pub fn combine<R: Real>(self, acc: R, x: R) -> R {
        match self {
            ReduceOp::Sum | ReduceOp::Mean => acc.add(x),
            ReduceOp::Prod => acc.mul(x),
            ReduceOp::Max if x > acc => x,
            ReduceOp::Min if x < acc => x,
            ReduceOp::Max | ReduceOp::Min => acc,
        }
    }

    /// Folds `items`. An empty sequence reduces to zero for every kind.
    pub fn reduce<R: Real>(self, items: impl IntoIterator<Item = R>) -> R {
        let (acc, count) = items
            .into_iter()
            .fold((self.identity(), 0usize), |(acc, count), x| {
                (self.combine(acc, x), count + 1)
            });
        match (self, count) {
            (_, 0) => R::ZERO,
            (ReduceOp::Mean, count) => acc.div(R::from_usize(count)),
            _ => acc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BinaryOp, ReduceOp, UnaryOp};

    #[test]
    fn test_unary() {
        assert_eq!(UnaryOp::Sigmoid.apply(0.0f32), 0.5);
        assert_eq!(UnaryOp::Relu.apply(-3.0f64), 0.0);
        assert_eq!(UnaryOp::Relu.apply(2.5f32), 2.5);
        assert_eq!(UnaryOp::Neg.apply(1.0f32), -1.0);
        assert_eq!(UnaryOp::Log.apply(1.0f64), 0.0);

        for x in [-1.0e4f32, -88.0, -1.0, 0.0, 1.0, 88.0, 1.0e4, f32::MAX, f32::MIN] {
            let y = UnaryOp::Sigmoid.apply(x);
            assert!(y.is_finite() && (0.0..=1.0).contains(&y), "sigmoid({x}) = {y}");
            assert!(UnaryOp::Relu.apply(x).is_finite());
        }
    }

    #[test]
    fn test_binary() {
        assert_eq!(BinaryOp::Add.apply(1.0f32, 5.0), 6.0);
        assert_eq!(BinaryOp::Sub.apply(1.0f32, 5.0), -4.0);
        assert_eq!(BinaryOp::Mul.apply(3.0f64, 7.0), 21.0);
        assert_eq!(BinaryOp::Div.apply(1.0f32, 4.0), 0.25);
    }

    #[test]
    fn test_reduce() {
        let data = [3.0f32, -1.0, 4.0, 1.0, -5.0];
        assert_eq!(ReduceOp::Sum.reduce(data), 2.0);
        assert_eq!(ReduceOp::Mean.reduce(data), 0.4);
        assert_eq!(ReduceOp::Max.reduce(data), 4.0);
        assert_eq!(ReduceOp::Min.reduce(data), -5.0);
        assert_eq!(ReduceOp::Prod.reduce(data), 60.0);

        for op in ReduceOp::ALL {
            assert_eq!(op.reduce(std::iter::empty::<f64>()), 0.0, "{op} of nothing");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(UnaryOp::Sigmoid.to_string(), "sigmoid");
        assert_eq!(ReduceOp::Prod.to_string(), "prod");
    }
}
