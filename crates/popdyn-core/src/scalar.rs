//! The numeric capability the rule evaluator is generic over.
//!
//! The evaluator algebra is written once and instantiated twice: over
//! native `f64` for the finite-precision lane and over [`Decimal`] for
//! the high-accuracy lane. Whatever the lane, the same operations with
//! the same guards produce semantically identical flows.

use crate::decimal::{self, Decimal, DEFAULT_SCALE};
use crate::error::NumericError;

/// Arithmetic required by the transition algebra.
///
/// `f64` operations are infallible; the decimal lane can fail with a
/// kernel domain error (division by zero, log of a non-positive value),
/// which aborts the run.
pub trait Scalar: Clone + Send + Sync {
    fn zero() -> Self;

    /// Promote a task-level coefficient or probability.
    fn promote(v: f64) -> Self;

    fn add(&self, rhs: &Self) -> Self;
    fn sub(&self, rhs: &Self) -> Self;
    fn mul(&self, rhs: &Self) -> Self;
    fn div(&self, rhs: &Self) -> Result<Self, NumericError>;

    /// Real-exponent power.
    fn powf(&self, exponent: f64) -> Result<Self, NumericError>;

    fn min(self, rhs: Self) -> Self;

    /// Strictly greater than zero.
    fn is_positive(&self) -> bool;

    /// Probabilistic factorial of a coefficient.
    fn prob_factorial(c: f64) -> Self;
}

impl Scalar for f64 {
    fn zero() -> Self {
        0.0
    }

    fn promote(v: f64) -> Self {
        v
    }

    fn add(&self, rhs: &Self) -> Self {
        self + rhs
    }

    fn sub(&self, rhs: &Self) -> Self {
        self - rhs
    }

    fn mul(&self, rhs: &Self) -> Self {
        self * rhs
    }

    fn div(&self, rhs: &Self) -> Result<Self, NumericError> {
        Ok(self / rhs)
    }

    fn powf(&self, exponent: f64) -> Result<Self, NumericError> {
        Ok(f64::powf(*self, exponent))
    }

    fn min(self, rhs: Self) -> Self {
        f64::min(self, rhs)
    }

    fn is_positive(&self) -> bool {
        *self > 0.0
    }

    fn prob_factorial(c: f64) -> Self {
        decimal::probabilistic_factorial(c)
    }
}

impl Scalar for Decimal {
    fn zero() -> Self {
        Decimal::zero()
    }

    fn promote(v: f64) -> Self {
        Decimal::from_f64(v)
    }

    fn add(&self, rhs: &Self) -> Self {
        Decimal::add(self, rhs)
    }

    fn sub(&self, rhs: &Self) -> Self {
        Decimal::sub(self, rhs)
    }

    fn mul(&self, rhs: &Self) -> Self {
        Decimal::mul(self, rhs, DEFAULT_SCALE)
    }

    fn div(&self, rhs: &Self) -> Result<Self, NumericError> {
        Decimal::div(self, rhs, DEFAULT_SCALE)
    }

    fn powf(&self, exponent: f64) -> Result<Self, NumericError> {
        self.pow_real(exponent, DEFAULT_SCALE)
    }

    fn min(self, rhs: Self) -> Self {
        if self <= rhs {
            self
        } else {
            rhs
        }
    }

    fn is_positive(&self) -> bool {
        self.signum() > 0
    }

    fn prob_factorial(c: f64) -> Self {
        decimal::probabilistic_factorial_dec(c, DEFAULT_SCALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The same operation chain through both lanes stays in agreement.
    #[test]
    fn lanes_agree_on_an_operation_chain() {
        let coarse = {
            let x = <f64 as Scalar>::promote(12.5);
            let y = Scalar::mul(&x, &Scalar::promote(3.0));
            let z = Scalar::div(&y, &Scalar::promote(7.0)).unwrap();
            Scalar::powf(&z, 1.5).unwrap()
        };
        let fine = {
            let x = <Decimal as Scalar>::promote(12.5);
            let y = Scalar::mul(&x, &Scalar::promote(3.0));
            let z = Scalar::div(&y, &Scalar::promote(7.0)).unwrap();
            Scalar::powf(&z, 1.5).unwrap().to_f64()
        };
        assert!((coarse - fine).abs() < 1e-9);
    }

    #[test]
    fn min_and_positivity() {
        assert_eq!(<f64 as Scalar>::promote(2.0).min(3.0), 2.0);
        let a = <Decimal as Scalar>::promote(2.0);
        let b = <Decimal as Scalar>::promote(3.0);
        assert_eq!(Scalar::min(a.clone(), b), a);
        assert!(a.is_positive());
        assert!(!<Decimal as Scalar>::zero().is_positive());
        assert!(!<f64 as Scalar>::promote(-1.0).is_positive());
    }
}
