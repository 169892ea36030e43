//! Arbitrary-precision scaled-decimal kernel for the high-accuracy lane.
//!
//! A [`Decimal`] is an integer mantissa with a decimal fractional scale:
//! `unscaled * 10^-scale`. Products and quotients are reduced back to a
//! target scale with banker's rounding (half to even); Newton iterations
//! round toward zero so each update stays a contraction. The engine runs
//! the whole lane at [`DEFAULT_SCALE`] fractional digits.

use std::cmp::Ordering;
use std::fmt;

use num_bigint::BigInt;
use num_traits::{Pow, Signed, ToPrimitive, Zero};

use crate::error::NumericError;

/// Fractional decimal digits carried by the high-accuracy lane.
pub const DEFAULT_SCALE: u32 = 384;

/// Rounding applied when a result is reduced to a target scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Round half to even (banker's rounding).
    HalfEven,
    /// Round toward zero.
    Down,
}

/// A signed decimal number `unscaled * 10^-scale`.
///
/// Equality and ordering are numeric: `1.0` at scale 3 equals `1` at
/// scale 0.
#[derive(Debug, Clone)]
pub struct Decimal {
    unscaled: BigInt,
    scale: u32,
}

fn pow10(n: u32) -> BigInt {
    Pow::pow(BigInt::from(10u8), n)
}

/// Integer division of `num / den` with the given rounding.
fn div_rounded(num: &BigInt, den: &BigInt, mode: Rounding) -> BigInt {
    let negative = num.is_negative() != den.is_negative();
    let n = num.abs();
    let d = den.abs();
    let q = &n / &d;
    let r = &n % &d;
    let q = match mode {
        Rounding::Down => q,
        Rounding::HalfEven => {
            let twice = &r * 2u8;
            match twice.cmp(&d) {
                Ordering::Greater => q + 1,
                Ordering::Less => q,
                Ordering::Equal => {
                    if (&q % BigInt::from(2u8)).is_zero() {
                        q
                    } else {
                        q + 1
                    }
                }
            }
        }
    };
    if negative {
        -q
    } else {
        q
    }
}

impl Decimal {
    pub fn zero() -> Self {
        Self {
            unscaled: BigInt::zero(),
            scale: 0,
        }
    }

    pub fn one() -> Self {
        Self {
            unscaled: BigInt::from(1u8),
            scale: 0,
        }
    }

    pub fn from_i64(v: i64) -> Self {
        Self {
            unscaled: BigInt::from(v),
            scale: 0,
        }
    }

    /// Exact promotion of a binary double: every finite `f64` has an exact
    /// decimal expansion, and the engine depends on promotion being exact
    /// so both lanes start from identical values.
    ///
    /// # Panics
    ///
    /// Panics on NaN or infinity; task validation rejects those upstream.
    pub fn from_f64(v: f64) -> Self {
        assert!(v.is_finite(), "decimal promotion requires a finite value");
        if v == 0.0 {
            return Self::zero();
        }
        let bits = v.to_bits();
        let exponent = ((bits >> 52) & 0x7ff) as i64;
        let fraction = bits & 0x000f_ffff_ffff_ffff;
        let (mantissa, exp2) = if exponent == 0 {
            (fraction, -1074i64)
        } else {
            (fraction | (1u64 << 52), exponent - 1075)
        };
        let mut m = BigInt::from(mantissa);
        if v.is_sign_negative() {
            m = -m;
        }
        if exp2 >= 0 {
            Self {
                unscaled: m << (exp2 as usize),
                scale: 0,
            }
        } else {
            // m * 2^-k = m * 5^k * 10^-k
            let k = (-exp2) as u32;
            Self {
                unscaled: m * Pow::pow(BigInt::from(5u8), k),
                scale: k,
            }
        }
    }

    /// Projection into a double, correctly rounded.
    pub fn to_f64(&self) -> f64 {
        self.to_plain_string().parse().unwrap_or(f64::NAN)
    }

    pub fn is_zero(&self) -> bool {
        self.unscaled.is_zero()
    }

    pub fn signum(&self) -> i32 {
        if self.unscaled.is_zero() {
            0
        } else if self.unscaled.is_negative() {
            -1
        } else {
            1
        }
    }

    pub fn abs(&self) -> Self {
        Self {
            unscaled: self.unscaled.abs(),
            scale: self.scale,
        }
    }

    pub fn neg(&self) -> Self {
        Self {
            unscaled: -&self.unscaled,
            scale: self.scale,
        }
    }

    fn aligned_unscaled(&self, scale: u32) -> BigInt {
        &self.unscaled * pow10(scale - self.scale)
    }

    /// Exact addition; the result carries the finer of the two scales.
    pub fn add(&self, rhs: &Self) -> Self {
        let scale = self.scale.max(rhs.scale);
        Self {
            unscaled: self.aligned_unscaled(scale) + rhs.aligned_unscaled(scale),
            scale,
        }
    }

    /// Exact subtraction; the result carries the finer of the two scales.
    pub fn sub(&self, rhs: &Self) -> Self {
        let scale = self.scale.max(rhs.scale);
        Self {
            unscaled: self.aligned_unscaled(scale) - rhs.aligned_unscaled(scale),
            scale,
        }
    }

    /// Exact product; scales add.
    pub fn mul_exact(&self, rhs: &Self) -> Self {
        Self {
            unscaled: &self.unscaled * &rhs.unscaled,
            scale: self.scale + rhs.scale,
        }
    }

    /// Reduce to `scale` fractional digits. Widening pads exactly;
    /// narrowing rounds with `mode`.
    pub fn with_scale(&self, scale: u32, mode: Rounding) -> Self {
        match self.scale.cmp(&scale) {
            Ordering::Equal => self.clone(),
            Ordering::Less => Self {
                unscaled: self.aligned_unscaled(scale),
                scale,
            },
            Ordering::Greater => Self {
                unscaled: div_rounded(&self.unscaled, &pow10(self.scale - scale), mode),
                scale,
            },
        }
    }

    /// Integer part, truncated toward zero.
    pub fn trunc(&self) -> Self {
        self.with_scale(0, Rounding::Down)
    }

    /// Exact multiply, then round half-even to `scale`.
    pub fn mul(&self, rhs: &Self, scale: u32) -> Self {
        self.mul_exact(rhs).with_scale(scale, Rounding::HalfEven)
    }

    /// Division to `scale` fractional digits, half-even.
    pub fn div(&self, rhs: &Self, scale: u32) -> Result<Self, NumericError> {
        self.div_mode(rhs, scale, Rounding::HalfEven)
    }

    fn div_mode(&self, rhs: &Self, scale: u32, mode: Rounding) -> Result<Self, NumericError> {
        if rhs.unscaled.is_zero() {
            return Err(NumericError::DivisionByZero);
        }
        // u/v at scale s: round(a * 10^(s + v.scale - u.scale) / b)
        let shift = scale as i64 + rhs.scale as i64 - self.scale as i64;
        let (num, den) = if shift >= 0 {
            (&self.unscaled * pow10(shift as u32), rhs.unscaled.clone())
        } else {
            (self.unscaled.clone(), &rhs.unscaled * pow10((-shift) as u32))
        };
        Ok(Self {
            unscaled: div_rounded(&num, &den, mode),
            scale,
        })
    }

    /// Integer power by square-and-multiply, every product reduced to
    /// `scale`. `0^n = 0`; a negative exponent goes through the
    /// reciprocal.
    pub fn pow_int(&self, exponent: i64, scale: u32) -> Result<Self, NumericError> {
        if self.is_zero() {
            return Ok(Self::zero());
        }
        if exponent < 0 {
            return Self::one().div(&self.pow_int(-exponent, scale)?, scale);
        }
        let mut p = Self::one();
        let mut base = self.clone();
        let mut n = exponent;
        while n > 0 {
            if n & 1 == 1 {
                p = p.mul(&base, scale);
            }
            base = base.mul(&base, scale);
            n >>= 1;
        }
        Ok(p)
    }

    /// Real power. An exponent with no fractional part delegates to
    /// [`pow_int`](Self::pow_int); otherwise `u^e = exp(e * ln u)`.
    /// `0^e = 0`.
    pub fn pow_real(&self, exponent: f64, scale: u32) -> Result<Self, NumericError> {
        if self.is_zero() {
            return Ok(Self::zero());
        }
        if exponent % 1.0 == 0.0 && exponent <= i64::MAX as f64 {
            return self.pow_int(exponent as i64, scale);
        }
        Self::from_f64(exponent)
            .mul_exact(&self.ln(scale)?)
            .exp(scale)
    }

    /// Natural exponential. `exp(0) = 1`, `exp(-u) = 1/exp(u)`; for
    /// positive arguments the integer part `a` is split off and
    /// `exp0(1 + b/a)^a` keeps the Taylor argument near 1.
    pub fn exp(&self, scale: u32) -> Result<Self, NumericError> {
        match self.signum() {
            0 => return Ok(Self::one()),
            -1 => return Self::one().div(&self.neg().exp(scale)?, DEFAULT_SCALE),
            _ => {}
        }
        let a = self.trunc();
        if a.is_zero() {
            return Ok(self.exp0(scale));
        }
        let b = self.sub(&a);
        let c = Self::one().add(&b.div(&a, scale)?);
        let d = c.exp0(scale);
        let mut f = Self::one();
        let mut whole = a.unscaled;
        loop {
            match whole.to_i64() {
                Some(n) => return Ok(f.mul(&d.pow_int(n, scale)?, scale)),
                None => {
                    f = f.mul(&d.pow_int(i64::MAX, scale)?, scale);
                    whole -= BigInt::from(i64::MAX);
                }
            }
        }
    }

    /// Taylor series sum(u^k / k!), stopped when two successive partial
    /// sums agree at `scale`.
    fn exp0(&self, scale: u32) -> Self {
        let mut numerator = self.clone();
        let mut factorial = Self::one();
        let mut sum = self.add(&Self::one());
        let mut i = 2i64;
        loop {
            numerator = numerator.mul(self, scale);
            factorial = factorial.mul_exact(&Self::from_i64(i));
            // factorial is never zero, so the quotient cannot fail
            let term = match numerator.div(&factorial, scale) {
                Ok(t) => t,
                Err(_) => break,
            };
            let previous = sum.clone();
            sum = sum.add(&term);
            if sum == previous {
                break;
            }
            i += 1;
        }
        sum
    }

    /// Natural logarithm, defined for positive values only. Arguments with
    /// three or more integer digits are reduced through a root:
    /// `ln u = d * ln(root(u, d))`.
    pub fn ln(&self, scale: u32) -> Result<Self, NumericError> {
        if self.signum() <= 0 {
            return Err(NumericError::LogNonPositive);
        }
        let digits = self.integer_digits();
        if digits < 3 {
            self.ln0(scale)
        } else {
            let reduced = self.nth_root(digits, scale)?.ln0(scale)?;
            Ok(Self::from_i64(digits).mul(&reduced, scale))
        }
    }

    /// Newton iteration on `exp`: `x <- x - (exp(x) - u)/exp(x)`, updates
    /// rounded toward zero, until the update is at most `5*10^-(scale+1)`.
    fn ln0(&self, scale: u32) -> Result<Self, NumericError> {
        let s = scale + 1;
        let threshold = Self {
            unscaled: BigInt::from(5u8),
            scale: s,
        };
        let mut x = self.clone();
        loop {
            let e = x.exp(s)?;
            let update = e.sub(self).div_mode(&e, s, Rounding::Down)?;
            x = x.sub(&update);
            if update <= threshold {
                break;
            }
        }
        Ok(x.with_scale(scale, Rounding::HalfEven))
    }

    /// `k`-th root by Newton `x <- (u + (k-1)x^k) / (k x^(k-1))`, seeded
    /// at `u/k`, same stopping rule as [`ln`](Self::ln). The result keeps
    /// one guard digit (scale + 1).
    pub fn nth_root(&self, index: i64, scale: u32) -> Result<Self, NumericError> {
        if self.is_zero() {
            return Ok(Self::zero());
        }
        let s = scale + 1;
        let k = Self::from_i64(index);
        let k_minus_one = Self::from_i64(index - 1);
        let tolerance = Self {
            unscaled: BigInt::from(5u8),
            scale: s,
        };
        let mut x = self.div(&k, scale)?;
        loop {
            let f = x.pow_int(index - 1, s)?;
            let g = x.mul(&f, s);
            let numerator = self
                .add(&k_minus_one.mul_exact(&g))
                .with_scale(s, Rounding::HalfEven);
            let denominator = k.mul(&f, s);
            let previous = x.clone();
            x = numerator.div_mode(&denominator, s, Rounding::Down)?;
            if x.sub(&previous).abs() <= tolerance {
                break;
            }
        }
        Ok(x)
    }

    /// Decimal digit count of the truncated integer part (`0.x` counts
    /// one digit).
    fn integer_digits(&self) -> i64 {
        self.trunc().unscaled.abs().to_string().len() as i64
    }

    fn to_plain_string(&self) -> String {
        let digits = self.unscaled.abs().to_string();
        let sign = if self.unscaled.is_negative() { "-" } else { "" };
        let scale = self.scale as usize;
        if scale == 0 {
            return format!("{sign}{digits}");
        }
        if digits.len() > scale {
            let split = digits.len() - scale;
            format!("{sign}{}.{}", &digits[..split], &digits[split..])
        } else {
            format!("{sign}0.{}{}", "0".repeat(scale - digits.len()), digits)
        }
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        self.aligned_unscaled(scale)
            .cmp(&other.aligned_unscaled(scale))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_plain_string())
    }
}

/// Probabilistic factorial of a non-negative real: the linear
/// interpolation between `floor(u)!` and `floor(u)! * (floor(u)+1)`.
/// Intentionally not the Gamma function.
pub fn probabilistic_factorial(u: f64) -> f64 {
    let mut result = 1.0;
    let r = u % 1.0;
    if r > 0.0 {
        let v = u.floor();
        let mut i = 2.0;
        while i <= v {
            result *= i;
            i += 1.0;
        }
        result * (1.0 - r) + result * (v + 1.0) * r
    } else {
        let mut i = 2.0;
        while i <= u {
            result *= i;
            i += 1.0;
        }
        result
    }
}

/// Decimal form of [`probabilistic_factorial`]: exact interior products,
/// one terminal half-even rounding to `scale`.
pub fn probabilistic_factorial_dec(u: f64, scale: u32) -> Decimal {
    let mut result = Decimal::one();
    let r = u % 1.0;
    if r > 0.0 {
        let v = u.floor();
        let mut i = 2.0;
        while i <= v {
            result = result.mul_exact(&Decimal::from_f64(i));
            i += 1.0;
        }
        let fraction = Decimal::from_f64(r);
        let stay = result.mul_exact(&Decimal::one().sub(&fraction));
        let carry = result
            .mul_exact(&Decimal::from_f64(v).add(&Decimal::one()))
            .mul_exact(&fraction);
        result = stay.add(&carry);
    } else {
        let mut i = 2.0;
        while i <= u {
            result = result.mul_exact(&Decimal::from_f64(i));
            i += 1.0;
        }
    }
    result.with_scale(scale, Rounding::HalfEven)
}

/// Linear interpolation between `u` and `v` at fraction `f`.
pub fn interpolate(u: f64, v: f64, f: f64) -> f64 {
    u * (1.0 - f) + v * f
}

/// Evenly interpolated index positions in `[start, end)`, used to
/// downsample long series for display.
pub fn interpolate_indexes(start: usize, end: usize, result_size: usize) -> Vec<usize> {
    (0..result_size)
        .map(|i| interpolate(start as f64, end as f64, i as f64 / result_size as f64).round() as usize)
        .collect()
}
