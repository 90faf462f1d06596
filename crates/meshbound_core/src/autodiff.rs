pub mod tape;

use crate::traits::AdScalar;
use num_traits::{Float, FromPrimitive, Num, NumCast, One, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

/// Active real for reverse-mode AD.
/// val: primal value
/// index: slot on the thread-local tape, `None` while passive
/// generation: tape generation the slot belongs to
#[derive(Debug, Clone, Copy, Default)]
pub struct AReal {
    val: f64,
    index: Option<usize>,
    generation: u64,
}

impl AReal {
    /// A passive value, not yet known to the tape.
    pub fn new(val: f64) -> Self {
        Self {
            val,
            index: None,
            generation: 0,
        }
    }

    pub fn value(&self) -> f64 {
        self.val
    }

    /// Tape slot, if the value is active on the current tape.
    pub fn index(&self) -> Option<usize> {
        tape::live_index(self)
    }

    /// Whether the value holds a slot on the current tape. Values registered
    /// before a [`tape::reset`] are passive again.
    pub fn is_active(&self) -> bool {
        self.index().is_some()
    }

    fn from_record(val: f64, slot: Option<(usize, u64)>) -> Self {
        match slot {
            Some((index, generation)) => Self {
                val,
                index: Some(index),
                generation,
            },
            None => Self::new(val),
        }
    }

    fn unary(self, val: f64, partial: f64) -> Self {
        if self.index.is_none() {
            return Self::new(val);
        }
        Self::from_record(val, tape::record(&[(self, partial)]))
    }

    fn binary(self, rhs: Self, val: f64, d_lhs: f64, d_rhs: f64) -> Self {
        if self.index.is_none() && rhs.index.is_none() {
            return Self::new(val);
        }
        Self::from_record(val, tape::record(&[(self, d_lhs), (rhs, d_rhs)]))
    }
}

impl From<f64> for AReal {
    fn from(val: f64) -> Self {
        Self::new(val)
    }
}

impl AdScalar for AReal {
    fn mark_as_input(&mut self) {
        tape::register_input(self);
    }

    fn derivative(&self) -> f64 {
        tape::adjoint(self)
    }
}

// Comparisons only look at the primal value.

impl PartialEq for AReal {
    fn eq(&self, other: &Self) -> bool {
        self.val == other.val
    }
}

impl PartialOrd for AReal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.val.partial_cmp(&other.val)
    }
}

impl Zero for AReal {
    fn zero() -> Self {
        Self::new(0.0)
    }
    fn is_zero(&self) -> bool {
        self.val == 0.0
    }
}

impl One for AReal {
    fn one() -> Self {
        Self::new(1.0)
    }
}

impl Add for AReal {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.binary(rhs, self.val + rhs.val, 1.0, 1.0)
    }
}

impl Sub for AReal {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.binary(rhs, self.val - rhs.val, 1.0, -1.0)
    }
}

impl Mul for AReal {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        self.binary(rhs, self.val * rhs.val, rhs.val, self.val)
    }
}

impl Div for AReal {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.val;
        self.binary(rhs, self.val * inv, inv, -self.val * inv * inv)
    }
}

impl Neg for AReal {
    type Output = Self;
    fn neg(self) -> Self {
        self.unary(-self.val, -1.0)
    }
}

impl Rem for AReal {
    type Output = Self;
    fn rem(self, rhs: Self) -> Self {
        let quotient = (self.val / rhs.val).trunc();
        self.binary(rhs, self.val % rhs.val, 1.0, -quotient)
    }
}

impl AddAssign for AReal {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
impl SubAssign for AReal {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}
impl MulAssign for AReal {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}
impl DivAssign for AReal {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}
impl RemAssign for AReal {
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

impl Num for AReal {
    type FromStrRadixErr = ();
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        f64::from_str_radix(str, radix)
            .map(Self::new)
            .map_err(|_| ())
    }
}

impl ToPrimitive for AReal {
    fn to_i64(&self) -> Option<i64> {
        self.val.to_i64()
    }
    fn to_u64(&self) -> Option<u64> {
        self.val.to_u64()
    }
    fn to_f64(&self) -> Option<f64> {
        Some(self.val)
    }
}

impl FromPrimitive for AReal {
    fn from_i64(n: i64) -> Option<Self> {
        Some(Self::new(n as f64))
    }
    fn from_u64(n: u64) -> Option<Self> {
        Some(Self::new(n as f64))
    }
    fn from_f64(n: f64) -> Option<Self> {
        Some(Self::new(n))
    }
}

impl NumCast for AReal {
    fn from<T: ToPrimitive>(n: T) -> Option<Self> {
        n.to_f64().map(Self::new)
    }
}

impl Float for AReal {
    fn nan() -> Self {
        Self::new(f64::NAN)
    }
    fn infinity() -> Self {
        Self::new(f64::INFINITY)
    }
    fn neg_infinity() -> Self {
        Self::new(f64::NEG_INFINITY)
    }
    fn neg_zero() -> Self {
        Self::new(-0.0)
    }
    fn min_value() -> Self {
        Self::new(f64::MIN)
    }
    fn min_positive_value() -> Self {
        Self::new(f64::MIN_POSITIVE)
    }
    fn max_value() -> Self {
        Self::new(f64::MAX)
    }
    fn is_nan(self) -> bool {
        self.val.is_nan()
    }
    fn is_infinite(self) -> bool {
        self.val.is_infinite()
    }
    fn is_finite(self) -> bool {
        self.val.is_finite()
    }
    fn is_normal(self) -> bool {
        self.val.is_normal()
    }
    fn classify(self) -> std::num::FpCategory {
        self.val.classify()
    }

    // Piecewise-constant functions have zero derivative almost everywhere.
    fn floor(self) -> Self {
        Self::new(self.val.floor())
    }
    fn ceil(self) -> Self {
        Self::new(self.val.ceil())
    }
    fn round(self) -> Self {
        Self::new(self.val.round())
    }
    fn trunc(self) -> Self {
        Self::new(self.val.trunc())
    }
    fn signum(self) -> Self {
        Self::new(self.val.signum())
    }

    fn fract(self) -> Self {
        self.unary(self.val.fract(), 1.0)
    }
    fn abs(self) -> Self {
        let sign = if self.val >= 0.0 { 1.0 } else { -1.0 };
        self.unary(self.val.abs(), sign)
    }
    fn is_sign_positive(self) -> bool {
        self.val.is_sign_positive()
    }
    fn is_sign_negative(self) -> bool {
        self.val.is_sign_negative()
    }
    fn mul_add(self, a: Self, b: Self) -> Self {
        self * a + b
    }
    fn recip(self) -> Self {
        let inv = 1.0 / self.val;
        self.unary(inv, -inv * inv)
    }

    fn powi(self, n: i32) -> Self {
        let partial = (n as f64) * self.val.powi(n - 1);
        self.unary(self.val.powi(n), partial)
    }

    fn powf(self, n: Self) -> Self {
        let val_pow = self.val.powf(n.val);
        let d_base = n.val * self.val.powf(n.val - 1.0);
        let d_exp = if n.is_active() {
            val_pow * self.val.ln()
        } else {
            0.0
        };
        self.binary(n, val_pow, d_base, d_exp)
    }

    fn sqrt(self) -> Self {
        let s = self.val.sqrt();
        self.unary(s, 0.5 / s)
    }

    fn exp(self) -> Self {
        let e = self.val.exp();
        self.unary(e, e)
    }
    fn exp2(self) -> Self {
        let e = self.val.exp2();
        self.unary(e, e * std::f64::consts::LN_2)
    }
    fn ln(self) -> Self {
        self.unary(self.val.ln(), 1.0 / self.val)
    }
    fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }
    fn log2(self) -> Self {
        self.unary(self.val.log2(), 1.0 / (self.val * std::f64::consts::LN_2))
    }
    fn log10(self) -> Self {
        self.unary(self.val.log10(), 1.0 / (self.val * std::f64::consts::LN_10))
    }

    fn max(self, other: Self) -> Self {
        if self.val > other.val {
            self
        } else {
            other
        }
    }
    fn min(self, other: Self) -> Self {
        if self.val < other.val {
            self
        } else {
            other
        }
    }

    fn abs_sub(self, other: Self) -> Self {
        if self.val <= other.val {
            Self::zero()
        } else {
            self - other
        }
    }

    fn cbrt(self) -> Self {
        let c = self.val.cbrt();
        self.unary(c, 1.0 / (3.0 * c * c))
    }
    fn hypot(self, other: Self) -> Self {
        let h = self.val.hypot(other.val);
        self.binary(other, h, self.val / h, other.val / h)
    }

    fn sin(self) -> Self {
        self.unary(self.val.sin(), self.val.cos())
    }
    fn cos(self) -> Self {
        self.unary(self.val.cos(), -self.val.sin())
    }
    fn tan(self) -> Self {
        let t = self.val.tan();
        self.unary(t, 1.0 + t * t)
    }
    fn asin(self) -> Self {
        self.unary(self.val.asin(), 1.0 / (1.0 - self.val * self.val).sqrt())
    }
    fn acos(self) -> Self {
        self.unary(self.val.acos(), -1.0 / (1.0 - self.val * self.val).sqrt())
    }
    fn atan(self) -> Self {
        self.unary(self.val.atan(), 1.0 / (1.0 + self.val * self.val))
    }
    fn atan2(self, other: Self) -> Self {
        // self is y, other is x.
        let r2 = self.val * self.val + other.val * other.val;
        self.binary(
            other,
            self.val.atan2(other.val),
            other.val / r2,
            -self.val / r2,
        )
    }
    fn sin_cos(self) -> (Self, Self) {
        (self.sin(), self.cos())
    }

    fn exp_m1(self) -> Self {
        self.unary(self.val.exp_m1(), self.val.exp())
    }
    fn ln_1p(self) -> Self {
        self.unary(self.val.ln_1p(), 1.0 / (1.0 + self.val))
    }
    fn sinh(self) -> Self {
        self.unary(self.val.sinh(), self.val.cosh())
    }
    fn cosh(self) -> Self {
        self.unary(self.val.cosh(), self.val.sinh())
    }
    fn tanh(self) -> Self {
        let t = self.val.tanh();
        self.unary(t, 1.0 - t * t)
    }
    fn asinh(self) -> Self {
        self.unary(self.val.asinh(), 1.0 / (self.val * self.val + 1.0).sqrt())
    }
    fn acosh(self) -> Self {
        self.unary(self.val.acosh(), 1.0 / (self.val * self.val - 1.0).sqrt())
    }
    fn atanh(self) -> Self {
        self.unary(self.val.atanh(), 1.0 / (1.0 - self.val * self.val))
    }

    fn integer_decode(self) -> (u64, i16, i8) {
        self.val.integer_decode()
    }
}
