use crate::util::FloatExp;
use std::ops::{AddAssign, Mul, Add, Sub, SubAssign, MulAssign, DivAssign, Div, Neg};
use std::cmp::Ordering;
use std::f64::consts::{LN_2, LOG10_2};
use std::fmt::{Display, Formatter, Result};

/// Real number stored as an `f64` mantissa in `[0.5, 1)` and a separate binary
/// exponent, so that magnitudes far outside the `f64` range stay representable.
#[derive(Debug, Copy, Clone)]
pub struct FloatExtended {
    pub mantissa: f64,
    pub exponent: i32,
}

impl FloatExtended {
    #[inline]
    pub fn new(mantissa: f64, exponent: i32) -> Self {
        let mut output = FloatExtended {
            mantissa,
            exponent
        };
        output.reduce();
        output
    }

    #[inline]
    pub fn zero() -> Self {
        FloatExtended {
            mantissa: 0.0,
            exponent: 0
        }
    }

    #[inline]
    pub fn from_f64(value: f64) -> Self {
        FloatExtended::new(value, 0)
    }

    #[inline]
    pub fn reduce(&mut self) {
        if self.mantissa == 0.0 {
            self.exponent = 0;
            return;
        }

        let (temp_mantissa, added_exponent) = self.mantissa.frexp();
        self.mantissa = temp_mantissa;
        self.exponent += added_exponent;
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.mantissa == 0.0
    }

    #[inline]
    pub fn abs(&self) -> FloatExtended {
        FloatExtended {
            mantissa: self.mantissa.abs(),
            exponent: self.exponent
        }
    }

    #[inline]
    pub fn sqrt(&self) -> FloatExtended {
        let (new_mantissa, new_exponent) = if self.exponent % 2 == 0 {
            (self.mantissa.sqrt(), self.exponent / 2)
        } else {
            ((2.0 * self.mantissa).sqrt(), (self.exponent - 1) / 2)
        };
        FloatExtended::new(new_mantissa, new_exponent)
    }

    /// Natural logarithm, which always fits in an `f64`.
    #[inline]
    pub fn ln(&self) -> f64 {
        self.mantissa.ln() + self.exponent as f64 * LN_2
    }

    #[inline]
    pub fn log10(&self) -> f64 {
        self.mantissa.log10() + self.exponent as f64 * LOG10_2
    }

    #[inline]
    pub fn to_float(&self) -> f64 {
        self.mantissa.ldexp(self.exponent)
    }

    #[inline]
    pub fn max(self, other: FloatExtended) -> FloatExtended {
        if other > self {
            other
        } else {
            self
        }
    }

    #[inline]
    pub fn min(self, other: FloatExtended) -> FloatExtended {
        if other < self {
            other
        } else {
            self
        }
    }

    #[inline]
    fn aligned_sum(a: FloatExtended, b: FloatExtended) -> FloatExtended {
        if a.mantissa == 0.0 {
            return b;
        }

        if b.mantissa == 0.0 {
            return a;
        }

        let (new_mantissa, new_exponent) = match a.exponent.cmp(&b.exponent) {
            Ordering::Equal => (a.mantissa + b.mantissa, a.exponent),
            Ordering::Greater => (a.mantissa + b.mantissa.ldexp(b.exponent - a.exponent), a.exponent),
            Ordering::Less => (b.mantissa + a.mantissa.ldexp(a.exponent - b.exponent), b.exponent)
        };

        FloatExtended::new(new_mantissa, new_exponent)
    }
}

impl PartialEq for FloatExtended {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.mantissa == other.mantissa && (self.mantissa == 0.0 || self.exponent == other.exponent)
    }
}

impl PartialOrd for FloatExtended {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.mantissa.is_nan() || other.mantissa.is_nan() {
            return None;
        }

        // Signs decide first, the exponent only orders values of the same sign
        let sign_self = if self.mantissa > 0.0 { 1 } else if self.mantissa < 0.0 { -1 } else { 0 };
        let sign_other = if other.mantissa > 0.0 { 1 } else if other.mantissa < 0.0 { -1 } else { 0 };

        if sign_self != sign_other || sign_self == 0 {
            return sign_self.partial_cmp(&sign_other);
        }

        let magnitude = match self.exponent.cmp(&other.exponent) {
            Ordering::Equal => self.mantissa.abs().partial_cmp(&other.mantissa.abs())?,
            ordering => ordering,
        };

        if sign_self > 0 {
            Some(magnitude)
        } else {
            Some(magnitude.reverse())
        }
    }
}

impl Neg for FloatExtended {
    type Output = FloatExtended;

    #[inline]
    fn neg(self) -> Self::Output {
        FloatExtended {
            mantissa: -self.mantissa,
            exponent: self.exponent
        }
    }
}

impl AddAssign for FloatExtended {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        *self = FloatExtended::aligned_sum(*self, other);
    }
}

impl SubAssign for FloatExtended {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        *self = FloatExtended::aligned_sum(*self, -other);
    }
}

impl MulAssign<FloatExtended> for FloatExtended {
    #[inline]
    fn mul_assign(&mut self, other: Self) {
        self.mantissa *= other.mantissa;
        self.exponent += other.exponent;
        self.reduce();
    }
}

impl MulAssign<f64> for FloatExtended {
    #[inline]
    fn mul_assign(&mut self, other: f64) {
        self.mantissa *= other;
        self.reduce();
    }
}

impl DivAssign for FloatExtended {
    #[inline]
    fn div_assign(&mut self, other: Self) {
        self.mantissa /= other.mantissa;
        self.exponent -= other.exponent;
        self.reduce();
    }
}

impl Add<FloatExtended> for FloatExtended {
    type Output = FloatExtended;

    #[inline]
    fn add(self, other: Self) -> Self::Output {
        FloatExtended::aligned_sum(self, other)
    }
}

impl Sub<FloatExtended> for FloatExtended {
    type Output = FloatExtended;

    #[inline]
    fn sub(self, other: Self) -> Self::Output {
        FloatExtended::aligned_sum(self, -other)
    }
}

impl Mul<FloatExtended> for FloatExtended {
    type Output = FloatExtended;

    #[inline]
    fn mul(self, other: Self) -> Self::Output {
        FloatExtended::new(
            self.mantissa * other.mantissa,
            self.exponent + other.exponent
        )
    }
}

impl Div<FloatExtended> for FloatExtended {
    type Output = FloatExtended;

    #[inline]
    fn div(self, other: Self) -> Self::Output {
        FloatExtended::new(
            self.mantissa / other.mantissa,
            self.exponent - other.exponent
        )
    }
}

impl Add<f64> for FloatExtended {
    type Output = FloatExtended;

    #[inline]
    fn add(self, other: f64) -> Self::Output {
        FloatExtended::aligned_sum(self, FloatExtended::from_f64(other))
    }
}

impl Sub<f64> for FloatExtended {
    type Output = FloatExtended;

    #[inline]
    fn sub(self, other: f64) -> Self::Output {
        FloatExtended::aligned_sum(self, FloatExtended::from_f64(-other))
    }
}

impl Mul<f64> for FloatExtended {
    type Output = FloatExtended;

    #[inline]
    fn mul(self, other: f64) -> Self::Output {
        self * FloatExtended::from_f64(other)
    }
}

impl Div<f64> for FloatExtended {
    type Output = FloatExtended;

    #[inline]
    fn div(self, other: f64) -> Self::Output {
        self / FloatExtended::from_f64(other)
    }
}

impl Mul<FloatExtended> for f64 {
    type Output = FloatExtended;

    #[inline]
    fn mul(self, other: FloatExtended) -> Self::Output {
        FloatExtended::from_f64(self) * other
    }
}

impl Display for FloatExtended {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let scaled = self.exponent as f64 * LOG10_2;

        if self.mantissa == 0.0 {
            write!(f, "0.00E0")
        } else {
            let value = self.mantissa * 10.0f64.powf(scaled.fract());
            let (value, power) = if value.abs() < 1.0 {
                (value * 10.0, scaled.trunc() as i32 - 1)
            } else {
                (value, scaled.trunc() as i32)
            };

            write!(f, "{:.2}E{}", value, power)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_keeps_mantissa_in_range() {
        let value = FloatExtended::new(12.0, 3);
        assert!(value.mantissa >= 0.5 && value.mantissa < 1.0);
        assert_eq!(value.to_float(), 96.0);
    }

    #[test]
    fn multiply_beyond_f64_range() {
        let tiny = FloatExtended::new(1.0, -2000);
        let squared = tiny * tiny;

        assert_eq!(squared.exponent, -3999);
        assert_eq!(squared.to_float(), 0.0);
        assert!(squared > FloatExtended::zero());
    }

    #[test]
    fn addition_aligns_exponents() {
        let a = FloatExtended::new(1.0, 100);
        let b = FloatExtended::new(1.0, 99);

        let sum = a + b;
        assert_eq!(sum, FloatExtended::new(1.5, 100));

        let difference = b - a;
        assert_eq!(difference, FloatExtended::new(-1.0, 99));
    }

    #[test]
    fn ordering_respects_sign_and_exponent() {
        let small = FloatExtended::new(1.0, -500);
        let large = FloatExtended::new(1.0, 500);
        let negative = FloatExtended::new(-1.0, 500);

        assert!(small < large);
        assert!(negative < small);
        assert!(negative < FloatExtended::zero());
        assert!(FloatExtended::new(-1.0, -10) > negative);
    }

    #[test]
    fn sqrt_of_odd_exponent() {
        let original = FloatExtended::new(1.0, -1002);
        assert_eq!(original.exponent % 2, -1);

        let root = original.sqrt();
        let ratio = (root * root / original).to_float();

        assert!((ratio - 1.0).abs() < 1e-14);
    }

    #[test]
    fn logarithms_of_deep_values() {
        let value = FloatExtended::new(1.0, -3322);
        assert!((value.log10() + 3322.0 * LOG10_2).abs() < 1e-9);
        assert!((value.ln() + 3322.0 * LN_2).abs() < 1e-9);
    }
}
