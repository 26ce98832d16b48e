use crate::util::float_extended::FloatExtended;
use crate::util::FloatExp;
use std::ops::{Mul, Add, AddAssign, MulAssign, Sub, SubAssign, Div, Neg};
use num_complex::Complex;
use std::fmt::{Display, Result, Formatter};

/// Complex number sharing a single binary exponent between both parts. The larger
/// part of the mantissa is kept in `[0.5, 1)` after a reduce.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ComplexExtended {
    pub mantissa: Complex<f64>,
    pub exponent: i32,
}

impl ComplexExtended {
    #[inline]
    pub fn new(mantissa: Complex<f64>, exponent: i32) -> Self {
        let mut temp = ComplexExtended {
            mantissa,
            exponent
        };

        temp.reduce();
        temp
    }

    #[inline]
    pub fn new2(re: f64, im: f64, exponent: i32) -> Self {
        ComplexExtended::new(Complex::<f64>::new(re, im), exponent)
    }

    #[inline]
    pub fn zero() -> Self {
        ComplexExtended {
            mantissa: Complex::<f64>::new(0.0, 0.0),
            exponent: 0
        }
    }

    #[inline]
    pub fn one() -> Self {
        ComplexExtended::new2(1.0, 0.0, 0)
    }

    #[inline]
    pub fn from_extended(re: FloatExtended, im: FloatExtended) -> Self {
        if re.is_zero() {
            return ComplexExtended::new2(0.0, im.mantissa, im.exponent);
        }

        if im.is_zero() {
            return ComplexExtended::new2(re.mantissa, 0.0, re.exponent);
        }

        let exponent = re.exponent.max(im.exponent);

        ComplexExtended::new2(
            re.mantissa.ldexp(re.exponent - exponent),
            im.mantissa.ldexp(im.exponent - exponent),
            exponent)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.mantissa.re == 0.0 && self.mantissa.im == 0.0
    }

    #[inline]
    pub fn real(&self) -> FloatExtended {
        FloatExtended::new(self.mantissa.re, self.exponent)
    }

    #[inline]
    pub fn imag(&self) -> FloatExtended {
        FloatExtended::new(self.mantissa.im, self.exponent)
    }

    #[inline]
    pub fn norm(&self) -> FloatExtended {
        self.norm_square().sqrt()
    }

    #[inline]
    pub fn norm_square(&self) -> FloatExtended {
        FloatExtended::new(self.mantissa.norm_sqr(), self.exponent * 2)
    }

    #[inline]
    pub fn to_float(&self) -> Complex<f64> {
        Complex::<f64>::new(self.mantissa.re.ldexp(self.exponent), self.mantissa.im.ldexp(self.exponent))
    }

    #[inline]
    pub fn reduce(&mut self) {
        if self.is_zero() {
            self.exponent = 0;
            return;
        }

        let larger = if self.mantissa.re.abs() > self.mantissa.im.abs() {
            self.mantissa.re
        } else {
            self.mantissa.im
        };

        let (_, added_exponent) = larger.frexp();
        self.mantissa.re = self.mantissa.re.ldexp(-added_exponent);
        self.mantissa.im = self.mantissa.im.ldexp(-added_exponent);
        self.exponent += added_exponent;
    }

    #[inline]
    fn aligned_sum(a: ComplexExtended, b: ComplexExtended) -> ComplexExtended {
        if a.is_zero() {
            return b;
        }

        if b.is_zero() {
            return a;
        }

        let (new_mantissa, new_exponent) = if a.exponent == b.exponent {
            (a.mantissa + b.mantissa, a.exponent)
        } else if a.exponent > b.exponent {
            let shift = b.exponent - a.exponent;
            (a.mantissa + Complex::new(b.mantissa.re.ldexp(shift), b.mantissa.im.ldexp(shift)), a.exponent)
        } else {
            let shift = a.exponent - b.exponent;
            (b.mantissa + Complex::new(a.mantissa.re.ldexp(shift), a.mantissa.im.ldexp(shift)), b.exponent)
        };

        ComplexExtended::new(new_mantissa, new_exponent)
    }
}

impl Neg for ComplexExtended {
    type Output = ComplexExtended;

    #[inline]
    fn neg(self) -> Self::Output {
        ComplexExtended {
            mantissa: -self.mantissa,
            exponent: self.exponent
        }
    }
}

impl AddAssign for ComplexExtended {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        *self = ComplexExtended::aligned_sum(*self, other);
    }
}

impl SubAssign for ComplexExtended {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        *self = ComplexExtended::aligned_sum(*self, -other);
    }
}

impl MulAssign<ComplexExtended> for ComplexExtended {
    #[inline]
    fn mul_assign(&mut self, other: Self) {
        *self = *self * other;
    }
}

impl MulAssign<f64> for ComplexExtended {
    #[inline]
    fn mul_assign(&mut self, other: f64) {
        *self = *self * other;
    }
}

impl Add<ComplexExtended> for ComplexExtended {
    type Output = ComplexExtended;

    #[inline]
    fn add(self, other: Self) -> Self::Output {
        ComplexExtended::aligned_sum(self, other)
    }
}

impl Sub<ComplexExtended> for ComplexExtended {
    type Output = ComplexExtended;

    #[inline]
    fn sub(self, other: Self) -> Self::Output {
        ComplexExtended::aligned_sum(self, -other)
    }
}

impl Add<f64> for ComplexExtended {
    type Output = ComplexExtended;

    #[inline]
    fn add(self, other: f64) -> Self::Output {
        ComplexExtended::aligned_sum(self, ComplexExtended::new2(other, 0.0, 0))
    }
}

impl Mul<ComplexExtended> for ComplexExtended {
    type Output = ComplexExtended;

    #[inline]
    fn mul(self, other: Self) -> Self::Output {
        ComplexExtended::new(
            self.mantissa * other.mantissa,
            self.exponent + other.exponent
        )
    }
}

impl Mul<FloatExtended> for ComplexExtended {
    type Output = ComplexExtended;

    #[inline]
    fn mul(self, other: FloatExtended) -> Self::Output {
        ComplexExtended::new(
            self.mantissa * other.mantissa,
            self.exponent + other.exponent
        )
    }
}

impl Div<ComplexExtended> for ComplexExtended {
    type Output = ComplexExtended;

    #[inline]
    fn div(self, other: Self) -> Self::Output {
        ComplexExtended::new(
            self.mantissa / other.mantissa,
            self.exponent - other.exponent
        )
    }
}

impl Mul<f64> for ComplexExtended {
    type Output = ComplexExtended;

    #[inline]
    fn mul(self, other: f64) -> Self::Output {
        ComplexExtended::new(
            self.mantissa * other,
            self.exponent
        )
    }
}

impl Mul<ComplexExtended> for f64 {
    type Output = ComplexExtended;

    #[inline]
    fn mul(self, other: ComplexExtended) -> Self::Output {
        other * self
    }
}

impl Div<f64> for ComplexExtended {
    type Output = ComplexExtended;

    #[inline]
    fn div(self, other: f64) -> Self::Output {
        ComplexExtended::new(
            self.mantissa / other,
            self.exponent
        )
    }
}

impl Display for ComplexExtended {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "({}, {})", self.real(), self.imag())
    }
}
