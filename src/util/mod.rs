use std::f64::consts::LOG2_10;

pub mod chunk;
pub mod complex_extended;
pub mod field_catalogue;
pub mod float_extended;
pub mod progress;
pub mod result_store;
pub mod viewport;

pub use chunk::{Chunk, ChunkLayout};
pub use complex_extended::ComplexExtended;
pub use field_catalogue::{Field, FieldCatalogue, FieldKind};
pub use float_extended::FloatExtended;
pub use progress::ProgressCounters;
pub use result_store::{ChunkRecord, ChunkWriter, ResultReader, ResultStore, Subset};
pub use viewport::Viewport;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub type ComplexArbitrary = rug::Complex;
pub type FloatArbitrary = rug::Float;

/// Largest precision accepted for the reference orbit, in decimal digits.
pub const MAXIMUM_PRECISION_DIGITS: usize = 100_000;

pub trait FloatExp: Sized {
    fn frexp(self) -> (Self, i32);
    fn ldexp(self, exp: i32) -> Self;
}

impl FloatExp for f64 {
    fn frexp(self) -> (Self, i32) {
        if self == 0.0 || !self.is_finite() {
            return (self, 0);
        }

        let bits = self.to_bits();
        let biased = ((bits >> 52) & 0x7ff) as i32;

        if biased == 0 {
            // subnormal
            let (mantissa, exponent) = (self * 2.0f64.powi(54)).frexp();
            return (mantissa, exponent - 54);
        }

        let mantissa = f64::from_bits((bits & !(0x7ffu64 << 52)) | (1022u64 << 52));
        (mantissa, biased - 1022)
    }

    fn ldexp(self, exp: i32) -> Self {
        let mut value = self;
        let mut exp = exp;

        while exp > 1023 {
            value *= 2.0f64.powi(1023);
            exp -= 1023;

            if value.is_infinite() {
                return value;
            }
        }

        while exp < -1022 {
            value *= 2.0f64.powi(-1022);
            exp += 1022;

            if value == 0.0 {
                return value;
            }
        }

        value * 2.0f64.powi(exp)
    }
}

#[inline]
pub fn float_to_extended(value: &FloatArbitrary) -> FloatExtended {
    let (mantissa, exponent) = value.to_f64_exp();
    FloatExtended::new(mantissa, exponent)
}

pub fn to_extended(value: &ComplexArbitrary) -> ComplexExtended {
    ComplexExtended::from_extended(
        float_to_extended(value.real()),
        float_to_extended(value.imag()))
}

pub fn extended_to_arbitrary(value: FloatExtended, precision: u32) -> FloatArbitrary {
    let mut output = FloatArbitrary::with_val(precision, value.mantissa);
    output <<= value.exponent;
    output
}

pub fn parse_arbitrary(string: &str, precision: u32) -> Option<FloatArbitrary> {
    let parsed = FloatArbitrary::parse(string.trim()).ok()?;
    Some(FloatArbitrary::with_val(precision, parsed))
}

/// Square of an `f64` taken in the extended range, finite for any finite input.
#[inline]
pub fn squared(value: f64) -> FloatExtended {
    let value = FloatExtended::from_f64(value);
    value * value
}

/// Binary precision used for a given number of decimal digits, with a guard margin.
pub fn digits_to_bits(digits: usize) -> u32 {
    std::cmp::max(64, (digits as f64 * LOG2_10).ceil() as u32 + 16)
}

/// Decimal digits needed to resolve a pixel spacing at a centre of the given magnitude.
pub fn required_digits(centre_magnitude: FloatExtended, delta_pixel: FloatExtended) -> usize {
    let integer_digits = if centre_magnitude > FloatExtended::from_f64(1.0) {
        centre_magnitude.log10().ceil()
    } else {
        0.0
    };

    let fraction_digits = (-delta_pixel.log10()).ceil().max(0.0);

    std::cmp::max(1, (integer_digits + fraction_digits) as usize + 3)
}

pub fn validate_precision(digits: usize) -> Result<(), ConfigError> {
    if digits == 0 || digits > MAXIMUM_PRECISION_DIGITS {
        return Err(ConfigError::Precision {
            digits,
            maximum: MAXIMUM_PRECISION_DIGITS
        });
    }

    Ok(())
}

/// Why a pixel stopped iterating, stored as a one byte code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StopReason {
    MaxIteration = 0,
    Escaped = 1,
    Interior = 2,
    Glitched = 3,
    Iterating = 255,
}

impl StopReason {
    pub fn from_code(code: u8) -> Option<StopReason> {
        match code {
            0 => Some(StopReason::MaxIteration),
            1 => Some(StopReason::Escaped),
            2 => Some(StopReason::Interior),
            3 => Some(StopReason::Glitched),
            255 => Some(StopReason::Iterating),
            _ => None
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Mutable iteration state of one pixel.
#[derive(Debug, Copy, Clone)]
pub struct PixelData {
    pub image_x: usize,
    pub image_y: usize,
    // offset of the pixel from the reference it is iterated against
    pub delta_reference: ComplexExtended,
    pub delta_current: ComplexExtended,
    // dz/dc
    pub derivative_current: ComplexExtended,
    // dz/dz1
    pub derivative_z: ComplexExtended,
    pub iteration: usize,
    // index into the reference orbit, behind `iteration` after a rebase
    pub reference_iteration: usize,
    pub z_current: ComplexExtended,
    pub stop_reason: StopReason,
    pub reference_id: u32,
}

impl PixelData {
    pub fn new(image_x: usize, image_y: usize, delta_reference: ComplexExtended, reference_id: u32) -> PixelData {
        PixelData {
            image_x,
            image_y,
            delta_reference,
            delta_current: ComplexExtended::zero(),
            derivative_current: ComplexExtended::zero(),
            derivative_z: ComplexExtended::zero(),
            iteration: 0,
            reference_iteration: 0,
            z_current: ComplexExtended::zero(),
            stop_reason: StopReason::Iterating,
            reference_id
        }
    }
}
