pub mod bilinear_approximation;
pub mod glitch;
pub mod perturbation;
pub mod reference;
pub mod series_approximation;

pub use bilinear_approximation::BilinearApproximation;
pub use glitch::{GlitchCluster, GlitchKind, GlitchRecord};
pub use perturbation::{IterationParameters, Perturbation};
pub use reference::Reference;
pub use series_approximation::SeriesApproximation;

use rug::ops::PowAssign;

use crate::util::{ComplexArbitrary, ComplexExtended, FloatExtended};

/// Iterated map, chosen once per render.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FractalType {
    Mandelbrot2,
    Mandelbrot3,
    // z^p + c for any p >= 2
    Multibrot(u32),
    // (|Re z| + i|Im z|)^2 + c
    BurningShip,
}

impl FractalType {
    /// Map for a family and power, using the dedicated steps for power 2 and 3.
    pub fn with_power(burning_ship: bool, power: u32) -> FractalType {
        match (burning_ship, power) {
            (true, _) => FractalType::BurningShip,
            (false, 2) => FractalType::Mandelbrot2,
            (false, 3) => FractalType::Mandelbrot3,
            (false, power) => FractalType::Multibrot(power),
        }
    }

    #[inline]
    pub fn power(self) -> usize {
        match self {
            FractalType::Mandelbrot2 | FractalType::BurningShip => 2,
            FractalType::Mandelbrot3 => 3,
            FractalType::Multibrot(power) => power as usize,
        }
    }

    /// Whether the map is complex analytic, which the series and bilinear
    /// approximations and the `dz/dc` chain rule rely on.
    #[inline]
    pub fn is_analytic(self) -> bool {
        self != FractalType::BurningShip
    }

    /// Smallest escape radius past which every orbit keeps growing.
    pub fn minimum_escape_radius(self) -> f64 {
        2.0f64.powf(1.0 / (self.power() as f64 - 1.0))
    }

    /// One full precision step `z = z^p + c`.
    pub fn iterate_arbitrary(self, z: &mut ComplexArbitrary, c: &ComplexArbitrary) {
        match self {
            FractalType::Mandelbrot2 => {
                z.square_mut();
            }
            FractalType::Mandelbrot3 => {
                let square = z.clone().square();
                *z *= square;
            }
            FractalType::Multibrot(power) => {
                z.pow_assign(power as i64);
            }
            FractalType::BurningShip => {
                z.mut_real().abs_mut();
                z.mut_imag().abs_mut();
                z.square_mut();
            }
        }

        *z += c;
    }

    /// One perturbation step of `δz` against the reference value `Z`.
    #[inline]
    pub fn perturb(self, z: ComplexExtended, delta_z: ComplexExtended, delta_c: ComplexExtended) -> ComplexExtended {
        match self {
            // (2Z + δz) δz + δc
            FractalType::Mandelbrot2 => (z * 2.0 + delta_z) * delta_z + delta_c,
            // (3Z² + 3Zδz + δz²) δz + δc
            FractalType::Mandelbrot3 => (z * z * 3.0 + z * delta_z * 3.0 + delta_z * delta_z) * delta_z + delta_c,
            FractalType::Multibrot(power) => {
                // (Z + δz)^p - Z^p as Horner in δz over the binomial terms
                let mut sum = ComplexExtended::one();
                let mut z_power = ComplexExtended::one();
                let mut binomial = 1.0;

                for k in 1..power {
                    binomial = binomial * (power - k + 1) as f64 / k as f64;
                    z_power = z_power * z;
                    sum = sum * delta_z + z_power * binomial;
                }

                sum * delta_z + delta_c
            }
            FractalType::BurningShip => {
                let (x, y) = (z.real(), z.imag());
                let (dx, dy) = (delta_z.real(), delta_z.imag());

                let real = (x * 2.0 + dx) * dx - (y * 2.0 + dy) * dy;
                let imag = difference_of_abs(x * y, x * dy + dx * y + dx * dy) * 2.0;

                ComplexExtended::from_extended(real, imag) + delta_c
            }
        }
    }

    /// Derivative of the map with respect to `z`, which is `p z^(p - 1)`. For the
    /// burning ship this is `2(|Re z| + i|Im z|)`, which has the norm of the real
    /// Jacobian but not its direction.
    #[inline]
    pub fn derivative(self, z: ComplexExtended) -> ComplexExtended {
        match self {
            FractalType::Mandelbrot2 => z * 2.0,
            FractalType::Mandelbrot3 => z * z * 3.0,
            FractalType::Multibrot(power) => {
                let mut output = ComplexExtended::one();

                for _ in 1..power {
                    output = output * z;
                }

                output * power as f64
            }
            FractalType::BurningShip => ComplexExtended::from_extended(z.real().abs(), z.imag().abs()) * 2.0,
        }
    }
}

// |c + d| - |c| without cancellation
fn difference_of_abs(c: FloatExtended, d: FloatExtended) -> FloatExtended {
    let zero = FloatExtended::zero();
    let sum = c + d;

    if c >= zero {
        if sum >= zero {
            d
        } else {
            -(c * 2.0 + d)
        }
    } else if sum > zero {
        c * 2.0 + d
    } else {
        -d
    }
}
