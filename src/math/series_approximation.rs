use atomic_counter::AtomicCounter;
use smallvec::{SmallVec, smallvec};
use tracing::debug;

use crate::math::Reference;
use crate::util::{ComplexExtended, FloatExtended, ProgressCounters};

pub type Coefficients = SmallVec<[ComplexExtended; 16]>;

/// Truncated power series of the pixel orbit in `δc`, advanced alongside a reference.
/// Index 0 of the coefficients holds the reference value itself.
#[derive(Debug, Clone)]
pub struct SeriesApproximation {
    pub order: usize,
    pub current_iteration: usize,
    pub coefficients: Coefficients,
    // series of dz/dz1, valid from iteration 1
    pub derivative_coefficients: Coefficients,
    pub delta_pixel: FloatExtended,
    pub tolerance: f64,
    pub probes: Vec<ComplexExtended>,
}

fn multiply_truncated(a: &Coefficients, b: &Coefficients, order: usize) -> Coefficients {
    let mut output: Coefficients = smallvec![ComplexExtended::zero(); order + 1];

    for i in 0..=order {
        if a[i].is_zero() {
            continue;
        }

        for j in 0..=(order - i) {
            output[i + j] += a[i] * b[j];
        }
    }

    output
}

fn power_truncated(series: &Coefficients, power: usize, order: usize) -> Coefficients {
    let mut output = series.clone();

    for _ in 1..power {
        output = multiply_truncated(&output, series, order);
    }

    output
}

impl SeriesApproximation {
    pub fn new(order: usize, tolerance: f64, delta_pixel: FloatExtended, probes: Vec<ComplexExtended>) -> Self {
        let order = order.max(1);

        SeriesApproximation {
            order,
            current_iteration: 0,
            coefficients: smallvec![ComplexExtended::zero(); order + 1],
            derivative_coefficients: smallvec![ComplexExtended::zero(); order + 1],
            delta_pixel,
            tolerance,
            probes
        }
    }

    /// Advances the series while every probe agrees with its exact perturbation.
    /// Stops at the first failing step, when a probe delta grows past the reference
    /// value, when a probe escapes, or one step before the orbit or the cap ends.
    /// With interior detection the series also stops before `dz/dz1` of the reference
    /// or any probe falls below the stationary epsilon, so no pixel skips its interior
    /// check.
    pub fn run(&mut self,
               reference: &Reference,
               escape_radius_squared: FloatExtended,
               maximum_iteration: usize,
               stationary_epsilon_squared: Option<FloatExtended>,
               progress: &ProgressCounters) {
        let fractal_type = reference.fractal_type;
        let power = fractal_type.power();
        let order = self.order;
        let limit = maximum_iteration.min(reference.last_index());
        let tolerance = self.delta_pixel * self.tolerance;

        let mut series: Coefficients = smallvec![ComplexExtended::zero(); order + 1];
        let mut derivative_series: Coefficients = smallvec![ComplexExtended::zero(); order + 1];
        let mut probe_deltas = vec![ComplexExtended::zero(); self.probes.len()];

        // exact dz/dz1 of every probe and of the reference itself
        let mut probe_derivatives = vec![ComplexExtended::zero(); self.probes.len()];
        let mut reference_derivative = ComplexExtended::zero();

        let mut iteration = 0;

        while iteration + 1 < limit {
            let z = reference.z(iteration);
            let z_next = reference.z(iteration + 1);

            let mut next = power_truncated(&series, power, order);
            next[0] = z_next;
            next[1] += ComplexExtended::one();

            let next_derivative = if iteration == 0 {
                let mut first: Coefficients = smallvec![ComplexExtended::zero(); order + 1];
                first[0] = ComplexExtended::one();
                first
            } else {
                let mut factor = power_truncated(&series, power - 1, order);

                for coefficient in factor.iter_mut() {
                    *coefficient *= power as f64;
                }

                multiply_truncated(&factor, &derivative_series, order)
            };

            let (next_derivatives, next_reference_derivative) = if iteration == 0 {
                (vec![ComplexExtended::one(); self.probes.len()], ComplexExtended::one())
            } else {
                let derivatives = probe_deltas.iter()
                    .zip(probe_derivatives.iter())
                    .map(|(delta_z, derivative)| fractal_type.derivative(z + *delta_z) * *derivative)
                    .collect::<Vec<_>>();

                (derivatives, fractal_type.derivative(z) * reference_derivative)
            };

            if let Some(epsilon_squared) = stationary_epsilon_squared {
                if next_reference_derivative.norm_square() < epsilon_squared
                    || next_derivatives.iter().any(|derivative| derivative.norm_square() < epsilon_squared) {
                    break;
                }
            }

            let next_deltas = self.probes.iter()
                .zip(probe_deltas.iter())
                .map(|(delta_c, delta_z)| fractal_type.perturb(z, *delta_z, *delta_c))
                .collect::<Vec<_>>();

            let z_norm_squared = z_next.norm_square();

            let valid = self.probes.iter().zip(next_deltas.iter()).all(|(delta_c, delta_z)| {
                if (z_next + *delta_z).norm_square() > escape_radius_squared {
                    return false;
                }

                if delta_z.norm_square() > z_norm_squared {
                    return false;
                }

                let error = (evaluate_delta(&next, *delta_c) - *delta_z).norm();
                let scale = evaluate_derivative(&next, *delta_c).norm().max(FloatExtended::from_f64(1.0));

                error / scale <= tolerance
            });

            if !valid {
                break;
            }

            series = next;
            derivative_series = next_derivative;
            probe_deltas = next_deltas;
            probe_derivatives = next_derivatives;
            reference_derivative = next_reference_derivative;
            iteration += 1;

            progress.series_approximation.inc();
        }

        self.current_iteration = iteration;
        self.coefficients = series;
        self.derivative_coefficients = derivative_series;

        debug!("series approximation skips {} iterations (order {})", iteration, order);
    }

    /// `δz` at the skip iteration.
    #[inline]
    pub fn evaluate(&self, delta_c: ComplexExtended) -> ComplexExtended {
        evaluate_delta(&self.coefficients, delta_c)
    }

    /// `dz/dc` at the skip iteration.
    #[inline]
    pub fn evaluate_derivative(&self, delta_c: ComplexExtended) -> ComplexExtended {
        evaluate_derivative(&self.coefficients, delta_c)
    }

    /// `dz/dz1` at the skip iteration, zero before iteration 1.
    pub fn evaluate_derivative_z(&self, delta_c: ComplexExtended) -> ComplexExtended {
        let mut output = self.derivative_coefficients[self.order];

        for k in (0..self.order).rev() {
            output = output * delta_c + self.derivative_coefficients[k];
        }

        output
    }
}

fn evaluate_delta(coefficients: &Coefficients, delta_c: ComplexExtended) -> ComplexExtended {
    let order = coefficients.len() - 1;
    let mut output = coefficients[order];

    for k in (1..order).rev() {
        output = output * delta_c + coefficients[k];
    }

    output * delta_c
}

fn evaluate_derivative(coefficients: &Coefficients, delta_c: ComplexExtended) -> ComplexExtended {
    let order = coefficients.len() - 1;
    let mut output = coefficients[order] * order as f64;

    for k in (1..order).rev() {
        output = output * delta_c + coefficients[k] * k as f64;
    }

    output
}
