use atomic_counter::AtomicCounter;
use tracing::debug;

use crate::math::FractalType;
use crate::util::{squared, ComplexArbitrary, ComplexExtended, FloatExtended, ProgressCounters, StopReason, to_extended};

/// Full precision orbit of one point, stored range extended for the pixels.
#[derive(Debug, Clone)]
pub struct Reference {
    pub id: u32,
    pub c: ComplexArbitrary,
    // offset of c from the image centre
    pub delta_centre: ComplexExtended,
    pub fractal_type: FractalType,
    pub maximum_iteration: usize,
    pub reference_data_extended: Vec<ComplexExtended>,
    pub escaped_iteration: Option<usize>,
    pub interior_iteration: Option<usize>,
}

impl Reference {
    pub fn new(id: u32, c: ComplexArbitrary, delta_centre: ComplexExtended, fractal_type: FractalType, maximum_iteration: usize) -> Reference {
        Reference {
            id,
            c,
            delta_centre,
            fractal_type,
            maximum_iteration,
            reference_data_extended: Vec::new(),
            escaped_iteration: None,
            interior_iteration: None
        }
    }

    /// Iterates from `z = 0` until the stored value leaves the escape radius or the
    /// cap is reached. Interior references keep iterating so pixels near them still
    /// have an orbit to follow.
    pub fn run(&mut self, escape_radius_squared: FloatExtended, stationary_epsilon: Option<f64>, progress: &ProgressCounters) {
        let precision = self.c.prec().0;
        let mut z = ComplexArbitrary::with_val(precision, (0, 0));

        let mut derivative = ComplexExtended::zero();
        let epsilon_squared = stationary_epsilon.map(squared);

        self.reference_data_extended.clear();
        self.reference_data_extended.reserve(self.maximum_iteration + 1);
        self.reference_data_extended.push(ComplexExtended::zero());

        self.escaped_iteration = None;
        self.interior_iteration = None;

        let mut iteration = 0;

        while iteration < self.maximum_iteration {
            let previous = self.reference_data_extended[iteration];

            self.fractal_type.iterate_arbitrary(&mut z, &self.c);
            iteration += 1;

            let z_extended = to_extended(&z);
            self.reference_data_extended.push(z_extended);
            progress.reference.inc();

            // same decision as a pixel sitting exactly on the reference
            if z_extended.norm_square() > escape_radius_squared {
                self.escaped_iteration = Some(iteration);
                break;
            }

            derivative = if iteration == 1 {
                ComplexExtended::one()
            } else {
                self.fractal_type.derivative(previous) * derivative
            };

            if let Some(epsilon_squared) = epsilon_squared {
                if self.interior_iteration.is_none() && derivative.norm_square() < epsilon_squared {
                    self.interior_iteration = Some(iteration);
                }
            }
        }

        progress.references.inc();

        debug!("reference {} ran {} iterations ({:?})", self.id, iteration, self.classification());
    }

    #[inline]
    pub fn z(&self, iteration: usize) -> ComplexExtended {
        self.reference_data_extended[iteration]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.reference_data_extended.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.reference_data_extended.is_empty()
    }

    /// Largest orbit index a pixel can look up.
    #[inline]
    pub fn last_index(&self) -> usize {
        self.len().saturating_sub(1)
    }

    pub fn classification(&self) -> StopReason {
        if self.escaped_iteration.is_some() {
            StopReason::Escaped
        } else if self.interior_iteration.is_some() {
            StopReason::Interior
        } else if self.reference_data_extended.is_empty() {
            StopReason::Iterating
        } else {
            StopReason::MaxIteration
        }
    }

    /// Iteration at which the reference itself stopped, for its classification.
    pub fn stop_iteration(&self) -> usize {
        self.escaped_iteration
            .or(self.interior_iteration)
            .unwrap_or_else(|| self.last_index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(re: f64, im: f64, fractal_type: FractalType, maximum_iteration: usize) -> Reference {
        let c = ComplexArbitrary::with_val(128, (re, im));
        let mut reference = Reference::new(0, c, ComplexExtended::zero(), fractal_type, maximum_iteration);
        reference.run(FloatExtended::from_f64(4.0), Some(1e-3), &ProgressCounters::new());
        reference
    }

    #[test]
    fn minus_one_is_a_superattracting_cycle() {
        let reference = reference(-1.0, 0.0, FractalType::Mandelbrot2, 100);

        assert_eq!(reference.classification(), StopReason::Interior);
        assert_eq!(reference.interior_iteration, Some(3));
        assert_eq!(reference.len(), 101);
        assert_eq!(reference.z(2), ComplexExtended::zero());
        assert_eq!(reference.z(3), ComplexExtended::new2(-1.0, 0.0, 0));
    }

    #[test]
    fn escape_is_decided_on_stored_values() {
        let reference = reference(1.0, 0.0, FractalType::Mandelbrot2, 100);

        // 0, 1, 2, 5
        assert_eq!(reference.escaped_iteration, Some(3));
        assert_eq!(reference.last_index(), 3);
        assert_eq!(reference.stop_iteration(), 3);
        assert!(reference.z(3).norm_square() > FloatExtended::from_f64(4.0));
    }

    #[test]
    fn power_three_orbit() {
        let reference = reference(0.5, 0.0, FractalType::Mandelbrot3, 100);

        assert!((reference.z(2).to_float().re - 0.625).abs() < 1e-15);
        assert_eq!(reference.classification(), StopReason::Escaped);
    }

    #[test]
    fn origin_never_escapes() {
        let reference = reference(0.0, 0.0, FractalType::Mandelbrot2, 50);

        assert_eq!(reference.escaped_iteration, None);
        assert_eq!(reference.last_index(), 50);
    }

    #[test]
    fn progress_counts_orbits_and_iterations() {
        let progress = ProgressCounters::new();

        for (re, maximum_iteration) in [(0.0, 50), (1.0, 100)].iter() {
            let c = ComplexArbitrary::with_val(128, (*re, 0.0));
            let mut reference = Reference::new(0, c, ComplexExtended::zero(), FractalType::Mandelbrot2, *maximum_iteration);
            reference.run(FloatExtended::from_f64(4.0), None, &progress);
        }

        assert_eq!(progress.references.get(), 2);
        assert_eq!(progress.reference.get(), 50 + 3);
    }
}
