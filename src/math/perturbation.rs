use crate::math::{BilinearApproximation, Reference, SeriesApproximation};
use crate::settings::ValidatedSettings;
use crate::util::{squared, ComplexExtended, FloatExtended, PixelData, StopReason};

/// Per-render constants of the pixel loop.
#[derive(Debug, Copy, Clone)]
pub struct IterationParameters {
    pub maximum_iteration: usize,
    pub escape_radius_squared: FloatExtended,
    pub stationary_epsilon_squared: Option<FloatExtended>,
    pub glitch_tolerance_squared: f64,
    pub rebasing: bool,
}

impl IterationParameters {
    pub fn from_settings(settings: &ValidatedSettings) -> Self {
        IterationParameters {
            maximum_iteration: settings.maximum_iteration,
            escape_radius_squared: squared(settings.escape_radius),
            stationary_epsilon_squared: if settings.interior_detection {
                Some(squared(settings.stationary_epsilon))
            } else {
                None
            },
            glitch_tolerance_squared: settings.glitch.tolerance * settings.glitch.tolerance,
            rebasing: settings.rebasing
        }
    }
}

/// A reference together with the approximations built over it, shared read only by
/// every pixel that uses it.
#[derive(Debug, Clone)]
pub struct ReferenceContext {
    pub reference: Reference,
    pub series: Option<SeriesApproximation>,
    pub bilinear: Option<BilinearApproximation>,
}

impl ReferenceContext {
    #[inline]
    pub fn series_skip(&self) -> usize {
        self.series.as_ref().map_or(0, |series| series.current_iteration)
    }
}

pub struct Perturbation {}

impl Perturbation {
    /// Sets up a pixel at the series skip iteration, or at iteration 0 when there is
    /// no series or the pixel is already outside the escape radius there.
    pub fn initialise(pixel: &mut PixelData, context: &ReferenceContext, parameters: &IterationParameters) {
        pixel.stop_reason = StopReason::Iterating;
        pixel.reference_id = context.reference.id;

        if let Some(series) = context.series.as_ref().filter(|series| series.current_iteration > 0) {
            let iteration = series.current_iteration;
            let delta_current = series.evaluate(pixel.delta_reference);

            if (context.reference.z(iteration) + delta_current).norm_square() <= parameters.escape_radius_squared {
                pixel.delta_current = delta_current;
                pixel.derivative_current = series.evaluate_derivative(pixel.delta_reference);
                pixel.derivative_z = series.evaluate_derivative_z(pixel.delta_reference);
                pixel.iteration = iteration;
                pixel.reference_iteration = iteration;
                return;
            }
        }

        pixel.delta_current = ComplexExtended::zero();
        pixel.derivative_current = ComplexExtended::zero();
        pixel.derivative_z = ComplexExtended::zero();
        pixel.iteration = 0;
        pixel.reference_iteration = 0;
    }

    /// Iterates a pixel until it stops, returning the number of iterations advanced.
    pub fn iterate(pixel: &mut PixelData, context: &ReferenceContext, parameters: &IterationParameters) -> usize {
        let reference = &context.reference;
        let fractal_type = reference.fractal_type;
        let last_index = reference.last_index();
        let delta_reference = pixel.delta_reference;

        let mut delta_current = pixel.delta_current;
        let mut derivative_current = pixel.derivative_current;
        let mut derivative_z = pixel.derivative_z;
        let mut iteration = pixel.iteration;
        let mut reference_iteration = pixel.reference_iteration;

        let mut advanced = 0;

        let (stop_reason, z) = loop {
            let z_reference = reference.z(reference_iteration);
            let z = z_reference + delta_current;
            let z_norm_squared = z.norm_square();

            if z_norm_squared > parameters.escape_radius_squared {
                break (StopReason::Escaped, z);
            }

            if let Some(epsilon_squared) = parameters.stationary_epsilon_squared {
                if iteration >= 1 && derivative_z.norm_square() < epsilon_squared {
                    break (StopReason::Interior, z);
                }
            }

            if iteration >= parameters.maximum_iteration {
                break (StopReason::MaxIteration, z);
            }

            if reference_iteration >= last_index {
                if !parameters.rebasing {
                    break (StopReason::Glitched, z);
                }

                delta_current = z;
                reference_iteration = 0;
                continue;
            }

            if parameters.rebasing {
                if z_norm_squared < delta_current.norm_square() {
                    delta_current = z;
                    reference_iteration = 0;
                    continue;
                }
            } else if z_norm_squared < z_reference.norm_square() * parameters.glitch_tolerance_squared {
                break (StopReason::Glitched, z);
            }

            if let Some(bilinear) = &context.bilinear {
                let remaining = parameters.maximum_iteration - iteration;

                if let Some(entry) = bilinear.lookup(reference_iteration, delta_current.norm_square(), remaining) {
                    let next = entry.apply(delta_current, delta_reference);
                    let next_iteration = reference_iteration + entry.length;

                    let next_derivative_z = entry.a * derivative_z;

                    // a jump landing outside the escape radius or past the interior
                    // threshold is dropped for exact steps
                    let escapes = (reference.z(next_iteration) + next).norm_square() > parameters.escape_radius_squared;
                    let stationary = parameters.stationary_epsilon_squared
                        .map_or(false, |epsilon_squared| next_derivative_z.norm_square() < epsilon_squared);

                    if !escapes && !stationary {
                        derivative_current = entry.a * derivative_current + entry.b;
                        derivative_z = next_derivative_z;
                        delta_current = next;
                        reference_iteration = next_iteration;
                        iteration += entry.length;
                        advanced += entry.length;
                        continue;
                    }
                }
            }

            let derivative = fractal_type.derivative(z);

            derivative_z = if iteration == 0 {
                ComplexExtended::one()
            } else {
                derivative * derivative_z
            };

            derivative_current = derivative * derivative_current + ComplexExtended::one();
            delta_current = fractal_type.perturb(z_reference, delta_current, delta_reference);

            iteration += 1;
            reference_iteration += 1;
            advanced += 1;
        };

        pixel.delta_current = delta_current;
        pixel.derivative_current = derivative_current;
        pixel.derivative_z = derivative_z;
        pixel.iteration = iteration;
        pixel.reference_iteration = reference_iteration;
        pixel.z_current = z;
        pixel.stop_reason = stop_reason;

        advanced
    }

    /// Computes one pixel from scratch against a reference.
    pub fn compute(image_x: usize, image_y: usize, delta_reference: ComplexExtended, context: &ReferenceContext, parameters: &IterationParameters) -> (PixelData, usize) {
        let mut pixel = PixelData::new(image_x, image_y, delta_reference, context.reference.id);

        Perturbation::initialise(&mut pixel, context, parameters);
        let advanced = Perturbation::iterate(&mut pixel, context, parameters);

        (pixel, advanced)
    }
}
