use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use atomic_counter::AtomicCounter;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{RenderError, StoreError};
use crate::math::glitch::{self, GlitchKind};
use crate::math::perturbation::ReferenceContext;
use crate::math::{BilinearApproximation, IterationParameters, Perturbation, Reference, SeriesApproximation};
use crate::settings::{EngineSettings, ValidatedSettings};
use crate::util::{ComplexExtended, FloatExtended, ProgressCounters, ResultStore, StopReason, Subset};

/// Counts gathered from the workers of one pass.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct PassStatistics {
    pub pixels: usize,
    pub iterations: usize,
    pub escaped: usize,
    pub interior: usize,
    pub maximum_iteration: usize,
    pub glitched: usize,
}

impl PassStatistics {
    fn record(&mut self, stop_reason: StopReason, iterations: usize) {
        self.pixels += 1;
        self.iterations += iterations;

        match stop_reason {
            StopReason::Escaped => self.escaped += 1,
            StopReason::Interior => self.interior += 1,
            StopReason::MaxIteration => self.maximum_iteration += 1,
            StopReason::Glitched => self.glitched += 1,
            StopReason::Iterating => {}
        }
    }

    fn merge(&mut self, other: &PassStatistics) {
        self.pixels += other.pixels;
        self.iterations += other.iterations;
        self.escaped += other.escaped;
        self.interior += other.interior;
        self.maximum_iteration += other.maximum_iteration;
        self.glitched += other.glitched;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderSummary {
    pub run_directory: PathBuf,
    pub precision_digits: usize,
    pub stored_pixels: usize,
    pub references: usize,
    pub reference_iterations: usize,
    pub series_skip: usize,
    pub bilinear_levels: usize,
    pub passes: Vec<PassStatistics>,
    // glitched pixels left after the first pass and after each correction round
    pub glitched_per_round: Vec<usize>,
    pub reference_exhausted: usize,
    pub timings: Vec<(String, u128)>,
}

impl RenderSummary {
    #[inline]
    pub fn remaining_glitched(&self) -> usize {
        self.glitched_per_round.last().copied().unwrap_or(0)
    }
}

/// Engine entry point: one validated configuration, one run.
pub struct FractalRenderer {
    settings: EngineSettings,
    validated: ValidatedSettings,
    parameters: IterationParameters,
    subset: Subset,
    progress: ProgressCounters,
}

impl FractalRenderer {
    pub fn new(settings: EngineSettings) -> Result<FractalRenderer, RenderError> {
        let validated = settings.validate()?;
        let parameters = IterationParameters::from_settings(&validated);

        Ok(FractalRenderer {
            settings,
            validated,
            parameters,
            subset: Subset::All,
            progress: ProgressCounters::new()
        })
    }

    /// Restricts the run to part of the image.
    pub fn with_subset(mut self, subset: Subset) -> FractalRenderer {
        self.subset = subset;
        self
    }

    #[inline]
    pub fn settings(&self) -> &ValidatedSettings {
        &self.validated
    }

    pub fn progress(&self) -> ProgressCounters {
        self.progress.clone()
    }

    pub fn render(&self) -> Result<RenderSummary, RenderError> {
        match self.validated.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
                pool.install(|| self.render_passes())
            }
            None => self.render_passes()
        }
    }

    fn render_passes(&self) -> Result<RenderSummary, RenderError> {
        let validated = &self.validated;
        let viewport = &validated.viewport;
        let layout = validated.layout;

        let mut timings = Vec::new();
        let total = Instant::now();

        let snapshot = serde_json::to_value(&self.settings).map_err(StoreError::from)?;

        let mut store = ResultStore::create(
            &validated.output_directory,
            &validated.run_name,
            layout,
            validated.catalogue.clone(),
            &self.subset,
            snapshot)?;

        let time = Instant::now();
        let main = self.build_context(0, ComplexExtended::zero(), viewport.corners().to_vec());
        timings.push(("Reference".to_owned(), time.elapsed().as_millis()));

        info!("{:<14}{:>6} ms (precision {}, iterations {})", "Reference", time.elapsed().as_millis(), validated.precision_digits, main.reference.last_index());
        info!("{:<14}{:>6}", "Skipped", main.series_skip());

        let series_skip = main.series_skip();
        let bilinear_levels = main.bilinear.as_ref().map_or(0, BilinearApproximation::level_count);

        let mut contexts = vec![Arc::new(main)];
        let mut passes = Vec::new();

        let time = Instant::now();
        passes.push(self.run_pass(&mut store, &contexts, |_, _| Some(0)));
        timings.push(("Iteration".to_owned(), time.elapsed().as_millis()));

        info!("{:<14}{:>6} ms", "Iteration", time.elapsed().as_millis());

        let image_width = layout.image_width;
        let image_height = layout.image_height;

        let mut glitched_per_round = Vec::new();
        let mut reference_exhausted = 0;
        let mut round = 0;

        let time = Instant::now();

        loop {
            let last_indices = contexts.iter()
                .map(|context| context.reference.last_index())
                .collect::<Vec<_>>();

            let records = glitch::detect(&mut store, viewport, &last_indices);
            glitched_per_round.push(records.len());

            if round == 0 {
                reference_exhausted = records.iter().filter(|record| record.kind == GlitchKind::ReferenceExhausted).count();
            }

            if records.is_empty() {
                break;
            }

            if round >= validated.glitch.maximum_rounds {
                warn!("{} pixels still glitched after {} rounds", records.len(), round);
                break;
            }

            round += 1;

            let clusters = glitch::find_clusters(&records, image_width, image_height);
            let mut assignment = HashMap::with_capacity(records.len());

            debug!("round {}: {} glitched pixels in {} clusters", round, records.len(), clusters.len());

            for cluster in clusters.iter().take(validated.glitch.maximum_references) {
                let id = contexts.len();
                let centre = cluster.representative.proposed_centre;
                let (x0, y0, x1, y1) = cluster.bounds;

                let probes = viewport.box_corners(x0, y0, x1, y1)
                    .iter()
                    .map(|corner| *corner - centre)
                    .collect::<Vec<_>>();

                contexts.push(Arc::new(self.build_context(id as u32, centre, probes)));

                for &pixel in &cluster.pixels {
                    assignment.insert(pixel, id);
                }
            }

            passes.push(self.run_pass(&mut store, &contexts, |i, j| assignment.get(&(j * image_width + i)).copied()));
        }

        timings.push(("Glitch".to_owned(), time.elapsed().as_millis()));
        info!("{:<14}{:>6} ms ({} references, {} rounds)", "Glitch", time.elapsed().as_millis(), contexts.len(), round);

        let stored_pixels = store.stored_pixels();
        let run_directory = store.finalize(contexts.len())?;

        timings.push(("Total".to_owned(), total.elapsed().as_millis()));
        info!("{:<14}{:>6} ms", "Total", total.elapsed().as_millis());

        Ok(RenderSummary {
            run_directory,
            precision_digits: validated.precision_digits,
            stored_pixels,
            references: contexts.len(),
            reference_iterations: self.progress.reference.get(),
            series_skip,
            bilinear_levels,
            passes,
            glitched_per_round,
            reference_exhausted,
            timings
        })
    }

    /// Builds a reference at an offset from the image centre, with the approximations
    /// covering the region spanned by `probes` (offsets from the new reference).
    fn build_context(&self, id: u32, delta_centre: ComplexExtended, probes: Vec<ComplexExtended>) -> ReferenceContext {
        let validated = &self.validated;
        let viewport = &validated.viewport;

        let mut reference = Reference::new(
            id,
            viewport.coordinate(delta_centre),
            delta_centre,
            validated.fractal_type,
            validated.maximum_iteration);

        let stationary_epsilon = if validated.interior_detection {
            Some(validated.stationary_epsilon)
        } else {
            None
        };

        reference.run(self.parameters.escape_radius_squared, stationary_epsilon, &self.progress);

        let delta_maximum = probes.iter()
            .map(|probe| probe.norm())
            .fold(FloatExtended::zero(), FloatExtended::max);

        let series = if validated.approximation.uses_series() {
            let mut series = SeriesApproximation::new(validated.series.order, validated.series.tolerance, viewport.delta_pixel, probes);
            series.run(&reference,
                       self.parameters.escape_radius_squared,
                       validated.maximum_iteration,
                       self.parameters.stationary_epsilon_squared,
                       &self.progress);
            Some(series)
        } else {
            None
        };

        let bilinear = if validated.approximation.uses_bilinear() {
            Some(BilinearApproximation::new(&reference, validated.bilinear.epsilon, delta_maximum))
        } else {
            None
        };

        debug!("reference {} built: {:?}, skip {}", id, reference.classification(), series.as_ref().map_or(0, |series| series.current_iteration));

        ReferenceContext {
            reference,
            series,
            bilinear
        }
    }

    /// Recomputes every stored pixel the assignment maps to a context.
    fn run_pass<F>(&self, store: &mut ResultStore, contexts: &[Arc<ReferenceContext>], assignment: F) -> PassStatistics
        where F: Fn(usize, usize) -> Option<usize> + Sync {
        let viewport = &self.validated.viewport;
        let parameters = &self.parameters;
        let progress = &self.progress;

        let statistics = Mutex::new(PassStatistics::default());

        progress.reset_pass();

        store.chunk_writers()
            .into_par_iter()
            .for_each(|mut writer| {
                let mut local = PassStatistics::default();

                for (position, i, j) in writer.stored_pixels() {
                    let context = match assignment(i, j) {
                        Some(index) => &contexts[index],
                        None => continue
                    };

                    let delta_reference = viewport.delta_centre(i, j) - context.reference.delta_centre;
                    let (pixel, advanced) = Perturbation::compute(i, j, delta_reference, context, parameters);

                    writer.write_pixel(position, &pixel);
                    local.record(pixel.stop_reason, advanced);
                }

                progress.add_iterations(local.iterations);
                progress.pixels.add(local.pixels);
                progress.glitched.add(local.glitched);

                statistics.lock().merge(&local);
            });

        let statistics = statistics.into_inner();

        debug!("pass: {:?}", statistics);

        statistics
    }
}
