use tracing::debug;

use crate::math::Reference;
use crate::util::{ComplexExtended, FloatExtended};

/// Affine step `δz ← A δz + B δc` valid while `|δz| < radius`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BilinearEntry {
    pub a: ComplexExtended,
    pub b: ComplexExtended,
    pub radius: FloatExtended,
    pub radius_squared: FloatExtended,
    pub length: usize,
}

impl BilinearEntry {
    fn new(a: ComplexExtended, b: ComplexExtended, radius: FloatExtended, length: usize) -> Self {
        BilinearEntry {
            a,
            b,
            radius,
            radius_squared: radius * radius,
            length
        }
    }

    /// Entry for `x` followed by `y`.
    fn merge(x: &BilinearEntry, y: &BilinearEntry, delta_maximum: FloatExtended) -> BilinearEntry {
        let a = y.a * x.a;
        let b = y.a * x.b + y.b;

        let a_norm = x.a.norm();
        let remaining = y.radius - x.b.norm() * delta_maximum;

        // a zero A maps every δz to B δc, so only the δc term limits the second step
        let radius_y = if a_norm.is_zero() {
            if remaining > FloatExtended::zero() {
                x.radius
            } else {
                FloatExtended::zero()
            }
        } else {
            remaining.max(FloatExtended::zero()) / a_norm
        };

        BilinearEntry::new(a, b, x.radius.min(radius_y), x.length + y.length)
    }

    #[inline]
    pub fn apply(&self, delta_z: ComplexExtended, delta_c: ComplexExtended) -> ComplexExtended {
        self.a * delta_z + self.b * delta_c
    }
}

/// Table of merged affine steps over a reference. Level `l` holds entries of
/// `2^l` steps starting at orbit indices `1 + k 2^l`.
#[derive(Debug, Clone)]
pub struct BilinearApproximation {
    pub levels: Vec<Vec<BilinearEntry>>,
    pub last_index: usize,
}

impl BilinearApproximation {
    pub fn new(reference: &Reference, epsilon: f64, delta_maximum: FloatExtended) -> Self {
        let last_index = reference.last_index();
        let fractal_type = reference.fractal_type;

        // index 0 has Z = 0 and only matters after a rebase, which steps it exactly
        let base = (1..last_index)
            .map(|m| {
                let z = reference.z(m);
                BilinearEntry::new(fractal_type.derivative(z), ComplexExtended::one(), z.norm() * epsilon, 1)
            })
            .collect::<Vec<_>>();

        let mut levels = vec![base];

        loop {
            let next = {
                let previous = &levels[levels.len() - 1];

                previous.chunks_exact(2)
                    .map(|pair| BilinearEntry::merge(&pair[0], &pair[1], delta_maximum))
                    .collect::<Vec<_>>()
            };

            if next.is_empty() {
                break;
            }

            levels.push(next);
        }

        debug!("bilinear approximation with {} levels over {} iterations", levels.len(), last_index);

        BilinearApproximation {
            levels,
            last_index
        }
    }

    /// Longest entry starting at orbit index `m` that is valid for `δz` and spans at
    /// most `remaining` iterations.
    pub fn lookup(&self, m: usize, delta_z_norm_squared: FloatExtended, remaining: usize) -> Option<&BilinearEntry> {
        if m == 0 || m >= self.last_index {
            return None;
        }

        let offset = m - 1;

        for level in (0..self.levels.len()).rev() {
            let step = 1 << level;

            if offset % step != 0 || step > remaining {
                continue;
            }

            if let Some(entry) = self.levels[level].get(offset >> level) {
                if delta_z_norm_squared < entry.radius_squared {
                    return Some(entry);
                }
            }
        }

        None
    }

    #[inline]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}
