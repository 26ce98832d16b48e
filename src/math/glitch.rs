use std::collections::HashMap;

use rayon::prelude::*;

use crate::util::{ComplexExtended, Field, FloatExtended, ResultStore, StopReason, Viewport};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GlitchKind {
    // Pauldelbrot criterion, |z| collapsed relative to |Z|
    Dynamic,
    // the pixel outlived its reference orbit
    ReferenceExhausted,
}

/// A glitched pixel found in the store after a pass.
#[derive(Debug, Copy, Clone)]
pub struct GlitchRecord {
    pub pixel_id: usize,
    pub image_x: usize,
    pub image_y: usize,
    pub iteration: usize,
    pub kind: GlitchKind,
    pub z_norm: FloatExtended,
    // offset of the pixel from the image centre, where a new reference would go
    pub proposed_centre: ComplexExtended,
}

impl GlitchRecord {
    /// Orders candidate references: smallest |z| at the glitch, then lowest pixel.
    fn better_than(&self, other: &GlitchRecord) -> bool {
        if self.z_norm < other.z_norm {
            true
        } else if other.z_norm < self.z_norm {
            false
        } else {
            self.pixel_id < other.pixel_id
        }
    }
}

/// Reads every stored pixel and returns the glitched ones in image order.
/// `last_indices` gives the last orbit index of each reference id.
pub fn detect(store: &mut ResultStore, viewport: &Viewport, last_indices: &[usize]) -> Vec<GlitchRecord> {
    let image_width = store.layout().image_width;

    let mut records = store.chunk_writers()
        .into_par_iter()
        .flat_map_iter(|writer| {
            writer.stored_pixels()
                .into_iter()
                .filter_map(|(position, i, j)| {
                    let code = writer.read_code(Field::StopReason, position)?;

                    if StopReason::from_code(code) != Some(StopReason::Glitched) {
                        return None;
                    }

                    let iteration = writer.read_integer(Field::StopIter, position)? as usize;
                    let reference = writer.read_integer(Field::Reference, position)? as usize;
                    let z = writer.read_complex(Field::Zn, position)?;

                    let kind = match last_indices.get(reference) {
                        Some(&last_index) if iteration >= last_index => GlitchKind::ReferenceExhausted,
                        _ => GlitchKind::Dynamic
                    };

                    Some(GlitchRecord {
                        pixel_id: j * image_width + i,
                        image_x: i,
                        image_y: j,
                        iteration,
                        kind,
                        z_norm: z.norm(),
                        proposed_centre: viewport.delta_centre(i, j)
                    })
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    records.sort_by_key(|record| record.pixel_id);
    records
}

/// 4-connected group of glitched pixels.
#[derive(Debug, Clone)]
pub struct GlitchCluster {
    pub pixels: Vec<usize>,
    pub lowest_pixel: usize,
    // inclusive pixel bounds x0, y0, x1, y1
    pub bounds: (usize, usize, usize, usize),
    pub representative: GlitchRecord,
}

impl GlitchCluster {
    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

/// Groups glitched pixels by flood fill, largest cluster first and then by lowest
/// pixel index.
pub fn find_clusters(records: &[GlitchRecord], image_width: usize, image_height: usize) -> Vec<GlitchCluster> {
    // sized by the glitched pixels, not the image
    let lookup = records.iter()
        .enumerate()
        .map(|(index, record)| (record.pixel_id, index))
        .collect::<HashMap<_, _>>();

    let mut visited = vec![false; records.len()];
    let mut clusters = Vec::new();

    for start in 0..records.len() {
        if visited[start] {
            continue;
        }

        let mut stack = vec![start];
        visited[start] = true;

        let mut pixels = Vec::new();
        let mut representative = records[start];
        let mut bounds = (records[start].image_x, records[start].image_y, records[start].image_x, records[start].image_y);

        while let Some(index) = stack.pop() {
            let record = &records[index];
            let (x, y) = (record.image_x, record.image_y);

            pixels.push(record.pixel_id);

            if record.better_than(&representative) {
                representative = *record;
            }

            bounds = (bounds.0.min(x), bounds.1.min(y), bounds.2.max(x), bounds.3.max(y));

            let mut neighbours = Vec::with_capacity(4);

            if x > 0 {
                neighbours.push(record.pixel_id - 1);
            }
            if x + 1 < image_width {
                neighbours.push(record.pixel_id + 1);
            }
            if y > 0 {
                neighbours.push(record.pixel_id - image_width);
            }
            if y + 1 < image_height {
                neighbours.push(record.pixel_id + image_width);
            }

            for neighbour in neighbours {
                if let Some(&next) = lookup.get(&neighbour) {
                    if !visited[next] {
                        visited[next] = true;
                        stack.push(next);
                    }
                }
            }
        }

        pixels.sort_unstable();

        clusters.push(GlitchCluster {
            lowest_pixel: pixels[0],
            pixels,
            bounds,
            representative
        });
    }

    clusters.sort_by(|a, b| b.len().cmp(&a.len()).then(a.lowest_pixel.cmp(&b.lowest_pixel)));
    clusters
}
