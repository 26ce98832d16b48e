use serde::{Deserialize, Serialize};

/// Rectangular tile of the image, processed and stored as a unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub rank: usize,
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Chunk {
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn contains(&self, image_x: usize, image_y: usize) -> bool {
        image_x >= self.x && image_x < self.x + self.width && image_y >= self.y && image_y < self.y + self.height
    }

    /// Row-major position of an image pixel inside the tile.
    #[inline]
    pub fn local_index(&self, image_x: usize, image_y: usize) -> usize {
        (image_y - self.y) * self.width + (image_x - self.x)
    }

    /// Image coordinates of the tile's pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> {
        let (x, y, width, height) = (self.x, self.y, self.width, self.height);

        (0..height).flat_map(move |j| (0..width).map(move |i| (x + i, y + j)))
    }
}

/// Regular tiling of an image, with narrower tiles along the right and bottom edges.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkLayout {
    pub image_width: usize,
    pub image_height: usize,
    pub chunk_size: usize,
    pub columns: usize,
    pub rows: usize,
}

impl ChunkLayout {
    pub fn new(image_width: usize, image_height: usize, chunk_size: usize) -> ChunkLayout {
        let chunk_size = chunk_size.max(1);

        ChunkLayout {
            image_width,
            image_height,
            chunk_size,
            columns: (image_width + chunk_size - 1) / chunk_size,
            rows: (image_height + chunk_size - 1) / chunk_size
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.columns * self.rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.image_width * self.image_height
    }

    pub fn chunk(&self, rank: usize) -> Chunk {
        let column = rank % self.columns;
        let row = rank / self.columns;

        let x = column * self.chunk_size;
        let y = row * self.chunk_size;

        Chunk {
            rank,
            x,
            y,
            width: self.chunk_size.min(self.image_width - x),
            height: self.chunk_size.min(self.image_height - y)
        }
    }

    pub fn chunks(&self) -> Vec<Chunk> {
        (0..self.len()).map(|rank| self.chunk(rank)).collect()
    }

    #[inline]
    pub fn chunk_of(&self, image_x: usize, image_y: usize) -> usize {
        (image_y / self.chunk_size) * self.columns + image_x / self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn chunks_tile_the_image_exactly() {
        let layout = ChunkLayout::new(37, 21, 8);
        let mut covered = vec![0usize; 37 * 21];

        for chunk in layout.chunks() {
            for (i, j) in chunk.pixels() {
                covered[j * 37 + i] += 1;
                assert_eq!(layout.chunk_of(i, j), chunk.rank);
            }
        }

        assert!(covered.iter().all(|&count| count == 1));
        assert_eq!(layout.len(), 5 * 3);
    }

    #[test]
    fn edge_chunk_is_narrower() {
        let layout = ChunkLayout::new(10, 10, 4);
        let last = layout.chunk(layout.len() - 1);

        assert_eq!((last.x, last.y, last.width, last.height), (8, 8, 2, 2));
        assert_eq!(last.local_index(9, 9), 3);
        assert!(last.contains(8, 9));
        assert!(!last.contains(7, 9));
    }

    #[test]
    fn random_layouts_locate_every_pixel() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let layout = ChunkLayout::new(rng.gen_range(1..90), rng.gen_range(1..90), rng.gen_range(1..20));
            let total = layout.chunks().iter().map(Chunk::pixel_count).sum::<usize>();

            assert_eq!(total, layout.pixel_count());

            for _ in 0..20 {
                let i = rng.gen_range(0..layout.image_width);
                let j = rng.gen_range(0..layout.image_height);
                let chunk = layout.chunk(layout.chunk_of(i, j));

                assert!(chunk.contains(i, j));
                assert_eq!(chunk.pixels().nth(chunk.local_index(i, j)), Some((i, j)));
            }
        }
    }
}
