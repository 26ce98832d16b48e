use crate::util::{ComplexArbitrary, ComplexExtended, FloatExtended, extended_to_arbitrary, to_extended};

/// Geometry of the image in the complex plane. Pixel offsets are measured from the
/// centre of the image so they stay small at any zoom.
#[derive(Debug, Clone)]
pub struct Viewport {
    pub image_width: usize,
    pub image_height: usize,
    pub centre: ComplexArbitrary,
    pub width: FloatExtended,
    pub delta_pixel: FloatExtended,
    pub precision: u32,
}

impl Viewport {
    pub fn new(centre: ComplexArbitrary, width: FloatExtended, image_width: usize, image_height: usize) -> Viewport {
        let precision = centre.prec().0;
        let delta_pixel = width / image_width as f64;

        Viewport {
            image_width,
            image_height,
            centre,
            width,
            delta_pixel,
            precision
        }
    }

    #[inline]
    pub fn height(&self) -> FloatExtended {
        self.delta_pixel * self.image_height as f64
    }

    /// Offset from the image centre to the centre of pixel `(image_x, image_y)`,
    /// with `y` growing downwards in the image and upwards in the plane.
    #[inline]
    pub fn delta_centre(&self, image_x: usize, image_y: usize) -> ComplexExtended {
        let re = image_x as f64 + 0.5 - 0.5 * self.image_width as f64;
        let im = 0.5 * self.image_height as f64 - (image_y as f64 + 0.5);

        ComplexExtended::from_extended(self.delta_pixel * re, self.delta_pixel * im)
    }

    /// Centres of the four corner pixels of a pixel rectangle (inclusive bounds).
    pub fn box_corners(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> [ComplexExtended; 4] {
        [
            self.delta_centre(x0, y0),
            self.delta_centre(x1, y0),
            self.delta_centre(x0, y1),
            self.delta_centre(x1, y1)
        ]
    }

    pub fn corners(&self) -> [ComplexExtended; 4] {
        self.box_corners(0, 0, self.image_width.max(1) - 1, self.image_height.max(1) - 1)
    }

    /// Largest offset of any pixel centre from the image centre.
    pub fn delta_maximum(&self) -> FloatExtended {
        self.corners().iter()
            .map(|corner| corner.norm())
            .fold(FloatExtended::zero(), FloatExtended::max)
    }

    /// Point in the plane at an offset from the image centre, at the viewport precision.
    pub fn coordinate(&self, delta: ComplexExtended) -> ComplexArbitrary {
        let mut output = self.centre.clone();

        *output.mut_real() += extended_to_arbitrary(delta.real(), self.precision);
        *output.mut_imag() += extended_to_arbitrary(delta.imag(), self.precision);

        output
    }

    pub fn centre_extended(&self) -> ComplexExtended {
        to_extended(&self.centre)
    }
}
