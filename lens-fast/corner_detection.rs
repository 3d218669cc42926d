use lens_core::Image;
use crate::types::{Corner, CornerType, ScaleLevel};
use crate::utils::{compass_count, has_contiguous_arc};
use rayon::prelude::*;

/// Minimum contiguous arc for FAST-9
const ARC_LENGTH: usize = 9;

/// Corner detection algorithms (FAST and Harris)
pub struct CornerDetector;

impl CornerDetector {
    /// FAST circle offsets for corner detection, clockwise from 12 o'clock
    pub const FAST_OFFSETS: [(i32, i32); 16] = [
        (0, -3), (1, -3), (2, -2), (3, -1),
        (3, 0), (3, 1), (2, 2), (1, 3),
        (0, 3), (-1, 3), (-2, 2), (-3, 1),
        (-3, 0), (-3, -1), (-2, -2), (-1, -3),
    ];

    /// Detect FAST-9 corners on one pyramid level.
    ///
    /// Candidates within `border` pixels of the level edge are never scored.
    /// Returns corners after 3x3 non-maximum suppression, in row-major order.
    pub fn detect_corners(img: &Image, scale_level: &ScaleLevel, threshold: u8, border: usize) -> Vec<Corner> {
        let width = scale_level.width;
        let height = scale_level.height;
        let border = border.max(3);
        if width <= 2 * border || height <= 2 * border {
            return Vec::new();
        }

        let mut scores = vec![0u32; width * height];
        scores
            .par_chunks_mut(width)
            .enumerate()
            .filter(|(y, _)| *y >= border && *y < height - border)
            .for_each(|(y, row)| {
                for x in border..width - border {
                    let (corner_type, score) = Self::segment_test(img, width, x, y, threshold);
                    if corner_type != CornerType::None {
                        row[x] = score;
                    }
                }
            });

        crate::refinement::KeypointRefinement::non_maximum_suppression(&scores, width, height, border)
    }

    /// FAST segment test for a single pixel.
    ///
    /// The score is the summed excess over the threshold of the pixels on
    /// the qualifying side, so stronger contrast ranks higher in NMS.
    fn segment_test(img: &Image, width: usize, x: usize, y: usize, threshold: u8) -> (CornerType, u32) {
        let center = img[y * width + x] as i32;
        let t = threshold as i32;

        let mut bright_mask = 0u16;
        let mut dark_mask = 0u16;
        let mut bright_sum = 0u32;
        let mut dark_sum = 0u32;

        for (i, &(dx, dy)) in Self::FAST_OFFSETS.iter().enumerate() {
            let px = (x as i32 + dx) as usize;
            let py = (y as i32 + dy) as usize;
            let pixel = img[py * width + px] as i32;

            if pixel > center + t {
                bright_mask |= 1 << i;
                bright_sum += (pixel - center - t) as u32;
            } else if pixel < center - t {
                dark_mask |= 1 << i;
                dark_sum += (center - t - pixel) as u32;
            }
        }

        if compass_count(bright_mask) < 2 && compass_count(dark_mask) < 2 {
            return (CornerType::None, 0);
        }

        let bright = has_contiguous_arc(bright_mask, ARC_LENGTH);
        let dark = has_contiguous_arc(dark_mask, ARC_LENGTH);
        match (bright, dark) {
            (true, true) => {
                if bright_sum >= dark_sum {
                    (CornerType::Bright, bright_sum.max(1))
                } else {
                    (CornerType::Dark, dark_sum.max(1))
                }
            }
            (true, false) => (CornerType::Bright, bright_sum.max(1)),
            (false, true) => (CornerType::Dark, dark_sum.max(1)),
            (false, false) => (CornerType::None, 0),
        }
    }

    /// Compute Harris corner response at a pixel over a 7x7 window
    pub fn compute_harris_response(img: &Image, width: usize, height: usize, x: usize, y: usize) -> f32 {
        const RADIUS: i32 = 3;
        if x < (RADIUS + 1) as usize
            || y < (RADIUS + 1) as usize
            || x + (RADIUS as usize) + 1 >= width
            || y + (RADIUS as usize) + 1 >= height
        {
            return 0.0;
        }

        let mut ixx = 0.0f64;
        let mut ixy = 0.0f64;
        let mut iyy = 0.0f64;

        for dy in -RADIUS..=RADIUS {
            for dx in -RADIUS..=RADIUS {
                let nx = (x as i32 + dx) as usize;
                let ny = (y as i32 + dy) as usize;
                let (gx, gy) = Self::compute_gradients(img, width, nx, ny);

                ixx += (gx * gx) as f64;
                ixy += (gx * gy) as f64;
                iyy += (gy * gy) as f64;
            }
        }

        // Harris corner response: det(M) - k * trace(M)^2
        let k = 0.04f64;
        let det = ixx * iyy - ixy * ixy;
        let trace = ixx + iyy;
        (det - k * trace * trace) as f32
    }

    /// Compute image gradients using Sobel operator; caller keeps (x, y) off the border
    fn compute_gradients(img: &Image, width: usize, x: usize, y: usize) -> (f32, f32) {
        let at = |xx: usize, yy: usize| img[yy * width + xx] as f32;

        // Sobel X kernel: [-1, 0, 1; -2, 0, 2; -1, 0, 1]
        let gx = at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1)
            - at(x - 1, y - 1) - 2.0 * at(x - 1, y) - at(x - 1, y + 1);

        // Sobel Y kernel: [-1, -2, -1; 0, 0, 0; 1, 2, 1]
        let gy = at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1)
            - at(x - 1, y - 1) - 2.0 * at(x, y - 1) - at(x + 1, y - 1);

        (gx / 8.0, gy / 8.0)
    }
}
