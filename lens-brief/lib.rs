use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use lens_core::{Descriptor, Image, Keypoint};
use rayon::prelude::*;

const DESCRIPTOR_SIZE: usize = 32;
const DESCRIPTOR_BITS: usize = DESCRIPTOR_SIZE * 8;

/// Smoothing applied to each level before sampling; BRIEF tests on raw
/// pixels are too sensitive to single-pixel noise.
const SMOOTHING_SIGMA: f32 = 2.0;

/// Fixed seed for the sampling pattern. Library and capture descriptors are
/// only comparable if they share the pattern, so it must never change at runtime.
const PATTERN_SEED: u64 = 0x2545_F491_4F6C_DD1D;

/// One binary test: compare intensity at `(x1, y1)` against `(x2, y2)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointPair {
    pub x1: i8,
    pub y1: i8,
    pub x2: i8,
    pub y2: i8,
}

pub struct BriefGenerator {
    pattern: Vec<PointPair>,
}

impl BriefGenerator {
    /// Build the 256-pair pattern for the given patch size.
    ///
    /// Offsets are drawn from a seeded xorshift generator and kept inside a
    /// radius of `patch_size / 2 - 2`, so the pattern is identical across runs.
    pub fn new(patch_size: usize) -> Self {
        let radius = (patch_size / 2).saturating_sub(2).max(1) as i64;
        let span = (2 * radius + 1) as u64;

        let mut state = PATTERN_SEED;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            ((state % span) as i64 - radius) as i8
        };

        let mut pattern = Vec::with_capacity(DESCRIPTOR_BITS);
        while pattern.len() < DESCRIPTOR_BITS {
            let pair = PointPair { x1: next(), y1: next(), x2: next(), y2: next() };
            // A test comparing a point with itself carries no information
            if (pair.x1, pair.y1) != (pair.x2, pair.y2) {
                pattern.push(pair);
            }
        }

        Self { pattern }
    }

    pub fn pattern(&self) -> &[PointPair] {
        &self.pattern
    }

    /// Gaussian-smooth one pyramid level ahead of descriptor sampling
    pub fn smooth_level(img: &Image, width: usize, height: usize) -> Image {
        match GrayImage::from_raw(width as u32, height as u32, img.clone()) {
            Some(gray) => gaussian_blur_f32(&gray, SMOOTHING_SIGMA).into_raw(),
            None => img.clone(),
        }
    }

    /// Generate descriptors for keypoints detected on one level.
    ///
    /// `img` must already be smoothed; keypoint coordinates are in base
    /// image space and are divided by `scale` to reach the level.
    pub fn generate_descriptors(&self, img: &Image, width: usize, height: usize, scale: f32, kps: &[Keypoint]) -> Vec<Descriptor> {
        kps.par_iter()
            .map(|kp| {
                let (s, c) = kp.angle.sin_cos();
                let (cx, cy) = (kp.x / scale, kp.y / scale);
                let mut d = [0u8; DESCRIPTOR_SIZE];

                for (i, pair) in self.pattern.iter().enumerate() {
                    let (dx1, dy1) = (pair.x1 as f32, pair.y1 as f32);
                    let (dx2, dy2) = (pair.x2 as f32, pair.y2 as f32);

                    // Steer the pattern by the keypoint orientation
                    let (rx1, ry1) = (cx + c * dx1 - s * dy1, cy + s * dx1 + c * dy1);
                    let (rx2, ry2) = (cx + c * dx2 - s * dy2, cy + s * dx2 + c * dy2);

                    let val1 = bilinear_sample(img, width, height, rx1, ry1);
                    let val2 = bilinear_sample(img, width, height, rx2, ry2);

                    let bit = (val1 < val2) as u8;
                    d[i / 8] |= bit << (i % 8);
                }
                d
            })
            .collect()
    }
}

/// Bilinear interpolation for subpixel sampling, clamped at the borders
fn bilinear_sample(img: &Image, width: usize, height: usize, x: f32, y: f32) -> f32 {
    let x0 = x.floor();
    let y0 = y.floor();
    let x1 = x0 + 1.0;
    let y1 = y0 + 1.0;

    if x0 < 0.0 || y0 < 0.0 || x1 >= width as f32 || y1 >= height as f32 {
        let cx = x.round().clamp(0.0, (width - 1) as f32) as usize;
        let cy = y.round().clamp(0.0, (height - 1) as f32) as usize;
        return img[cy * width + cx] as f32;
    }

    let dx = x - x0;
    let dy = y - y0;

    let x0_idx = x0 as usize;
    let y0_idx = y0 as usize;
    let x1_idx = x1 as usize;
    let y1_idx = y1 as usize;

    let p00 = img[y0_idx * width + x0_idx] as f32;
    let p10 = img[y0_idx * width + x1_idx] as f32;
    let p01 = img[y1_idx * width + x0_idx] as f32;
    let p11 = img[y1_idx * width + x1_idx] as f32;

    let top = p00 * (1.0 - dx) + p10 * dx;
    let bottom = p01 * (1.0 - dx) + p11 * dx;

    top * (1.0 - dy) + bottom * dy
}

/// 64-bit words per descriptor
const DESCRIPTOR_LANES: usize = 4;

/// Number of differing bits between two descriptors
#[inline]
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    let lane = |d: &Descriptor, i: usize| u64::from_le_bytes(std::array::from_fn(|j| d[i * 8 + j]));
    (0..DESCRIPTOR_LANES).map(|i| (lane(a, i) ^ lane(b, i)).count_ones()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keypoint(x: f32, y: f32, angle: f32) -> Keypoint {
        Keypoint { x, y, angle, octave: 0, size: 31.0, response: 1.0 }
    }

    fn gradient_image(width: usize, height: usize) -> Image {
        (0..width * height)
            .map(|i| {
                let (x, y) = (i % width, i / width);
                ((x * 7 + y * 3) % 256) as u8
            })
            .collect()
    }

    #[test]
    fn test_pattern_is_stable_and_bounded() {
        let a = BriefGenerator::new(31);
        let b = BriefGenerator::new(31);
        assert_eq!(a.pattern(), b.pattern());
        assert_eq!(a.pattern().len(), 256);
        for p in a.pattern() {
            for v in [p.x1, p.y1, p.x2, p.y2] {
                assert!((-13..=13).contains(&v));
            }
            assert_ne!((p.x1, p.y1), (p.x2, p.y2));
        }
    }

    #[test]
    fn test_uniform_patch_gives_zero_descriptor() {
        let generator = BriefGenerator::new(31);
        let img = vec![90u8; 64 * 64];
        let desc = generator.generate_descriptors(&img, 64, 64, 1.0, &[keypoint(32.0, 32.0, 0.0)]);
        assert_eq!(desc, vec![[0u8; 32]]);
    }

    #[test]
    fn test_descriptors_are_deterministic() {
        let generator = BriefGenerator::new(31);
        let img = gradient_image(64, 64);
        let kps = [keypoint(20.0, 20.0, 0.3), keypoint(40.0, 30.0, -1.2)];
        let first = generator.generate_descriptors(&img, 64, 64, 1.0, &kps);
        let second = generator.generate_descriptors(&img, 64, 64, 1.0, &kps);
        assert_eq!(first, second);
        assert_eq!(first.len(), kps.len());
    }

    #[test]
    fn test_scale_maps_to_level_coordinates() {
        let generator = BriefGenerator::new(31);
        let img = gradient_image(64, 64);
        let on_level = generator.generate_descriptors(&img, 64, 64, 1.0, &[keypoint(30.0, 30.0, 0.0)]);
        let from_base = generator.generate_descriptors(&img, 64, 64, 2.0, &[keypoint(60.0, 60.0, 0.0)]);
        assert_eq!(on_level, from_base);
    }

    #[test]
    fn test_smoothing_keeps_dimensions() {
        let img = gradient_image(40, 30);
        let smoothed = BriefGenerator::smooth_level(&img, 40, 30);
        assert_eq!(smoothed.len(), img.len());
    }

    #[test]
    fn test_hamming_known_values() {
        let a = [0u8; 32];
        let mut b = [0u8; 32];
        assert_eq!(hamming_distance(&a, &b), 0);
        b[0] = 0b1010_0001;
        b[31] = 0xFF;
        assert_eq!(hamming_distance(&a, &b), 11);
        assert_eq!(hamming_distance(&[0xFF; 32], &a), 256);
    }

    #[test]
    fn test_hamming_counts_every_byte() {
        let zero = [0u8; 32];
        for byte in 0..32 {
            let mut d = [0u8; 32];
            d[byte] = 0x80;
            assert_eq!(hamming_distance(&zero, &d), 1, "bit in byte {byte} not counted");
        }
    }

    proptest! {
        #[test]
        fn prop_hamming_symmetric_and_self_zero(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
            prop_assert_eq!(hamming_distance(&a, &a), 0);
            prop_assert_eq!(hamming_distance(&a, &b), hamming_distance(&b, &a));
            let bytewise: u32 = a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum();
            prop_assert_eq!(hamming_distance(&a, &b), bytewise);
        }
    }
}
