use lens_core::{Image, Keypoint, OrbConfig};
use crate::corner_detection::CornerDetector;
use crate::error::{FastError, FastResult};
use crate::pyramid::ImagePyramid;
use crate::refinement::KeypointRefinement;
use crate::types::{ScaleLevel, ScoredKeypoint};
use rayon::prelude::*;

/// Output of one multi-scale detection pass.
///
/// `keypoints` are grouped by octave in ascending order; `levels[i]` and
/// `pyramid[i]` describe the image each octave was detected on.
#[derive(Debug, Clone)]
pub struct Detection {
    pub levels: Vec<ScaleLevel>,
    pub pyramid: Vec<Image>,
    pub keypoints: Vec<Keypoint>,
}

/// Main FAST corner detector with multi-scale capability
#[derive(Debug, Clone)]
pub struct FastDetector {
    cfg: OrbConfig,
    w: usize,
    h: usize,
    scale_levels: Vec<ScaleLevel>,
    level_budget: Vec<usize>,
}

impl FastDetector {
    /// Creates a new FAST detector with validation
    pub fn new(cfg: OrbConfig, width: usize, height: usize) -> FastResult<Self> {
        if width == 0 || height == 0 {
            return Err(FastError::InvalidImageSize { width, height });
        }

        // FAST requires at least 7x7 image (3-pixel border on each side)
        const MIN_SIZE: usize = 7;
        if width < MIN_SIZE || height < MIN_SIZE {
            return Err(FastError::ImageTooSmall {
                width, height, min_size: MIN_SIZE
            });
        }

        // 0 would accept every pixel, >127 overflows the u8 comparisons
        if cfg.fast_threshold == 0 || cfg.fast_threshold > 127 {
            return Err(FastError::InvalidThreshold(cfg.fast_threshold));
        }

        let min_dim = std::cmp::min(width, height);
        if cfg.patch_size % 2 == 0 || cfg.patch_size >= min_dim {
            return Err(FastError::InvalidPatchSize {
                patch_size: cfg.patch_size,
                min_image_dim: min_dim,
            });
        }

        if cfg.n_levels == 0 || (cfg.n_levels > 1 && (cfg.scale_factor.is_nan() || cfg.scale_factor <= 1.0)) {
            return Err(FastError::InvalidPyramid {
                scale_factor: cfg.scale_factor,
                n_levels: cfg.n_levels,
            });
        }

        let scale_levels = ImagePyramid::generate_scale_levels(width, height, &cfg);
        if scale_levels.is_empty() {
            return Err(FastError::ImageTooSmall {
                width,
                height,
                min_size: 2 * cfg.edge_threshold.max(3) + 7,
            });
        }
        let level_budget = cfg.features_per_level();

        Ok(Self {
            cfg,
            w: width,
            h: height,
            scale_levels,
            level_budget,
        })
    }

    /// Validates image data before processing
    fn validate_image(&self, img: &Image) -> FastResult<()> {
        let expected_len = self.w * self.h;
        if img.len() != expected_len {
            return Err(FastError::InvalidImageData {
                expected_len,
                actual_len: img.len(),
            });
        }
        Ok(())
    }

    /// Detect oriented keypoints across the pyramid
    pub fn detect(&self, img: &Image) -> FastResult<Detection> {
        self.validate_image(img)?;

        let pyramid = ImagePyramid::build_image_pyramid(img, self.w, self.h, &self.scale_levels);

        let per_level: Vec<Vec<Keypoint>> = self
            .scale_levels
            .par_iter()
            .zip(pyramid.par_iter())
            .map(|(scale_level, level_img)| self.detect_keypoints_at_scale(level_img, scale_level))
            .collect();

        Ok(Detection {
            levels: self.scale_levels.clone(),
            pyramid,
            keypoints: per_level.into_iter().flatten().collect(),
        })
    }

    /// Detect keypoints only, discarding the pyramid
    pub fn detect_keypoints(&self, img: &Image) -> FastResult<Vec<Keypoint>> {
        Ok(self.detect(img)?.keypoints)
    }

    /// Detect, rank and orient keypoints on one level.
    ///
    /// Coordinates are mapped back to the base image.
    pub fn detect_keypoints_at_scale(&self, img: &Image, scale_level: &ScaleLevel) -> Vec<Keypoint> {
        let budget = self.level_budget.get(scale_level.level).copied().unwrap_or(0);
        if budget == 0 {
            return Vec::new();
        }

        let corners = CornerDetector::detect_corners(
            img,
            scale_level,
            self.cfg.fast_threshold,
            self.cfg.edge_threshold,
        );

        let scored: Vec<ScoredKeypoint> = corners
            .iter()
            .map(|corner| {
                let response = CornerDetector::compute_harris_response(
                    img,
                    scale_level.width,
                    scale_level.height,
                    corner.x,
                    corner.y,
                );
                ScoredKeypoint {
                    keypoint: Keypoint {
                        x: corner.x as f32,
                        y: corner.y as f32,
                        angle: 0.0,
                        octave: scale_level.level as u8,
                        size: self.cfg.patch_size as f32 * scale_level.scale,
                        response,
                    },
                    response,
                }
            })
            .collect();

        KeypointRefinement::retain_best(scored, budget)
            .into_iter()
            .map(|sk| {
                let mut kp = sk.keypoint;
                kp.angle = KeypointRefinement::compute_orientation(
                    img,
                    scale_level.width,
                    scale_level.height,
                    kp.x as usize,
                    kp.y as usize,
                    self.cfg.patch_size,
                );
                kp.x *= scale_level.scale;
                kp.y *= scale_level.scale;
                kp
            })
            .collect()
    }

    /// Get scale levels for this detector
    pub fn get_scale_levels(&self) -> &[ScaleLevel] {
        &self.scale_levels
    }

    /// Get detector configuration
    pub fn config(&self) -> &OrbConfig {
        &self.cfg
    }

    /// Get image dimensions
    pub fn dimensions(&self) -> (usize, usize) {
        (self.w, self.h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> OrbConfig {
        OrbConfig {
            n_threads: 1,
            ..OrbConfig::default()
        }
    }

    /// Blocky texture: 8x8 cells with pseudo-random intensities
    fn create_textured_image(width: usize, height: usize, seed: u32) -> Image {
        let mut state = seed.wrapping_mul(2_654_435_761).max(1);
        let cells_x = width.div_ceil(8);
        let cells_y = height.div_ceil(8);
        let mut cells = Vec::with_capacity(cells_x * cells_y);
        for _ in 0..cells_x * cells_y {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            cells.push((state % 256) as u8);
        }

        let mut img = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                img[y * width + x] = cells[(y / 8) * cells_x + x / 8];
            }
        }
        img
    }

    #[test]
    fn test_valid_constructor() {
        assert!(FastDetector::new(create_test_config(), 128, 128).is_ok());
    }

    #[test]
    fn test_invalid_dimensions() {
        let result = FastDetector::new(create_test_config(), 0, 100);
        assert!(matches!(result, Err(FastError::InvalidImageSize { .. })));

        let result = FastDetector::new(create_test_config(), 100, 0);
        assert!(matches!(result, Err(FastError::InvalidImageSize { .. })));
    }

    #[test]
    fn test_too_small_image() {
        let result = FastDetector::new(create_test_config(), 6, 6);
        assert!(matches!(result, Err(FastError::ImageTooSmall { .. })));

        // Fits FAST but not the edge border
        let result = FastDetector::new(create_test_config(), 32, 32);
        assert!(matches!(result, Err(FastError::ImageTooSmall { .. })));
    }

    #[test]
    fn test_invalid_threshold() {
        let mut cfg = create_test_config();

        cfg.fast_threshold = 0;
        let result = FastDetector::new(cfg.clone(), 128, 128);
        assert!(matches!(result, Err(FastError::InvalidThreshold(0))));

        cfg.fast_threshold = 200;
        let result = FastDetector::new(cfg, 128, 128);
        assert!(matches!(result, Err(FastError::InvalidThreshold(200))));
    }

    #[test]
    fn test_invalid_patch_size() {
        let mut cfg = create_test_config();

        cfg.patch_size = 16;
        let result = FastDetector::new(cfg.clone(), 128, 128);
        assert!(matches!(result, Err(FastError::InvalidPatchSize { .. })));

        cfg.patch_size = 129;
        let result = FastDetector::new(cfg, 128, 128);
        assert!(matches!(result, Err(FastError::InvalidPatchSize { .. })));
    }

    #[test]
    fn test_invalid_pyramid() {
        let cfg = OrbConfig {
            scale_factor: 1.0,
            ..create_test_config()
        };
        assert!(matches!(
            FastDetector::new(cfg, 128, 128),
            Err(FastError::InvalidPyramid { .. })
        ));
    }

    #[test]
    fn test_invalid_image_data() {
        let detector = FastDetector::new(create_test_config(), 128, 128).unwrap();
        let img = vec![0; 50];
        let result = detector.detect(&img);
        assert!(matches!(result, Err(FastError::InvalidImageData { .. })));
    }

    #[test]
    fn test_uniform_image_detection() {
        let detector = FastDetector::new(create_test_config(), 128, 128).unwrap();
        let img = vec![128u8; 128 * 128];
        assert!(detector.detect_keypoints(&img).unwrap().is_empty());
    }

    #[test]
    fn test_textured_image_detection() {
        let cfg = create_test_config();
        let edge = cfg.edge_threshold as f32;
        let detector = FastDetector::new(cfg.clone(), 128, 128).unwrap();
        let img = create_textured_image(128, 128, 7);

        let detection = detector.detect(&img).unwrap();
        assert!(detection.keypoints.len() > 20, "only {} keypoints", detection.keypoints.len());
        assert!(detection.keypoints.len() <= cfg.n_features);
        assert_eq!(detection.levels.len(), detection.pyramid.len());

        for kp in &detection.keypoints {
            let scale = detection.levels[kp.octave as usize].scale;
            assert!(kp.x >= edge * scale - 1e-3 && kp.x < 128.0 - edge * scale + 1e-3);
            assert!(kp.y >= edge * scale - 1e-3 && kp.y < 128.0 - edge * scale + 1e-3);
            assert!(kp.angle.is_finite());
            assert!((kp.size - cfg.patch_size as f32 * scale).abs() < 1e-3);
        }

        // Grouped by ascending octave
        assert!(detection.keypoints.windows(2).all(|w| w[0].octave <= w[1].octave));
    }

    #[test]
    fn test_feature_cap_is_respected() {
        let cfg = OrbConfig {
            n_features: 12,
            ..create_test_config()
        };
        let detector = FastDetector::new(cfg, 128, 128).unwrap();
        let img = create_textured_image(128, 128, 3);
        assert!(detector.detect_keypoints(&img).unwrap().len() <= 12);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let detector = FastDetector::new(create_test_config(), 128, 128).unwrap();
        let img = create_textured_image(128, 128, 11);

        let first = detector.detect_keypoints(&img).unwrap();
        for _ in 0..5 {
            assert_eq!(detector.detect_keypoints(&img).unwrap(), first);
        }
    }

    #[test]
    fn test_configuration_access() {
        let cfg = create_test_config();
        let detector = FastDetector::new(cfg.clone(), 128, 128).unwrap();

        assert_eq!(detector.config(), &cfg);
        assert_eq!(detector.dimensions(), (128, 128));
        assert_eq!(detector.get_scale_levels()[0].width, 128);
    }
}
