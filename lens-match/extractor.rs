use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use lens_brief::BriefGenerator;
use lens_core::{Descriptor, Image, Keypoint, NORMALIZED_SIZE, OrbConfig};
use lens_fast::FastDetector;

use crate::error::ExtractResult;

/// Keypoints and descriptors of one normalized image.
///
/// `descriptors` is `None` when fewer than two features were found; such
/// images carry no usable signal for matching.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Option<Vec<Descriptor>>,
}

impl Features {
    fn new(keypoints: Vec<Keypoint>, descriptors: Vec<Descriptor>) -> Self {
        debug_assert_eq!(keypoints.len(), descriptors.len());
        let descriptors = (descriptors.len() >= 2).then_some(descriptors);
        Self { keypoints, descriptors }
    }

    /// Descriptors if there are enough of them to take part in matching
    pub fn matchable(&self) -> Option<&[Descriptor]> {
        self.descriptors.as_deref().filter(|d| d.len() >= 2)
    }

    pub fn descriptor_count(&self) -> usize {
        self.descriptors.as_ref().map_or(0, Vec::len)
    }
}

/// ORB feature extractor bound to the fixed normalization size.
///
/// Combines multi-scale FAST detection with steered BRIEF descriptors.
pub struct FeatureExtractor {
    detector: FastDetector,
    brief: BriefGenerator,
}

impl FeatureExtractor {
    pub fn new(cfg: OrbConfig) -> ExtractResult<Self> {
        let side = NORMALIZED_SIZE as usize;
        let patch_size = cfg.patch_size;
        let detector = FastDetector::new(cfg, side, side)?;
        let brief = BriefGenerator::new(patch_size);
        Ok(Self { detector, brief })
    }

    /// Resize any image to the square normalization size, keeping colour
    pub fn normalize(img: &DynamicImage) -> RgbaImage {
        imageops::resize(&img.to_rgba8(), NORMALIZED_SIZE, NORMALIZED_SIZE, FilterType::Triangle)
    }

    /// Normalize, convert to intensity and extract
    pub fn extract(&self, img: &DynamicImage) -> ExtractResult<Features> {
        self.extract_normalized(&Self::normalize(img))
    }

    /// Extract from an image that already went through [`Self::normalize`]
    pub fn extract_normalized(&self, rgba: &RgbaImage) -> ExtractResult<Features> {
        let gray = imageops::grayscale(rgba);
        self.extract_gray(gray.as_raw())
    }

    /// Detect keypoints and generate descriptors level by level
    pub fn extract_gray(&self, img: &Image) -> ExtractResult<Features> {
        let detection = self.detector.detect(img)?;
        let keypoints = detection.keypoints;
        let mut descriptors = Vec::with_capacity(keypoints.len());

        let mut start = 0;
        for (level, layer) in detection.levels.iter().zip(&detection.pyramid) {
            let count = keypoints[start..]
                .iter()
                .take_while(|kp| kp.octave as usize == level.level)
                .count();
            if count == 0 {
                continue;
            }

            let level_kps = &keypoints[start..start + count];
            start += count;

            let smoothed = BriefGenerator::smooth_level(layer, level.width, level.height);
            descriptors.extend(self.brief.generate_descriptors(
                &smoothed,
                level.width,
                level.height,
                level.scale,
                level_kps,
            ));
        }

        Ok(Features::new(keypoints, descriptors))
    }

    pub fn config(&self) -> &OrbConfig {
        self.detector.config()
    }
}
