#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Row-major 8-bit grayscale image
pub type Image = Vec<u8>;

/// Side length every sprite and capture is resized to before extraction.
pub const NORMALIZED_SIZE: u32 = 128;

/// Key-point ≙ FAST corner + orientation (radians), in base-level coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    /// Pyramid level the corner was found on
    pub octave: u8,
    /// Diameter of the described patch at base scale
    pub size: f32,
    /// Harris response used for ranking
    pub response: f32,
}

/// 256-bit binary descriptor = 32 bytes
pub type Descriptor = [u8; 32];

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OrbConfig {
    /// Upper bound on keypoints kept across all pyramid levels
    pub n_features: usize,
    pub scale_factor: f32,
    pub n_levels: usize,
    /// Corners closer than this to a level border are dropped
    pub edge_threshold: usize,
    pub fast_threshold: u8,
    pub patch_size: usize,
    pub n_threads: usize,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            n_features: 1500,
            scale_factor: 1.2,
            n_levels: 8,
            edge_threshold: 15,
            fast_threshold: 20,
            patch_size: 31,
            n_threads: num_cpus::get().max(1),
        }
    }
}

impl OrbConfig {
    /// Share of `n_features` assigned to each pyramid level.
    ///
    /// Levels get a geometrically shrinking budget so coarse levels, which
    /// cover less area, do not crowd out the base image.
    pub fn features_per_level(&self) -> Vec<usize> {
        let levels = self.n_levels.max(1);
        let factor = 1.0 / self.scale_factor as f64;
        let mut desired = self.n_features as f64 * (1.0 - factor)
            / (1.0 - factor.powi(levels as i32));
        if !desired.is_finite() {
            desired = self.n_features as f64 / levels as f64;
        }

        let mut budget = Vec::with_capacity(levels);
        let mut assigned = 0usize;
        for _ in 0..levels - 1 {
            let n = desired.round() as usize;
            budget.push(n);
            assigned += n;
            desired *= factor;
        }
        budget.push(self.n_features.saturating_sub(assigned));
        budget
    }
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}
