use std::sync::Arc;

use image::DynamicImage;
use lens_brief::hamming_distance;
use lens_core::Descriptor;
use rayon::prelude::*;
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::extractor::{FeatureExtractor, Features};
use crate::library::SpriteLibrary;

/// Ratio test and qualification floor
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MatchConfig {
    /// Nearest neighbour must be strictly closer than `ratio` times the second
    pub ratio: f32,
    /// An entry needs strictly more passing matches than this
    pub min_good_matches: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            ratio: 0.75,
            min_good_matches: 10,
        }
    }
}

/// Outcome of comparing one library entry against a capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryScore {
    pub good_matches: usize,
    /// Mean Hamming distance of the passing matches, 0 when there are none
    pub mean_distance: f32,
}

impl EntryScore {
    pub fn qualifies(&self, cfg: &MatchConfig) -> bool {
        self.good_matches > cfg.min_good_matches
    }
}

/// Best qualifying library entry for a capture. Lower score is better.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpriteMatch {
    pub name: String,
    pub score: f32,
    pub good_matches: usize,
}

/// Two nearest neighbours of `query` in `train` by Hamming distance
#[inline]
fn two_nearest(query: &Descriptor, train: &[Descriptor]) -> (u32, u32) {
    let mut best = u32::MAX;
    let mut second = u32::MAX;
    for candidate in train {
        let d = hamming_distance(query, candidate);
        if d < best {
            second = best;
            best = d;
        } else if d < second {
            second = d;
        }
    }
    (best, second)
}

/// k=2 nearest-neighbour matching from `des1` (library) into `des2`
/// (capture), keeping only matches that pass the ratio test.
pub fn score_descriptors(des1: &[Descriptor], des2: &[Descriptor], cfg: &MatchConfig) -> EntryScore {
    if des2.len() < 2 {
        return EntryScore { good_matches: 0, mean_distance: 0.0 };
    }

    let mut good_matches = 0usize;
    let mut total = 0u64;
    for query in des1 {
        let (best, second) = two_nearest(query, des2);
        if (best as f32) < cfg.ratio * second as f32 {
            good_matches += 1;
            total += best as u64;
        }
    }

    let mean_distance = if good_matches == 0 {
        0.0
    } else {
        (total as f64 / good_matches as f64) as f32
    };
    EntryScore { good_matches, mean_distance }
}

/// Identifies which library sprite a capture shows
pub struct MatchEngine {
    extractor: Arc<FeatureExtractor>,
    cfg: MatchConfig,
}

impl MatchEngine {
    pub fn new(extractor: Arc<FeatureExtractor>, cfg: MatchConfig) -> Self {
        Self { extractor, cfg }
    }

    /// Normalize and extract the capture, then score it against every entry
    pub fn detect(&self, capture: &DynamicImage, library: &SpriteLibrary) -> Option<SpriteMatch> {
        match self.extractor.extract(capture) {
            Ok(features) => self.detect_features(&features, library),
            Err(err) => {
                warn!(error = %err, "capture feature extraction failed");
                None
            }
        }
    }

    /// Score already-extracted capture features against the library
    pub fn detect_features(&self, capture: &Features, library: &SpriteLibrary) -> Option<SpriteMatch> {
        let Some(des2) = capture.matchable() else {
            debug!(descriptors = capture.descriptor_count(), "capture has too few features");
            return None;
        };

        let entries: Vec<_> = library.iter().collect();
        let scored: Vec<(&str, EntryScore)> = entries
            .par_iter()
            .filter_map(|entry| {
                let des1 = entry.descriptors()?;
                let score = score_descriptors(des1, des2, &self.cfg);
                score.qualifies(&self.cfg).then_some((entry.name.as_str(), score))
            })
            .collect();

        // Sequential so the first of equally scored entries is kept
        let mut best: Option<(&str, EntryScore)> = None;
        for (name, score) in scored {
            match best {
                Some((_, current)) if score.mean_distance >= current.mean_distance => {}
                _ => best = Some((name, score)),
            }
        }

        let (name, score) = best?;
        debug!(sprite = name, score = score.mean_distance, good = score.good_matches, "sprite matched");
        Some(SpriteMatch {
            name: name.to_string(),
            score: score.mean_distance,
            good_matches: score.good_matches,
        })
    }

    pub fn extractor(&self) -> &Arc<FeatureExtractor> {
        &self.extractor
    }

    pub fn config(&self) -> &MatchConfig {
        &self.cfg
    }
}
