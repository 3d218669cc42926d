use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader, RgbaImage};
use lens_core::Descriptor;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{LibraryError, LibraryResult};
use crate::extractor::{FeatureExtractor, Features};

/// One reference sprite: its normalized image and precomputed features
#[derive(Debug, Clone)]
pub struct SpriteEntry {
    pub name: String,
    pub image: RgbaImage,
    pub features: Features,
}

impl SpriteEntry {
    fn extract(name: String, img: &DynamicImage, extractor: &FeatureExtractor) -> Self {
        let image = FeatureExtractor::normalize(img);
        let features = extractor.extract_normalized(&image).unwrap_or_else(|err| {
            warn!(sprite = %name, error = %err, "feature extraction failed, sprite kept for display only");
            Features::default()
        });
        Self { name, image, features }
    }

    /// Descriptors usable for matching, `None` for featureless sprites
    pub fn descriptors(&self) -> Option<&[Descriptor]> {
        self.features.matchable()
    }
}

/// Name-indexed reference sprites, built once and read-only afterwards.
///
/// Entries iterate in name order, which fixes the evaluation order used by
/// the match engine.
#[derive(Debug, Default)]
pub struct SpriteLibrary {
    entries: BTreeMap<String, SpriteEntry>,
}

impl SpriteLibrary {
    /// Load every decodable image directly inside `dir`.
    ///
    /// Only failure to read the directory itself is an error; files that
    /// cannot be decoded are skipped.
    pub fn build(dir: impl AsRef<Path>, extractor: &FeatureExtractor) -> LibraryResult<Self> {
        let dir = dir.as_ref();
        let read_dir = fs::read_dir(dir).map_err(|source| LibraryError::OpenDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut candidates: Vec<(String, PathBuf)> = Vec::new();
        for dir_entry in read_dir {
            let path = match dir_entry {
                Ok(dir_entry) => dir_entry.path(),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(stem) if !stem.is_empty() => candidates.push((stem.to_string(), path)),
                _ => debug!(path = %path.display(), "skipping file without usable name"),
            }
        }
        candidates.sort_by(|a, b| a.1.cmp(&b.1));

        let loaded: Vec<SpriteEntry> = candidates
            .into_par_iter()
            .filter_map(|(name, path)| {
                let img = decode(&path)?;
                Some(SpriteEntry::extract(name, &img, extractor))
            })
            .collect();

        let library = Self::from_entries(loaded);
        info!(
            dir = %dir.display(),
            sprites = library.len(),
            matchable = library.matchable_count(),
            "sprite library loaded"
        );
        Ok(library)
    }

    /// Build from already-decoded images, e.g. for tooling and tests
    pub fn from_images<I>(images: I, extractor: &FeatureExtractor) -> Self
    where
        I: IntoIterator<Item = (String, DynamicImage)>,
    {
        let images: Vec<(String, DynamicImage)> = images.into_iter().collect();
        let loaded: Vec<SpriteEntry> = images
            .into_par_iter()
            .map(|(name, img)| SpriteEntry::extract(name, &img, extractor))
            .collect();
        Self::from_entries(loaded)
    }

    /// First entry per name wins
    pub(crate) fn from_entries(loaded: Vec<SpriteEntry>) -> Self {
        let mut entries = BTreeMap::new();
        for sprite in loaded {
            match entries.entry(sprite.name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(sprite);
                }
                Entry::Occupied(_) => {
                    warn!(sprite = %sprite.name, "duplicate sprite name, keeping the first file");
                }
            }
        }
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&SpriteEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpriteEntry> {
        self.entries.values()
    }

    /// Number of entries that take part in matching
    pub fn matchable_count(&self) -> usize {
        self.iter().filter(|entry| entry.descriptors().is_some()).count()
    }
}

/// Decode by content rather than extension; `None` means skip the file
fn decode(path: &Path) -> Option<DynamicImage> {
    let decoded = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.decode());

    match decoded {
        Ok(img) => Some(img),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "skipping undecodable sprite");
            None
        }
    }
}
