//! Sprite identification: ORB extraction of normalized images, a
//! name-indexed reference library and ratio-test matching of captures.

pub mod engine;
pub mod error;
pub mod extractor;
pub mod library;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use engine::{score_descriptors, EntryScore, MatchConfig, MatchEngine, SpriteMatch};
pub use error::{ExtractError, ExtractResult, LibraryError, LibraryResult};
pub use extractor::{FeatureExtractor, Features};
pub use library::{SpriteEntry, SpriteLibrary};
