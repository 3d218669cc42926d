//! Multi-scale FAST-9 corner detection with intensity-centroid orientation.
//!
//! Corners are found on every pyramid level, suppressed to 3x3 local maxima,
//! ranked by Harris response within a per-level budget and reported in base
//! image coordinates.

pub mod corner_detection;
pub mod detector;
pub mod error;
pub mod pyramid;
pub mod refinement;
pub mod types;
pub mod utils;

pub use detector::{Detection, FastDetector};
pub use error::{FastError, FastResult};
pub use types::{Corner, ScaleLevel, ScoredKeypoint};
