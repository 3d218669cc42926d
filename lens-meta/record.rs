use std::fmt;

use serde::{Deserialize, Serialize};

/// Item quality rating in `0..=4`, shown as filled stars
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct QualityTier(u8);

impl QualityTier {
    pub const MAX: u8 = 4;

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    /// Lenient parse: anything that is not an integer in range becomes tier 0
    pub fn parse(raw: &str) -> Self {
        raw.trim()
            .parse::<i64>()
            .ok()
            .and_then(|v| u8::try_from(v).ok())
            .and_then(Self::new)
            .unwrap_or_default()
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Four star slots, the first `value` of them filled
    pub fn stars(self) -> String {
        (0..Self::MAX)
            .map(|slot| if slot < self.0 { '★' } else { '☆' })
            .collect()
    }
}

impl TryFrom<u8> for QualityTier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("quality tier {value} out of range 0..={}", Self::MAX))
    }
}

impl From<QualityTier> for u8 {
    fn from(tier: QualityTier) -> Self {
        tier.0
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stars())
    }
}

/// Everything shown about a detected item.
///
/// Fields the page did not provide hold their defaults rather than being
/// absent; see [`MetadataRecord::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub title: String,
    pub quality: QualityTier,
    pub entity_id: String,
    pub pickup_quote: String,
    pub effects: Vec<String>,
    pub synergies: Vec<String>,
}

impl MetadataRecord {
    pub const UNKNOWN_ID: &'static str = "Unknown";
    pub const NO_QUOTE: &'static str = "No Pickup Quote";

    /// Record with every field defaulted, titled after the item
    pub fn new(name: &str) -> Self {
        Self {
            title: name.to_string(),
            quality: QualityTier::default(),
            entity_id: Self::UNKNOWN_ID.to_string(),
            pickup_quote: Self::NO_QUOTE.to_string(),
            effects: Vec::new(),
            synergies: Vec::new(),
        }
    }

    pub fn display_title(&self) -> &str {
        non_empty_or(&self.title, "No Title")
    }

    pub fn display_entity_id(&self) -> String {
        format!("Entity ID: {}", non_empty_or(&self.entity_id, Self::UNKNOWN_ID))
    }

    pub fn display_quote(&self) -> &str {
        non_empty_or(&self.pickup_quote, Self::NO_QUOTE)
    }

    pub fn display_effects(&self) -> String {
        join_or(&self.effects, "No Effects")
    }

    pub fn display_synergies(&self) -> String {
        join_or(&self.synergies, "No Synergies")
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

fn join_or(lines: &[String], fallback: &str) -> String {
    if lines.is_empty() {
        fallback.to_string()
    } else {
        lines.join("\n")
    }
}
