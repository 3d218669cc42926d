use std::path::{Path, PathBuf};

use device_query::Keycode;
use lens_core::OrbConfig;
use lens_match::MatchConfig;
use lens_meta::WikiSource;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot access config file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML config: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("cannot write TOML config: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Where and how item metadata is fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Item names are appended to this URL
    pub base_url: String,
    pub timeout_secs: u64,
    /// Size of the background fetch pool
    pub workers: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_url: WikiSource::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
            workers: 2,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory of reference sprites, one image per item
    pub sprite_dir: PathBuf,
    pub poll_interval_ms: u64,
    /// Side of the square captured around the pointer
    pub region_size: u32,
    /// `device_query` key name that toggles pause, e.g. "F8" or "Insert".
    /// Read globally, so it must not be a key the game uses.
    pub pause_key: String,
    pub extractor: OrbConfig,
    pub matcher: MatchConfig,
    pub metadata: MetadataConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sprite_dir: PathBuf::from("./item_sprites"),
            poll_interval_ms: 200,
            region_size: 50,
            pause_key: "F8".to_string(),
            extractor: OrbConfig::default(),
            matcher: MatchConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn with_sprite_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sprite_dir = dir.into();
        self
    }

    pub fn pause_keycode(&self) -> ConfigResult<Keycode> {
        self.pause_key
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown pause_key {:?}", self.pause_key)))
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "AppConfig: sprites={}, poll={}ms, region={}px, pause={}, features={}, levels={}, ratio={}, min_matches>{}, workers={}",
            self.sprite_dir.display(),
            self.poll_interval_ms,
            self.region_size,
            self.pause_key,
            self.extractor.n_features,
            self.extractor.n_levels,
            self.matcher.ratio,
            self.matcher.min_good_matches,
            self.metadata.workers,
        )
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.poll_interval_ms == 0 {
            return invalid("poll_interval_ms must be positive");
        }
        if self.region_size == 0 {
            return invalid("region_size must be positive");
        }
        self.pause_keycode()?;
        if self.extractor.n_features == 0 {
            return invalid("extractor.n_features must be positive");
        }
        if !(self.matcher.ratio > 0.0 && self.matcher.ratio <= 1.0) {
            return invalid("matcher.ratio must be in (0, 1]");
        }
        if self.metadata.workers == 0 {
            return invalid("metadata.workers must be positive");
        }
        if self.metadata.base_url.trim().is_empty() {
            return invalid("metadata.base_url must not be empty");
        }
        Ok(())
    }

    /// Load from a `.json` file, or TOML for any other extension
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json { Self::load_json(path) } else { Self::load_toml(path) }
    }

    pub fn load_toml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_toml(&read(path.as_ref())?)
    }

    pub fn save_toml(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        write(path.as_ref(), &self.to_toml()?)
    }

    pub fn load_json(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_json(&read(path.as_ref())?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        write(path.as_ref(), &self.to_json()?)
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn from_toml(toml_str: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

fn read(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, contents: &str) -> ConfigResult<()> {
    std::fs::write(path, contents).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
