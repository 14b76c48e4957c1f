//! Archive settings
//!
//! Defaults are usable out of the box. A JSON settings file can be loaded with
//! [`Settings::load`] and individual values overridden from `ASTROMANAGER_*`
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ArchiveError, Result};

/// Distance in metres within which a coordinate is considered to be at a known site.
pub const DEFAULT_SITE_MATCH_THRESHOLD_M: f64 = 500.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite database file holding the archive
    pub database_path: PathBuf,
    /// Maximum number of pooled connections
    pub pool_size: u32,
    /// SQLite busy timeout applied to every connection
    pub busy_timeout_ms: u32,
    pub site_match_threshold_m: f64,
    /// Upload the pristine pixel data as version 0 when an image is first registered
    pub store_original_on_import: bool,
    /// Attempts at minting a UUID that is not yet registered before giving up
    pub max_uuid_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            pool_size: 5,
            busy_timeout_ms: 5000,
            site_match_threshold_m: DEFAULT_SITE_MATCH_THRESHOLD_M,
            store_original_on_import: true,
            max_uuid_attempts: 16,
        }
    }
}

impl Settings {
    /// Settings for a database at `path`, everything else defaulted.
    pub fn with_database(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: path.into(),
            ..Self::default()
        }
    }

    /// Read settings from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            ArchiveError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `ASTROMANAGER_*` environment variables on top of `self`.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("ASTROMANAGER_DATABASE") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(value) = lookup("ASTROMANAGER_POOL_SIZE") {
            self.pool_size = parse_var("ASTROMANAGER_POOL_SIZE", &value)?;
        }
        if let Some(value) = lookup("ASTROMANAGER_BUSY_TIMEOUT_MS") {
            self.busy_timeout_ms = parse_var("ASTROMANAGER_BUSY_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("ASTROMANAGER_SITE_THRESHOLD_M") {
            self.site_match_threshold_m = parse_var("ASTROMANAGER_SITE_THRESHOLD_M", &value)?;
        }
        if let Some(value) = lookup("ASTROMANAGER_STORE_ORIGINAL") {
            self.store_original_on_import = parse_var("ASTROMANAGER_STORE_ORIGINAL", &value)?;
        }
        if let Some(value) = lookup("ASTROMANAGER_MAX_UUID_ATTEMPTS") {
            self.max_uuid_attempts = parse_var("ASTROMANAGER_MAX_UUID_ATTEMPTS", &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(ArchiveError::Config("pool_size must be at least 1".into()));
        }
        if !(self.site_match_threshold_m >= 0.0) {
            return Err(ArchiveError::Config(
                "site_match_threshold_m must be a non-negative number".into(),
            ));
        }
        if self.max_uuid_attempts == 0 {
            return Err(ArchiveError::Config("max_uuid_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ArchiveError::Config(format!("Invalid value for {}: {:?}", key, value)))
}

/// `<data dir>/astromanager/arid.db`, falling back to the working directory.
fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("astromanager")
        .join("arid.db")
}
