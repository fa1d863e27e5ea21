//! Studio configuration with versioned JSON persistence.
//!
//! The config lives at `<config_dir>/musicverse/config.json`. A missing file
//! yields defaults; unknown fields are ignored and missing fields default.

use crate::defaults;
use crate::error::{Result, StudioError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Current config schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Runtime configuration for the studio utilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Maximum number of mixer snapshots kept for undo.
    pub history_max_entries: usize,
    /// Number of waveform peaks computed per source.
    pub peak_count: usize,
    /// Background threads used for peak extraction.
    pub worker_threads: usize,
    /// In-memory waveform cache entries.
    pub peak_cache_capacity: usize,
    /// Waveform cache entry lifetime in seconds.
    pub peak_cache_ttl_secs: u64,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            history_max_entries: defaults::HISTORY_MAX_ENTRIES,
            peak_count: defaults::PEAK_COUNT,
            worker_threads: num_cpus::get().max(1),
            peak_cache_capacity: defaults::PEAK_CACHE_CAPACITY,
            peak_cache_ttl_secs: defaults::PEAK_CACHE_TTL_SECS,
            log_level: "info".to_string(),
        }
    }
}

impl StudioConfig {
    /// Reject values the studio cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("history_max_entries", self.history_max_entries),
            ("peak_count", self.peak_count),
            ("worker_threads", self.worker_threads),
            ("peak_cache_capacity", self.peak_cache_capacity),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(StudioError::InvalidArgument(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    /// Default config file location, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("musicverse").join("config.json"))
    }

    /// Directory for persisted waveform peaks.
    pub fn default_cache_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("musicverse").join("peaks"))
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = ConfigFile::load_from_file(path)?.config;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        ConfigFile::new(self.clone()).save_to_file(path)
    }
}

/// Versioned config file wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Schema version for migration.
    pub version: u32,
    /// The configuration.
    pub config: StudioConfig,
}

impl ConfigFile {
    pub fn new(config: StudioConfig) -> Self {
        Self {
            version: CURRENT_VERSION,
            config,
        }
    }

    /// Serialize to pretty JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| StudioError::Serialization(format!("Failed to serialize config: {}", e)))
    }

    /// Deserialize from JSON bytes, applying migrations if needed.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| StudioError::Serialization(format!("Invalid JSON: {}", e)))?;

        let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        if version > CURRENT_VERSION {
            return Err(StudioError::Serialization(format!(
                "Config file version {} is newer than supported version {}",
                version, CURRENT_VERSION
            )));
        }

        let migrated = migrate(raw, version)?;
        serde_json::from_value(migrated)
            .map_err(|e| StudioError::Serialization(format!("Failed to parse config: {}", e)))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }
}

/// Apply sequential migrations from `from_version` to CURRENT_VERSION.
fn migrate(mut data: serde_json::Value, from_version: u32) -> Result<serde_json::Value> {
    let mut version = from_version;

    while version < CURRENT_VERSION {
        match version {
            0 => {
                // v0 was a bare config object
                if data.get("version").is_none() {
                    data = serde_json::json!({
                        "version": 1,
                        "config": data,
                    });
                }
                version = 1;
            }
            _ => {
                return Err(StudioError::Serialization(format!(
                    "No migration path from version {}",
                    version
                )));
            }
        }
    }

    Ok(data)
}
