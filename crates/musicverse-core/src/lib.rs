//! MusicVerse Core - Foundation types for the studio
//!
//! This crate provides the types shared by the studio crates:
//! - The error taxonomy (`StudioError`, `ErrorKind`)
//! - Studio configuration and its on-disk format

pub mod config;
pub mod error;

pub use config::{ConfigFile, StudioConfig};
pub use error::{ErrorKind, Result, StudioError};

/// Defaults carried over from the web studio.
pub mod defaults {
    /// Mixer undo history depth.
    pub const HISTORY_MAX_ENTRIES: usize = 30;

    /// Waveform bars rendered per stem.
    pub const PEAK_COUNT: usize = 100;

    /// In-memory waveform cache entries.
    pub const PEAK_CACHE_CAPACITY: usize = 20;

    /// Waveform cache entry lifetime (7 days).
    pub const PEAK_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;
}
