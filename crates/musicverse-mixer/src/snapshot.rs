//! Mixer state snapshots.
//!
//! A [`MixerSnapshot`] is a complete, owned copy of every stem's controls.
//! History stores clones, so later edits to a live snapshot never reach
//! recorded ones.

use musicverse_core::{Result, StudioError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Controls for one stem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StemState {
    /// Volume (0.0 to 1.0).
    pub volume: f32,
    /// Whether this stem is muted.
    pub muted: bool,
    /// Whether this stem is soloed.
    pub solo: bool,
    /// Pan (-1.0 = full left, 0.0 = center, 1.0 = full right).
    pub pan: f32,
}

impl Default for StemState {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
            solo: false,
            pan: 0.0,
        }
    }
}

impl StemState {
    pub fn with_volume(volume: f32) -> Self {
        Self {
            volume,
            ..Default::default()
        }
    }

    /// Compute left/right gain from volume and pan (constant-power panning).
    pub fn stereo_gain(&self) -> (f32, f32) {
        if self.muted {
            return (0.0, 0.0);
        }
        let angle = (self.pan + 1.0) * 0.25 * std::f32::consts::PI;
        (self.volume * angle.cos(), self.volume * angle.sin())
    }

    fn validate(&self, stem_id: &str) -> Result<()> {
        if !self.volume.is_finite() || !(0.0..=1.0).contains(&self.volume) {
            return Err(StudioError::MalformedSnapshot(format!(
                "stem '{}' volume {} is outside [0, 1]",
                stem_id, self.volume
            )));
        }
        if !self.pan.is_finite() || !(-1.0..=1.0).contains(&self.pan) {
            return Err(StudioError::MalformedSnapshot(format!(
                "stem '{}' pan {} is outside [-1, 1]",
                stem_id, self.pan
            )));
        }
        Ok(())
    }
}

/// Point-in-time copy of the mixer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerSnapshot {
    /// Per-stem controls keyed by stem id.
    pub stems: BTreeMap<String, StemState>,
    /// Master volume (0.0 to 1.0).
    #[serde(default = "default_master_volume")]
    pub master_volume: f32,
}

fn default_master_volume() -> f32 {
    1.0
}

impl Default for MixerSnapshot {
    fn default() -> Self {
        Self {
            stems: BTreeMap::new(),
            master_volume: default_master_volume(),
        }
    }
}

impl MixerSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style stem insertion.
    pub fn with_stem(mut self, id: impl Into<String>, state: StemState) -> Self {
        self.stems.insert(id.into(), state);
        self
    }

    pub fn stem(&self, id: &str) -> Option<&StemState> {
        self.stems.get(id)
    }

    pub fn stem_mut(&mut self, id: &str) -> Option<&mut StemState> {
        self.stems.get_mut(id)
    }

    /// Check if any stem is soloed.
    pub fn any_solo(&self) -> bool {
        self.stems.values().any(|s| s.solo)
    }

    /// Audible left/right gain for a stem after solo, mute, pan and master.
    pub fn effective_gain(&self, id: &str) -> Option<(f32, f32)> {
        let stem = self.stems.get(id)?;
        if self.any_solo() && !stem.solo {
            return Some((0.0, 0.0));
        }
        let (left, right) = stem.stereo_gain();
        Some((left * self.master_volume, right * self.master_volume))
    }

    /// Reject out-of-range or non-finite values and empty stem ids.
    pub fn validate(&self) -> Result<()> {
        if !self.master_volume.is_finite() || !(0.0..=1.0).contains(&self.master_volume) {
            return Err(StudioError::MalformedSnapshot(format!(
                "master volume {} is outside [0, 1]",
                self.master_volume
            )));
        }
        for (id, stem) in &self.stems {
            if id.trim().is_empty() {
                return Err(StudioError::MalformedSnapshot(
                    "stem id must not be empty".into(),
                ));
            }
            stem.validate(id)?;
        }
        Ok(())
    }

    /// Parse and validate a snapshot sent by the UI as JSON.
    pub fn from_json(data: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(data)
            .map_err(|e| StudioError::MalformedSnapshot(format!("Invalid snapshot JSON: {}", e)))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| StudioError::Serialization(format!("Failed to serialize snapshot: {}", e)))
    }
}
