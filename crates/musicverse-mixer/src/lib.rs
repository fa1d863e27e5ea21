//! MusicVerse Mixer - Mixer state model
//!
//! Implements the mixer side of the studio:
//! - Per-stem volume, mute, solo and pan snapshots
//! - Bounded linear undo/redo over snapshots
//! - Keyboard shortcut mapping for undo/redo

pub mod history;
pub mod shortcuts;
pub mod snapshot;

pub use history::{HistoryPosition, HistoryStatus, MixerHistory};
pub use shortcuts::{resolve_shortcut, FocusContext, HistoryCommand, KeyChord};
pub use snapshot::{MixerSnapshot, StemState};
