//! Undo/redo history for mixer snapshots.
//!
//! Linear history with a cursor. Recording after an undo discards the
//! undone entries; there is no branching. The oldest entries are evicted
//! once the configured depth is exceeded.

use crossbeam_channel::{Receiver, Sender};
use musicverse_core::{defaults, Result, StudioError};
use std::collections::VecDeque;
use tracing::debug;

use crate::shortcuts::HistoryCommand;
use crate::snapshot::MixerSnapshot;

// ── Position ────────────────────────────────────────────────────

/// Where the cursor sits in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPosition {
    /// Nothing recorded.
    Empty,
    /// At the first entry; nothing to undo.
    AtStart,
    /// Both undo and redo are possible.
    Middle,
    /// At the newest entry; nothing to redo.
    AtEnd,
}

/// Change notification sent to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryStatus {
    pub can_undo: bool,
    pub can_redo: bool,
    pub len: usize,
    pub index: Option<usize>,
}

// ── History ─────────────────────────────────────────────────────

/// Bounded linear undo/redo over mixer snapshots.
#[derive(Debug)]
pub struct MixerHistory {
    /// Recorded snapshots, oldest first.
    entries: VecDeque<MixerSnapshot>,
    /// Cursor into `entries`; `None` when empty.
    index: Option<usize>,
    /// Maximum history depth.
    max_entries: usize,
    subscribers: Vec<Sender<HistoryStatus>>,
}

impl MixerHistory {
    /// Create an empty history holding at most `max_entries` snapshots.
    pub fn new(max_entries: usize) -> Result<Self> {
        if max_entries == 0 {
            return Err(StudioError::InvalidArgument(
                "history depth must be greater than zero".into(),
            ));
        }
        Ok(Self {
            entries: VecDeque::with_capacity(max_entries.min(64)),
            index: None,
            max_entries,
            subscribers: Vec::new(),
        })
    }

    /// Record a committed mixer state.
    ///
    /// Discards anything after the cursor, appends a copy of `snapshot`, and
    /// moves the cursor onto it. Malformed snapshots are rejected untouched.
    pub fn record(&mut self, snapshot: &MixerSnapshot) -> Result<()> {
        snapshot.validate()?;

        let keep = self.index.map_or(0, |i| i + 1);
        self.entries.truncate(keep);
        self.entries.push_back(snapshot.clone());

        if self.entries.len() > self.max_entries {
            self.entries.pop_front();
            debug!(max = self.max_entries, "Evicted oldest mixer snapshot");
        }
        self.index = Some(self.entries.len() - 1);

        self.notify();
        Ok(())
    }

    /// Step back one entry. `None` when there is nothing earlier.
    pub fn undo(&mut self) -> Option<MixerSnapshot> {
        let index = self.index.filter(|&i| i > 0)? - 1;
        self.index = Some(index);
        self.notify();
        self.entries.get(index).cloned()
    }

    /// Step forward one entry. `None` when already at the newest.
    pub fn redo(&mut self) -> Option<MixerSnapshot> {
        let index = self.index.filter(|&i| i + 1 < self.entries.len())? + 1;
        self.index = Some(index);
        self.notify();
        self.entries.get(index).cloned()
    }

    /// Run an undo or redo command.
    pub fn apply_command(&mut self, command: HistoryCommand) -> Option<MixerSnapshot> {
        match command {
            HistoryCommand::Undo => self.undo(),
            HistoryCommand::Redo => self.redo(),
        }
    }

    /// Check if undo is available.
    pub fn can_undo(&self) -> bool {
        matches!(self.index, Some(i) if i > 0)
    }

    /// Check if redo is available.
    pub fn can_redo(&self) -> bool {
        matches!(self.index, Some(i) if i + 1 < self.entries.len())
    }

    /// Drop all history.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = None;
        self.notify();
    }

    /// Number of recorded snapshots.
    pub fn history_len(&self) -> usize {
        self.entries.len()
    }

    /// Cursor position, `None` when empty.
    pub fn current_index(&self) -> Option<usize> {
        self.index
    }

    /// Snapshot under the cursor.
    pub fn current(&self) -> Option<&MixerSnapshot> {
        self.index.and_then(|i| self.entries.get(i))
    }

    pub fn position(&self) -> HistoryPosition {
        match self.index {
            None => HistoryPosition::Empty,
            Some(0) => HistoryPosition::AtStart,
            Some(i) if i + 1 == self.entries.len() => HistoryPosition::AtEnd,
            Some(_) => HistoryPosition::Middle,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn status(&self) -> HistoryStatus {
        HistoryStatus {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            len: self.entries.len(),
            index: self.index,
        }
    }

    /// Receive a [`HistoryStatus`] after every change.
    pub fn subscribe(&mut self) -> Receiver<HistoryStatus> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let status = self.status();
        self.subscribers.retain(|tx| tx.send(status).is_ok());
    }
}

impl Default for MixerHistory {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
            index: None,
            max_entries: defaults::HISTORY_MAX_ENTRIES,
            subscribers: Vec::new(),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
