//! Keyboard bindings for mixer undo/redo.
//!
//! Ctrl/Cmd+Z undoes, Ctrl/Cmd+Shift+Z or Ctrl/Cmd+Y redoes. Nothing fires
//! while a text field has focus so native text undo keeps working.

use serde::{Deserialize, Serialize};

/// A history navigation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryCommand {
    Undo,
    Redo,
}

/// What currently holds keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusContext {
    #[default]
    Canvas,
    /// A text input or text area.
    TextInput,
}

/// A key press with its modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyChord {
    /// Key as reported by the platform (`"z"`, `"Z"`, `"y"`, ...).
    pub key: String,
    pub ctrl: bool,
    /// Cmd on macOS, Win elsewhere.
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyChord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    fn primary(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Map a key press to a history command.
pub fn resolve_shortcut(chord: &KeyChord, focus: FocusContext) -> Option<HistoryCommand> {
    if focus == FocusContext::TextInput || !chord.primary() || chord.alt {
        return None;
    }
    match chord.key.to_ascii_lowercase().as_str() {
        "z" if chord.shift => Some(HistoryCommand::Redo),
        "z" => Some(HistoryCommand::Undo),
        "y" => Some(HistoryCommand::Redo),
        _ => None,
    }
}
