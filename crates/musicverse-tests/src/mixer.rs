//! Integration tests for mixer history as the mixer UI drives it.

use musicverse_core::ErrorKind;
use musicverse_mixer::{
    resolve_shortcut, FocusContext, HistoryPosition, KeyChord, MixerHistory, MixerSnapshot,
    StemState,
};

fn session_start() -> MixerSnapshot {
    MixerSnapshot::new()
        .with_stem("vocals", StemState::default())
        .with_stem("drums", StemState::default())
        .with_stem("bass", StemState::default())
}

#[test]
fn drag_end_commits_are_undoable_with_keyboard() {
    let mut history = MixerHistory::default();
    let mut live = session_start();
    history.record(&live).unwrap();

    // Volume slider released
    live.stem_mut("vocals").unwrap().volume = 0.4;
    history.record(&live).unwrap();
    // Mute toggled
    live.stem_mut("drums").unwrap().muted = true;
    history.record(&live).unwrap();

    let undo = resolve_shortcut(&KeyChord::new("z").ctrl(), FocusContext::Canvas).unwrap();
    let restored = history.apply_command(undo).unwrap();
    assert!(!restored.stem("drums").unwrap().muted);
    assert_eq!(restored.stem("vocals").unwrap().volume, 0.4);

    let redo = resolve_shortcut(&KeyChord::new("Z").meta().shift(), FocusContext::Canvas).unwrap();
    let restored = history.apply_command(redo).unwrap();
    assert!(restored.stem("drums").unwrap().muted);
    assert_eq!(history.position(), HistoryPosition::AtEnd);
}

#[test]
fn text_input_focus_leaves_history_alone() {
    let mut history = MixerHistory::default();
    history.record(&session_start()).unwrap();
    history
        .record(&session_start().with_stem("vocals", StemState::with_volume(0.1)))
        .unwrap();

    let chord = KeyChord::new("z").ctrl();
    assert!(resolve_shortcut(&chord, FocusContext::TextInput).is_none());
    assert_eq!(history.current_index(), Some(1));
}

#[test]
fn push_after_undo_discards_future() {
    let mut history = MixerHistory::default();
    let a = session_start();
    let b = a.clone().with_stem("bass", StemState::with_volume(0.2));
    let c = a.clone().with_stem("bass", StemState::with_volume(0.3));
    let d = a.clone().with_stem("bass", StemState::with_volume(0.9));

    for snapshot in [&a, &b, &c] {
        history.record(snapshot).unwrap();
    }
    assert_eq!(history.undo().unwrap(), b);
    assert_eq!(history.undo().unwrap(), a);
    history.record(&d).unwrap();

    assert_eq!(history.history_len(), 2);
    assert_eq!(history.current_index(), Some(1));
    assert_eq!(history.current(), Some(&d));
    assert_eq!(history.undo().unwrap(), a);
}

#[test]
fn snapshots_from_ui_json_are_validated() {
    let mut history = MixerHistory::default();
    let ok = r#"{"stems":{"vocals":{"volume":0.7,"muted":false,"solo":true,"pan":-0.5}},"master_volume":0.85}"#;
    history.record(&MixerSnapshot::from_json(ok).unwrap()).unwrap();

    let bad = r#"{"stems":{"vocals":{"volume":0.7,"muted":false,"solo":true,"pan":-3.0}}}"#;
    let err = MixerSnapshot::from_json(bad).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedSnapshot);
    assert_eq!(history.history_len(), 1);
}

#[test]
fn long_session_stays_bounded() {
    let mut history = MixerHistory::new(30).unwrap();
    for i in 0..100 {
        let snapshot = session_start().with_stem("vocals", StemState::with_volume(i as f32 / 100.0));
        history.record(&snapshot).unwrap();
        assert!(history.history_len() <= 30);
        assert_eq!(history.current_index(), Some(history.history_len() - 1));
    }
    let mut undone = 0;
    while history.undo().is_some() {
        undone += 1;
    }
    assert_eq!(undone, 29);
}
