//! Interactive chord learning
//!
//! The recorder watches raw press/release events while the user holds the
//! keys they want as a hotkey. A chord is finalized either when two keys are
//! held together or when a single key is pressed and released. Esc cancels.

use std::collections::HashSet;

use tracing::debug;

use super::chord::{HotkeyChord, MAX_CHORD_KEYS};
use super::keys::KeyToken;

/// Result of feeding one key event to the recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStep {
    /// Nothing to report yet
    Pending,
    /// Keys held so far, for live display
    Tentative(HotkeyChord),
    /// Recording finished with this chord
    Finished(HotkeyChord),
    /// The cancel key was pressed; the hotkey is cleared
    Cancelled,
}

/// Chord-learning state machine
#[derive(Debug, Default)]
pub struct HotkeyRecorder {
    /// Keys currently held during recording
    working: HashSet<KeyToken>,
    /// Last published tentative chord
    tentative: HotkeyChord,
    /// Whether a recording is in progress
    active: bool,
}

impl HotkeyRecorder {
    /// Create an idle recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new recording, discarding any recording in progress
    pub fn begin(&mut self) {
        self.working.clear();
        self.tentative = HotkeyChord::empty();
        self.active = true;
    }

    /// Abandon the recording without producing a chord
    pub fn abort(&mut self) {
        if self.active {
            debug!("hotkey recording aborted");
        }
        self.working.clear();
        self.tentative = HotkeyChord::empty();
        self.active = false;
    }

    /// Whether a recording is in progress
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Handle a key press during recording
    pub fn on_press(&mut self, key: KeyToken) -> RecordStep {
        if !self.active {
            return RecordStep::Pending;
        }
        self.working.insert(key);

        if key == KeyToken::CANCEL {
            self.abort();
            return RecordStep::Cancelled;
        }

        if (1..=MAX_CHORD_KEYS).contains(&self.working.len()) {
            let Some(chord) = HotkeyChord::from_keys(self.working.iter().copied()) else {
                return RecordStep::Pending;
            };
            self.tentative = chord.clone();
            if chord.len() == MAX_CHORD_KEYS {
                self.finish();
                return RecordStep::Finished(chord);
            }
            return RecordStep::Tentative(chord);
        }

        RecordStep::Pending
    }

    /// Handle a key release during recording
    pub fn on_release(&mut self, key: KeyToken) -> RecordStep {
        if !self.active {
            return RecordStep::Pending;
        }
        self.working.remove(&key);

        if self.working.is_empty() && self.tentative.len() == 1 {
            let chord = std::mem::take(&mut self.tentative);
            self.finish();
            return RecordStep::Finished(chord);
        }

        RecordStep::Pending
    }

    fn finish(&mut self) {
        self.working.clear();
        self.tentative = HotkeyChord::empty();
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::keys::NamedKey;

    fn ctrl() -> KeyToken {
        NamedKey::Ctrl.into()
    }

    fn space() -> KeyToken {
        NamedKey::Space.into()
    }

    fn recording() -> HotkeyRecorder {
        let mut recorder = HotkeyRecorder::new();
        recorder.begin();
        recorder
    }

    #[test]
    fn test_inactive_recorder_ignores_keys() {
        let mut recorder = HotkeyRecorder::new();
        assert_eq!(recorder.on_press(ctrl()), RecordStep::Pending);
        assert_eq!(recorder.on_release(ctrl()), RecordStep::Pending);
        assert!(!recorder.is_active());
    }

    #[test]
    fn test_two_keys_finalize_on_second_press() {
        let mut recorder = recording();
        let first = recorder.on_press(ctrl());
        assert_eq!(first, RecordStep::Tentative(HotkeyChord::from_keys([ctrl()]).unwrap()));

        let second = recorder.on_press(space());
        assert_eq!(
            second,
            RecordStep::Finished(HotkeyChord::from_keys([ctrl(), space()]).unwrap())
        );
        assert!(!recorder.is_active());
    }

    #[test]
    fn test_single_key_finalizes_on_release() {
        let mut recorder = recording();
        recorder.on_press(KeyToken::character('f'));
        let step = recorder.on_release(KeyToken::character('f'));
        assert_eq!(
            step,
            RecordStep::Finished(HotkeyChord::from_keys([KeyToken::character('f')]).unwrap())
        );
        assert!(!recorder.is_active());
    }

    #[test]
    fn test_auto_repeat_does_not_grow_chord() {
        let mut recorder = recording();
        recorder.on_press(ctrl());
        let repeat = recorder.on_press(ctrl());
        assert_eq!(repeat, RecordStep::Tentative(HotkeyChord::from_keys([ctrl()]).unwrap()));
        assert!(recorder.is_active());
    }

    #[test]
    fn test_cancel_key_clears_regardless_of_held_keys() {
        let mut recorder = recording();
        recorder.on_press(ctrl());
        assert_eq!(recorder.on_press(KeyToken::CANCEL), RecordStep::Cancelled);
        assert!(!recorder.is_active());
    }

    #[test]
    fn test_cancel_as_first_key() {
        let mut recorder = recording();
        assert_eq!(recorder.on_press(KeyToken::CANCEL), RecordStep::Cancelled);
    }

    #[test]
    fn test_begin_discards_previous_recording() {
        let mut recorder = recording();
        recorder.on_press(ctrl());
        recorder.begin();
        // the earlier Ctrl press no longer counts
        let step = recorder.on_press(space());
        assert_eq!(step, RecordStep::Tentative(HotkeyChord::from_keys([space()]).unwrap()));
    }

    #[test]
    fn test_abort_leaves_nothing() {
        let mut recorder = recording();
        recorder.on_press(ctrl());
        recorder.abort();
        assert!(!recorder.is_active());
        assert_eq!(recorder.on_release(ctrl()), RecordStep::Pending);
    }
}
