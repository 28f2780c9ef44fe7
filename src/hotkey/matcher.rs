//! Detects the configured chord in the stream of held keys

use std::collections::HashSet;

use tracing::debug;

use super::chord::HotkeyChord;
use super::keys::KeyToken;

/// Tracks held keys and reports when the chord becomes exactly held
#[derive(Debug, Default)]
pub struct HotkeyMatcher {
    /// Active chord; empty disables matching
    chord: HotkeyChord,
    /// Keys currently held down
    pressed: HashSet<KeyToken>,
    /// Whether the held keys equal the chord after the last event
    matched: bool,
}

impl HotkeyMatcher {
    /// Create a matcher for `chord`
    pub fn new(chord: HotkeyChord) -> Self {
        Self {
            chord,
            ..Self::default()
        }
    }

    /// Replace the chord. Held keys are kept.
    pub fn set_chord(&mut self, chord: HotkeyChord) {
        self.chord = chord;
        self.matched = self.chord.matches_exactly(&self.pressed);
    }

    /// The active chord
    pub fn chord(&self) -> &HotkeyChord {
        &self.chord
    }

    /// Whether the held keys matched the chord after the last event
    pub fn is_matched(&self) -> bool {
        self.matched
    }

    /// Keys currently held
    #[cfg(test)]
    pub fn pressed(&self) -> &HashSet<KeyToken> {
        &self.pressed
    }

    /// Forget every held key (listener restarted)
    pub fn reset(&mut self) {
        self.pressed.clear();
        self.matched = false;
    }

    /// Handle a key press. Returns `true` when a toggle should fire.
    ///
    /// Only a press that adds a new key can fire, so auto-repeat while the
    /// chord is held never toggles twice.
    pub fn on_press(&mut self, key: KeyToken) -> bool {
        let newly_held = self.pressed.insert(key);
        if self.chord.is_empty() {
            return false;
        }

        self.matched = self.chord.matches_exactly(&self.pressed);
        let fire = newly_held && self.matched;
        if fire {
            debug!(chord = %self.chord, "hotkey chord matched");
        }
        fire
    }

    /// Handle a key release
    pub fn on_release(&mut self, key: KeyToken) {
        self.pressed.remove(&key);
        if !self.chord.is_empty() {
            self.matched = self.chord.matches_exactly(&self.pressed);
        }
    }
}
