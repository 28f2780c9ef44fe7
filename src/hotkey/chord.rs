//! Hotkey chord: the set of keys that toggles automation

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use tracing::warn;

use super::keys::KeyToken;

/// Text stored for an empty chord
pub const NONE_TEXT: &str = "NONE";

/// Separator between key names in the stored text
const SEPARATOR: &str = " + ";

/// Largest chord the recorder and matcher support
pub const MAX_CHORD_KEYS: usize = 2;

/// An unordered set of up to two distinct keys. Empty means no hotkey.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HotkeyChord {
    keys: BTreeSet<KeyToken>,
}

impl HotkeyChord {
    /// Chord with no keys (hotkey disabled)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a chord from keys. Returns `None` if there are more than
    /// [`MAX_CHORD_KEYS`] distinct keys.
    pub fn from_keys<I: IntoIterator<Item = KeyToken>>(keys: I) -> Option<Self> {
        let keys: BTreeSet<KeyToken> = keys.into_iter().collect();
        (keys.len() <= MAX_CHORD_KEYS).then_some(Self { keys })
    }

    /// Parse the stored text form. Unknown key names are skipped; a chord
    /// with too many keys loads as empty.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() || text == NONE_TEXT {
            return Self::empty();
        }

        let keys = text.split(SEPARATOR).filter_map(|name| {
            let key = KeyToken::from_name(name.trim());
            if key.is_none() {
                warn!(name, "skipping unknown key name in hotkey");
            }
            key
        });

        Self::from_keys(keys).unwrap_or_else(|| {
            warn!(text, "hotkey has more than {MAX_CHORD_KEYS} keys, ignoring it");
            Self::empty()
        })
    }

    /// Whether no hotkey is configured
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of keys in the chord
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Exactly these keys are held: same size and every chord key present
    pub fn matches_exactly(&self, pressed: &HashSet<KeyToken>) -> bool {
        !self.is_empty()
            && pressed.len() == self.len()
            && self.keys.iter().all(|k| pressed.contains(k))
    }
}

impl fmt::Display for HotkeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str(NONE_TEXT);
        }
        let names: Vec<String> = self.keys.iter().map(KeyToken::name).collect();
        f.write_str(&names.join(SEPARATOR))
    }
}
