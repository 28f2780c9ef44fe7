//! Key identifiers shared by the recorder, matcher and input backends
//!
//! A key is either one of a fixed set of named keys or a character key.
//! Equality is by the key itself, never by its display name.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Keys that have a name rather than a character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Ctrl,
    Shift,
    Alt,
    Cmd,
    Enter,
    Esc,
    Tab,
    Backspace,
    CapsLock,
    Up,
    Down,
    Left,
    Right,
    /// Function key F1..=F12
    F(u8),
}

impl NamedKey {
    /// Display name used in the settings file and status surface
    pub fn name(&self) -> String {
        match self {
            NamedKey::Space => "Space".into(),
            NamedKey::Ctrl => "Ctrl".into(),
            NamedKey::Shift => "Shift".into(),
            NamedKey::Alt => "Alt".into(),
            NamedKey::Cmd => "Cmd".into(),
            NamedKey::Enter => "Enter".into(),
            NamedKey::Esc => "Esc".into(),
            NamedKey::Tab => "Tab".into(),
            NamedKey::Backspace => "Backspace".into(),
            NamedKey::CapsLock => "CapsLock".into(),
            NamedKey::Up => "Up".into(),
            NamedKey::Down => "Down".into(),
            NamedKey::Left => "Left".into(),
            NamedKey::Right => "Right".into(),
            NamedKey::F(n) => format!("F{n}"),
        }
    }

    /// Parse a display name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let key = match lower.as_str() {
            "space" => NamedKey::Space,
            "ctrl" | "control" => NamedKey::Ctrl,
            "shift" => NamedKey::Shift,
            "alt" | "option" => NamedKey::Alt,
            "cmd" | "command" => NamedKey::Cmd,
            "enter" | "return" => NamedKey::Enter,
            "esc" | "escape" => NamedKey::Esc,
            "tab" => NamedKey::Tab,
            "backspace" => NamedKey::Backspace,
            "capslock" => NamedKey::CapsLock,
            "up" => NamedKey::Up,
            "down" => NamedKey::Down,
            "left" => NamedKey::Left,
            "right" => NamedKey::Right,
            other => {
                let n: u8 = other.strip_prefix('f')?.parse().ok()?;
                if !(1..=12).contains(&n) {
                    return None;
                }
                NamedKey::F(n)
            }
        };
        Some(key)
    }
}

/// Identifies one physical key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyToken {
    /// A key with a name (Space, Ctrl, ...)
    Named(NamedKey),
    /// A character key, always stored lowercase
    Character(char),
}

impl KeyToken {
    /// The key that cancels a hotkey recording
    pub const CANCEL: KeyToken = KeyToken::Named(NamedKey::Esc);

    /// Character key, normalized to lowercase so Shift+a and a are the same key
    pub fn character(c: char) -> Self {
        KeyToken::Character(c.to_lowercase().next().unwrap_or(c))
    }

    /// Parse a display name. A single character is a character key.
    pub fn from_name(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (None, _) => None,
            (Some(c), None) if !c.is_whitespace() => Some(Self::character(c)),
            _ => NamedKey::from_name(name).map(KeyToken::Named),
        }
    }

    /// Display name for this key
    pub fn name(&self) -> String {
        match self {
            KeyToken::Named(key) => key.name(),
            KeyToken::Character(c) => c.to_string(),
        }
    }
}

impl From<NamedKey> for KeyToken {
    fn from(key: NamedKey) -> Self {
        KeyToken::Named(key)
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
