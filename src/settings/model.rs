//! User settings and per-feature parameters
//!
//! Numeric settings are kept as the text the user entered. They are only
//! parsed when a feature loop starts, and a loop that finds bad text resets
//! its own settings to the defaults below.

use std::ops::RangeInclusive;

use crate::hotkey::HotkeyChord;

use super::store::SettingsMap;

/// Keys in the order they are written to the settings file
pub const KEYS: [&str; 13] = [
    "hotkey",
    "feed",
    "afk",
    "circle",
    "walk",
    "spins",
    "drift",
    "walk_min",
    "walk_max",
    "walk_duration_min",
    "walk_duration_max",
    "min_delay",
    "max_delay",
];

pub const DEFAULT_SPINS: &str = "10";
pub const DEFAULT_DRIFT: &str = "2";
pub const DEFAULT_WALK_MIN: &str = "3";
pub const DEFAULT_WALK_MAX: &str = "10";
pub const DEFAULT_WALK_DURATION_MIN: &str = "50";
pub const DEFAULT_WALK_DURATION_MAX: &str = "150";
pub const DEFAULT_MIN_DELAY: &str = "100";
pub const DEFAULT_MAX_DELAY: &str = "300";

/// Errors in user settings
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("{key} is not a valid number: {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{min_key} ({min}) is greater than {max_key} ({max})")]
    InvertedRange {
        min_key: &'static str,
        max_key: &'static str,
        min: u64,
        max: u64,
    },

    #[error("unknown setting {0:?}")]
    UnknownKey(String),

    #[error("{0} must be a single line")]
    LineBreak(String),
}

/// All user-editable settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub hotkey: HotkeyChord,
    pub feed: bool,
    pub afk: bool,
    pub circle: bool,
    pub walk: bool,
    pub spins: String,
    pub drift: String,
    pub walk_min: String,
    pub walk_max: String,
    pub walk_duration_min: String,
    pub walk_duration_max: String,
    pub min_delay: String,
    pub max_delay: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hotkey: HotkeyChord::empty(),
            feed: false,
            afk: false,
            circle: false,
            walk: false,
            spins: DEFAULT_SPINS.into(),
            drift: DEFAULT_DRIFT.into(),
            walk_min: DEFAULT_WALK_MIN.into(),
            walk_max: DEFAULT_WALK_MAX.into(),
            walk_duration_min: DEFAULT_WALK_DURATION_MIN.into(),
            walk_duration_max: DEFAULT_WALK_DURATION_MAX.into(),
            min_delay: DEFAULT_MIN_DELAY.into(),
            max_delay: DEFAULT_MAX_DELAY.into(),
        }
    }
}

/// Inclusive bounds for a uniformly drawn duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: u64,
    pub max: u64,
}

impl Bounds {
    pub fn range(&self) -> RangeInclusive<u64> {
        self.min..=self.max
    }
}

/// Circular click pattern parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircleParams {
    /// Full revolutions before the center drifts
    pub spins_before_drift: u32,
    /// Center shift on both axes after each drift
    pub drift: i32,
}

/// Clicking loop parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickParams {
    /// Delay between clicks, milliseconds
    pub delay_ms: Bounds,
    /// Present when circular mode is enabled
    pub circle: Option<CircleParams>,
}

/// Walk loop parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkParams {
    /// Time between walk cycles, seconds
    pub interval_secs: Bounds,
    /// How long each key is held, milliseconds
    pub hold_ms: Bounds,
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, SettingsError> {
    value.trim().parse().map_err(|_| SettingsError::InvalidNumber {
        key,
        value: value.to_string(),
    })
}

fn parse_bounds(
    (min_key, min): (&'static str, &str),
    (max_key, max): (&'static str, &str),
) -> Result<Bounds, SettingsError> {
    let min: u64 = parse_number(min_key, min)?;
    let max: u64 = parse_number(max_key, max)?;
    if min > max {
        return Err(SettingsError::InvertedRange {
            min_key,
            max_key,
            min,
            max,
        });
    }
    Ok(Bounds { min, max })
}

impl Settings {
    /// Build settings from stored pairs. Missing keys take defaults.
    pub fn from_map(map: &SettingsMap) -> Self {
        let mut settings = Self::default();
        for (key, value) in map {
            // unknown keys in the file are ignored
            let _ = settings.set(key, value);
        }
        settings
    }

    /// Pairs in file order
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        KEYS.iter().map(|key| (*key, self.get(key).unwrap_or_default())).collect()
    }

    /// Text value of one setting
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "hotkey" => self.hotkey.to_string(),
            "feed" => self.feed.to_string(),
            "afk" => self.afk.to_string(),
            "circle" => self.circle.to_string(),
            "walk" => self.walk.to_string(),
            "spins" => self.spins.clone(),
            "drift" => self.drift.clone(),
            "walk_min" => self.walk_min.clone(),
            "walk_max" => self.walk_max.clone(),
            "walk_duration_min" => self.walk_duration_min.clone(),
            "walk_duration_max" => self.walk_duration_max.clone(),
            "min_delay" => self.min_delay.clone(),
            "max_delay" => self.max_delay.clone(),
            _ => return None,
        };
        Some(value)
    }

    /// Set one setting from its text value. Flags are on only for `"true"`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        // the store holds one `key=value` pair per line
        if value.contains(['\n', '\r']) {
            return Err(SettingsError::LineBreak(key.to_string()));
        }

        let flag = value == "true";
        match key {
            "hotkey" => self.hotkey = HotkeyChord::parse(value),
            "feed" => self.feed = flag,
            "afk" => self.afk = flag,
            "circle" => self.circle = flag,
            "walk" => self.walk = flag,
            "spins" => self.spins = value.to_string(),
            "drift" => self.drift = value.to_string(),
            "walk_min" => self.walk_min = value.to_string(),
            "walk_max" => self.walk_max = value.to_string(),
            "walk_duration_min" => self.walk_duration_min = value.to_string(),
            "walk_duration_max" => self.walk_duration_max = value.to_string(),
            "min_delay" => self.min_delay = value.to_string(),
            "max_delay" => self.max_delay = value.to_string(),
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Parameters for the clicking loop, in the current mode
    pub fn click_params(&self) -> Result<ClickParams, SettingsError> {
        let delay_ms = parse_bounds(
            ("min_delay", &self.min_delay),
            ("max_delay", &self.max_delay),
        )?;
        let circle = if self.circle {
            Some(CircleParams {
                spins_before_drift: parse_number("spins", &self.spins)?,
                drift: parse_number("drift", &self.drift)?,
            })
        } else {
            None
        };
        Ok(ClickParams { delay_ms, circle })
    }

    /// Parameters for the walk loop
    pub fn walk_params(&self) -> Result<WalkParams, SettingsError> {
        let interval_secs =
            parse_bounds(("walk_min", &self.walk_min), ("walk_max", &self.walk_max))?;
        let hold_ms = parse_bounds(
            ("walk_duration_min", &self.walk_duration_min),
            ("walk_duration_max", &self.walk_duration_max),
        )?;
        Ok(WalkParams {
            interval_secs,
            hold_ms,
        })
    }

    /// Restore clicking defaults; circular mode also restores spins and drift
    pub fn reset_click(&mut self) {
        self.min_delay = DEFAULT_MIN_DELAY.into();
        self.max_delay = DEFAULT_MAX_DELAY.into();
        if self.circle {
            self.spins = DEFAULT_SPINS.into();
            self.drift = DEFAULT_DRIFT.into();
        }
    }

    /// Restore walk defaults
    pub fn reset_walk(&mut self) {
        self.walk_min = DEFAULT_WALK_MIN.into();
        self.walk_max = DEFAULT_WALK_MAX.into();
        self.walk_duration_min = DEFAULT_WALK_DURATION_MIN.into();
        self.walk_duration_max = DEFAULT_WALK_DURATION_MAX.into();
    }
}
