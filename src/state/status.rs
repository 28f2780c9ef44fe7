//! Status surface read by the presentation layer
//!
//! Several tasks publish into one board: the orchestrator owns `running`,
//! the feature loops own the delay and countdown, and the hotkey service
//! owns listener health and chord fields.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Health of the global key listener as shown to the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerHealth {
    #[default]
    NotInitialized,
    Running,
    Stopped,
    Restarting,
}

impl fmt::Display for ListenerHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerHealth::NotInitialized => write!(f, "Not Initialized"),
            ListenerHealth::Running => write!(f, "Running"),
            ListenerHealth::Stopped => write!(f, "Stopped"),
            ListenerHealth::Restarting => write!(f, "Restarting…"),
        }
    }
}

/// Point-in-time view of the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Automation is running
    pub running: bool,
    /// Most recent delay drawn by the clicking loop
    pub click_delay_ms: u64,
    /// Seconds until the next chat feed command, if the feed loop is counting
    pub feed_countdown: Option<u32>,
    pub listener: ListenerHealth,
    /// Hotkey text, or the tentative chord while recording
    pub hotkey: String,
    /// Held keys equal the chord
    pub chord_matched: bool,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            running: false,
            click_delay_ms: 0,
            feed_countdown: None,
            listener: ListenerHealth::NotInitialized,
            hotkey: crate::hotkey::HotkeyChord::empty().to_string(),
            chord_matched: false,
        }
    }
}

impl StatusSnapshot {
    /// Countdown as displayed: seconds, or `--` when inactive
    pub fn feed_countdown_text(&self) -> String {
        match self.feed_countdown {
            Some(secs) => format!("{secs}s"),
            None => "--".to_string(),
        }
    }
}

/// Shared, observable status
#[derive(Debug)]
pub struct StatusBoard {
    tx: watch::Sender<StatusSnapshot>,
}

impl StatusBoard {
    pub fn new() -> Arc<Self> {
        let (tx, _) = watch::channel(StatusSnapshot::default());
        Arc::new(Self { tx })
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    /// Receive a notification on every change
    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    fn modify(&self, f: impl FnOnce(&mut StatusSnapshot) -> bool) {
        self.tx.send_if_modified(f);
    }

    pub fn set_running(&self, running: bool) {
        self.modify(|s| std::mem::replace(&mut s.running, running) != running);
    }

    pub fn set_click_delay(&self, delay_ms: u64) {
        self.modify(|s| std::mem::replace(&mut s.click_delay_ms, delay_ms) != delay_ms);
    }

    pub fn set_feed_countdown(&self, secs: Option<u32>) {
        self.modify(|s| std::mem::replace(&mut s.feed_countdown, secs) != secs);
    }

    /// Clear the per-run display fields
    pub fn reset_display(&self) {
        self.modify(|s| {
            let changed = s.click_delay_ms != 0 || s.feed_countdown.is_some();
            s.click_delay_ms = 0;
            s.feed_countdown = None;
            changed
        });
    }

    pub fn set_listener(&self, health: ListenerHealth) {
        self.modify(|s| std::mem::replace(&mut s.listener, health) != health);
    }

    pub fn set_hotkey(&self, text: String) {
        self.modify(|s| {
            if s.hotkey == text {
                return false;
            }
            s.hotkey = text;
            true
        });
    }

    pub fn set_chord_matched(&self, matched: bool) {
        self.modify(|s| std::mem::replace(&mut s.chord_matched, matched) != matched);
    }
}
