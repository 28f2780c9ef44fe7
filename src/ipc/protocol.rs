//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::events::StateEvent;
use crate::state::StatusSnapshot;

/// Largest accepted message body
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Requests from UI to daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Flip automation between Idle and Running
    Toggle,

    /// Start automation; no-op when already running
    Start,

    /// Stop automation; no-op when already idle
    Stop,

    /// Learn a new hotkey from the next keys pressed
    RecordHotkey,

    /// Request every user setting as text
    GetSettings,

    /// Change one user setting
    SetSetting { key: String, value: String },

    /// Subscribe to state change notifications
    Subscribe,
}

/// Responses from daemon to UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// The command was queued
    Accepted,

    /// Every user setting, by key
    Settings { settings: BTreeMap<String, String> },

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// State event occurred
    Event { event: StateEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Automation is running
    pub running: bool,

    /// Most recent click delay
    pub click_delay_ms: u64,

    /// Seconds until the next feed command, or `--`
    pub feed_countdown: String,

    /// Key listener health as displayed
    pub listener: String,

    /// Configured hotkey, or the chord being recorded
    pub hotkey: String,

    /// Held keys equal the hotkey
    pub chord_matched: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl DaemonStatus {
    pub fn from_snapshot(snapshot: &StatusSnapshot, uptime_secs: u64) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            running: snapshot.running,
            click_delay_ms: snapshot.click_delay_ms,
            feed_countdown: snapshot.feed_countdown_text(),
            listener: snapshot.listener.to_string(),
            hotkey: snapshot.hotkey.clone(),
            chord_matched: snapshot.chord_matched,
            uptime_secs,
        }
    }
}
