//! Events module for daemon lifecycle notifications
//!
//! Structured events emitted by the orchestrator and hotkey service, fanned
//! out to logging and to subscribed IPC clients.

use serde::{Deserialize, Serialize};

use crate::features::Feature;

/// Events emitted as automation and the hotkey channel change state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    /// Automation entered Running with these features
    AutomationStarted { features: Vec<Feature> },

    /// Automation returned to Idle
    AutomationStopped {
        /// Duration in milliseconds that automation was running
        duration_ms: u64,
    },

    /// A feature loop exited before automation stopped
    FeatureExited { feature: Feature, reason: String },

    /// A feature found invalid settings and restored its defaults
    SettingsReset { feature: Feature },

    /// Hotkey recording began
    RecordingStarted,

    /// A new hotkey chord was recorded
    HotkeyRecorded { hotkey: String },

    /// Recording was cancelled; no hotkey is configured
    RecordingCancelled,

    /// The global key listener is up
    ListenerStarted,

    /// The global key listener failed to start or died
    ListenerFailed { reason: String },
}

impl std::fmt::Display for StateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateEvent::AutomationStarted { features } => {
                write!(f, "AUTOMATION_STARTED ({} features)", features.len())
            }
            StateEvent::AutomationStopped { duration_ms } => {
                write!(f, "AUTOMATION_STOPPED ({}ms)", duration_ms)
            }
            StateEvent::FeatureExited { feature, reason } => {
                write!(f, "FEATURE_EXITED ({}: {})", feature, reason)
            }
            StateEvent::SettingsReset { feature } => write!(f, "SETTINGS_RESET ({})", feature),
            StateEvent::RecordingStarted => write!(f, "RECORDING_STARTED"),
            StateEvent::HotkeyRecorded { hotkey } => write!(f, "HOTKEY_RECORDED ({})", hotkey),
            StateEvent::RecordingCancelled => write!(f, "RECORDING_CANCELLED"),
            StateEvent::ListenerStarted => write!(f, "LISTENER_STARTED"),
            StateEvent::ListenerFailed { reason } => write!(f, "LISTENER_FAILED ({})", reason),
        }
    }
}
