//! Hotkey module: chord learning, matching and listener supervision
//!
//! Key events arrive from a global `KeySource` subscription and are consumed
//! by a single service task, which either records a new chord or matches the
//! configured one and dispatches toggles to the orchestrator.

mod chord;
mod keys;
mod listener;
mod matcher;
mod recorder;
mod service;

pub use chord::HotkeyChord;
pub use keys::{KeyToken, NamedKey};
pub use listener::ListenerTimings;
pub use service::{HotkeyCommand, HotkeyService};
