//! Input module: synthetic keyboard/pointer output and global key events
//!
//! The daemon only talks to the platform through the traits defined here.
//! Platform backends live in submodules; tests use the doubles in `testing`.

#[cfg(target_os = "macos")]
mod macos;
#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::hotkey::KeyToken;

/// Raw key event delivered by a global listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Pressed(KeyToken),
    Released(KeyToken),
}

/// Errors reported by input backends
#[derive(Debug, thiserror::Error)]
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub enum InputError {
    #[error("no input backend for platform {0}")]
    Unsupported(&'static str),

    #[error("failed to create event source")]
    EventSource,

    #[error("failed to post {0} event")]
    Post(&'static str),

    #[error("key {0} has no platform key code")]
    UnmappedKey(KeyToken),

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),
}

/// Synthetic keyboard and pointer output
pub trait InputPort: Send + Sync {
    fn press_key(&self, key: KeyToken) -> Result<(), InputError>;

    fn release_key(&self, key: KeyToken) -> Result<(), InputError>;

    /// Left click at the current pointer position
    fn click(&self) -> Result<(), InputError>;

    fn pointer_position(&self) -> Result<(f64, f64), InputError>;

    fn set_pointer_position(&self, x: f64, y: f64) -> Result<(), InputError>;

    /// Press and release a key
    fn tap_key(&self, key: KeyToken) -> Result<(), InputError> {
        self.press_key(key)?;
        self.release_key(key)
    }
}

/// A live global key subscription
pub trait ListenerHandle: Send {
    /// Whether the listener is still delivering events
    fn is_alive(&self) -> bool;

    /// Tear the subscription down. Idempotent.
    fn stop(&mut self);
}

/// Source of global key press/release events
///
/// Implementations deliver events by sending on `events`; the send must
/// never block the platform callback.
pub trait KeySource: Send + Sync {
    fn subscribe(
        &self,
        events: mpsc::UnboundedSender<KeyEvent>,
    ) -> Result<Box<dyn ListenerHandle>, InputError>;
}

/// Input backend for the current platform
pub struct Backend {
    pub output: Arc<dyn InputPort>,
    pub keys: Arc<dyn KeySource>,
}

/// Create the input backend for the platform we are running on
#[cfg(target_os = "macos")]
pub fn platform_backend() -> Result<Backend, InputError> {
    let output = Arc::new(macos::CgOutput::new()?);
    Ok(Backend {
        output,
        keys: Arc::new(macos::CgKeySource),
    })
}

/// Create the input backend for the platform we are running on
#[cfg(not(target_os = "macos"))]
pub fn platform_backend() -> Result<Backend, InputError> {
    Err(InputError::Unsupported(std::env::consts::OS))
}
