//! Shared, persisted settings
//!
//! Every change is written back to the store immediately. Store failures are
//! logged and otherwise ignored; the in-memory settings stay authoritative.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::hotkey::HotkeyChord;

use super::model::Settings;
use super::store::{ConfigStore, StoreError};

/// Cloneable handle to the current settings and their store
#[derive(Clone)]
pub struct SettingsHandle {
    settings: Arc<Mutex<Settings>>,
    store: Arc<dyn ConfigStore>,
}

impl SettingsHandle {
    /// Load settings from `store`. A missing or unreadable store yields
    /// defaults, which are written back immediately.
    pub fn load(store: Arc<dyn ConfigStore>) -> Self {
        let settings = match store.load() {
            Ok(map) => Settings::from_map(&map),
            Err(StoreError::NotFound(path)) => {
                info!(?path, "no settings file, creating one with defaults");
                Settings::default()
            }
            Err(e) => {
                warn!(?e, "failed to load settings, using defaults");
                Settings::default()
            }
        };

        let handle = Self {
            settings: Arc::new(Mutex::new(settings)),
            store,
        };
        // rewrite so the file always holds every key
        handle.persist(&handle.lock());
        handle
    }

    fn lock(&self) -> MutexGuard<'_, Settings> {
        self.settings.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, settings: &Settings) {
        if let Err(e) = self.store.save(&settings.to_pairs()) {
            warn!(?e, "failed to save settings");
        }
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> Settings {
        self.lock().clone()
    }

    /// Modify settings and persist the result
    pub fn update<R>(&self, f: impl FnOnce(&mut Settings) -> R) -> R {
        let mut settings = self.lock();
        let result = f(&mut settings);
        self.persist(&settings);
        result
    }

    /// The stored hotkey chord
    pub fn hotkey(&self) -> HotkeyChord {
        self.lock().hotkey.clone()
    }

    /// Replace the hotkey chord and persist it
    pub fn set_hotkey(&self, chord: HotkeyChord) {
        self.update(|s| s.hotkey = chord);
    }
}
