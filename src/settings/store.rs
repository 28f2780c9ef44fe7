//! Flat `key=value` persistence for user settings

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::Mutex;

use tracing::{debug, warn};

/// Raw settings as stored: key to text value
pub type SettingsMap = BTreeMap<String, String>;

/// Errors reading or writing the settings store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("settings file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Where user settings are loaded from and saved to
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<SettingsMap, StoreError>;

    /// Save pairs in the given order, one per line
    fn save(&self, pairs: &[(&str, String)]) -> Result<(), StoreError>;
}

/// Settings stored in a text file, one `key=value` per line
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_owned(),
        }
    }
}

impl ConfigStore for FileStore {
    fn load(&self) -> Result<SettingsMap, StoreError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                StoreError::NotFound(self.path.clone())
            } else {
                StoreError::Read {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        Ok(parse_pairs(&text))
    }

    fn save(&self, pairs: &[(&str, String)]) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut text = String::new();
        for (key, value) in pairs {
            text.push_str(key);
            text.push('=');
            text.push_str(value);
            text.push('\n');
        }
        std::fs::write(&self.path, text).map_err(write_err)?;

        debug!(path = ?self.path, "settings saved");
        Ok(())
    }
}

/// Parse `key=value` lines. Lines without `=` are skipped.
fn parse_pairs(text: &str) -> SettingsMap {
    let mut map = SettingsMap::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) => {
                map.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => warn!(line = index + 1, "skipping malformed settings line"),
        }
    }
    map
}

/// In-memory store
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<Option<Vec<(String, String)>>>,
    saves: Mutex<usize>,
    /// `load` fails with a read error
    unreadable: bool,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with pairs
    pub fn with_pairs(pairs: &[(&str, &str)]) -> Self {
        let saved = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            saved: Mutex::new(Some(saved)),
            ..Self::default()
        }
    }

    /// Store whose contents cannot be read
    pub fn unreadable() -> Self {
        Self {
            unreadable: true,
            ..Self::default()
        }
    }

    /// Number of times `save` was called
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Last saved value for `key`
    pub fn get(&self, key: &str) -> Option<String> {
        let saved = self.saved.lock().unwrap_or_else(|e| e.into_inner());
        saved
            .as_ref()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

#[cfg(test)]
impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<SettingsMap, StoreError> {
        if self.unreadable {
            return Err(StoreError::Read {
                path: PathBuf::from(":memory:"),
                source: std::io::Error::new(ErrorKind::InvalidData, "corrupt settings"),
            });
        }
        let saved = self.saved.lock().unwrap_or_else(|e| e.into_inner());
        match saved.as_ref() {
            Some(pairs) => Ok(pairs.iter().cloned().collect()),
            None => Err(StoreError::NotFound(PathBuf::from(":memory:"))),
        }
    }

    fn save(&self, pairs: &[(&str, String)]) -> Result<(), StoreError> {
        let owned = pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        *self.saved.lock().unwrap_or_else(|e| e.into_inner()) = Some(owned);
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
