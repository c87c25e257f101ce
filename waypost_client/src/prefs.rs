use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Durable user preferences: read once at startup, written on session
/// increment and configuration save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub user_id: String,
    pub session_count: u64,
    pub backend_url: String,
    pub poll_interval_secs: u64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            user_id: Uuid::new_v4().to_string(),
            session_count: 0,
            backend_url: String::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("failed to read preference file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write preference file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("preference file {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl PrefsError {
    fn path(&self) -> &PathBuf {
        match self {
            PrefsError::Read { path, .. }
            | PrefsError::Write { path, .. }
            | PrefsError::Malformed { path, .. } => path,
        }
    }
}

pub trait PreferenceStore: Send + Sync {
    fn load(&self) -> Result<Preferences, PrefsError>;
    fn store(&self, prefs: &Preferences) -> Result<(), PrefsError>;
}

/// JSON-file-backed preference store. A missing file yields defaults with
/// a freshly generated user id.
pub struct JsonPreferenceStore {
    path: PathBuf,
}

impl JsonPreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn load(&self) -> Result<Preferences, PrefsError> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|source| PrefsError::Read {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| PrefsError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    fn store(&self, prefs: &Preferences) -> Result<(), PrefsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| PrefsError::Write {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }
        let raw = serde_json::to_string_pretty(prefs).expect("preferences serialize");
        std::fs::write(&self.path, raw).map_err(|source| PrefsError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// In-memory store for tests and demos.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    inner: Mutex<Option<Preferences>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(prefs: Preferences) -> Self {
        Self {
            inner: Mutex::new(Some(prefs)),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<Preferences, PrefsError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_default())
    }

    fn store(&self, prefs: &Preferences) -> Result<(), PrefsError> {
        *self.inner.lock().unwrap() = Some(prefs.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> JsonPreferenceStore {
        let path = std::env::temp_dir().join(format!("waypost_prefs_{}.json", Uuid::new_v4()));
        JsonPreferenceStore::new(path)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let store = temp_store();
        let prefs = store.load().unwrap();
        assert_eq!(prefs.session_count, 0);
        assert_eq!(prefs.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
        assert!(!prefs.user_id.is_empty());
    }

    #[test]
    fn round_trip_persists_session_count() {
        let store = temp_store();
        let mut prefs = store.load().unwrap();
        prefs.session_count += 1;
        prefs.backend_url = "https://example.test/api/locations".to_string();
        store.store(&prefs).unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded, prefs);

        std::fs::remove_file(store.path).ok();
    }

    #[test]
    fn malformed_file_is_an_error() {
        let store = temp_store();
        std::fs::write(&store.path, "not json").unwrap();
        let err = store.load().unwrap_err();
        assert_eq!(err.path(), &store.path);
        std::fs::remove_file(&store.path).ok();
    }
}
