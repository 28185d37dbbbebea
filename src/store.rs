//! Key-value persistence for settings, the last location and the last
//! computed prayer times.
//!
//! `JsonFileStore` keeps one JSON object at `~/.miqat/store.json` and
//! rewrites it on every change (write to a sibling temp file, then rename).
//! Missing or corrupt files load as an empty store.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

use crate::schedule::PrayerTimeSet;

pub const USER_LOCATION: &str = "user_location";
pub const NOTIFICATION_SETTINGS: &str = "notification_settings";
pub const PRAYER_METHOD: &str = "prayer_method";
pub const APP_SETTINGS: &str = "app_settings";
pub const LAST_PRAYER_TIMES: &str = "last_prayer_times";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Stored value for '{key}' is malformed: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Cannot encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Minimal persistence contract. Values are JSON documents.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Typed read. `Ok(None)` for a missing key.
pub fn get_as<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>, StoreError> {
    store
        .get(key)
        .map(|v| serde_json::from_value(v).map_err(|source| StoreError::Malformed { key: key.to_string(), source }))
        .transpose()
}

pub fn set_as<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), StoreError> {
    let value = serde_json::to_value(value).map_err(|source| StoreError::Encode { key: key.to_string(), source })?;
    store.set(key, value)
}

/// Last computed prayer times, reused by callers within the same day.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedTimes {
    times: PrayerTimeSet,
}

pub fn save_last_prayer_times(store: &dyn KeyValueStore, times: &PrayerTimeSet) -> Result<(), StoreError> {
    set_as(store, LAST_PRAYER_TIMES, &CachedTimes { times: times.clone() })
}

/// The stored set if it was computed for `date`. Stale or malformed
/// entries read as `None`.
pub fn load_last_prayer_times(store: &dyn KeyValueStore, date: chrono::NaiveDate) -> Option<PrayerTimeSet> {
    match get_as::<CachedTimes>(store, LAST_PRAYER_TIMES) {
        Ok(Some(cached)) if cached.times.date == date => Some(cached.times),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "ignoring cached prayer times");
            None
        }
    }
}

/// File-backed store.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    /// Load from the default location (~/.miqat/store.json).
    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load from a specific path.
    pub fn load_from(path: PathBuf) -> Self {
        let entries = Self::read_file(&path).unwrap_or_default();
        Self { path, entries: Mutex::new(entries) }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".miqat")
            .join("store.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(path: &Path) -> Option<BTreeMap<String, Value>> {
        let data = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&data) {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "store file is corrupt, starting empty");
                None
            }
        }
    }

    fn persist(&self, entries: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        let io = |source| StoreError::Io { path: self.path.clone(), source };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        let json = serde_json::to_string_pretty(entries)
            .map_err(|source| StoreError::Encode { key: "*".into(), source })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io)?;
        fs::rename(&tmp, &self.path).map_err(io)
    }

    /// Apply `change` to a copy and keep it only once it is on disk.
    fn update(&self, change: impl FnOnce(&mut BTreeMap<String, Value>)) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = entries.clone();
        change(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.update(BTreeMap::clear)
    }
}

/// In-process store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(())
    }
}
