// ── Key-value persistence ──
//
// The core keeps all durable state (credentials, push token, queued
// events) behind a small synchronous `Storage` trait holding JSON
// values by key. Backends here: an in-memory map and a
// one-file-per-key directory. The keyring backend lives in
// telesync-config.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Storage keys used by the core.
pub mod keys {
    pub const CURRENT_CREDENTIAL: &str = "current_credential";
    pub const ALL_CREDENTIALS: &str = "all_credentials";
    pub const PUSH_TOKEN: &str = "push_token";
    pub const PUSH_REGISTERED: &str = "push_registered";
    pub const EVENTS: &str = "events";
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("I/O error for key '{key}': {reason}")]
    Io { key: String, reason: String },

    #[error("Value for key '{key}' could not be decoded: {reason}")]
    Decode { key: String, reason: String },

    #[error("Value for key '{key}' could not be encoded: {reason}")]
    Encode { key: String, reason: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Synchronous key-value store of JSON values.
///
/// `set(key, None)` removes the key. Implementations must be safe to
/// share between the queue worker and callers.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    fn set(&self, key: &str, value: Option<Value>) -> Result<(), StorageError>;
}

/// Typed helpers over any [`Storage`], including `dyn Storage`.
pub trait StorageExt: Storage {
    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StorageError::Decode {
                    key: key.to_owned(),
                    reason: e.to_string(),
                }),
        }
    }

    fn store<T: Serialize>(&self, key: &str, value: Option<&T>) -> Result<(), StorageError> {
        let value = value
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StorageError::Encode {
                key: key.to_owned(),
                reason: e.to_string(),
            })?;
        self.set(key, value)
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

// ── MemoryStorage ────────────────────────────────────────────────────

/// Volatile storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: DashMap<String, Value>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: Option<Value>) -> Result<(), StorageError> {
        match value {
            Some(value) => {
                self.values.insert(key.to_owned(), value);
            }
            None => {
                self.values.remove(key);
            }
        }
        Ok(())
    }
}

// ── FileStorage ──────────────────────────────────────────────────────

/// One `<key>.json` file per key under a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so
/// a crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

fn io_error(key: &str, err: &std::io::Error) -> StorageError {
    StorageError::Io {
        key: key.to_owned(),
        reason: err.to_string(),
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let data = match std::fs::read(self.path(key)) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(key, &e)),
        };

        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| StorageError::Decode {
                key: key.to_owned(),
                reason: e.to_string(),
            })
    }

    fn set(&self, key: &str, value: Option<Value>) -> Result<(), StorageError> {
        let path = self.path(key);

        let Some(value) = value else {
            return match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(io_error(key, &e)),
            };
        };

        std::fs::create_dir_all(&self.dir).map_err(|e| io_error(key, &e))?;

        let data = serde_json::to_vec_pretty(&value).map_err(|e| StorageError::Encode {
            key: key.to_owned(),
            reason: e.to_string(),
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data).map_err(|e| io_error(key, &e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_error(key, &e))?;

        debug!(key, path = %path.display(), "stored value");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k"), Ok(None));

        storage.set("k", Some(json!({ "a": 1 }))).expect("set");
        assert_eq!(storage.get("k"), Ok(Some(json!({ "a": 1 }))));

        storage.set("k", None).expect("remove");
        assert!(storage.is_empty());
    }

    #[test]
    fn typed_helpers_round_trip_through_dyn_storage() {
        let storage: Box<dyn Storage> = Box::new(MemoryStorage::new());
        storage
            .store(keys::PUSH_TOKEN, Some(&"ABCD".to_string()))
            .expect("store");

        let token: Option<String> = storage.load(keys::PUSH_TOKEN).expect("load");
        assert_eq!(token.as_deref(), Some("ABCD"));

        storage.store::<String>(keys::PUSH_TOKEN, None).expect("clear");
        let token: Option<String> = storage.load(keys::PUSH_TOKEN).expect("load");
        assert!(token.is_none());
    }

    #[test]
    fn load_reports_decode_errors() {
        let storage = MemoryStorage::new();
        storage.set("flag", Some(json!("not a bool"))).expect("set");

        let result: Result<Option<bool>, _> = storage.load("flag");
        assert!(matches!(result, Err(StorageError::Decode { .. })));
    }

    #[test]
    fn file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state");

        FileStorage::new(&path)
            .set(keys::EVENTS, Some(json!([1, 2, 3])))
            .expect("set");

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get(keys::EVENTS), Ok(Some(json!([1, 2, 3]))));
        assert!(path.join("events.json").exists());
        assert!(!path.join("events.json.tmp").exists());
    }

    #[test]
    fn file_storage_remove_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path());

        storage.set("k", None).expect("remove missing");
        storage.set("k", Some(json!(true))).expect("set");
        storage.set("k", None).expect("remove");
        assert_eq!(storage.get("k"), Ok(None));
    }

    #[test]
    fn file_storage_reports_corrupt_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("k.json"), b"{nope").expect("write");

        let result = FileStorage::new(dir.path()).get("k");
        assert!(matches!(result, Err(StorageError::Decode { .. })));
    }
}
