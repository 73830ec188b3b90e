// OS keyring storage backend.
//
// Each key is one keyring entry under the `telesync` service, named
// `<profile>/<key>`, holding the JSON-encoded value.

use serde_json::Value;
use tracing::debug;

use telesync_core::{Storage, StorageError};

/// Keyring service name for every telesync entry.
pub const KEYRING_SERVICE: &str = "telesync";

#[derive(Debug, Clone)]
pub struct KeyringStorage {
    profile: String,
}

impl KeyringStorage {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    /// Keyring user name for `key` in this profile.
    pub fn entry_name(&self, key: &str) -> String {
        format!("{}/{key}", self.profile)
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, StorageError> {
        keyring::Entry::new(KEYRING_SERVICE, &self.entry_name(key)).map_err(|e| backend(key, &e))
    }
}

fn backend(key: &str, err: &keyring::Error) -> StorageError {
    StorageError::Backend(format!("keyring entry '{key}': {err}"))
}

impl Storage for KeyringStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let secret = match self.entry(key)?.get_password() {
            Ok(secret) => secret,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => return Err(backend(key, &e)),
        };

        serde_json::from_str(&secret)
            .map(Some)
            .map_err(|e| StorageError::Decode {
                key: key.to_owned(),
                reason: e.to_string(),
            })
    }

    fn set(&self, key: &str, value: Option<Value>) -> Result<(), StorageError> {
        let entry = self.entry(key)?;
        match value {
            Some(value) => {
                entry
                    .set_password(&value.to_string())
                    .map_err(|e| backend(key, &e))?;
                debug!(entry = %self.entry_name(key), "keyring entry stored");
            }
            None => match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => return Err(backend(key, &e)),
            },
        }
        Ok(())
    }
}
