// ── Credential store ──
//
// Owns the current device credential and the audit map of every
// credential this installation has been issued (device id -> token).

use std::collections::BTreeMap;
use std::sync::Arc;

use secrecy::ExposeSecret;
use telesync_api::Credential;
use tracing::info;

use crate::error::CoreError;
use crate::storage::{Storage, StorageExt, keys};

/// Cheaply cloneable handle over the persisted credentials.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// The credential requests are currently signed with.
    pub fn get(&self) -> Result<Option<Credential>, CoreError> {
        Ok(self.storage.load(keys::CURRENT_CREDENTIAL)?)
    }

    /// Replace (or clear, with `None`) the current credential.
    pub fn set(&self, credential: Option<&Credential>) -> Result<(), CoreError> {
        self.storage.store(keys::CURRENT_CREDENTIAL, credential)?;
        match credential {
            Some(c) => info!(device_id = %c.device_id, "credential stored"),
            None => info!("credential cleared"),
        }
        Ok(())
    }

    /// Add `credential` to the known-credentials map, replacing any
    /// earlier token for the same device id.
    pub fn remember(&self, credential: &Credential) -> Result<(), CoreError> {
        let mut all = self.tokens()?;
        all.insert(
            credential.device_id.clone(),
            credential.auth_token.expose_secret().to_owned(),
        );
        self.storage.store(keys::ALL_CREDENTIALS, Some(&all))?;
        Ok(())
    }

    /// Drop the entry for `credential`'s device id.
    pub fn forget(&self, credential: &Credential) -> Result<(), CoreError> {
        let mut all = self.tokens()?;
        if all.remove(&credential.device_id).is_some() {
            self.storage.store(keys::ALL_CREDENTIALS, Some(&all))?;
        }
        Ok(())
    }

    /// Every known credential, ordered by device id.
    pub fn all(&self) -> Result<Vec<Credential>, CoreError> {
        Ok(self
            .tokens()?
            .into_iter()
            .map(|(device_id, token)| Credential::new(device_id, token))
            .collect())
    }

    fn tokens(&self) -> Result<BTreeMap<String, String>, CoreError> {
        Ok(self
            .storage
            .load(keys::ALL_CREDENTIALS)?
            .unwrap_or_default())
    }
}
