//! Profile resolution for the CLI: config file, profile selection and
//! command-line overrides, ending in a ready `SyncClient`.

use std::path::PathBuf;

use telesync_config::{Config, Profile, StorageKind};
use telesync_core::SyncClient;
use tracing::debug;

use crate::cli::{GlobalOpts, StorageArg};
use crate::error::CliError;

impl From<StorageArg> for StorageKind {
    fn from(arg: StorageArg) -> Self {
        match arg {
            StorageArg::File => Self::File,
            StorageArg::Keyring => Self::Keyring,
            StorageArg::Memory => Self::Memory,
        }
    }
}

/// Config file in use: `--config` / `TELESYNC_CONFIG`, else the platform path.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(telesync_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(telesync_config::load_config_from(&config_file(global))?)
}

/// Pick the active profile and apply command-line overrides.
///
/// A profile missing from the file is synthesized when `--app-id` is
/// given, so one-off invocations work without `config init`.
pub fn resolve_profile(global: &GlobalOpts, cfg: &Config) -> Result<(String, Profile), CliError> {
    let name = cfg.profile_name(global.profile.as_deref());

    let mut profile = match (cfg.profiles.get(&name), &global.app_id) {
        (Some(profile), _) => profile.clone(),
        (None, Some(app_id)) => Profile::new(app_id.clone()),
        (None, None) => {
            let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
            available.sort();
            return Err(CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
    };

    if let Some(ref app_id) = global.app_id {
        profile.app_id.clone_from(app_id);
    }
    if let Some(ref url) = global.api_url {
        profile.api_url.clone_from(url);
    }
    if let Some(storage) = global.storage {
        profile.storage = storage.into();
    }
    if let Some(ref dir) = global.data_dir {
        profile.data_dir = Some(dir.clone());
    }

    Ok((name, profile))
}

/// Build a client for the active profile.
pub fn build_client(global: &GlobalOpts) -> Result<(String, SyncClient), CliError> {
    let cfg = load(global)?;
    let (name, profile) = resolve_profile(global, &cfg)?;
    let client_config = telesync_config::profile_to_client_config(&profile, &cfg.defaults)?;

    debug!(
        profile = %name,
        api_url = %client_config.api_url,
        storage = ?profile.storage,
        "building client"
    );

    let storage = telesync_config::open_storage(&profile, &name);
    let client = SyncClient::new(client_config, storage)?;
    Ok((name, client))
}
