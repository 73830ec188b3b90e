//! Shared configuration for the telesync CLI.
//!
//! TOML profiles layered with `TELESYNC_` environment variables, storage
//! backend selection (file, OS keyring, memory) and translation into
//! `telesync_core::ClientConfig`.

mod keyring_storage;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use telesync_core::client::{DEFAULT_API_URL, DEFAULT_TRACKED_EVENT_TYPES};
use telesync_core::{Backoff, ClientConfig, FileStorage, MemoryStorage, Storage};

pub use keyring_storage::{KEYRING_SERVICE, KeyringStorage};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named application profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: explicit choice, then the configured
    /// default, then `"default"`.
    pub fn profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Application version reported in the device payload.
    #[serde(default = "default_app_version")]
    pub app_version: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            app_version: default_app_version(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}
fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}

/// Where a profile keeps its credential, push token and queued events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// JSON files under the profile's data directory.
    #[default]
    File,
    /// The OS keyring.
    Keyring,
    /// Process memory only.
    Memory,
}

/// A named application profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Service base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Application id assigned by the service.
    pub app_id: String,

    /// Advertising identifier reported with the device.
    pub advertising_id: Option<String>,

    /// Override the reported application version.
    pub app_version: Option<String>,

    #[serde(default)]
    pub storage: StorageKind,

    /// Override the data directory for file storage.
    pub data_dir: Option<PathBuf>,

    /// Override the request timeout (seconds).
    pub timeout: Option<u64>,

    /// Event types sent by `track`; defaults to launch and clickthru.
    pub tracked_event_types: Option<Vec<String>>,
}

impl Profile {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            api_url: default_api_url(),
            app_id: app_id.into(),
            advertising_id: None,
            app_version: None,
            storage: StorageKind::default(),
            data_dir: None,
            timeout: None,
            tracked_event_types: None,
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "telesync", "telesync")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default data directory for a profile's file storage.
pub fn data_dir(profile_name: &str) -> PathBuf {
    project_dirs()
        .map_or_else(dirs_fallback, |dirs| dirs.data_dir().to_path_buf())
        .join(profile_name)
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("telesync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full config from the canonical file and the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine) layered with `TELESYNC_` env
/// vars. Nested keys use a double underscore, e.g.
/// `TELESYNC_PROFILES__DEFAULT__APP_ID`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TELESYNC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ClientConfig` from a profile and the global defaults.
pub fn profile_to_client_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    if profile.app_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "app_id".into(),
            reason: "must not be empty".into(),
        });
    }

    let url: url::Url = profile
        .api_url
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("invalid URL: {}", profile.api_url),
        })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("expected http or https, got '{}'", url.scheme()),
        });
    }

    let tracked_event_types = profile.tracked_event_types.clone().unwrap_or_else(|| {
        DEFAULT_TRACKED_EVENT_TYPES
            .iter()
            .map(|&t| t.to_owned())
            .collect()
    });

    Ok(ClientConfig {
        app_id: profile.app_id.clone(),
        api_url: profile.api_url.clone(),
        advertising_id: profile.advertising_id.clone(),
        app_version: profile
            .app_version
            .clone()
            .unwrap_or_else(|| defaults.app_version.clone()),
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        backoff: Backoff::default(),
        tracked_event_types,
    })
}

/// Open the storage backend a profile asks for.
pub fn open_storage(profile: &Profile, profile_name: &str) -> Arc<dyn Storage> {
    match profile.storage {
        StorageKind::File => {
            let dir = profile
                .data_dir
                .clone()
                .unwrap_or_else(|| data_dir(profile_name));
            Arc::new(FileStorage::new(dir))
        }
        StorageKind::Keyring => Arc::new(KeyringStorage::new(profile_name)),
        StorageKind::Memory => Arc::new(MemoryStorage::new()),
    }
}
