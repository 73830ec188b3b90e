//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use telesync_config::ConfigError;
use telesync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the service: {reason}")]
    #[diagnostic(
        code(telesync::unreachable),
        help(
            "Check network access and the profile's api_url.\n\
             Pending events stay queued and are sent with the next track."
        )
    )]
    Unreachable { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {detail}")]
    #[diagnostic(
        code(telesync::auth_failed),
        help("The stored credential was rejected. Run: telesync register")
    )]
    AuthFailed { detail: String },

    #[error("No device credential stored for profile '{profile}'")]
    #[diagnostic(
        code(telesync::no_credentials),
        help("Register this device first with: telesync register")
    )]
    NoCredentials { profile: String },

    #[error("No push token stored")]
    #[diagnostic(
        code(telesync::no_push_token),
        help("Store one with: telesync push set-token <hex>")
    )]
    NoPushToken,

    // ── Service ──────────────────────────────────────────────────────
    #[error("Request failed: {detail}")]
    #[diagnostic(code(telesync::request_failed))]
    Request { detail: String },

    #[error("Operation was cancelled")]
    #[diagnostic(code(telesync::cancelled))]
    Cancelled,

    // ── Local state ──────────────────────────────────────────────────
    #[error("Local storage failed: {detail}")]
    #[diagnostic(
        code(telesync::storage),
        help("Check permissions on the profile data directory, or use --storage memory.")
    )]
    Storage { detail: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(telesync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(telesync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: telesync --app-id <ID> config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(telesync::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    #[diagnostic(code(telesync::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NoPushToken => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the active profile name to a core error.
    pub fn from_core(err: CoreError, profile: &str) -> Self {
        match err {
            CoreError::NoCredentials => Self::NoCredentials {
                profile: profile.into(),
            },
            other => other.into(),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

const UNREACHABLE_PREFIX: &str = "Service unreachable: ";

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoCredentials => Self::NoCredentials {
                profile: "current".into(),
            },
            CoreError::NoPushToken => Self::NoPushToken,
            CoreError::NoEvents | CoreError::TooManyEventTypes => Self::Validation {
                field: "events".into(),
                reason: err.to_string(),
            },
            CoreError::AuthFailed { detail } => Self::AuthFailed { detail },
            CoreError::Cancelled => Self::Cancelled,
            CoreError::Storage { detail } => Self::Storage { detail },
            CoreError::Other { detail } => match detail.strip_prefix(UNREACHABLE_PREFIX) {
                Some(reason) => Self::Unreachable {
                    reason: reason.into(),
                },
                None => Self::Request { detail },
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound {
                name: profile,
                available: "(none)".into(),
            },
            other => Self::Config(Box::new(other)),
        }
    }
}
