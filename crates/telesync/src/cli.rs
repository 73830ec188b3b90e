//! Clap derive structures for the `telesync` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// telesync -- register devices and deliver telemetry events
#[derive(Debug, Parser)]
#[command(
    name = "telesync",
    version,
    about = "Register devices and deliver telemetry events to a telesync service",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Application profile to use
    #[arg(long, short = 'p', env = "TELESYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Path to the config file
    #[arg(long, env = "TELESYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Service base URL (overrides profile)
    #[arg(long, env = "TELESYNC_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Application id (overrides profile)
    #[arg(long, env = "TELESYNC_APP_ID", global = true)]
    pub app_id: Option<String>,

    /// Storage backend (overrides profile)
    #[arg(long, global = true)]
    pub storage: Option<StorageArg>,

    /// Directory for file storage (overrides profile)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "text", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    Text,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StorageArg {
    /// JSON files in the profile data directory
    File,
    /// OS keyring
    Keyring,
    /// Process memory (nothing survives the command)
    Memory,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register this device and store its credential
    Register,

    /// Unregister this device and clear local credentials
    Unregister,

    /// Send the device payload and store the returned credential
    Update(UpdateArgs),

    /// Patch the device payload without replacing the credential
    Patch(UpdateArgs),

    /// Associate this device with an external person id
    Associate(AssociateArgs),

    /// Manage the push token
    Push(PushArgs),

    /// Track an event and send every pending event of its type
    Track(TrackArgs),

    /// Show local credential, push and event state
    Status,

    /// Manage configuration profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Latitude of the device location
    #[arg(long, requires = "long", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude of the device location
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub long: Option<f64>,
}

#[derive(Debug, Args)]
pub struct AssociateArgs {
    /// External person id
    pub person_id: String,
}

#[derive(Debug, Args)]
pub struct PushArgs {
    #[command(subcommand)]
    pub command: PushCommand,
}

#[derive(Debug, Subcommand)]
pub enum PushCommand {
    /// Store a push token given as hex
    SetToken {
        /// Token bytes as hex, e.g. 0a1b2c
        token: String,
    },
    /// Register the stored push token with the service
    Register,
    /// Unregister push delivery for this device
    Unregister,
}

#[derive(Debug, Args)]
pub struct TrackArgs {
    /// Event type, e.g. launch or clickthru
    pub event_type: String,

    /// Event property as key=value; JSON values are parsed (repeatable)
    #[arg(long = "prop", value_name = "KEY=VALUE")]
    pub props: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or replace a profile from the global flags
    Init(ConfigInitArgs),
    /// Print the current configuration
    Show,
    /// Print the config file path
    Path,
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    /// Advertising identifier reported with the device
    #[arg(long)]
    pub advertising_id: Option<String>,

    /// Make this profile the default
    #[arg(long)]
    pub set_default: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
