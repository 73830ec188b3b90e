//! Command handlers. Each takes a ready client and the global options.

pub mod config_cmd;
pub mod device;
pub mod events;
pub mod push;

use telesync_core::{SyncClient, SyncStatus};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Route a client-backed command to its handler.
pub async fn dispatch(
    cmd: Command,
    client: &SyncClient,
    profile: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let result = match cmd {
        Command::Register => device::register(client, global).await,
        Command::Unregister => device::unregister(client, global).await,
        Command::Update(args) => device::update(client, &args, global).await,
        Command::Patch(args) => device::patch(client, &args, global).await,
        Command::Associate(args) => device::associate(client, &args, global).await,
        Command::Push(args) => push::handle(client, args, global).await,
        Command::Track(args) => events::track(client, &args, global).await,
        Command::Status => status(client, global),
        Command::Config(_) | Command::Completions(_) => Ok(()),
    };
    result.map_err(|err| match err {
        CliError::NoCredentials { .. } => CliError::NoCredentials {
            profile: profile.into(),
        },
        other => other,
    })
}

fn status(client: &SyncClient, global: &GlobalOpts) -> Result<(), CliError> {
    let status = client.status()?;
    let out = output::render(global, &status, status_text)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn status_text(status: &SyncStatus, color: bool) -> String {
    let device = status.device_id.as_deref().unwrap_or("(not registered)");
    let push = match (&status.push_token, status.push_registered) {
        (None, _) => "no token".to_owned(),
        (Some(_), true) => "registered".to_owned(),
        (Some(_), false) => "token stored, not registered".to_owned(),
    };
    [
        output::field("device", device, color),
        output::field("known devices", &status.known_devices.to_string(), color),
        output::field("push", &push, color),
        output::field("pending events", &status.pending_events.to_string(), color),
    ]
    .join("\n")
}
