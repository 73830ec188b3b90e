//! Device lifecycle commands.

use serde_json::json;
use telesync_core::{Credential, Location, SyncClient};

use crate::cli::{AssociateArgs, GlobalOpts, UpdateArgs};
use crate::error::CliError;
use crate::output;

fn location(args: &UpdateArgs) -> Option<Location> {
    match (args.lat, args.long) {
        (Some(latitude), Some(longitude)) => Some(Location {
            latitude,
            longitude,
        }),
        _ => None,
    }
}

fn print_credential(
    credential: &Credential,
    verb: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let data = json!({ "device_id": credential.device_id });
    let out = output::render(global, &data, |_, color| {
        output::success(&format!("{verb} device {}", credential.device_id), color)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn print_done(message: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let data = json!({ "ok": true });
    let out = output::render(global, &data, |_, color| output::success(message, color))?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn register(client: &SyncClient, global: &GlobalOpts) -> Result<(), CliError> {
    let credential = client.register_device().await?;
    print_credential(&credential, "Registered", global)
}

pub async fn unregister(client: &SyncClient, global: &GlobalOpts) -> Result<(), CliError> {
    client.unregister_device().await?;
    print_done("Unregistered device", global)
}

pub async fn update(
    client: &SyncClient,
    args: &UpdateArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let credential = client.update_device(location(args)).await?;
    print_credential(&credential, "Updated", global)
}

pub async fn patch(
    client: &SyncClient,
    args: &UpdateArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    client.patch_device(location(args)).await?;
    print_done("Patched device", global)
}

pub async fn associate(
    client: &SyncClient,
    args: &AssociateArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    client.associate_person(&args.person_id).await?;
    print_done(&format!("Associated person {}", args.person_id), global)
}
