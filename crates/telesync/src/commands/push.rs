//! Push token commands.

use serde_json::json;
use telesync_core::SyncClient;

use crate::cli::{GlobalOpts, PushArgs, PushCommand};
use crate::error::CliError;
use crate::output;

/// Decode a hex string into bytes, ignoring `:` and space separators.
fn decode_hex(token: &str) -> Result<Vec<u8>, CliError> {
    let digits: Vec<u8> = token
        .bytes()
        .filter(|b| !matches!(b, b':' | b' '))
        .collect();

    let invalid = |reason: &str| CliError::Validation {
        field: "token".into(),
        reason: reason.into(),
    };
    if digits.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if digits.len() % 2 != 0 {
        return Err(invalid("hex string has an odd number of digits"));
    }

    digits
        .chunks_exact(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).map_err(|_| invalid("not valid hex"))?;
            u8::from_str_radix(pair, 16).map_err(|_| invalid("not valid hex"))
        })
        .collect()
}

pub async fn handle(
    client: &SyncClient,
    args: PushArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let message = match args.command {
        PushCommand::SetToken { token } => {
            client.set_push_token(&decode_hex(&token)?)?;
            "Stored push token".to_owned()
        }
        PushCommand::Register => {
            client.register_push().await?;
            "Registered push token".to_owned()
        }
        PushCommand::Unregister => {
            client.unregister_push().await?;
            "Unregistered push".to_owned()
        }
    };

    let data = json!({ "ok": true, "push_token": client.push_token()? });
    let out = output::render(global, &data, |_, color| output::success(&message, color))?;
    output::print_output(&out, global.quiet);
    Ok(())
}
