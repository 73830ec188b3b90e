//! Event tracking command.

use serde_json::{Map, Value, json};
use telesync_core::SyncClient;
use tracing::debug;

use crate::cli::{GlobalOpts, TrackArgs};
use crate::error::CliError;
use crate::output;

/// Parse `key=value` pairs. Values that parse as JSON keep their type,
/// anything else is taken as a string.
fn parse_props(props: &[String]) -> Result<Map<String, Value>, CliError> {
    props
        .iter()
        .map(|prop| {
            let (key, raw) = prop.split_once('=').ok_or_else(|| CliError::Validation {
                field: "prop".into(),
                reason: format!("expected KEY=VALUE, got '{prop}'"),
            })?;
            if key.is_empty() {
                return Err(CliError::Validation {
                    field: "prop".into(),
                    reason: format!("empty key in '{prop}'"),
                });
            }
            let value =
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
            Ok((key.to_owned(), value))
        })
        .collect()
}

pub async fn track(
    client: &SyncClient,
    args: &TrackArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let properties = parse_props(&args.props)?;
    debug!(event_type = %args.event_type, props = properties.len(), "tracking event");

    let sent = client.track(&args.event_type, properties).await?;
    let pending = client.pending_events()?.len();

    let data = json!({ "event_type": args.event_type, "tracked": sent, "pending": pending });
    let out = output::render(global, &data, |_, color| {
        if sent {
            output::success(&format!("Sent {} events", args.event_type), color)
        } else {
            format!(
                "Event type '{}' is not tracked by this profile; nothing sent",
                args.event_type
            )
        }
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
