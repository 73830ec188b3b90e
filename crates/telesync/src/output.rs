//! Output formatting: human-readable text or JSON.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Render `data` as JSON when requested, otherwise with `text_fn`.
pub fn render<T: Serialize + ?Sized>(
    global: &GlobalOpts,
    data: &T,
    text_fn: impl FnOnce(&T, bool) -> String,
) -> Result<String, CliError> {
    Ok(match global.output {
        OutputFormat::Text => text_fn(data, should_color(global.color)),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
    })
}

/// One-line confirmation of a finished action.
pub fn success(message: &str, color: bool) -> String {
    if color {
        format!("{} {message}", "✓".green().bold())
    } else {
        format!("✓ {message}")
    }
}

/// `label: value` line with the label dimmed when colored.
pub fn field(label: &str, value: &str, color: bool) -> String {
    if color {
        format!("{:<16}{value}", format!("{label}:").dimmed())
    } else {
        format!("{:<16}{value}", format!("{label}:"))
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
