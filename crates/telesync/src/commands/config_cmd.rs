//! Config subcommand handlers.

use telesync_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, ConfigInitArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

fn init(args: &ConfigInitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_file(global);
    let mut cfg = config::load(global)?;
    let name = global.profile.clone().unwrap_or_else(|| "default".into());

    let app_id = global
        .app_id
        .clone()
        .or_else(|| cfg.profiles.get(&name).map(|p| p.app_id.clone()))
        .ok_or_else(|| CliError::Validation {
            field: "app_id".into(),
            reason: "pass --app-id to create a profile".into(),
        })?;

    let mut profile = cfg
        .profiles
        .get(&name)
        .cloned()
        .unwrap_or_else(|| Profile::new(app_id.clone()));
    profile.app_id = app_id;
    if let Some(ref url) = global.api_url {
        profile.api_url.clone_from(url);
    }
    if let Some(storage) = global.storage {
        profile.storage = storage.into();
    }
    if let Some(ref dir) = global.data_dir {
        profile.data_dir = Some(dir.clone());
    }
    if let Some(ref id) = args.advertising_id {
        profile.advertising_id = Some(id.clone());
    }

    // Fail before writing anything unusable.
    telesync_config::profile_to_client_config(&profile, &cfg.defaults)?;

    if args.set_default || cfg.profiles.is_empty() {
        cfg.default_profile = Some(name.clone());
    }
    cfg.profiles.insert(name.clone(), profile);
    telesync_config::save_config_to(&cfg, &path)?;

    let color = output::should_color(global.color);
    output::print_output(
        &output::success(
            &format!("Saved profile '{name}' to {}", path.display()),
            color,
        ),
        global.quiet,
    );
    Ok(())
}

fn show(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let out = output::render(global, &cfg, |cfg: &Config, _| {
        toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("# could not render config: {e}"))
    })?;
    output::print_output(out.trim_end(), global.quiet);
    Ok(())
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init(ref init_args) => init(init_args, global),
        ConfigCommand::Show => show(global),
        ConfigCommand::Path => {
            output::print_output(&config::config_file(global).display().to_string(), false);
            Ok(())
        }
    }
}
