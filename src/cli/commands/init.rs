//! Init and Config commands.

use crate::config::Settings;
use crate::error::{QaError, QaResult};

/// Run init command - create configuration file.
pub fn run_init(force: bool) -> QaResult<()> {
    let path = Settings::init_config_file(force).map_err(|e| QaError::Config {
        reason: e.to_string(),
    })?;

    if force {
        println!("Wrote configuration file at: {}", path.display());
    } else {
        println!("Created configuration file at: {}", path.display());
    }
    println!("Edit this file to customize your settings.");
    if Settings::default().remote.resolve_api_key().is_none() {
        println!("Set remote.api_key or DOCQA_API_KEY before ingesting.");
    }
    Ok(())
}

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) -> QaResult<()> {
    let mut shown = config.clone();
    if shown.remote.api_key.is_some() {
        shown.remote.api_key = Some("<redacted>".to_string());
    }

    let toml_str = toml::to_string_pretty(&shown).map_err(|e| QaError::Internal {
        reason: format!("cannot render configuration: {e}"),
    })?;

    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{toml_str}");
    Ok(())
}
