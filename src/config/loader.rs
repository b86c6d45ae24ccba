use std::{fs, fs::File, io::Write, path::Path};

use anyhow::{Context, Result};
use config::{Config, Environment};
use log::info;

pub fn get_default_config() -> &'static str {
    include_str!("../../config/config.toml")
}

/// Loads configuration from `path`, writing the embedded default file first
/// if none exists. Environment variables prefixed `BITBAR_` override file
/// values (e.g. `BITBAR_MONITOR__API_PORT=8080`).
pub fn load_configuration(path: &Path) -> Result<Config> {
    if !path.exists() {
        write_config_to(path, get_default_config()).context("Could not create default config")?;
        info!(path:% = path.display(); "Created new configuration file");
    }

    let filename = path.to_str().context("Invalid config file path")?;

    Config::builder()
        .add_source(config::File::with_name(filename))
        .add_source(Environment::with_prefix("BITBAR").prefix_separator("_").separator("__"))
        .build()
        .context("Could not build config")
}

pub fn write_config_to(path: &Path, source: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create parent directories")?;
    };

    let mut file = File::create(path).context("Failed to create config file")?;
    file.write_all(source.as_bytes())
        .context("Failed to write config content")?;
    file.write_all(b"\n").context("Failed to write newline")?;
    Ok(())
}
