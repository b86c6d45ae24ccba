//! Configuration loading and typed defaults.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

mod defaults;
mod loader;

pub use defaults::{MonitorConfig, WorkerConfig};
pub use loader::{get_default_config, load_configuration, write_config_to};

/// Extracts one named table from the loaded configuration, falling back to
/// the built-in defaults when the table is absent.
pub fn section<T: Default + DeserializeOwned>(cfg: &config::Config, key: &str) -> Result<T> {
    match cfg.get::<T>(key) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => Ok(T::default()),
        Err(e) => Err(e).with_context(|| format!("Could not read the `{key}` configuration table")),
    }
}
