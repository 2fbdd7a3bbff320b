pub mod chat;
pub mod config_cmd;
pub mod providers;
pub mod serve;

use std::path::Path;

use anyhow::Context;
use ragbridge_config::AppConfig;

/// Load configuration from `path` when given, else the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => AppConfig::load().context("Failed to load config"),
    }
}
