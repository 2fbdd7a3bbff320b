//! `ragbridge config`: configuration helpers.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use ragbridge_config::AppConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the config file location
    Path,
    /// Load and validate the configuration
    Validate,
    /// Write the default configuration if no file exists yet
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// With no action, print the default configuration as TOML.
pub fn run(config_path: Option<&Path>, action: Option<ConfigAction>) -> anyhow::Result<()> {
    match action {
        None => {
            println!("{}", AppConfig::default_toml());
            Ok(())
        }
        Some(ConfigAction::Path) => {
            println!("{}", target_path(config_path).display());
            Ok(())
        }
        Some(ConfigAction::Validate) => validate(config_path),
        Some(ConfigAction::Init { force }) => init(&target_path(config_path), force),
    }
}

fn target_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

fn validate(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    println!("Config OK");
    if !config.has_api_key() {
        println!("   warning: no API key set (RAGBRIDGE_API_KEY or OPENAI_API_KEY)");
    }
    println!("   Provider:   {}", config.default_provider);
    println!("   Model:      {}", config.default_model);
    println!("   Server:     {}:{}", config.gateway.host, config.gateway.port);
    println!("   Retrieval:  {}", if config.retrieval.enabled { "on" } else { "off" });
    println!("   History:    {} turns", config.assembler.max_history_turns);
    Ok(())
}

fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        println!("Config already exists: {}", path.display());
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    std::fs::write(path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
