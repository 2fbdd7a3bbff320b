//! RagBridge CLI: the main entry point.
//!
//! Commands:
//! - `serve`      Start the HTTP server
//! - `chat`       Ask one question, or chat interactively, without HTTP
//! - `config`     Print the default configuration, its path, or validate it
//! - `providers`  List the providers the current configuration registers

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "ragbridge",
    about = "RagBridge: retrieval-augmented chat backend",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read configuration from this file instead of ~/.ragbridge/config.toml
    #[arg(long, global = true, env = "RAGBRIDGE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat through the full retrieval pipeline
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Provider to dispatch to
        #[arg(long)]
        provider: Option<String>,

        /// Model to request
        #[arg(long)]
        model: Option<String>,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: Option<commands::config_cmd::ConfigAction>,
    },

    /// List registered providers and their models
    Providers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Chat {
            message,
            provider,
            model,
        } => commands::chat::run(config_path, message, provider, model).await?,
        Commands::Config { action } => commands::config_cmd::run(config_path, action)?,
        Commands::Providers => commands::providers::run(config_path)?,
    }

    Ok(())
}
