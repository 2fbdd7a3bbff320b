//! `ragbridge serve`: start the HTTP server.

use std::path::Path;

use anyhow::anyhow;

pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    if !config.has_api_key() {
        tracing::warn!("No API key configured; chat requests will fail until one is set");
    }

    println!("RagBridge");
    println!("   Listening:  http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:   {} ({})", config.default_provider, config.default_model);
    println!("   Uploads:    {}", config.storage.upload_dir.display());

    ragbridge_gateway::start(config)
        .await
        .map_err(|e| anyhow!("Server stopped: {e}"))
}
