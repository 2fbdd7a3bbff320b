//! `ragbridge chat`: single-message or interactive chat without HTTP.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, bail};
use ragbridge_assembler::ChatTurnRequest;
use ragbridge_config::AppConfig;
use ragbridge_core::message::SessionId;
use ragbridge_gateway::AppState;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
    provider: Option<String>,
    model: Option<String>,
) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set RAGBRIDGE_API_KEY or OPENAI_API_KEY, or add api_key to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        bail!("No API key found");
    }

    let state = AppState::from_config(&config)
        .await
        .context("Failed to initialise collaborators")?;
    let session = SessionId::new();

    let turn = |text: String| ChatTurnRequest {
        session: Some(session.clone()),
        message: text,
        provider: provider.clone(),
        model: model.clone(),
    };

    if let Some(msg) = message {
        let reply = state.pipeline.chat(turn(msg)).await?;
        println!("{}", reply.reply);
        return Ok(());
    }

    println!();
    println!("  RagBridge interactive chat");
    println!("  Provider:   {}", provider.as_deref().unwrap_or(&config.default_provider));
    println!("  Documents:  {} chunks indexed", state.ingestor.index().len().await);
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        match state.pipeline.chat(turn(line.to_string())).await {
            Ok(reply) => {
                for text in reply.reply.lines() {
                    println!("  Assistant > {text}");
                }
                if reply.context_used {
                    println!("  ({} document fragment(s) used)", reply.fragments);
                }
                println!();
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    Ok(())
}
