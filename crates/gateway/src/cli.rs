use clap::{Parser, Subcommand};

/// A research-agent gateway: accepts a query, runs a bounded search/fetch
/// tool loop against a model, and streams progress over SSE.
#[derive(Debug, Parser)]
#[command(name = "wsa-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Validate the current configuration and report issues without
    /// starting the server.
    Doctor,
}

/// Loads the configuration from the path named by `WSA_CONFIG` (or
/// `config.toml` by default). Shared by `serve` and `doctor`.
pub fn load_config() -> anyhow::Result<(wsa_domain::config::Config, String)> {
    let config_path = std::env::var("WSA_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let path = std::path::Path::new(&config_path);
    let config = wsa_domain::config::Config::load(Some(path))
        .map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?;
    Ok((config, config_path))
}
