use anyhow::{Context, Result};
use arbor_web::{start_server, AppState, ArborConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Collaborative tree synchronization server
#[derive(Debug, Parser)]
#[command(name = "arbor-server", version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "ARBOR_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind (overrides config and ARBOR_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config and ARBOR_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging for arbor crates
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins when set
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "info,arbor_web={log_level},arbor_sync={log_level},arbor_core={log_level},arbor_llm={log_level},arbor_config={log_level}"
        ))
    });
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut config = ArborConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;

    if config.auth.tokens.is_empty() {
        tracing::warn!("No bearer tokens configured; every REST call will be rejected");
    }
    info!(
        gc_enabled = config.sync.gc_enabled,
        model = %config.llm.model,
        "Configuration loaded"
    );

    start_server(AppState::from_config(config)).await?;
    Ok(())
}
