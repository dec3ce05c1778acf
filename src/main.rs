//! tcp-notify relay server
//!
//! Run with: cargo run --bin tcp-notify -- --config config.toml
//!
//! # Configuration
//!
//! Settings are read from `--config`, or else the first of
//! `~/.config/tcp-notify/config.toml`, `/etc/tcp-notify/config.toml` and
//! `./config.toml` that exists. Environment variables override the file:
//! - `TCP_NOTIFY_HOST`, `TCP_NOTIFY_PORT`, `TCP_NOTIFY_MAX_CONNECTIONS`
//! - `TCP_NOTIFY_AUTH_TOKEN`
//! - `TCP_NOTIFY_LOG_LEVEL`, `TCP_NOTIFY_LOG_FORMAT`
//! - `RUST_LOG`: full filter directive, overrides the log level

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tcp_notify::config::{generate_default_config, Config};
use tcp_notify::server::RelayServer;

#[derive(Parser)]
#[command(name = "tcp-notify")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "TCP notification relay server")]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind, overrides the config
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on, overrides the config
    #[arg(short, long)]
    port: Option<u16>,

    /// Connection bound, overrides the config
    #[arg(short = 'm', long)]
    max_connections: Option<usize>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::load_default(),
    };

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(max) = args.max_connections {
        config.server.max_connections = max;
    }

    config.validate().context("Invalid configuration")?;
    tcp_notify::logging::init(&config.logging).context("Failed to initialize logging")?;

    tracing::info!("Starting tcp-notify v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        max_connections = config.server.max_connections,
        policy = ?config.server.capacity_policy,
        token_required = config.server.auth_token.is_some(),
        "Relay configured"
    );

    let server = RelayServer::new(config.server)?;
    server.serve().await?;

    tracing::info!("tcp-notify shut down");
    Ok(())
}
