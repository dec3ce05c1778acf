//! tcp-notify command-line client
//!
//! Connects to a relay, authenticates, forwards each stdin line as a message
//! and logs every notification it receives. EOF on stdin or Ctrl+C sends
//! `disconnecting` and exits.

use anyhow::Context;
use clap::Parser;
use tcp_notify::client::{Notification, RelayClient};
use tcp_notify::config::LoggingConfig;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "tcp-notify-client")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Send and receive notifications through a tcp-notify relay")]
struct Args {
    /// Relay address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    addr: String,

    /// Shared token, if the relay requires one
    #[arg(short, long, default_value = "")]
    token: String,

    /// Log format (pretty, json)
    #[arg(long, default_value = "pretty")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let logging = LoggingConfig {
        format: args.log_format.clone(),
        ..LoggingConfig::default()
    };
    logging.validate()?;
    tcp_notify::logging::init(&logging).context("Failed to initialize logging")?;

    let mut client = RelayClient::connect(args.addr.as_str())
        .await
        .with_context(|| format!("Failed to connect to {}", args.addr))?;
    let client_id = client
        .authenticate(&args.token)
        .await
        .context("Authentication failed")?;
    tracing::info!(client_id = %client_id, addr = %args.addr, "Connected");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => client.send_message(&line).await?,
                None => break,
            },
            event = client.next_event() => match event? {
                Some(event) => match Notification::from_event(&event) {
                    Some(Notification::ClientAuthenticated { client_id }) => {
                        tracing::info!(client_id = %client_id, "Client joined");
                    }
                    Some(Notification::ClientDisconnected { client_id }) => {
                        tracing::info!(client_id = %client_id, "Client left");
                    }
                    Some(Notification::Message { sender, message }) => {
                        tracing::info!(sender = %sender, "{}", message);
                    }
                    None => tracing::debug!(event = %event.kind(), "Ignoring event"),
                },
                None => {
                    tracing::warn!("Relay closed the connection");
                    return Ok(());
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.disconnect().await?;
    tracing::info!("Disconnected");
    Ok(())
}
