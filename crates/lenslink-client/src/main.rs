//! Lenslink Client - Main entry point
//!
//! Connects to a lenslink host's command channel and sends
//! remote-control commands.

use anyhow::Result;
use clap::Parser;
use lenslink_peer::{CommandClient, PeerEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "lenslink-client")]
#[command(about = "Send remote-control commands to a lenslink host")]
#[command(version)]
struct Args {
    /// Host command-channel address
    #[arg(short = 'H', long, default_value = "127.0.0.1:7070")]
    host: String,

    /// Commands to send once connected
    #[arg(default_values_t = [String::from("capture")])]
    commands: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let (events_tx, mut events_rx) = mpsc::channel(32);
    let mut client = CommandClient::new();
    client.start(&args.host, events_tx).await?;

    while let Some(event) = events_rx.recv().await {
        match event {
            PeerEvent::Connecting => info!(host = %args.host, "Connecting"),
            PeerEvent::Connected => {
                for command in &args.commands {
                    client.send_command(command)?;
                    info!(command = %command, "Command sent");
                }
                // Give the writer a moment to drain before closing
                tokio::time::sleep(Duration::from_millis(200)).await;
                client.stop();
            }
            PeerEvent::Disconnected => {
                info!("Session closed");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
