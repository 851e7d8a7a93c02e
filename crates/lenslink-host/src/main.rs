//! Lenslink Host - Main entry point
//!
//! Discovers a camera on the local network, streams its liveview, and
//! accepts remote-control commands from a client peer.

mod config;
mod coordinator;

use anyhow::Result;
use clap::Parser;
use coordinator::CameraController;
use lenslink_peer::{CommandHost, PeerEvent};
use lenslink_stream::StreamEvent;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Command payload a client sends to trigger a capture
const CAPTURE_COMMAND: &str = "capture";

#[derive(Parser, Debug)]
#[command(name = "lenslink-host")]
#[command(about = "Camera discovery, liveview streaming, and remote control host")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "lenslink.toml")]
    config: PathBuf,

    /// Bind address for the remote command channel
    #[arg(short, long)]
    bind: Option<String>,

    /// Discovery search window in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

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

    info!("Lenslink host v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;
    if let Some(bind) = args.bind {
        config.peer.bind = bind;
    }
    if let Some(timeout) = args.timeout {
        config.discovery.timeout_secs = timeout;
    }

    info!(
        search_target = %config.discovery.search_target,
        timeout_secs = config.discovery.timeout_secs,
        "Configuration ready"
    );

    let mut controller = CameraController::new(config.discovery.clone())?;
    controller.prepare_open_connection()?;

    let (peer_tx, mut peer_rx) = mpsc::channel(64);
    let mut command_host = CommandHost::new();
    let addr = command_host.start(&config.peer.bind, peer_tx).await?;
    info!(addr = %addr, "Remote command channel listening");

    let (frame_tx, mut frame_rx) = mpsc::channel(64);
    let streaming = controller.start(frame_tx.clone()).await?;
    if !streaming {
        warn!("No usable camera found; remote commands stay available");
    }

    // Frames go to the viewer seam (logged here); peer commands drive
    // the controller
    loop {
        tokio::select! {
            event = frame_rx.recv() => match event {
                Some(StreamEvent::Connected) => info!("Liveview connected"),
                Some(StreamEvent::Frame(frame)) => {
                    debug!(bytes = frame.payload.len(), "Frame received");
                }
                Some(StreamEvent::Ended) => info!("Liveview ended"),
                Some(StreamEvent::Failed(e)) => warn!(error = %e, "Liveview failed"),
                Some(StreamEvent::Disconnected) => info!("Liveview disconnected"),
                None => break,
            },
            event = peer_rx.recv() => match event {
                Some(PeerEvent::InvitationReceived) => info!("Peer invitation received"),
                Some(PeerEvent::Connected) => info!("Peer connected"),
                Some(PeerEvent::Command(command)) => {
                    if command == CAPTURE_COMMAND {
                        controller.take_picture();
                    } else {
                        warn!(command = %command, "Unknown peer command ignored");
                    }
                }
                Some(PeerEvent::Disconnected) => info!("Peer disconnected"),
                Some(PeerEvent::Connecting) => {}
                None => break,
            },
        }
    }

    controller.stop_stream();
    command_host.stop();
    Ok(())
}
