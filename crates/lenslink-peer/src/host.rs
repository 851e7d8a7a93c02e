//! Host role: accept one peer session and surface its commands

use lenslink_core::ConnectionState;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{PeerError, PeerEvent};

/// Listens for one incoming peer session and forwards each received
/// command line to the subscriber, in arrival order.
pub struct CommandHost {
    state: Arc<Mutex<ConnectionState>>,
    live: Arc<AtomicBool>,
    events: Option<mpsc::Sender<PeerEvent>>,
    task: Option<JoinHandle<()>>,
}

impl CommandHost {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectionState::Idle)),
            live: Arc::new(AtomicBool::new(false)),
            events: None,
            task: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    /// Bind `addr` and wait for a peer. Returns the bound address so
    /// callers may pass port 0.
    pub async fn start(
        &mut self,
        addr: &str,
        events: mpsc::Sender<PeerEvent>,
    ) -> Result<SocketAddr, PeerError> {
        if matches!(
            self.state(),
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return Err(PeerError::AlreadyStarted);
        }

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Command host listening");

        *self.state.lock().unwrap() = ConnectionState::Connecting;
        let live = Arc::new(AtomicBool::new(true));
        self.live = live.clone();
        self.events = Some(events.clone());

        let state = self.state.clone();
        self.task = Some(tokio::spawn(async move {
            serve_peer(listener, &events, &live, &state).await;

            if live
                .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                *state.lock().unwrap() = ConnectionState::Disconnected;
                let _ = events.send(PeerEvent::Disconnected).await;
            }
        }));

        Ok(local_addr)
    }

    /// Close the session. Idempotent; exactly one Disconnected event per
    /// session, and none after this returns.
    pub fn stop(&mut self) {
        let was_live = self
            .live
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();

        if let Some(task) = self.task.take() {
            task.abort();
        }
        let events = self.events.take();

        if was_live {
            *self.state.lock().unwrap() = ConnectionState::Disconnected;
            if let Some(events) = events {
                if events.try_send(PeerEvent::Disconnected).is_err() {
                    debug!("Subscriber gone before disconnect notification");
                }
            }
        }
    }
}

impl Default for CommandHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CommandHost {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve_peer(
    listener: TcpListener,
    events: &mpsc::Sender<PeerEvent>,
    live: &AtomicBool,
    state: &Mutex<ConnectionState>,
) {
    let (stream, peer) = match listener.accept().await {
        Ok(accepted) => accepted,
        Err(e) => {
            warn!(error = %e, "Accept failed");
            return;
        }
    };

    if !live.load(Ordering::SeqCst) {
        return;
    }
    info!(peer = %peer, "Peer session accepted");
    if events.send(PeerEvent::InvitationReceived).await.is_err() {
        return;
    }
    *state.lock().unwrap() = ConnectionState::Connected;
    if events.send(PeerEvent::Connected).await.is_err() {
        return;
    }

    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                debug!(command = %line, "Command received");
                if !live.load(Ordering::SeqCst) {
                    return;
                }
                if events.send(PeerEvent::Command(line)).await.is_err() {
                    return;
                }
            }
            Ok(None) => {
                debug!(peer = %peer, "Peer closed the session");
                return;
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "Peer read error");
                return;
            }
        }
    }
}
