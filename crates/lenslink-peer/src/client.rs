//! Client role: connect to a Host and send remote-control commands

use lenslink_core::ConnectionState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{PeerError, PeerEvent};

/// Connects to a Host's command channel and sends opaque text commands.
///
/// Commands are queued once Connected and written in call order, one
/// line per command. Sending while not connected fails with
/// `NotConnected` rather than being dropped silently.
pub struct CommandClient {
    state: Arc<Mutex<ConnectionState>>,
    live: Arc<AtomicBool>,
    outgoing: Option<mpsc::UnboundedSender<String>>,
    events: Option<mpsc::Sender<PeerEvent>>,
    tasks: Vec<JoinHandle<()>>,
}

impl CommandClient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectionState::Idle)),
            live: Arc::new(AtomicBool::new(false)),
            outgoing: None,
            events: None,
            tasks: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Connect to a Host at `addr`.
    ///
    /// Emits Connecting before the attempt and Connected on success; a
    /// failed attempt transitions to Disconnected and returns the error.
    pub async fn start(
        &mut self,
        addr: &str,
        events: mpsc::Sender<PeerEvent>,
    ) -> Result<(), PeerError> {
        if matches!(
            self.state(),
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return Err(PeerError::AlreadyStarted);
        }

        *self.state.lock().unwrap() = ConnectionState::Connecting;
        let _ = events.send(PeerEvent::Connecting).await;

        let stream = match TcpStream::connect(addr).await {
            Ok(stream) => stream,
            Err(e) => {
                *self.state.lock().unwrap() = ConnectionState::Disconnected;
                let _ = events.send(PeerEvent::Disconnected).await;
                return Err(e.into());
            }
        };

        info!(addr = %addr, "Connected to command host");
        *self.state.lock().unwrap() = ConnectionState::Connected;
        let _ = events.send(PeerEvent::Connected).await;

        let live = Arc::new(AtomicBool::new(true));
        self.live = live.clone();
        self.events = Some(events.clone());

        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
        self.outgoing = Some(outgoing_tx);

        let (mut read_half, mut write_half) = stream.into_split();

        // Writer: drain the command queue onto the socket, in order
        self.tasks.push(tokio::spawn(async move {
            while let Some(command) = outgoing_rx.recv().await {
                let mut line = command.into_bytes();
                line.push(b'\n');
                if let Err(e) = write_half.write_all(&line).await {
                    warn!(error = %e, "Command write failed");
                    return;
                }
            }
        }));

        // Reader: the host sends nothing; EOF means the peer went away
        let state = self.state.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut sink = [0u8; 256];
            loop {
                match tokio::io::AsyncReadExt::read(&mut read_half, &mut sink).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            if live
                .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                debug!("Host closed the command channel");
                *state.lock().unwrap() = ConnectionState::Disconnected;
                let _ = events.send(PeerEvent::Disconnected).await;
            }
        }));

        Ok(())
    }

    /// Queue one command for transmission.
    ///
    /// The command is treated as one atomic unit; it must not contain a
    /// newline of its own.
    pub fn send_command(&self, command: &str) -> Result<(), PeerError> {
        if !self.is_connected() {
            return Err(PeerError::NotConnected);
        }
        let outgoing = self.outgoing.as_ref().ok_or(PeerError::NotConnected)?;
        outgoing
            .send(command.to_string())
            .map_err(|_| PeerError::NotConnected)
    }

    /// Close the channel. Idempotent; exactly one Disconnected event per
    /// session, and none after this returns.
    pub fn stop(&mut self) {
        let was_live = self
            .live
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();

        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.outgoing = None;
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

impl Default for CommandClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CommandClient {
    fn drop(&mut self) {
        self.stop();
    }
}
