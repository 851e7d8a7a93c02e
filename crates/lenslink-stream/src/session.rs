//! Streaming session: owns the connection to a liveview endpoint
//!
//! A session opens the HTTP connection, drives every received chunk
//! through a connection-scoped [`FrameDecoder`], and forwards decoded
//! frames to a subscriber channel in arrival order. Decoder errors tear
//! the session down; reconnecting is the caller's job (a fresh `start`
//! builds a fresh decoder).

use futures_util::StreamExt;
use lenslink_core::ConnectionState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::decoder::{Frame, FrameDecoder, StreamError};

/// Events delivered to a streaming subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The connection to the liveview endpoint is established
    Connected,
    /// A complete image frame
    Frame(Frame),
    /// The device ended the stream cleanly
    Ended,
    /// The session failed; no more frames will arrive
    Failed(StreamError),
    /// Terminal notification, sent exactly once per session
    Disconnected,
}

/// A single liveview streaming session.
///
/// One logical owner drives the session; frames reach the subscriber
/// through the channel passed to [`start`](Self::start). `stop` is
/// idempotent and guarantees no further events after it returns.
pub struct StreamingSession {
    client: reqwest::Client,
    state: Arc<Mutex<ConnectionState>>,
    live: Arc<AtomicBool>,
    events: Option<mpsc::Sender<StreamEvent>>,
    task: Option<JoinHandle<()>>,
}

impl StreamingSession {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Build a session reusing an existing HTTP client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(ConnectionState::Idle)),
            // False until start: stop on an idle session is a no-op
            live: Arc::new(AtomicBool::new(false)),
            events: None,
            task: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Connecting | ConnectionState::Connected
        )
    }

    /// Open the connection and begin streaming frames to `events`.
    ///
    /// Transitions Idle -> Connecting immediately; Connected (or
    /// Disconnected) follows asynchronously. Fails with `AlreadyActive`
    /// if a session is running; a Disconnected session may be started
    /// again.
    pub fn start(&mut self, url: &str, events: mpsc::Sender<StreamEvent>) -> Result<(), StreamError> {
        if self.is_active() {
            return Err(StreamError::AlreadyActive);
        }

        *self.state.lock().unwrap() = ConnectionState::Connecting;
        let live = Arc::new(AtomicBool::new(true));
        self.live = live.clone();
        self.events = Some(events.clone());

        info!(url = %url, "Starting liveview stream");

        let client = self.client.clone();
        let url = url.to_string();
        let state = self.state.clone();
        self.task = Some(tokio::spawn(async move {
            let outcome = run_stream(client, &url, &events, &live, &state).await;

            // Only the first finisher (this task or stop) reports
            if live
                .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                *state.lock().unwrap() = ConnectionState::Disconnected;
                match outcome {
                    Ok(()) => {
                        debug!(url = %url, "Stream ended cleanly");
                        let _ = events.send(StreamEvent::Ended).await;
                    }
                    Err(e) => {
                        warn!(url = %url, error = %e, "Stream failed");
                        let _ = events.send(StreamEvent::Failed(e)).await;
                    }
                }
                let _ = events.send(StreamEvent::Disconnected).await;
            }
        }));

        Ok(())
    }

    /// Tear the session down.
    ///
    /// Idempotent: a no-op while Idle or Disconnected. Safe to call from
    /// a subscriber's event loop; once it returns, no further events
    /// reach the subscriber.
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
                if events.try_send(StreamEvent::Disconnected).is_err() {
                    debug!("Subscriber gone before disconnect notification");
                }
            }
        }
    }
}

impl Default for StreamingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Connection + read loop. Frame delivery happens here, synchronously
/// with buffer mutation, so ordering matches byte-completion order.
async fn run_stream(
    client: reqwest::Client,
    url: &str,
    events: &mpsc::Sender<StreamEvent>,
    live: &AtomicBool,
    state: &Mutex<ConnectionState>,
) -> Result<(), StreamError> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| StreamError::Connect(e.to_string()))?;

    if !live.load(Ordering::SeqCst) {
        return Ok(());
    }
    *state.lock().unwrap() = ConnectionState::Connected;
    if events.send(StreamEvent::Connected).await.is_err() {
        return Ok(());
    }

    let mut decoder = FrameDecoder::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| StreamError::Connect(e.to_string()))?;
        for frame in decoder.feed(&chunk)? {
            if !live.load(Ordering::SeqCst) {
                return Ok(());
            }
            if events.send(StreamEvent::Frame(frame)).await.is_err() {
                return Ok(());
            }
        }
    }

    decoder.finish()
}
