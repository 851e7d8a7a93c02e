//! Discovery engine: broadcast a search, collect and dedup replies,
//! fetch and parse device descriptions, emit device records

use lenslink_core::{DescriptionError, DeviceDescription, DeviceRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, trace, warn};

use crate::ssdp::{build_search_request, extract_header, SSDP_MULTICAST_ADDR};

/// Timeout for fetching a single description document
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace period for in-flight description fetches after the search
/// window closes
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("invalid multicast address {addr:?}: {reason}")]
    InvalidAddress { addr: String, reason: String },
    #[error("failed to bind discovery socket: {0}")]
    Bind(#[source] std::io::Error),
    #[error("failed to send search request: {0}")]
    Send(#[source] std::io::Error),
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),
}

/// Discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Address the M-SEARCH request is sent to
    #[serde(default = "default_multicast_addr")]
    pub multicast_addr: String,
    /// SSDP search target (ST header)
    #[serde(default = "default_search_target")]
    pub search_target: String,
    /// MX header: maximum reply delay devices may pick, in seconds
    #[serde(default = "default_mx")]
    pub mx: u32,
    /// How long one discovery session listens for replies
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            multicast_addr: default_multicast_addr(),
            search_target: default_search_target(),
            mx: default_mx(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_multicast_addr() -> String {
    SSDP_MULTICAST_ADDR.to_string()
}

fn default_search_target() -> String {
    "upnp:rootdevice".to_string()
}

fn default_mx() -> u32 {
    1
}

fn default_timeout_secs() -> u64 {
    5
}

/// Per-session registry of description URLs already seen.
///
/// The description URL is the dedup key: a device advertising on several
/// interfaces, or answering several search targets, still yields one
/// record per session.
#[derive(Debug, Default)]
struct ReplyRegistry {
    seen: HashSet<String>,
}

impl ReplyRegistry {
    /// Returns true the first time a URL is registered
    fn register(&mut self, description_url: &str) -> bool {
        self.seen.insert(description_url.to_string())
    }
}

/// Discovery engine. One engine can run any number of sequential
/// sessions; each `discover` call starts a fresh one.
pub struct DiscoveryEngine {
    config: DiscoveryConfig,
    client: reqwest::Client,
}

impl DiscoveryEngine {
    pub fn new(config: DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| DiscoveryError::HttpClient(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Send the search request and start collecting replies.
    ///
    /// The returned session yields device records lazily as replies are
    /// verified; it ends when the configured timeout elapses or `stop`
    /// is called, and cannot be restarted.
    pub async fn discover(&self) -> Result<DiscoverySession, DiscoveryError> {
        let target: SocketAddr =
            self.config
                .multicast_addr
                .parse()
                .map_err(|e: std::net::AddrParseError| DiscoveryError::InvalidAddress {
                    addr: self.config.multicast_addr.clone(),
                    reason: e.to_string(),
                })?;

        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(DiscoveryError::Bind)?;
        socket.set_broadcast(true).map_err(DiscoveryError::Bind)?;

        let request = build_search_request(
            &self.config.multicast_addr,
            &self.config.search_target,
            self.config.mx,
        );
        socket
            .send_to(request.as_bytes(), target)
            .await
            .map_err(DiscoveryError::Send)?;

        info!(
            target = %target,
            st = %self.config.search_target,
            timeout_secs = self.config.timeout_secs,
            "Discovery search sent"
        );

        let (tx, rx) = mpsc::channel(16);
        let live = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(collect_replies(
            socket,
            self.client.clone(),
            Duration::from_secs(self.config.timeout_secs),
            tx,
            live.clone(),
        ));

        Ok(DiscoverySession {
            records: rx,
            live,
            task,
        })
    }
}

/// One bounded search for devices.
///
/// Finite: `recv` returns `None` once the session has ended. Not
/// restartable; create a fresh session to search again.
pub struct DiscoverySession {
    records: mpsc::Receiver<DeviceRecord>,
    live: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl DiscoverySession {
    /// Next discovered device, or `None` when the session has ended
    pub async fn recv(&mut self) -> Option<DeviceRecord> {
        self.records.recv().await
    }

    /// End the session. Idempotent; no record is emitted after this
    /// returns, including from fetches already in flight.
    pub fn stop(&mut self) {
        if self
            .live
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            debug!("Discovery session stopped");
        }
        self.task.abort();
        self.records.close();
    }
}

impl Drop for DiscoverySession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Reply collection loop. Owns the dedup registry for its session.
async fn collect_replies(
    socket: UdpSocket,
    client: reqwest::Client,
    window: Duration,
    tx: mpsc::Sender<DeviceRecord>,
    live: Arc<AtomicBool>,
) {
    let deadline = Instant::now() + window;
    let mut registry = ReplyRegistry::default();
    let mut fetches = JoinSet::new();
    let mut buf = vec![0u8; 8192];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        tokio::select! {
            reply = tokio::time::timeout(remaining, socket.recv_from(&mut buf)) => {
                match reply {
                    Ok(Ok((len, from))) => {
                        let response = String::from_utf8_lossy(&buf[..len]);
                        let Some(location) = extract_header(&response, "LOCATION") else {
                            trace!(from = %from, "Reply without LOCATION header, ignoring");
                            continue;
                        };
                        if !registry.register(location) {
                            trace!(location = %location, "Duplicate advertisement, ignoring");
                            continue;
                        }
                        debug!(location = %location, from = %from, "New device advertisement");

                        let client = client.clone();
                        let tx = tx.clone();
                        let live = live.clone();
                        let location = location.to_string();
                        fetches.spawn(async move {
                            fetch_and_emit(&client, &location, &tx, &live).await;
                        });
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "Discovery socket error, ending session");
                        break;
                    }
                    Err(_) => break, // search window elapsed
                }
            }
            Some(_) = fetches.join_next() => {}
        }
    }

    // Replies already received get a short grace period to finish their
    // description fetch; anything later is discarded.
    let _ = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while fetches.join_next().await.is_some() {}
    })
    .await;

    debug!("Discovery session ended");
}

/// Fetch and parse one description document, emitting the record on
/// success. All failures are local to this reply: logged and skipped,
/// never fatal to the session.
async fn fetch_and_emit(
    client: &reqwest::Client,
    location: &str,
    tx: &mpsc::Sender<DeviceRecord>,
    live: &AtomicBool,
) {
    let body = match fetch_description(client, location).await {
        Ok(body) => body,
        Err(e) => {
            warn!(location = %location, error = %e, "Failed to fetch device description");
            return;
        }
    };

    match DeviceDescription::parse(&body) {
        Ok(description) => {
            let record = description.into_record(location);
            if !live.load(Ordering::SeqCst) {
                debug!(location = %location, "Session stopped, discarding fetched device");
                return;
            }
            info!(device = %record.name, id = %record.id, "Device discovered");
            if tx.send(record).await.is_err() {
                debug!(location = %location, "Subscriber gone, dropping device record");
            }
        }
        Err(DescriptionError::Incomplete) => {
            debug!(location = %location, "Description has no liveview service, skipping device");
        }
        Err(e) => {
            warn!(location = %location, error = %e, "Malformed device description, skipping device");
        }
    }
}

async fn fetch_description(client: &reqwest::Client, url: &str) -> Result<String, reqwest::Error> {
    client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_dedups_by_description_url() {
        let mut registry = ReplyRegistry::default();
        assert!(registry.register("http://192.168.122.1:64321/dd.xml"));
        assert!(!registry.register("http://192.168.122.1:64321/dd.xml"));
        assert!(registry.register("http://192.168.122.2:64321/dd.xml"));
    }

    #[test]
    fn test_config_defaults() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.multicast_addr, SSDP_MULTICAST_ADDR);
        assert_eq!(config.search_target, "upnp:rootdevice");
        assert_eq!(config.mx, 1);
        assert_eq!(config.timeout_secs, 5);
    }
}
