//! Capture coordinator: discovery, streaming, and one-shot capture
//!
//! Composes the discovery engine and a streaming session into one
//! controller. Discovery is armed with `prepare_open_connection`, run
//! with `start`, and the first device advertising a liveview endpoint
//! wins; `take_picture` fires a one-shot request at that device's
//! control endpoint.

use anyhow::{bail, Context, Result};
use lenslink_discovery::{DiscoveryConfig, DiscoveryEngine};
use lenslink_stream::{StreamEvent, StreamingSession};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Timeout for one-shot control requests (capture)
const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);

pub struct CameraController {
    discovery: DiscoveryConfig,
    control: reqwest::Client,
    engine: Option<DiscoveryEngine>,
    session: StreamingSession,
    control_url: Option<String>,
}

impl CameraController {
    pub fn new(discovery: DiscoveryConfig) -> Result<Self> {
        let control = reqwest::Client::builder()
            .timeout(CONTROL_TIMEOUT)
            .build()
            .context("Failed to create control HTTP client")?;
        Ok(Self {
            discovery,
            control,
            engine: None,
            // The streaming client carries no request timeout: the
            // liveview body is unbounded by design
            session: StreamingSession::new(),
            control_url: None,
        })
    }

    /// Arm discovery. Must be called before `start`.
    pub fn prepare_open_connection(&mut self) -> Result<()> {
        let engine = DiscoveryEngine::new(self.discovery.clone())
            .context("Failed to create discovery engine")?;
        self.engine = Some(engine);
        debug!("Discovery armed");
        Ok(())
    }

    /// Run one discovery session and start streaming from the first
    /// usable device found.
    ///
    /// Returns true once a stream is running (discovery is stopped at
    /// that point; later devices are ignored), false if the search
    /// window closed without a usable device.
    pub async fn start(&mut self, frames: mpsc::Sender<StreamEvent>) -> Result<bool> {
        let Some(engine) = self.engine.take() else {
            bail!("discovery not armed; call prepare_open_connection first");
        };

        let mut session = engine
            .discover()
            .await
            .context("Failed to start discovery")?;

        while let Some(record) = session.recv().await {
            if self.session.is_active() {
                debug!(device = %record.name, "Stream already active, ignoring device");
                continue;
            }
            let Some(liveview) = record.liveview_url() else {
                // Parser guarantees a liveview entry; skip just in case
                continue;
            };

            info!(device = %record.name, url = %liveview, "Streaming from first usable device");
            self.control_url = record.control_url().map(str::to_string);
            self.session.start(liveview, frames.clone())?;
            session.stop();
            return Ok(true);
        }

        info!("Discovery ended without a usable device");
        Ok(false)
    }

    /// Issue a one-shot capture command to the device's control
    /// endpoint. Fire-and-forget: failures are logged, never propagated.
    pub fn take_picture(&self) {
        let Some(url) = self.control_url.clone() else {
            warn!("No control endpoint known, ignoring capture request");
            return;
        };
        let client = self.control.clone();
        tokio::spawn(async move {
            debug!(url = %url, "Sending capture request");
            let result = client
                .post(&url)
                .body("capture")
                .send()
                .await
                .and_then(|r| r.error_for_status());
            match result {
                Ok(_) => info!("Capture request accepted"),
                Err(e) => warn!(url = %url, error = %e, "Capture request failed"),
            }
        });
    }

    pub fn is_streaming(&self) -> bool {
        self.session.is_active()
    }

    /// Tear down the active stream, if any. Idempotent.
    pub fn stop_stream(&mut self) {
        self.session.stop();
    }
}
