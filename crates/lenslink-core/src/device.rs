//! Device types for cameras discovered on the local network

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a discovered device.
///
/// The identity of a device is the URL of its description document --
/// the same value discovery uses to suppress duplicate advertisements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Create a DeviceId from a description-document URL
    pub fn from_description_url(url: &str) -> Self {
        Self(url.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One named capability exposed by a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// Service type token (e.g. "liveview", "control")
    pub service_type: String,
    /// Access URL for the service
    pub url: String,
}

/// A camera discovered on the local network.
///
/// Immutable once constructed; a fresh record is built for every
/// successful description fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Device identity (description-document URL)
    pub id: DeviceId,
    /// Human-readable name from the description document
    pub name: String,
    /// Named service endpoints the device advertises
    pub endpoints: Vec<ServiceEndpoint>,
    /// When the device was discovered
    pub discovered_at: DateTime<Utc>,
}

impl DeviceRecord {
    pub fn new(id: DeviceId, name: String, endpoints: Vec<ServiceEndpoint>) -> Self {
        Self {
            id,
            name,
            endpoints,
            discovered_at: Utc::now(),
        }
    }

    /// Look up the URL for a service type token (case-insensitive)
    pub fn endpoint(&self, service_type: &str) -> Option<&str> {
        self.endpoints
            .iter()
            .find(|e| e.service_type.eq_ignore_ascii_case(service_type))
            .map(|e| e.url.as_str())
    }

    /// URL of the liveview streaming endpoint, if advertised
    pub fn liveview_url(&self) -> Option<&str> {
        self.endpoint(crate::LIVEVIEW_SERVICE)
    }

    /// URL of the camera-control endpoint, if advertised
    pub fn control_url(&self) -> Option<&str> {
        self.endpoint(crate::CONTROL_SERVICE)
    }
}
