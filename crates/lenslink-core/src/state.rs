//! Connection state shared by streaming and peer sessions

use serde::{Deserialize, Serialize};

/// Lifecycle state of a network session.
///
/// Exactly one state holds at a time per session instance; transitions
/// drive subscriber notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Session created, no connection attempted yet
    Idle,
    /// Connection attempt in progress
    Connecting,
    /// Connection established
    Connected,
    /// Connection closed (cleanly or after a failure)
    Disconnected,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        write!(f, "{}", s)
    }
}
