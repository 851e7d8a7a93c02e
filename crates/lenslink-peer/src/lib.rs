//! Lenslink Peer - Remote command channel between Host and Client
//!
//! A thin peer-session abstraction carrying opaque, line-delimited text
//! commands over TCP. The Host listens for one incoming peer; the
//! Client seeks a Host and sends commands once connected. The channel
//! is transport only: command contents are never interpreted here.

pub mod client;
pub mod host;

use thiserror::Error;

pub use client::CommandClient;
pub use host::CommandHost;

#[derive(Error, Debug)]
pub enum PeerError {
    /// `send_command` was called while not connected
    #[error("command channel is not connected")]
    NotConnected,
    /// `start` was called on an already running channel
    #[error("command channel already started")]
    AlreadyStarted,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Events delivered to a peer-channel subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// Client role: a connection attempt has begun
    Connecting,
    /// Host role: an incoming peer session arrived
    InvitationReceived,
    /// The peer session is established
    Connected,
    /// Host role: one command payload, in arrival order
    Command(String),
    /// Terminal notification, sent exactly once per session
    Disconnected,
}
