//! Lenslink Core - Core types and device-description parsing
//!
//! This crate provides the foundational types for the lenslink system:
//! - Device records for cameras discovered on the local network
//! - Single-pass parsing of device-description XML documents
//! - Connection state shared by streaming and peer sessions

pub mod description;
pub mod device;
pub mod state;

pub use description::{DescriptionError, DeviceDescription};
pub use device::{DeviceId, DeviceRecord, ServiceEndpoint};
pub use state::ConnectionState;

/// Service type token identifying the liveview (streaming) endpoint
pub const LIVEVIEW_SERVICE: &str = "liveview";

/// Service type token identifying the camera-control endpoint
pub const CONTROL_SERVICE: &str = "control";
