//! Lenslink Discovery - SSDP camera discovery
//!
//! This crate locates network-attached cameras:
//! - An M-SEARCH multicast request solicits device advertisements
//! - Replies carry the URL of a device-description XML document
//! - Each new description URL is fetched, parsed, and emitted as a
//!   device record; duplicates and unusable devices are dropped

pub mod engine;
pub mod ssdp;

pub use engine::{DiscoveryConfig, DiscoveryEngine, DiscoveryError, DiscoverySession};
