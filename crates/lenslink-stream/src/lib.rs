//! Lenslink Stream - Liveview frame decoding and streaming sessions
//!
//! This crate turns a camera's continuous multipart byte stream into
//! discrete image frames:
//! - An incremental decoder that extracts complete frames from a chunked
//!   byte stream regardless of how the transport fragments it
//! - A streaming session that owns the connection, drives bytes through
//!   the decoder, and delivers frames to a subscriber in order

pub mod decoder;
pub mod session;

pub use decoder::{Frame, FrameDecoder, StreamError};
pub use session::{StreamEvent, StreamingSession};
