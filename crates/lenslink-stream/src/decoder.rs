//! Incremental decoding of the liveview multipart stream
//!
//! The stream is a sequence of parts. Each part begins with a small
//! ASCII header block terminated by a blank line and carrying a
//! mandatory `Content-Length` field, followed by exactly that many
//! payload bytes, followed by a boundary line before the next header.
//! The transport delivers arbitrary chunks with no relation to part
//! boundaries, so the decoder buffers unresolved bytes between calls.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Frame boundaries are lost; the session cannot recover by skipping
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The connection closed mid-header or mid-payload
    #[error("stream truncated mid-frame")]
    Truncated,
    /// Connection-level failure (connect, read, bad status)
    #[error("connection failed: {0}")]
    Connect(String),
    /// `start` was called while a session is already running
    #[error("streaming session already active")]
    AlreadyActive,
}

/// One decoded unit: an image payload ready for image decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    AwaitingHeader,
    AwaitingPayload { length: usize },
}

/// Incremental frame decoder.
///
/// Decoder state is connection-scoped: construct a fresh decoder for
/// every connection, never reuse one across a socket re-open.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    state: DecodeState,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            state: DecodeState::AwaitingHeader,
        }
    }

    /// Number of buffered bytes not yet resolved into a frame
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Append a chunk and extract every frame that is now complete.
    ///
    /// Frames are returned in the order their payloads completed in the
    /// byte stream. Bytes not yet forming a complete frame stay buffered
    /// for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, StreamError> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        loop {
            match self.state {
                DecodeState::AwaitingHeader => {
                    self.discard_noise();
                    match self.take_header_block()? {
                        Some(length) => {
                            self.state = DecodeState::AwaitingPayload { length };
                        }
                        None => break,
                    }
                }
                DecodeState::AwaitingPayload { length } => {
                    if self.buf.len() < length {
                        break;
                    }
                    let payload: Vec<u8> = self.buf.drain(..length).collect();
                    frames.push(Frame { payload });
                    self.state = DecodeState::AwaitingHeader;
                }
            }
        }

        Ok(frames)
    }

    /// End-of-connection check.
    ///
    /// A close while awaiting a header with nothing buffered (boundary
    /// trailer text included) is a clean stop; anything else left the
    /// stream mid-frame.
    pub fn finish(&mut self) -> Result<(), StreamError> {
        if let DecodeState::AwaitingPayload { .. } = self.state {
            return Err(StreamError::Truncated);
        }
        self.discard_noise();
        // A final "--boundary--" trailer may arrive without a newline
        if self.buf.starts_with(b"--") && !self.buf.contains(&b'\n') {
            self.buf.clear();
        }
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(StreamError::Truncated)
        }
    }

    /// Drop complete blank lines and boundary lines from the front of
    /// the buffer. Incomplete lines stay put until more bytes arrive.
    fn discard_noise(&mut self) {
        loop {
            if self.buf.starts_with(b"\r\n") {
                self.buf.drain(..2);
            } else if self.buf.starts_with(b"\n") {
                self.buf.drain(..1);
            } else if self.buf.starts_with(b"--") {
                match self.buf.iter().position(|&b| b == b'\n') {
                    Some(end) => {
                        self.buf.drain(..end + 1);
                    }
                    None => break,
                }
            } else {
                break;
            }
        }
    }

    /// Consume a complete header block from the front of the buffer and
    /// return its content length. `Ok(None)` means the terminator has
    /// not arrived yet.
    fn take_header_block(&mut self) -> Result<Option<usize>, StreamError> {
        let Some((block_end, consumed)) = find_blank_line(&self.buf) else {
            return Ok(None);
        };

        let header = String::from_utf8_lossy(&self.buf[..block_end]).into_owned();
        self.buf.drain(..consumed);

        let length = parse_content_length(&header)?;
        Ok(Some(length))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate the blank line terminating a header block. Returns the offset
/// where the header text ends and the total bytes to consume.
fn find_blank_line(buf: &[u8]) -> Option<(usize, usize)> {
    let crlf = find(buf, b"\r\n\r\n").map(|i| (i, i + 4));
    let lf = find(buf, b"\n\n").map(|i| (i + 1, i + 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Extract the Content-Length field from a header block. Absent or
/// invalid length is a protocol error: without it the frame boundary is
/// unknown and the stream cannot be re-synchronized.
fn parse_content_length(header: &str) -> Result<usize, StreamError> {
    for line in header.lines() {
        if line.starts_with("--") || line.trim().is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            return value.trim().parse::<usize>().map_err(|_| {
                StreamError::Protocol(format!("invalid Content-Length value: {:?}", value.trim()))
            });
        }
    }
    Err(StreamError::Protocol(
        "header block missing Content-Length".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "--frameboundary";

    fn part(payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(
            format!(
                "{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
                BOUNDARY,
                payload.len()
            )
            .as_bytes(),
        );
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(b"\r\n");
        bytes
    }

    fn payloads(frames: &[Frame]) -> Vec<Vec<u8>> {
        frames.iter().map(|f| f.payload.clone()).collect()
    }

    #[test]
    fn test_single_frame_exact_boundary_leaves_buffer_empty() {
        let mut decoder = FrameDecoder::new();
        let mut stream = format!("{}\r\nContent-Length: 4\r\n\r\n", BOUNDARY).into_bytes();
        stream.extend_from_slice(b"\x01\x02\x03\x04");

        let frames = decoder.feed(&stream).unwrap();
        assert_eq!(payloads(&frames), vec![b"\x01\x02\x03\x04".to_vec()]);
        assert_eq!(decoder.pending(), 0);
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn test_multiple_frames_in_one_feed() {
        let mut decoder = FrameDecoder::new();
        let mut stream = Vec::new();
        stream.extend_from_slice(&part(b"first"));
        stream.extend_from_slice(&part(b"second"));
        stream.extend_from_slice(&part(b"third"));

        let frames = decoder.feed(&stream).unwrap();
        assert_eq!(
            payloads(&frames),
            vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]
        );
    }

    #[test]
    fn test_chunking_invariance_byte_by_byte() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&part(b"alpha payload"));
        stream.extend_from_slice(&part(b"\xff\xd8\x00\x01\x02"));
        stream.extend_from_slice(&part(b"gamma"));

        let mut whole = FrameDecoder::new();
        let expected = whole.feed(&stream).unwrap();
        assert_eq!(expected.len(), 3);

        let mut decoder = FrameDecoder::new();
        let mut collected = Vec::new();
        for &byte in &stream {
            collected.extend(decoder.feed(&[byte]).unwrap());
        }
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_chunking_invariance_every_split_point() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&part(b"one"));
        stream.extend_from_slice(&part(b"two"));

        let mut whole = FrameDecoder::new();
        let expected = whole.feed(&stream).unwrap();

        for split in 0..=stream.len() {
            let mut decoder = FrameDecoder::new();
            let mut collected = decoder.feed(&stream[..split]).unwrap();
            collected.extend(decoder.feed(&stream[split..]).unwrap());
            assert_eq!(collected, expected, "split at {}", split);
        }
    }

    #[test]
    fn test_three_feed_calls_yield_one_frame() {
        // Header + 10 payload bytes + boundary, split at arbitrary points
        let payload: &[u8] = b"0123456789";
        let stream = part(payload);

        let mut decoder = FrameDecoder::new();
        let mut collected = Vec::new();
        collected.extend(decoder.feed(&stream[..7]).unwrap());
        collected.extend(decoder.feed(&stream[7..30]).unwrap());
        collected.extend(decoder.feed(&stream[30..]).unwrap());

        assert_eq!(payloads(&collected), vec![payload.to_vec()]);
    }

    #[test]
    fn test_payload_bytes_are_opaque() {
        // Payload containing CRLFs and boundary-like text must pass
        // through untouched
        let tricky = b"\r\n--frameboundary\r\nContent-Length: 3\r\n\r\n";
        let mut stream = part(tricky);
        stream.extend_from_slice(&part(b"after"));

        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&stream).unwrap();
        assert_eq!(payloads(&frames), vec![tricky.to_vec(), b"after".to_vec()]);
    }

    #[test]
    fn test_partial_header_produces_no_frames() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder
            .feed(format!("{}\r\nContent-Length: 10\r\n", BOUNDARY).as_bytes())
            .unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn test_missing_content_length_is_protocol_error() {
        let mut decoder = FrameDecoder::new();
        let result = decoder.feed(format!("{}\r\nContent-Type: image/jpeg\r\n\r\n", BOUNDARY).as_bytes());
        match result {
            Err(StreamError::Protocol(_)) => {}
            other => panic!("expected Protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_content_length_is_protocol_error() {
        let mut decoder = FrameDecoder::new();
        let result = decoder.feed(format!("{}\r\nContent-Length: many\r\n\r\n", BOUNDARY).as_bytes());
        assert!(matches!(result, Err(StreamError::Protocol(_))));
    }

    #[test]
    fn test_close_mid_payload_is_truncated() {
        let mut decoder = FrameDecoder::new();
        let stream = part(b"full payload");
        decoder.feed(&stream[..stream.len() - 6]).unwrap();
        assert_eq!(decoder.finish(), Err(StreamError::Truncated));
    }

    #[test]
    fn test_close_mid_header_is_truncated() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(b"Content-Len").unwrap();
        assert_eq!(decoder.finish(), Err(StreamError::Truncated));
    }

    #[test]
    fn test_close_after_trailer_is_clean() {
        let mut decoder = FrameDecoder::new();
        let mut stream = part(b"last frame");
        stream.extend_from_slice(b"--frameboundary--\r\n");
        let frames = decoder.feed(&stream).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn test_close_after_trailer_without_newline_is_clean() {
        let mut decoder = FrameDecoder::new();
        let mut stream = part(b"last frame");
        stream.extend_from_slice(b"--frameboundary--");
        decoder.feed(&stream).unwrap();
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn test_lf_only_header_terminator() {
        let mut decoder = FrameDecoder::new();
        let mut stream = b"Content-Length: 3\n\n".to_vec();
        stream.extend_from_slice(b"abc");
        let frames = decoder.feed(&stream).unwrap();
        assert_eq!(payloads(&frames), vec![b"abc".to_vec()]);
        assert_eq!(decoder.pending(), 0);
    }
}
