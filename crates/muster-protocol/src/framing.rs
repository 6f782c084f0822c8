//! Length-prefixed framing over a chunked byte stream.
//!
//! A frame is a 4-byte big-endian unsigned payload length followed by the
//! UTF-8 payload. The transport may pack several frames into one delivery or
//! split one frame across many; [`FrameDecoder`] reassembles either way and
//! never fails on partial input.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

/// Size of the big-endian length prefix.
const LENGTH_PREFIX: usize = 4;

/// Encode one payload as a length-prefixed frame.
#[must_use]
pub fn encode_frame(text: &str) -> Bytes {
    let payload = text.as_bytes();
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Stateful reassembler for length-prefixed frames.
///
/// Feed it raw transport deliveries; it yields every complete payload and
/// buffers any trailing partial frame for the next call.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete frame from the buffer.
    ///
    /// A complete frame whose payload is not valid UTF-8 is dropped with a
    /// warning; the stream stays aligned because the length prefix was read
    /// before the payload.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        loop {
            if self.buf.len() < LENGTH_PREFIX {
                return frames;
            }
            let length = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]])
                as usize;
            if self.buf.len() < LENGTH_PREFIX + length {
                return frames;
            }
            self.buf.advance(LENGTH_PREFIX);
            let payload = self.buf.split_to(length);
            match String::from_utf8(payload.to_vec()) {
                Ok(text) => frames.push(text),
                Err(e) => warn!(length, error = %e, "dropping frame with non-UTF-8 payload"),
            }
        }
    }

    /// Bytes buffered waiting for the rest of a frame.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
