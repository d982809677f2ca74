//! Newline-delimited frame reassembly
//!
//! The worker's stdout gives no guarantee that one read corresponds to one
//! frame, so chunks are accumulated and split on `\n`. The trailing segment
//! after the last newline stays buffered until more bytes arrive.

use tracing::warn;

/// Upper bound for a single buffered frame
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Reassembles raw output chunks into complete text frames
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline
    scanned: usize,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every frame it completed.
    ///
    /// Whitespace-only frames are dropped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.buffer[search_from..].iter().position(|b| *b == b'\n') {
            let end = search_from + offset;
            if let Some(frame) = decode_frame(&self.buffer[start..end]) {
                frames.push(frame);
            }
            start = end + 1;
            search_from = start;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > MAX_FRAME_BYTES {
            warn!(
                "Dropping oversized partial frame ({} bytes)",
                self.buffer.len()
            );
            self.buffer.clear();
            self.scanned = 0;
        }

        frames
    }

    /// Flush whatever is left once the stream has closed
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        decode_frame(&rest)
    }

    /// Bytes waiting for a newline
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_frame(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
