use crate::codec::{
    data_count_from_header, decode, frame_len, is_header_byte, Frame, MAX_FRAME_LEN,
};
use tracing::trace;

use crate::error::Result;
use crate::kind::FrameKind;

/// Incremental, self-resynchronizing frame assembler.
///
/// Feed it the received byte stream one byte at a time. A header byte always
/// starts a new frame, even in the middle of another one, so any amount of
/// noise or loss is recovered from at the next header.
#[derive(Debug, Clone)]
pub struct FrameReceiver {
    buf: [u8; MAX_FRAME_LEN],
    /// Bytes collected for the current frame; 0 while waiting for a header.
    count: usize,
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReceiver {
    /// Create a receiver waiting for a header.
    pub fn new() -> Self {
        Self {
            buf: [0; MAX_FRAME_LEN],
            count: 0,
        }
    }

    /// Consume one byte.
    ///
    /// Returns `Some` once a frame is complete: `Ok` with the decoded frame,
    /// or `Err` if the collected bytes do not decode. Either way the receiver
    /// is back to waiting for a header.
    pub fn push(&mut self, byte: u8) -> Option<Result<Frame>> {
        if is_header_byte(byte) {
            if self.count > 0 {
                trace!(dropped = self.count, "header interrupted partial frame");
            }
            self.buf[0] = byte;
            self.count = 1;
            return None;
        }
        if self.count == 0 {
            return None;
        }
        if self.count >= MAX_FRAME_LEN {
            trace!("frame buffer overflow, waiting for next header");
            self.count = 0;
            return None;
        }

        self.buf[self.count] = byte;
        self.count += 1;

        let header = self.buf[0];
        let expected = frame_len(
            FrameKind::from_header(header),
            data_count_from_header(header),
        );
        if self.count < expected {
            return None;
        }

        let len = self.count;
        self.count = 0;
        Some(decode(&self.buf[..len]))
    }

    /// Consume a slice, collecting every completed frame and decode error.
    pub fn push_slice(&mut self, bytes: &[u8]) -> Vec<Result<Frame>> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Drop any partial frame and wait for the next header.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Whether a header has been seen and a frame is being collected.
    pub fn is_collecting(&self) -> bool {
        self.count > 0
    }

    /// Bytes collected for the frame in progress.
    pub fn pending_len(&self) -> usize {
        self.count
    }
}
