//! Receive assembler: turns arbitrary TCP segments into whole frames.
//!
//! Bytes are appended as they arrive and never parsed on arrival. A drain
//! pass then walks the buffer, handing each complete frame to a callback.
//! A frame split across deliveries stays in the buffer until the rest
//! shows up; several frames in one delivery are all handed out in order.

use core::ops::ControlFlow;

use super::codec::{Decoded, Frame, try_decode_frame};

/// Result of a drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Buffer exhausted or holds a partial frame.
    NeedMore,
    /// The callback asked to stop; the frame it saw was not consumed.
    Stopped,
    /// Bad preamble at the head of the buffer.
    Malformed(u8),
    /// More than the configured limit is buffered without a full frame.
    Overflow(usize),
}

/// Growable inbound buffer with frame extraction.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: Vec<u8>,
    limit: usize,
}

impl FrameAssembler {
    pub fn new(reserve: usize, limit: usize) -> Self {
        Self {
            buf: Vec::with_capacity(reserve),
            limit,
        }
    }

    /// Append received bytes. No parsing happens here.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Hand every complete frame at the head of the buffer to `on_frame`.
    ///
    /// A frame's bytes are consumed only after `on_frame` returns
    /// `Continue`. Consumed bytes are removed once, at the end of the pass.
    pub fn drain_frames<F>(&mut self, mut on_frame: F) -> DrainOutcome
    where
        F: FnMut(Frame<'_>) -> ControlFlow<()>,
    {
        let mut offset = 0;
        let outcome = loop {
            match try_decode_frame(&self.buf[offset..]) {
                Decoded::Incomplete => {
                    let pending = self.buf.len() - offset;
                    if pending > self.limit {
                        break DrainOutcome::Overflow(pending);
                    }
                    break DrainOutcome::NeedMore;
                }
                Decoded::Malformed(byte) => break DrainOutcome::Malformed(byte),
                Decoded::Frame(frame) => {
                    let consumed = frame.consumed;
                    if on_frame(frame).is_break() {
                        break DrainOutcome::Stopped;
                    }
                    offset += consumed;
                }
            }
        };
        self.buf.drain(..offset);
        outcome
    }

    /// Bytes waiting for the rest of their frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for FrameAssembler {
    /// Unallocated buffer with the default overflow limit.
    fn default() -> Self {
        Self::new(0, 8192)
    }
}

// ── Tests ────────────────────────────────────────────────────
