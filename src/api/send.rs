//! Send path: frame a payload and write it whole, or not at all.
//!
//! ```text
//!   needed = |header| + |payload|
//!   needed ≤ space? ──yes──▶ write header, payload, flush
//!        │ no
//!        ▼
//!   yield_now, recheck ──yes──▶ write …
//!        │ no
//!        ▼
//!   Shortfall (nothing written)
//! ```
//!
//! A shortfall is never fatal here; the caller decides to drop or retry.
//! A transport error is reported so the connection can terminate.

use crate::error::TransportFault;

use super::codec::FrameHeader;
use super::messages::ApiMessage;
use super::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Not enough socket space even after one yield.
    Shortfall { needed: usize, space: usize },
    /// The message could not be serialised.
    Encode,
    /// The socket failed mid-write.
    Transport(TransportFault),
}

/// Per-connection send counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStats {
    pub frames_sent: u32,
    pub bytes_sent: u64,
    pub shortfalls: u32,
}

/// Owns the transport and the reusable payload scratch buffer.
pub struct SendPath<T: Transport> {
    transport: T,
    scratch: Vec<u8>,
    stats: SendStats,
}

impl<T: Transport> SendPath<T> {
    pub fn new(transport: T, scratch_reserve: usize) -> Self {
        Self {
            transport,
            scratch: Vec::with_capacity(scratch_reserve),
            stats: SendStats::default(),
        }
    }

    /// Frame `payload` as `msg_type` and write it if it fits.
    pub fn try_send(&mut self, msg_type: u32, payload: &[u8]) -> Result<(), SendError> {
        let header = FrameHeader::new(msg_type, payload.len());
        let needed = header.len() + payload.len();

        if needed > self.transport.space() {
            self.transport.yield_now();
            let space = self.transport.space();
            if needed > space {
                self.stats.shortfalls += 1;
                return Err(SendError::Shortfall { needed, space });
            }
        }

        self.write_all(header.as_bytes())?;
        self.write_all(payload)?;
        self.transport
            .flush()
            .map_err(|_| SendError::Transport(TransportFault::Error(self.transport.error_code())))?;

        self.stats.frames_sent += 1;
        self.stats.bytes_sent += needed as u64;
        Ok(())
    }

    /// Encode `msg` into the scratch buffer and send it.
    pub fn send_message<M: ApiMessage>(&mut self, msg: &M) -> Result<(), SendError> {
        let mut buf = core::mem::take(&mut self.scratch);
        buf.clear();
        let buf = postcard::to_extend(msg, buf).map_err(|_| SendError::Encode)?;
        let result = self.try_send(M::TYPE, &buf);
        self.scratch = buf;
        result
    }

    pub fn space(&self) -> usize {
        self.transport.space()
    }

    pub fn stats(&self) -> SendStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), SendError> {
        if data.is_empty() {
            return Ok(());
        }
        match self.transport.write(data) {
            Ok(n) if n == data.len() => Ok(()),
            _ => Err(SendError::Transport(TransportFault::Error(
                self.transport.error_code(),
            ))),
        }
    }
}
