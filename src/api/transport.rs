//! Transport abstraction: one accepted client socket.
//!
//! Concrete implementations:
//! - non-blocking TCP socket (device and host)
//! - in-memory loopback (tests, fuzzing)
//!
//! The connection is generic over `Transport`, so the session engine never
//! sees a socket API.

/// Byte-oriented, non-blocking client channel.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns 0 if no data is available (non-blocking).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write `data`. Callers check [`Transport::space`] first and treat a
    /// short count as a failure.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Push buffered output towards the peer.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Bytes that can be written right now without blocking.
    fn space(&self) -> usize;

    /// Give the network stack one chance to drain the send window.
    fn yield_now(&mut self) {}

    /// Close the socket. Idempotent.
    fn close(&mut self);

    /// True once the peer has gone away.
    fn is_disconnected(&self) -> bool;

    /// Remote address, for log prefixes.
    fn peer(&self) -> &str;

    /// Platform error code of the last failure.
    fn error_code(&self) -> i32 {
        -1
    }
}

/// Lifecycle notifications from an event-driven socket layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent<'a> {
    Connected,
    Data(&'a [u8]),
    Disconnected,
    Error(i32),
    /// Socket-level ACK timeout, in milliseconds.
    Timeout(u32),
}
