//! Unified error types for the API session engine.
//!
//! Every fatal condition a connection can hit funnels into [`Error`], so
//! the single `terminate` path in the connection has one type to log.
//! All variants are `Copy` so they can be stored in the connection's
//! termination flag without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The inbound byte stream cannot be framed.
    Framing(FramingError),
    /// The peer sent a message its session state does not permit.
    Protocol(ProtocolViolation),
    /// The socket reported a failure.
    Transport(TransportFault),
    /// The peer stopped answering keepalive probes.
    Liveness,
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Framing(e) => write!(f, "framing: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Liveness => write!(f, "keepalive timeout"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Framing errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    /// First byte of a frame was not the `0x00` preamble.
    BadPreamble(u8),
    /// Buffered inbound bytes exceeded the configured limit without
    /// forming a complete frame.
    BufferOverflow(usize),
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadPreamble(b) => write!(f, "invalid preamble 0x{b:02X}"),
            Self::BufferOverflow(n) => write!(f, "{n} bytes buffered without a complete frame"),
        }
    }
}

impl From<FramingError> for Error {
    fn from(e: FramingError) -> Self {
        Self::Framing(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol violations
// ---------------------------------------------------------------------------

/// Each variant carries the offending message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// Message requires a completed hello exchange.
    NoSetup(u32),
    /// Message requires an authenticated session.
    Unauthenticated(u32),
    /// Payload of a known message type could not be decoded.
    BadPayload(u32),
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSetup(t) => write!(f, "type {t} sent before hello"),
            Self::Unauthenticated(t) => write!(f, "type {t} sent without authentication"),
            Self::BadPayload(t) => write!(f, "undecodable payload for type {t}"),
        }
    }
}

impl From<ProtocolViolation> for Error {
    fn from(e: ProtocolViolation) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Transport faults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFault {
    /// Socket error with a platform error code.
    Error(i32),
    /// Socket-level ACK timeout (milliseconds).
    Timeout(u32),
    /// Peer closed the connection.
    Closed,
    /// The device lost its network interface.
    NetworkDown,
}

impl fmt::Display for TransportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(code) => write!(f, "socket error {code}"),
            Self::Timeout(ms) => write!(f, "socket timeout after {ms} ms"),
            Self::Closed => write!(f, "peer closed"),
            Self::NetworkDown => write!(f, "network down"),
        }
    }
}

impl From<TransportFault> for Error {
    fn from(e: TransportFault) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Disconnect reasons
// ---------------------------------------------------------------------------

/// Why a connection ended. Stored as the connection's termination flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Orderly close requested by the peer (`DisconnectRequest`/`Response`).
    ClientRequested,
    /// Orderly close requested by the device side.
    LocalRequest,
    /// Any fatal condition.
    Fatal(Error),
}

impl DisconnectReason {
    /// True for unresponsive-but-connected peers.
    pub fn is_liveness(&self) -> bool {
        matches!(self, Self::Fatal(Error::Liveness))
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientRequested => write!(f, "client requested disconnect"),
            Self::LocalRequest => write!(f, "closed by device"),
            Self::Fatal(e) => write!(f, "{e}"),
        }
    }
}

impl From<Error> for DisconnectReason {
    fn from(e: Error) -> Self {
        Self::Fatal(e)
    }
}

impl From<FramingError> for DisconnectReason {
    fn from(e: FramingError) -> Self {
        Self::Fatal(e.into())
    }
}

impl From<ProtocolViolation> for DisconnectReason {
    fn from(e: ProtocolViolation) -> Self {
        Self::Fatal(e.into())
    }
}

impl From<TransportFault> for DisconnectReason {
    fn from(e: TransportFault) -> Self {
        Self::Fatal(e.into())
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
