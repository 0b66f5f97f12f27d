//! Non-blocking TCP transport adapter.
//!
//! Implements [`Transport`](crate::api::transport::Transport) over one
//! accepted `std::net::TcpStream`. ESP-IDF exposes lwIP sockets through
//! `std::net`, so the same code runs on the device and on the host.
//!
//! ## Send window
//!
//! BSD sockets do not report free send-buffer space, so the adapter keeps
//! its own bounded outbound queue:
//!
//! 1. `space()` is the room left in the queue.
//! 2. `write()` appends to the queue; it never splits a write.
//! 3. `flush()` and `yield_now()` push queued bytes into the socket until
//!    it would block. Whatever the socket refuses stays queued.

use core::fmt;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

use log::{debug, info};

use crate::api::transport::Transport;

// ───────────────────────────────────────────────────────────────
// Error type
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpTransportError {
    /// Socket I/O failure.
    Io(ErrorKind),
    /// The socket was closed, locally or by the peer.
    NotConnected,
    /// A write larger than the free send window.
    WindowFull,
}

impl fmt::Display for TcpTransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(kind) => write!(f, "socket I/O error: {kind}"),
            Self::NotConnected => write!(f, "not connected"),
            Self::WindowFull => write!(f, "send window full"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// TcpTransport
// ───────────────────────────────────────────────────────────────

pub struct TcpTransport {
    stream: Option<TcpStream>,
    peer: String,
    pending: Vec<u8>,
    window: usize,
    last_error: i32,
}

impl TcpTransport {
    /// Wrap an accepted stream and switch it to non-blocking mode.
    pub fn new(stream: TcpStream, addr: SocketAddr, window: usize) -> std::io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream: Some(stream),
            peer: addr.ip().to_string(),
            pending: Vec::with_capacity(window),
            window,
            last_error: 0,
        })
    }

    /// Queued bytes the socket has not taken yet.
    pub fn queued(&self) -> usize {
        self.pending.len()
    }

    fn fail(&mut self, err: &std::io::Error) -> TcpTransportError {
        self.last_error = err.raw_os_error().unwrap_or(-1);
        debug!("TCP[{}]: {}", self.peer, err);
        self.stream.take();
        TcpTransportError::Io(err.kind())
    }

    /// Move queued bytes into the socket until it would block.
    fn drain_pending(&mut self) -> Result<(), TcpTransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TcpTransportError::NotConnected);
        };
        let mut sent = 0;
        let result = loop {
            if sent == self.pending.len() {
                break Ok(());
            }
            match stream.write(&self.pending[sent..]) {
                Ok(0) => break Err(std::io::Error::from(ErrorKind::WriteZero)),
                Ok(n) => sent += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };
        self.pending.drain(..sent);
        result.map_err(|e| self.fail(&e))
    }
}

// ───────────────────────────────────────────────────────────────
// Transport implementation
// ───────────────────────────────────────────────────────────────

impl Transport for TcpTransport {
    type Error = TcpTransportError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TcpTransportError> {
        let stream = self.stream.as_mut().ok_or(TcpTransportError::NotConnected)?;
        match stream.read(buf) {
            Ok(0) => {
                // Orderly close: no bytes, and `is_disconnected` now reports it.
                info!("TCP[{}]: peer closed (EOF)", self.peer);
                self.stream.take();
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => Ok(0),
            Err(e) => Err(self.fail(&e)),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TcpTransportError> {
        if self.stream.is_none() {
            return Err(TcpTransportError::NotConnected);
        }
        if data.len() > self.space() {
            return Err(TcpTransportError::WindowFull);
        }
        self.pending.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), TcpTransportError> {
        self.drain_pending()
    }

    fn space(&self) -> usize {
        if self.stream.is_none() {
            return 0;
        }
        self.window.saturating_sub(self.pending.len())
    }

    fn yield_now(&mut self) {
        // A failure here resurfaces on the next flush or read.
        let _ = self.drain_pending();
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            // Best effort: push out what is queued (e.g. DisconnectResponse).
            let _ = stream.write_all(&self.pending);
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.pending.clear();
    }

    fn is_disconnected(&self) -> bool {
        self.stream.is_none()
    }

    fn peer(&self) -> &str {
        &self.peer
    }

    fn error_code(&self) -> i32 {
        self.last_error
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

// ───────────────────────────────────────────────────────────────
// Tests (host only)
// ───────────────────────────────────────────────────────────────
