//! In-memory transport for host tests and fuzzing.
//!
//! [`loopback`] returns the device end (a [`Transport`]) and a
//! [`LoopbackPeer`] handle that plays the client: it queues inbound
//! bytes, scripts the send window and collects what the device wrote.
//! Both ends share state through `Rc<RefCell<..>>`, matching the
//! single-threaded service loop.

use core::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::api::codec::{Decoded, try_decode_frame};
use crate::api::transport::Transport;

#[derive(Debug, Default)]
struct Shared {
    inbound: VecDeque<u8>,
    written: Vec<u8>,
    space: usize,
    space_after_yield: Option<usize>,
    yields: u32,
    disconnected: bool,
    closed: bool,
    fail_writes: bool,
}

/// Device end of the loopback pair.
pub struct LoopbackTransport {
    shared: Rc<RefCell<Shared>>,
    peer: String,
}

/// Client end of the loopback pair.
#[derive(Clone)]
pub struct LoopbackPeer {
    shared: Rc<RefCell<Shared>>,
}

/// Create a connected pair with a fixed send window of `space` bytes.
pub fn loopback(peer: &str, space: usize) -> (LoopbackTransport, LoopbackPeer) {
    let shared = Rc::new(RefCell::new(Shared {
        space,
        ..Shared::default()
    }));
    (
        LoopbackTransport {
            shared: shared.clone(),
            peer: peer.to_owned(),
        },
        LoopbackPeer { shared },
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopbackError {
    Closed,
    Injected,
}

impl Transport for LoopbackTransport {
    type Error = LoopbackError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LoopbackError> {
        let mut s = self.shared.borrow_mut();
        if s.closed {
            return Err(LoopbackError::Closed);
        }
        let n = buf.len().min(s.inbound.len());
        for (dst, src) in buf.iter_mut().zip(s.inbound.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, LoopbackError> {
        let mut s = self.shared.borrow_mut();
        if s.closed {
            return Err(LoopbackError::Closed);
        }
        if s.fail_writes {
            return Err(LoopbackError::Injected);
        }
        s.written.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), LoopbackError> {
        Ok(())
    }

    fn space(&self) -> usize {
        self.shared.borrow().space
    }

    fn yield_now(&mut self) {
        let mut s = self.shared.borrow_mut();
        s.yields += 1;
        if let Some(space) = s.space_after_yield.take() {
            s.space = space;
        }
    }

    fn close(&mut self) {
        self.shared.borrow_mut().closed = true;
    }

    fn is_disconnected(&self) -> bool {
        self.shared.borrow().disconnected
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

impl LoopbackPeer {
    /// Queue bytes for the device to read.
    pub fn send(&self, bytes: &[u8]) {
        self.shared.borrow_mut().inbound.extend(bytes);
    }

    /// Everything the device wrote since the last call.
    pub fn take_written(&self) -> Vec<u8> {
        core::mem::take(&mut self.shared.borrow_mut().written)
    }

    /// Decode everything written since the last call into
    /// `(msg_type, payload)` pairs. A trailing partial frame is dropped.
    pub fn take_frames(&self) -> Vec<(u32, Vec<u8>)> {
        let bytes = self.take_written();
        let mut frames = Vec::new();
        let mut rest = bytes.as_slice();
        while let Decoded::Frame(f) = try_decode_frame(rest) {
            frames.push((f.msg_type, f.payload.to_vec()));
            rest = &rest[f.consumed..];
        }
        frames
    }

    pub fn set_space(&self, space: usize) {
        self.shared.borrow_mut().space = space;
    }

    /// Window the device sees after its next `yield_now`.
    pub fn set_space_after_yield(&self, space: usize) {
        self.shared.borrow_mut().space_after_yield = Some(space);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.shared.borrow_mut().fail_writes = fail;
    }

    /// Simulate the client dropping the connection.
    pub fn disconnect(&self) {
        self.shared.borrow_mut().disconnected = true;
    }

    /// True once the device closed its end.
    pub fn is_closed(&self) -> bool {
        self.shared.borrow().closed
    }

    pub fn yields(&self) -> u32 {
        self.shared.borrow().yields
    }
}
