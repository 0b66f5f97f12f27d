//! Frame codec for the native API wire envelope.
//!
//! Wire format:
//! ```text
//! ┌──────────┬──────────────────┬────────────────┬─────────────────────┐
//! │ 0x00 (1B)│ varint length    │ varint type    │ payload (length B)  │
//! └──────────┴──────────────────┴────────────────┴─────────────────────┘
//! ```
//!
//! Decoding is stateless: [`try_decode_frame`] looks at the start of a
//! buffer and says whether a whole frame is there. The receive side keeps
//! the buffer (see [`super::assembler`]). The protocol has no way to
//! resynchronise, so a bad preamble poisons the rest of the stream.

use heapless::Vec as HVec;

use super::varint;

/// Fixed first byte of every frame.
pub const PREAMBLE: u8 = 0x00;

/// Largest header for 32-bit length and type values.
pub const MAX_HEADER_LEN: usize = 1 + 2 * varint::MAX_LEN_U32;

/// One complete frame borrowed from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub msg_type: u32,
    pub payload: &'a [u8],
    /// Preamble + both varints + payload.
    pub consumed: usize,
}

/// Outcome of one decode attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded<'a> {
    /// More bytes are needed; nothing is wrong yet.
    Incomplete,
    /// First byte was not [`PREAMBLE`].
    Malformed(u8),
    Frame(Frame<'a>),
}

/// Try to decode one frame from the start of `buf`.
pub fn try_decode_frame(buf: &[u8]) -> Decoded<'_> {
    let Some(&first) = buf.first() else {
        return Decoded::Incomplete;
    };
    if first != PREAMBLE {
        return Decoded::Malformed(first);
    }

    let mut pos = 1;
    let Some((len, used)) = varint::decode(&buf[pos..]) else {
        return Decoded::Incomplete;
    };
    pos += used;
    let Some((msg_type, used)) = varint::decode(&buf[pos..]) else {
        return Decoded::Incomplete;
    };
    pos += used;

    // Lengths beyond the address space can never be satisfied.
    let Ok(len) = usize::try_from(len) else {
        return Decoded::Incomplete;
    };
    if buf.len() - pos < len {
        return Decoded::Incomplete;
    }

    Decoded::Frame(Frame {
        // Types wider than 32 bits are never routed; saturate them.
        msg_type: u32::try_from(msg_type).unwrap_or(u32::MAX),
        payload: &buf[pos..pos + len],
        consumed: pos + len,
    })
}

/// Encoded frame header, built on the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    bytes: HVec<u8, MAX_HEADER_LEN>,
}

impl FrameHeader {
    pub fn new(msg_type: u32, payload_len: usize) -> Self {
        let mut bytes = HVec::new();
        // Capacity covers 1 + 5 + 5 bytes; a u32 never needs more.
        let _ = bytes.push(PREAMBLE);
        let mut sink = HeaderSink(&mut bytes);
        varint::encode(payload_len as u64, &mut sink);
        varint::encode(u64::from(msg_type), &mut sink);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

struct HeaderSink<'a>(&'a mut HVec<u8, MAX_HEADER_LEN>);

impl Extend<u8> for HeaderSink<'_> {
    fn extend<I: IntoIterator<Item = u8>>(&mut self, iter: I) {
        for b in iter {
            let _ = self.0.push(b);
        }
    }
}

/// Total wire size of a frame carrying `payload_len` bytes.
pub fn frame_len(msg_type: u32, payload_len: usize) -> usize {
    1 + varint::encoded_len(payload_len as u64)
        + varint::encoded_len(u64::from(msg_type))
        + payload_len
}

/// Append a complete frame to `out`.
pub fn encode_frame(msg_type: u32, payload: &[u8], out: &mut Vec<u8>) {
    let header = FrameHeader::new(msg_type, payload.len());
    out.reserve(header.len() + payload.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
}

// ── Tests ────────────────────────────────────────────────────
