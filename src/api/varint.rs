//! Base-128 varints: 7 bits per byte, least-significant group first, high
//! bit set on every byte except the last.

/// Encoded width of any `u32` value.
pub const MAX_LEN_U32: usize = 5;

/// Encoded width of any `u64` value.
pub const MAX_LEN_U64: usize = 10;

/// Decode a varint from the start of `buf`.
///
/// Returns `(value, bytes_used)`, or `None` when `buf` ends before a byte
/// without the continuation bit. Groups beyond 64 bits are consumed but
/// their bits discarded, so an over-long encoding never errors.
pub fn decode(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        let shift = 7 * i as u32;
        if shift < u64::BITS {
            value |= u64::from(byte & 0x7F) << shift;
        }
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Append the encoding of `value` to `out`.
pub fn encode(mut value: u64, out: &mut impl Extend<u8>) {
    loop {
        let group = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.extend(core::iter::once(group));
            return;
        }
        out.extend(core::iter::once(group | 0x80));
    }
}

/// Number of bytes `encode(value)` produces.
pub fn encoded_len(value: u64) -> usize {
    let bits = u64::BITS - value.leading_zeros();
    (bits.max(1) as usize).div_ceil(7)
}
