// Variable-length integers for the delta format.
//
// Base-128, big-endian: the most significant 7-bit group comes first and
// every byte except the last has bit 7 set.  300 encodes as 0x82 0x2C.

use std::io::{self, Write};

use thiserror::Error;

/// Longest encoding of a `u64` (ceil(64 / 7)).
pub const MAX_VARINT_LEN: usize = 10;

/// Bits that must be clear before another `<< 7` fits in a `u64`.
const OVERFLOW_MASK: u64 = 0xFE00_0000_0000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VarIntError {
    #[error("varint truncated")]
    Truncated,
    #[error("varint overflow")]
    Overflow,
}

/// Encode `num` into the tail of `buf`; returns the encoded length.
/// The encoding occupies `buf[MAX_VARINT_LEN - len..]`.
#[inline]
pub fn encode_u64(mut num: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = MAX_VARINT_LEN;
    loop {
        i -= 1;
        buf[i] = (num as u8 & 0x7F) | 0x80;
        num >>= 7;
        if num == 0 {
            break;
        }
    }
    buf[MAX_VARINT_LEN - 1] &= 0x7F;
    MAX_VARINT_LEN - i
}

/// Append the encoding of `num` to `out`.
pub fn push_usize(out: &mut Vec<u8>, num: usize) {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u64(num as u64, &mut buf);
    out.extend_from_slice(&buf[MAX_VARINT_LEN - len..]);
}

/// Write the encoding of `num` to a sink.
pub fn write_usize<W: Write>(w: &mut W, num: usize) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u64(num as u64, &mut buf);
    w.write_all(&buf[MAX_VARINT_LEN - len..])
}

/// Decode a `u64` from the front of `data`; returns `(value, consumed)`.
pub fn read_u64(data: &[u8]) -> Result<(u64, usize), VarIntError> {
    let mut val: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if val & OVERFLOW_MASK != 0 {
            return Err(VarIntError::Overflow);
        }
        val = (val << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
    }
    Err(VarIntError::Truncated)
}

/// Decode a `usize` from the front of `data`.
pub fn read_usize(data: &[u8]) -> Result<(usize, usize), VarIntError> {
    let (val, len) = read_u64(data)?;
    let val = usize::try_from(val).map_err(|_| VarIntError::Overflow)?;
    Ok((val, len))
}

/// Encoded length of `num`.
#[inline]
pub fn encoded_len(num: usize) -> usize {
    let bits = u64::BITS - (num as u64).leading_zeros();
    bits.max(1).div_ceil(7) as usize
}
