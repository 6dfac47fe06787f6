//! `Data` — the length-prefixed UTF-8 string representation shared by
//! every string field in 9P2000 (uname, aname, ename, wname elements,
//! the negotiated version string, ...).
//!
//! Wire form: `n[2] bytes[n]`. A zero-length string is valid and common
//! (`aname = ""` is the default attach point).

use bytes::BufMut;

use crate::error::{DecodeError, EncodeError};

/// Wire size of a string, including its 2-byte length prefix.
pub fn sizeof_str(s: &str) -> usize {
    2 + s.len()
}

pub fn write_str(s: &str, buf: &mut impl BufMut) -> Result<usize, EncodeError> {
    if s.len() > u16::MAX as usize {
        return Err(EncodeError::StringTooLong(s.len()));
    }
    buf.put_u16_le(s.len() as u16);
    buf.put_slice(s.as_bytes());
    Ok(sizeof_str(s))
}

/// Parse a string from the front of `buf`, returning the value and the
/// unconsumed remainder. Never partially consumes `buf` on failure.
pub fn read_str(buf: &[u8]) -> Result<(String, &[u8]), DecodeError> {
    if buf.len() < 2 {
        return Err(DecodeError::ShortBuffer { needed: 2, have: buf.len() });
    }
    let len = u16::from_le_bytes([buf[0], buf[1]]) as usize;
    let total = 2 + len;
    if buf.len() < total {
        return Err(DecodeError::ShortBuffer { needed: total, have: buf.len() });
    }
    let s = std::str::from_utf8(&buf[2..total])
        .map_err(|e| DecodeError::malformed("string", e.to_string()))?
        .to_string();
    Ok((s, &buf[total..]))
}
