//! Fid — the client-chosen 32-bit handle naming a point in the server's
//! file tree.

use bytes::{Buf, BufMut};

use crate::error::DecodeError;

/// A 9P2000 file identifier.
pub type Fid = u32;

/// Reserved fid meaning "no fid" — used as `afid` when auth is skipped.
pub const NOFID: Fid = 0xFFFF_FFFF;

/// Wire size of a fid: always 4 bytes.
pub const FID_SIZE: usize = 4;

pub fn write_fid(fid: Fid, buf: &mut impl BufMut) {
    buf.put_u32_le(fid);
}

pub fn read_fid(buf: &mut impl Buf) -> Result<Fid, DecodeError> {
    if buf.remaining() < FID_SIZE {
        return Err(DecodeError::ShortBuffer {
            needed: FID_SIZE,
            have: buf.remaining(),
        });
    }
    Ok(buf.get_u32_le())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips() {
        let mut buf = BytesMut::new();
        write_fid(42, &mut buf);
        let mut cursor = &buf[..];
        assert_eq!(read_fid(&mut cursor).unwrap(), 42);
    }

    #[test]
    fn nofid_is_reserved_sentinel() {
        assert_eq!(NOFID, 0xFFFF_FFFF);
    }
}
