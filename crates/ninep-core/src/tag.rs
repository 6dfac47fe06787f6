//! Tag — the 16-bit transaction identifier that correlates a response
//! with its request on a single connection.

use bytes::{Buf, BufMut};

use crate::error::DecodeError;

/// A 9P2000 transaction tag.
pub type Tag = u16;

/// Reserved tag used only for the Version handshake, before any other
/// tag has meaning on the connection.
pub const NOTAG: Tag = 0xFFFF;

/// Wire size of a tag: always 2 bytes.
pub const TAG_SIZE: usize = 2;

pub fn write_tag(tag: Tag, buf: &mut impl BufMut) {
    buf.put_u16_le(tag);
}

pub fn read_tag(buf: &mut impl Buf) -> Result<Tag, DecodeError> {
    if buf.remaining() < TAG_SIZE {
        return Err(DecodeError::ShortBuffer {
            needed: TAG_SIZE,
            have: buf.remaining(),
        });
    }
    Ok(buf.get_u16_le())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips() {
        let mut buf = BytesMut::new();
        write_tag(7, &mut buf);
        assert_eq!(buf.len(), TAG_SIZE);
        let mut cursor = &buf[..];
        assert_eq!(read_tag(&mut cursor).unwrap(), 7);
    }

    #[test]
    fn notag_is_reserved_sentinel() {
        assert_eq!(NOTAG, 0xFFFF);
    }

    #[test]
    fn short_buffer_reported() {
        let mut cursor = &b"\x01"[..];
        assert!(matches!(
            read_tag(&mut cursor),
            Err(DecodeError::ShortBuffer { needed: 2, have: 1 })
        ));
    }
}
