//! Stat — the variable-length directory entry descriptor, prefixed by an
//! inner size so a reader that doesn't understand every field can still
//! skip over a whole record.

use bytes::BufMut;

use crate::data::{read_str, sizeof_str, write_str};
use crate::error::{DecodeError, EncodeError};
use crate::qid::{Qid, QID_SIZE};

/// Byte length of the fixed-width fields, not counting the outer size
/// prefix or the four trailing strings: type[2] dev[4] qid[13] mode[4]
/// atime[4] mtime[4] length[8].
const FIXED_BODY_LEN: usize = 2 + 4 + QID_SIZE + 4 + 4 + 4 + 8;

/// A directory entry. The wire field named `type` is renamed `dev_type`
/// here to avoid clashing with [`Qid::qtype`] — they describe different
/// things despite the shared name in the Plan 9 manual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub dev_type: u16,
    pub dev: u32,
    pub qid: Qid,
    pub mode: u32,
    pub atime: u32,
    pub mtime: u32,
    pub length: u64,
    pub name: String,
    pub uid: String,
    pub gid: String,
    pub muid: String,
}

impl Stat {
    fn body_len(&self) -> usize {
        FIXED_BODY_LEN
            + sizeof_str(&self.name)
            + sizeof_str(&self.uid)
            + sizeof_str(&self.gid)
            + sizeof_str(&self.muid)
    }

    /// Total wire size, including the outer 2-byte size prefix.
    pub fn sizeof(&self) -> usize {
        2 + self.body_len()
    }

    pub fn write(&self, buf: &mut impl BufMut) -> Result<usize, EncodeError> {
        let body_len = self.body_len();
        if body_len > u16::MAX as usize {
            return Err(EncodeError::StatTooLong(body_len));
        }
        buf.put_u16_le(body_len as u16);
        buf.put_u16_le(self.dev_type);
        buf.put_u32_le(self.dev);
        self.qid.write(buf);
        buf.put_u32_le(self.mode);
        buf.put_u32_le(self.atime);
        buf.put_u32_le(self.mtime);
        buf.put_u64_le(self.length);
        write_str(&self.name, buf)?;
        write_str(&self.uid, buf)?;
        write_str(&self.gid, buf)?;
        write_str(&self.muid, buf)?;
        Ok(2 + body_len)
    }

    /// Parse a Stat from the front of `buf`, returning the value and the
    /// unconsumed remainder. The decoder must consume exactly the
    /// declared inner size — leftover bytes inside that span are a
    /// malformed record, not silently ignored.
    pub fn read(buf: &[u8]) -> Result<(Stat, &[u8]), DecodeError> {
        if buf.len() < 2 {
            return Err(DecodeError::ShortBuffer { needed: 2, have: buf.len() });
        }
        let body_len = u16::from_le_bytes([buf[0], buf[1]]) as usize;
        let total = 2 + body_len;
        if buf.len() < total {
            return Err(DecodeError::ShortBuffer { needed: total, have: buf.len() });
        }
        let body = &buf[2..total];
        if body.len() < FIXED_BODY_LEN {
            return Err(DecodeError::malformed(
                "stat",
                format!("declared body {} shorter than fixed fields {}", body.len(), FIXED_BODY_LEN),
            ));
        }

        let dev_type = u16::from_le_bytes(body[0..2].try_into().unwrap());
        let dev = u32::from_le_bytes(body[2..6].try_into().unwrap());
        let (qid, after_qid) = Qid::read(&body[6..])?;

        let mode = u32::from_le_bytes(after_qid[0..4].try_into().unwrap());
        let atime = u32::from_le_bytes(after_qid[4..8].try_into().unwrap());
        let mtime = u32::from_le_bytes(after_qid[8..12].try_into().unwrap());
        let length = u64::from_le_bytes(after_qid[12..20].try_into().unwrap());
        let after_fixed = &after_qid[20..];

        let (name, after_name) = read_str(after_fixed)?;
        let (uid, after_uid) = read_str(after_name)?;
        let (gid, after_gid) = read_str(after_uid)?;
        let (muid, trailing) = read_str(after_gid)?;

        if !trailing.is_empty() {
            return Err(DecodeError::malformed(
                "stat",
                format!("{} trailing bytes inside declared stat size", trailing.len()),
            ));
        }

        Ok((
            Stat { dev_type, dev, qid, mode, atime, mtime, length, name, uid, gid, muid },
            &buf[total..],
        ))
    }
}
