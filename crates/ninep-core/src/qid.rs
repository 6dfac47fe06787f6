//! Qid — the 13-byte server-assigned file identity.
//!
//! `qtype` is a bitmask, not a discrete enum: a mounted, excluded,
//! temporary directory is representable on the wire even if no real
//! filesystem produces one. The [`qid_type`] module names the individual
//! bits; [`Qid::dir`]/[`Qid::file`] are convenience constructors for the
//! two overwhelmingly common cases.

use bytes::BufMut;

use crate::error::DecodeError;

/// Wire size of a Qid: always 13 bytes.
pub const QID_SIZE: usize = 13;

/// Named bits of [`Qid::qtype`].
pub mod qid_type {
    pub const FILE: u8 = 0x00;
    pub const TMP: u8 = 0x04;
    pub const AUTH: u8 = 0x08;
    pub const MOUNT: u8 = 0x10;
    pub const EXCL: u8 = 0x20;
    pub const APPEND: u8 = 0x40;
    pub const DIR: u8 = 0x80;
}

/// Server-assigned file identity: kind, modification version, and a
/// path unique and stable for the lifetime of the file on this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Qid {
    pub qtype: u8,
    pub version: u32,
    pub path: u64,
}

impl Qid {
    pub fn dir(version: u32, path: u64) -> Self {
        Qid { qtype: qid_type::DIR, version, path }
    }

    pub fn file(version: u32, path: u64) -> Self {
        Qid { qtype: qid_type::FILE, version, path }
    }

    pub fn is_dir(&self) -> bool {
        self.qtype & qid_type::DIR != 0
    }

    pub fn is_auth(&self) -> bool {
        self.qtype & qid_type::AUTH != 0
    }

    pub fn sizeof(&self) -> usize {
        QID_SIZE
    }

    /// Hex rendering of `path`, for structured log fields — cheaper to
    /// eyeball in a trace than a raw `u64`.
    pub fn path_hex(&self) -> String {
        hex::encode(self.path.to_be_bytes())
    }

    pub fn write(&self, buf: &mut impl BufMut) -> usize {
        buf.put_u8(self.qtype);
        buf.put_u32_le(self.version);
        buf.put_u64_le(self.path);
        QID_SIZE
    }

    /// Parse a Qid from the front of `buf`, returning the value and the
    /// unconsumed remainder.
    pub fn read(buf: &[u8]) -> Result<(Qid, &[u8]), DecodeError> {
        if buf.len() < QID_SIZE {
            return Err(DecodeError::ShortBuffer {
                needed: QID_SIZE,
                have: buf.len(),
            });
        }
        let qtype = buf[0];
        let version = u32::from_le_bytes(buf[1..5].try_into().unwrap());
        let path = u64::from_le_bytes(buf[5..13].try_into().unwrap());
        Ok((Qid { qtype, version, path }, &buf[QID_SIZE..]))
    }
}
