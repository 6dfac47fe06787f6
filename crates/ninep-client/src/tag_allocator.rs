//! Transaction tag allocation.
//!
//! A monotonically increasing counter that skips [`NOTAG`] and wraps
//! around, refusing to hand out a tag that's still outstanding in the
//! pending table.

use dashmap::DashMap;
use ninep_core::{Tag, NOTAG};

use crate::error::ClientError;

pub struct TagAllocator {
    next: Tag,
}

impl TagAllocator {
    pub fn new() -> Self {
        TagAllocator { next: 0 }
    }

    /// Find the next tag not present in `pending`, skipping `NOTAG`.
    /// Scans at most the full tag space once before giving up.
    pub fn allocate<V>(&mut self, pending: &DashMap<Tag, V>) -> Result<Tag, ClientError> {
        let mut candidate = self.next;
        for _ in 0..=u16::MAX {
            let tag = candidate;
            candidate = candidate.wrapping_add(1);
            if candidate == NOTAG {
                candidate = candidate.wrapping_add(1);
            }
            if tag == NOTAG {
                continue;
            }
            if !pending.contains_key(&tag) {
                self.next = candidate;
                return Ok(tag);
            }
        }
        Err(ClientError::Busy)
    }
}

impl Default for TagAllocator {
    fn default() -> Self {
        Self::new()
    }
}
