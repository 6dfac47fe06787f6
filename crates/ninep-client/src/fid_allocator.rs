//! Client-side fid allocation — a monotonically increasing counter
//! that skips [`NOFID`] and the client's own root fid.

use std::sync::atomic::{AtomicU32, Ordering};

use ninep_core::{Fid, NOFID};

pub struct FidAllocator {
    next: AtomicU32,
    root_fid: Fid,
}

impl FidAllocator {
    pub fn new(root_fid: Fid) -> Self {
        FidAllocator { next: AtomicU32::new(root_fid.wrapping_add(1)), root_fid }
    }

    pub fn allocate(&self) -> Fid {
        loop {
            let fid = self.next.fetch_add(1, Ordering::Relaxed);
            if fid != NOFID && fid != self.root_fid {
                return fid;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_sequentially_after_root() {
        let alloc = FidAllocator::new(0);
        assert_eq!(alloc.allocate(), 1);
        assert_eq!(alloc.allocate(), 2);
    }

    #[test]
    fn skips_nofid_on_wraparound() {
        let alloc = FidAllocator::new(99); // root fid well away from the wraparound point
        alloc.next.store(NOFID - 1, Ordering::Relaxed);
        assert_eq!(alloc.allocate(), NOFID - 1);
        assert_eq!(alloc.allocate(), 0); // NOFID itself is skipped, wrapping cleanly to 0
    }

    #[test]
    fn skips_root_fid() {
        let alloc = FidAllocator::new(5);
        alloc.next.store(5, Ordering::Relaxed);
        assert_eq!(alloc.allocate(), 6);
    }
}
