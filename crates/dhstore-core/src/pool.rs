//! Scratch buffer pool.
//!
//! Key construction and value framing on the hot paths reuse buffers from a
//! process-wide pool instead of allocating per operation. A lease is an RAII
//! guard: dropping it returns the cleared buffer to its free-list on every
//! exit path. Buffers that outgrew their shelf's capacity cap are dropped
//! instead of pooled, so a single oversized payload cannot pin memory.
//!
//! Leases are scoped to one operation and must not escape it; the pool is
//! otherwise indifferent to which thread acquires or releases.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

/// Largest key buffer capacity the pool will retain.
pub const POOLED_KEY_MAX_CAP: usize = 32;

/// Largest section buffer capacity the pool will retain.
pub const POOLED_SECTION_MAX_CAP: usize = 1 << 10;

/// Thread-safe free-lists for key buffers, section buffers and keyers.
#[derive(Default)]
pub struct Pool {
    keys: Shelf,
    sections: Shelf,
    hashers: Mutex<Vec<blake3::Hasher>>,
}

#[derive(Default)]
struct Shelf {
    free: Mutex<Vec<Vec<u8>>>,
}

impl Shelf {
    fn lease(&self, max_cap: usize) -> PooledBuf<'_> {
        let buf = self.free.lock().pop().unwrap_or_default();
        PooledBuf { buf, shelf: self, max_cap }
    }
}

impl Pool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Leases a buffer for composing a database key.
    #[must_use]
    pub fn lease_key_buf(&self) -> PooledBuf<'_> {
        self.keys.lease(POOLED_KEY_MAX_CAP)
    }

    /// Leases a buffer for composing a section-framed value.
    #[must_use]
    pub fn lease_section_buf(&self) -> PooledBuf<'_> {
        self.sections.lease(POOLED_SECTION_MAX_CAP)
    }

    pub(crate) fn lease_hasher(&self) -> blake3::Hasher {
        self.hashers.lock().pop().unwrap_or_else(blake3::Hasher::new)
    }

    pub(crate) fn return_hasher(&self, hasher: blake3::Hasher) {
        self.hashers.lock().push(hasher);
    }
}

/// A leased scratch buffer.
///
/// Dereferences to `Vec<u8>`. On drop the buffer is cleared and returned to
/// the pool, unless its capacity exceeds the shelf cap, in which case it is
/// simply freed.
pub struct PooledBuf<'p> {
    buf: Vec<u8>,
    shelf: &'p Shelf,
    max_cap: usize,
}

impl Deref for PooledBuf<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuf<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl AsRef<[u8]> for PooledBuf<'_> {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl Drop for PooledBuf<'_> {
    fn drop(&mut self) {
        if self.buf.capacity() <= self.max_cap {
            self.buf.clear();
            self.shelf.free.lock().push(std::mem::take(&mut self.buf));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_buffers_are_reused() {
        let pool = Pool::new();
        {
            let mut buf = pool.lease_key_buf();
            buf.extend_from_slice(&[1, 2, 3]);
        }
        let buf = pool.lease_key_buf();
        assert!(buf.is_empty(), "returned buffer must come back cleared");
        assert!(buf.capacity() > 0, "buffer should have been recycled, not freed");
    }

    #[test]
    fn oversized_buffers_are_discarded() {
        let pool = Pool::new();
        {
            let mut buf = pool.lease_key_buf();
            buf.extend_from_slice(&[0u8; POOLED_KEY_MAX_CAP + 1]);
        }
        let buf = pool.lease_key_buf();
        assert_eq!(buf.capacity(), 0, "an outgrown buffer must not return to the pool");
    }

    #[test]
    fn section_shelf_keeps_larger_buffers() {
        let pool = Pool::new();
        {
            let mut buf = pool.lease_section_buf();
            buf.extend_from_slice(&[0u8; 512]);
        }
        let buf = pool.lease_section_buf();
        assert!(buf.capacity() >= 512);
    }

    #[test]
    fn shelves_are_independent() {
        let pool = Pool::new();
        {
            let mut key = pool.lease_key_buf();
            key.push(1);
            let mut section = pool.lease_section_buf();
            section.push(2);
        }
        assert!(pool.lease_key_buf().capacity() <= POOLED_KEY_MAX_CAP);
        assert!(pool.lease_section_buf().capacity() <= POOLED_SECTION_MAX_CAP);
    }
}
