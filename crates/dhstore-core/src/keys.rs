//! Typed database key construction.
//!
//! Every persisted key starts with a one-byte tag identifying the entity
//! kind, partitioning the keyspace:
//!
//! - `0x01` - reserved, never produced
//! - `0x02` - multihash key: `[0x02][multihash bytes]`
//! - `0x03` - hashed-value-key key: `[0x03][blake3(hvk, 32)]`
//!
//! The multihash bytes are appended verbatim; a multihash is already a
//! fixed-width hash and keeping it raw preserves locality between the two
//! hash forms of the same content. A hashed value key has no length bound,
//! so its key form is condensed through a 32-byte BLAKE3 digest, which also
//! spreads the keys uniformly across the keyspace.
//!
//! Any other first byte observed at read time is corruption.

use crate::multihash::Multihash;
use crate::pool::{Pool, PooledBuf};
use crate::types::HashedValueKey;

/// Entity kind tag, the first byte of every persisted key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyPrefix {
    /// A multihash key; its value is the section-framed set of encrypted
    /// value keys and participates in the custom merge operator.
    Multihash = 0x02,
    /// A hashed-value-key key; its value is the raw encrypted metadata.
    HashedValueKey = 0x03,
}

impl KeyPrefix {
    /// The reserved tag byte. Kept unused so the multihash and
    /// hashed-value-key tags stay stable.
    pub const RESERVED: u8 = 0x01;

    /// Decodes a tag byte. Returns `None` for anything that is not a known
    /// entity kind, including the reserved byte.
    #[inline]
    #[must_use]
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x02 => Some(Self::Multihash),
            0x03 => Some(Self::HashedValueKey),
            _ => None,
        }
    }

    /// The tag byte value.
    #[inline]
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Builds typed database keys into pooled buffers.
///
/// A keyer owns a pooled BLAKE3 hasher; lease one per operation from
/// [`Keyer::lease`] and let it drop when the operation completes. The
/// returned key buffers are themselves pool leases scoped to the same
/// operation.
pub struct Keyer<'p> {
    hasher: Option<blake3::Hasher>,
    pool: &'p Pool,
}

impl<'p> Keyer<'p> {
    /// Leases a keyer from the pool.
    #[must_use]
    pub fn lease(pool: &'p Pool) -> Self {
        Self { hasher: Some(pool.lease_hasher()), pool }
    }

    /// The key a multihash's value set is stored under.
    #[must_use]
    pub fn multihash_key(&self, mh: &Multihash) -> PooledBuf<'p> {
        let mut key = self.pool.lease_key_buf();
        key.reserve(1 + mh.as_bytes().len());
        key.push(KeyPrefix::Multihash.as_byte());
        key.extend_from_slice(mh.as_bytes());
        key
    }

    /// The key a hashed value key's metadata is stored under.
    #[must_use]
    pub fn hashed_value_key_key(&mut self, hvk: &HashedValueKey) -> PooledBuf<'p> {
        let hasher = self.hasher.as_mut().expect("hasher present until drop");
        hasher.reset();
        hasher.update(hvk.as_bytes());
        let digest = hasher.finalize();
        let mut key = self.pool.lease_key_buf();
        key.reserve(1 + digest.as_bytes().len());
        key.push(KeyPrefix::HashedValueKey.as_byte());
        key.extend_from_slice(digest.as_bytes());
        key
    }
}

impl Drop for Keyer<'_> {
    fn drop(&mut self) {
        if let Some(hasher) = self.hasher.take() {
            self.pool.return_hasher(hasher);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_multihash() -> Multihash {
        let mut bytes = vec![0x56, 0x20];
        bytes.extend_from_slice(&[0xaa; 32]);
        Multihash::new(bytes)
    }

    #[test]
    fn multihash_key_is_tag_plus_raw_bytes() {
        let pool = Pool::new();
        let keyer = Keyer::lease(&pool);
        let mh = test_multihash();
        let key = keyer.multihash_key(&mh);
        assert_eq!(key[0], 0x02);
        assert_eq!(&key[1..], mh.as_bytes());
    }

    #[test]
    fn hashed_value_key_key_is_tag_plus_digest() {
        let pool = Pool::new();
        let mut keyer = Keyer::lease(&pool);
        let hvk = HashedValueKey::new(b"fish".to_vec());
        let key = keyer.hashed_value_key_key(&hvk);
        assert_eq!(key[0], 0x03);
        assert_eq!(key.len(), 33);
        assert_eq!(&key[1..], blake3::hash(b"fish").as_bytes());
    }

    #[test]
    fn keyer_reset_isolates_consecutive_keys() {
        let pool = Pool::new();
        let mut keyer = Keyer::lease(&pool);
        let first = keyer.hashed_value_key_key(&HashedValueKey::new(b"fish".to_vec())).to_vec();
        let _other = keyer.hashed_value_key_key(&HashedValueKey::new(b"lobster".to_vec()));
        let again = keyer.hashed_value_key_key(&HashedValueKey::new(b"fish".to_vec()));
        assert_eq!(first, *again);
    }

    #[test]
    fn keyspaces_do_not_collide() {
        let pool = Pool::new();
        let mut keyer = Keyer::lease(&pool);
        let mhk = keyer.multihash_key(&test_multihash());
        let hvkk = keyer.hashed_value_key_key(&HashedValueKey::new(vec![0xaa; 32]));
        assert_ne!(mhk[0], hvkk[0]);
    }

    #[test]
    fn unknown_prefixes_are_rejected() {
        assert_eq!(KeyPrefix::from_byte(0x00), None);
        assert_eq!(KeyPrefix::from_byte(KeyPrefix::RESERVED), None);
        assert_eq!(KeyPrefix::from_byte(0x02), Some(KeyPrefix::Multihash));
        assert_eq!(KeyPrefix::from_byte(0x03), Some(KeyPrefix::HashedValueKey));
        assert_eq!(KeyPrefix::from_byte(0x04), None);
    }
}
