//! The store facade.
//!
//! [`LsmStore`] implements the domain operations over any [`LsmBackend`].
//! Every operation validates its inputs before touching the backend, builds
//! typed keys from pooled scratch buffers, and submits writes as NoSync
//! batches. Batches are atomic: a validation failure anywhere in a batch
//! aborts the whole call with nothing committed.
//!
//! Concurrency: the facade adds no locking of its own. Operations may run
//! from any number of threads; the backend serializes its internal
//! structures, and the scratch pool is thread-safe. After [`DhStore::close`]
//! returns, every subsequent call fails fast.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::debug;

use dhstore_core::codec::{decode_sections, write_section};
use dhstore_core::types::check_value_len;
use dhstore_core::{
    CoreError, EncryptedMetadata, EncryptedValueKey, HashedValueKey, Index, Keyer, Multihash, Pool,
};

use crate::backends::rocks::{RocksBackend, RocksConfig};
use crate::engine::{BackendMetrics, BatchOps, LsmBackend, StorageError, WriteMode};

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Input validation or stored-value decoding failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The store has been closed.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Returns `true` when the error was caused by invalid caller input,
    /// as opposed to a backend failure or stored-data corruption.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_validation())
    }
}

/// The domain operations of the indexing store.
///
/// Index operations accept only multihashes that validate as
/// `dbl-sha2-256` with a 32-byte digest; validation happens before any
/// backend interaction. Metadata operations accept hashed value keys of any
/// length. Absent data reads cleanly: [`lookup`](Self::lookup) returns an
/// empty list and [`get_metadata`](Self::get_metadata) returns `None`.
pub trait DhStore: Send + Sync {
    /// Merges each `(multihash, encrypted value key)` pair into the value
    /// set stored under the multihash, without reading existing state.
    /// Duplicates fold away; insertion order is preserved.
    ///
    /// The batch applies atomically: the first invalid pair aborts the call
    /// and nothing is committed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on validation failure, backend failure, or a
    /// closed store.
    fn merge_indexes(&self, indexes: Vec<Index>) -> Result<(), StoreError>;

    /// Removes each `(multihash, encrypted value key)` pair from the value
    /// set stored under the multihash. Pairs whose multihash or value is
    /// not present are skipped. Removing the last value deletes the key.
    ///
    /// This is the inverse of [`merge_indexes`](Self::merge_indexes), but
    /// it is an absolute replacement, not a merge: concurrent merges of the
    /// same value are won by whichever write the backend sequences last.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on validation failure, backend failure, or a
    /// closed store.
    fn delete_indexes(&self, indexes: Vec<Index>) -> Result<(), StoreError>;

    /// Stores the metadata blob under the hashed value key, replacing any
    /// previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on validation failure, backend failure, or a
    /// closed store.
    fn put_metadata(&self, hvk: &HashedValueKey, em: &EncryptedMetadata)
        -> Result<(), StoreError>;

    /// Fetches the metadata stored under the hashed value key. Returns
    /// `None` when nothing is stored; absence is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure or a closed store.
    fn get_metadata(&self, hvk: &HashedValueKey) -> Result<Option<EncryptedMetadata>, StoreError>;

    /// Deletes the metadata stored under the hashed value key. Deleting an
    /// absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure or a closed store.
    fn delete_metadata(&self, hvk: &HashedValueKey) -> Result<(), StoreError>;

    /// Returns the encrypted value keys stored under the multihash, oldest
    /// first. An unknown multihash yields the empty list, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on validation failure, backend failure, or a
    /// closed store.
    fn lookup(&self, mh: &Multihash) -> Result<Vec<EncryptedValueKey>, StoreError>;

    /// Estimates the on-disk size of the store in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure or a closed store.
    fn size(&self) -> Result<u64, StoreError>;

    /// Flushes buffered writes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure or a closed store.
    fn flush(&self) -> Result<(), StoreError>;

    /// Flushes and closes the backend. Closing twice is a no-op; every
    /// other operation on a closed store fails with
    /// [`StoreError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn close(&self) -> Result<(), StoreError>;
}

/// [`DhStore`] implementation over an [`LsmBackend`].
pub struct LsmStore<B: LsmBackend> {
    backend: B,
    pool: Pool,
    closed: AtomicBool,
}

/// The store in its production configuration.
pub type RocksDhStore = LsmStore<RocksBackend>;

impl RocksDhStore {
    /// Opens or creates a RocksDB-backed store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the database cannot be opened.
    pub fn open(path: impl AsRef<Path>, config: RocksConfig) -> Result<Self, StoreError> {
        Ok(Self::new(RocksBackend::open(path, config)?))
    }
}

impl<B: LsmBackend> LsmStore<B> {
    /// Wraps a backend.
    pub fn new(backend: B) -> Self {
        Self { backend, pool: Pool::new(), closed: AtomicBool::new(false) }
    }

    /// Snapshot of the backend's health counters, passed through unchanged.
    pub fn backend_metrics(&self) -> BackendMetrics {
        self.backend.metrics()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

/// Sorting write batches by key reduces cursor churn in the backend.
fn sort_by_multihash(indexes: &mut [Index]) {
    indexes.sort_by(|a, b| a.key.as_bytes().cmp(b.key.as_bytes()));
}

impl<B: LsmBackend> DhStore for LsmStore<B> {
    fn merge_indexes(&self, mut indexes: Vec<Index>) -> Result<(), StoreError> {
        self.ensure_open()?;
        sort_by_multihash(&mut indexes);

        let keyer = Keyer::lease(&self.pool);
        let mut batch = self.backend.batch();
        for index in &indexes {
            index.key.ensure_dbl_sha2_256()?;
            check_value_len(index.value.as_bytes())?;
            let mhk = keyer.multihash_key(&index.key);
            let mut framed = self.pool.lease_section_buf();
            write_section(&mut framed, index.value.as_bytes());
            batch.merge(&mhk, &framed);
        }
        let merged = batch.len();
        self.backend.commit(batch, WriteMode::NoSync)?;
        debug!(merged, "merged indexes");
        Ok(())
    }

    fn delete_indexes(&self, mut indexes: Vec<Index>) -> Result<(), StoreError> {
        self.ensure_open()?;
        sort_by_multihash(&mut indexes);

        let keyer = Keyer::lease(&self.pool);
        let mut batch = self.backend.batch();
        // Sorting has grouped pairs sharing a multihash; each group is one
        // read-modify-write, so removals within a call cannot clobber each
        // other.
        let mut at = 0;
        while at < indexes.len() {
            let mh = &indexes[at].key;
            mh.ensure_dbl_sha2_256()?;
            let group_end = indexes[at..]
                .iter()
                .position(|ix| ix.key.as_bytes() != mh.as_bytes())
                .map_or(indexes.len(), |n| at + n);
            let group = &indexes[at..group_end];
            at = group_end;

            let mhk = keyer.multihash_key(mh);
            let mut value_keys = match self.backend.get(&mhk)? {
                Some(current) => decode_sections(&current)?,
                None => continue,
            };
            let before = value_keys.len();
            for index in group {
                if let Some(pos) = value_keys.iter().position(|vk| vk == index.value.as_bytes()) {
                    // Preserve order when removing the value key.
                    value_keys.remove(pos);
                }
            }
            if value_keys.len() == before {
                // No changes, continue to the next multihash.
                continue;
            }

            if value_keys.is_empty() {
                // The multihash maps to no remaining values; delete it.
                batch.delete(&mhk);
                continue;
            }
            let mut framed = self.pool.lease_section_buf();
            for vk in &value_keys {
                write_section(&mut framed, vk);
            }
            // An absolute replacement, deliberately not a merge.
            batch.set(&mhk, &framed);
        }
        let deleted = batch.len();
        self.backend.commit(batch, WriteMode::NoSync)?;
        debug!(deleted, "deleted indexes");
        Ok(())
    }

    fn put_metadata(
        &self,
        hvk: &HashedValueKey,
        em: &EncryptedMetadata,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        check_value_len(em.as_bytes())?;
        let mut keyer = Keyer::lease(&self.pool);
        let hvkk = keyer.hashed_value_key_key(hvk);
        self.backend.set(&hvkk, em.as_bytes(), WriteMode::NoSync)?;
        Ok(())
    }

    fn get_metadata(&self, hvk: &HashedValueKey) -> Result<Option<EncryptedMetadata>, StoreError> {
        self.ensure_open()?;
        let mut keyer = Keyer::lease(&self.pool);
        let hvkk = keyer.hashed_value_key_key(hvk);
        // Copy out before the backend borrow is released.
        Ok(self.backend.get(&hvkk)?.map(|em| EncryptedMetadata::new(em.to_vec())))
    }

    fn delete_metadata(&self, hvk: &HashedValueKey) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut keyer = Keyer::lease(&self.pool);
        let hvkk = keyer.hashed_value_key_key(hvk);
        self.backend.delete(&hvkk, WriteMode::NoSync)?;
        Ok(())
    }

    fn lookup(&self, mh: &Multihash) -> Result<Vec<EncryptedValueKey>, StoreError> {
        self.ensure_open()?;
        mh.ensure_dbl_sha2_256()?;
        let keyer = Keyer::lease(&self.pool);
        let mhk = keyer.multihash_key(mh);
        match self.backend.get(&mhk)? {
            None => Ok(Vec::new()),
            // An empty value is a deletion that compaction has not reclaimed
            // yet; it decodes to the same empty result as an absent key.
            Some(value) => Ok(decode_sections(&value)?
                .into_iter()
                .map(EncryptedValueKey::new)
                .collect()),
        }
    }

    fn size(&self) -> Result<u64, StoreError> {
        self.ensure_open()?;
        Ok(self.backend.estimate_size(&[0x00], &[0xff])?)
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        Ok(self.backend.flush()?)
    }

    fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("closing store");
        Ok(self.backend.close()?)
    }
}
