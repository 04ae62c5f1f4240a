//! Core backend traits.
//!
//! [`LsmBackend`] is the minimum capability set the store facade consumes
//! from an embedded log-structured database: point reads returning a
//! released-on-drop borrow, point writes, batched writes with merge
//! support, flush/close, a range size estimate, and a metrics snapshot.
//!
//! The custom merge operator is not part of this trait. It is wired into
//! the backend at open time under a versioned name, because the operator is
//! part of the on-disk format: a database written with one operator must
//! not be opened with another.

use std::ops::Deref;

use super::StorageError;

/// Durability of an individual write submission.
///
/// The store submits everything as [`NoSync`]; whether a write-ahead log
/// absorbs it is backend configuration, never a per-call decision.
///
/// [`NoSync`]: WriteMode::NoSync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Acknowledge before fsync.
    NoSync,
    /// Force fsync before acknowledging.
    Sync,
}

/// A backend that supports the store's operations.
///
/// Implementations must be safe for concurrent use from many threads; the
/// backend is responsible for internal serialization of its structures.
pub trait LsmBackend: Send + Sync {
    /// Borrowed value returned by point reads. Dropping it releases the
    /// backend-owned buffer, so callers copy out anything they keep.
    type Value<'a>: Deref<Target = [u8]>
    where
        Self: 'a;

    /// The write batch type.
    type Batch: BatchOps;

    /// Point read.
    ///
    /// Returns `Ok(None)` when the key is absent; absence is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on any backend failure.
    fn get(&self, key: &[u8]) -> Result<Option<Self::Value<'_>>, StorageError>;

    /// Point write.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on any backend failure.
    fn set(&self, key: &[u8], value: &[u8], mode: WriteMode) -> Result<(), StorageError>;

    /// Point delete. Deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on any backend failure.
    fn delete(&self, key: &[u8], mode: WriteMode) -> Result<(), StorageError>;

    /// Creates an empty write batch.
    fn batch(&self) -> Self::Batch;

    /// Atomically applies a batch. Either every operation in the batch
    /// becomes visible or none does.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on any backend failure; the batch is not
    /// partially applied.
    fn commit(&self, batch: Self::Batch, mode: WriteMode) -> Result<(), StorageError>;

    /// Flushes buffered writes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on any backend failure.
    fn flush(&self) -> Result<(), StorageError>;

    /// Flushes and releases backend resources. The backend must not be used
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on any backend failure.
    fn close(&self) -> Result<(), StorageError>;

    /// Estimates the on-disk size of the key range `[lo, hi)`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on any backend failure.
    fn estimate_size(&self, lo: &[u8], hi: &[u8]) -> Result<u64, StorageError>;

    /// Snapshot of backend health counters. Fields the backend cannot
    /// report are `None`.
    fn metrics(&self) -> BackendMetrics;
}

/// Mutation operations accepted by a write batch.
///
/// A batch accumulates in memory and applies atomically through
/// [`LsmBackend::commit`].
pub trait BatchOps {
    /// Enqueues a merge: the value is folded into the existing state by the
    /// backend's merge operator, without reading first.
    fn merge(&mut self, key: &[u8], value: &[u8]);

    /// Enqueues an absolute write (last write wins).
    fn set(&mut self, key: &[u8], value: &[u8]);

    /// Enqueues a delete.
    fn delete(&mut self, key: &[u8]);

    /// Number of enqueued operations.
    fn len(&self) -> usize;

    /// Returns `true` when nothing is enqueued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Point-in-time counters describing backend health.
///
/// The store's only role is to pass this through to whoever exports
/// metrics; it never interprets the values.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackendMetrics {
    /// Files in level 0, a proxy for read amplification.
    pub l0_files: Option<u64>,
    /// Currently running memtable flushes.
    pub running_flushes: Option<u64>,
    /// Currently running compactions.
    pub running_compactions: Option<u64>,
    /// Bytes of compaction debt.
    pub pending_compaction_bytes: Option<u64>,
    /// Bytes in use by the block cache.
    pub block_cache_usage: Option<u64>,
    /// Configured block cache capacity in bytes.
    pub block_cache_capacity: Option<u64>,
    /// Bytes held in all memtables.
    pub memtable_bytes: Option<u64>,
    /// Estimated number of live keys.
    pub estimated_keys: Option<u64>,
    /// Estimated bytes of live data.
    pub live_data_size: Option<u64>,
    /// Background errors the backend has accumulated.
    pub background_errors: Option<u64>,
}
