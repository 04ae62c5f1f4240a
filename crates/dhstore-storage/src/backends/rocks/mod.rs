//! RocksDB backend implementation.
//!
//! This module provides [`RocksBackend`], the [`LsmBackend`] implementation
//! over RocksDB. The value-keys merge operator and the empty-value
//! compaction filter are wired into the database options at open time; the
//! operator name is recorded in the database manifest, which is what makes
//! the merge semantics part of the on-disk format.

mod merge;

use std::ops::Deref;
use std::path::Path;

use rocksdb::{
    BlockBasedOptions, Cache, DBPinnableSlice, DBWithThreadMode, ErrorKind, MultiThreaded,
    Options, WriteBatch, WriteOptions,
};

use crate::engine::{BackendMetrics, BatchOps, LsmBackend, StorageError, WriteMode};
use crate::merger::VALUE_KEYS_MERGER_NAME;

type Db = DBWithThreadMode<MultiThreaded>;

/// Configuration options for the RocksDB backend.
///
/// Unset fields keep RocksDB's defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct RocksConfig {
    /// Skip the write-ahead log entirely. Unflushed writes are lost on
    /// crash; merge semantics are unaffected.
    pub disable_wal: bool,

    /// Shared block cache capacity in bytes.
    pub block_cache_size: Option<usize>,

    /// Memtable size in bytes.
    pub write_buffer_size: Option<usize>,

    /// Maximum concurrent background flushes and compactions.
    pub max_background_jobs: Option<i32>,

    /// L0 file count that triggers a compaction.
    pub l0_compaction_threshold: Option<i32>,

    /// L0 file count at which writes are stopped.
    pub l0_stop_writes_threshold: Option<i32>,
}

impl RocksConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable the write-ahead log.
    #[must_use]
    pub const fn disable_wal(mut self, disable: bool) -> Self {
        self.disable_wal = disable;
        self
    }

    /// Set the block cache capacity.
    #[must_use]
    pub const fn block_cache_size(mut self, bytes: usize) -> Self {
        self.block_cache_size = Some(bytes);
        self
    }

    /// Set the memtable size.
    #[must_use]
    pub const fn write_buffer_size(mut self, bytes: usize) -> Self {
        self.write_buffer_size = Some(bytes);
        self
    }

    /// Set the background job limit.
    #[must_use]
    pub const fn max_background_jobs(mut self, jobs: i32) -> Self {
        self.max_background_jobs = Some(jobs);
        self
    }

    /// Set the L0 compaction trigger.
    #[must_use]
    pub const fn l0_compaction_threshold(mut self, files: i32) -> Self {
        self.l0_compaction_threshold = Some(files);
        self
    }

    /// Set the L0 write stop trigger.
    #[must_use]
    pub const fn l0_stop_writes_threshold(mut self, files: i32) -> Self {
        self.l0_stop_writes_threshold = Some(files);
        self
    }
}

/// A backend over a RocksDB database.
///
/// The handle is immutable after construction and safe for concurrent use;
/// RocksDB serializes its internal structures.
pub struct RocksBackend {
    db: Db,
    disable_wal: bool,
}

impl RocksBackend {
    /// Opens or creates a database at `path`.
    ///
    /// The value-keys merge operator is always installed, overriding
    /// whatever a caller might have configured: the store depends on its
    /// exact semantics for read-free index writes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] when the database cannot be opened.
    pub fn open(path: impl AsRef<Path>, config: RocksConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        if let Some(jobs) = config.max_background_jobs {
            opts.set_max_background_jobs(jobs);
        }
        if let Some(bytes) = config.write_buffer_size {
            opts.set_write_buffer_size(bytes);
        }
        if let Some(files) = config.l0_compaction_threshold {
            opts.set_level_zero_file_num_compaction_trigger(files);
        }
        if let Some(files) = config.l0_stop_writes_threshold {
            opts.set_level_zero_stop_writes_trigger(files);
        }

        let mut table_opts = BlockBasedOptions::default();
        table_opts.set_block_size(32 << 10);
        table_opts.set_bloom_filter(10.0, false);
        if let Some(bytes) = config.block_cache_size {
            let cache = Cache::new_lru_cache(bytes);
            table_opts.set_block_cache(&cache);
        }
        opts.set_block_based_table_factory(&table_opts);

        opts.set_merge_operator(VALUE_KEYS_MERGER_NAME, merge::full_merge, merge::partial_merge);
        opts.set_compaction_filter("dhstore.v1.emptyValueKeys", merge::drop_empty_value_keys);

        let db = Db::open(&opts, path).map_err(|e| StorageError::Open(e.to_string()))?;
        Ok(Self { db, disable_wal: config.disable_wal })
    }

    fn write_opts(&self, mode: WriteMode) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(matches!(mode, WriteMode::Sync));
        opts.disable_wal(self.disable_wal);
        opts
    }

    fn property(&self, name: &str) -> Option<u64> {
        self.db.property_int_value(name).ok().flatten()
    }
}

fn backend_err(e: &rocksdb::Error) -> StorageError {
    match e.kind() {
        ErrorKind::Corruption => StorageError::Corruption(e.to_string()),
        _ => StorageError::Backend(e.to_string()),
    }
}

impl LsmBackend for RocksBackend {
    type Value<'a>
        = PinnedValue<'a>
    where
        Self: 'a;
    type Batch = WriteBatch;

    fn get(&self, key: &[u8]) -> Result<Option<Self::Value<'_>>, StorageError> {
        match self.db.get_pinned(key) {
            Ok(value) => Ok(value.map(PinnedValue)),
            Err(e) => Err(backend_err(&e)),
        }
    }

    fn set(&self, key: &[u8], value: &[u8], mode: WriteMode) -> Result<(), StorageError> {
        self.db.put_opt(key, value, &self.write_opts(mode)).map_err(|e| backend_err(&e))
    }

    fn delete(&self, key: &[u8], mode: WriteMode) -> Result<(), StorageError> {
        self.db.delete_opt(key, &self.write_opts(mode)).map_err(|e| backend_err(&e))
    }

    fn batch(&self) -> WriteBatch {
        WriteBatch::default()
    }

    fn commit(&self, batch: WriteBatch, mode: WriteMode) -> Result<(), StorageError> {
        self.db.write_opt(batch, &self.write_opts(mode)).map_err(|e| backend_err(&e))
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(|e| backend_err(&e))
    }

    fn close(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(|e| backend_err(&e))?;
        self.db.cancel_all_background_work(true);
        Ok(())
    }

    fn estimate_size(&self, lo: &[u8], hi: &[u8]) -> Result<u64, StorageError> {
        let files = self.db.live_files().map_err(|e| backend_err(&e))?;
        let total = files
            .iter()
            .filter(|f| {
                let starts_below_hi = f.start_key.as_deref().map_or(true, |start| start < hi);
                let ends_at_or_above_lo = f.end_key.as_deref().map_or(true, |end| end >= lo);
                starts_below_hi && ends_at_or_above_lo
            })
            .map(|f| f.size as u64)
            .sum();
        Ok(total)
    }

    fn metrics(&self) -> BackendMetrics {
        BackendMetrics {
            l0_files: self.property("rocksdb.num-files-at-level0"),
            running_flushes: self.property("rocksdb.num-running-flushes"),
            running_compactions: self.property("rocksdb.num-running-compactions"),
            pending_compaction_bytes: self.property("rocksdb.estimate-pending-compaction-bytes"),
            block_cache_usage: self.property("rocksdb.block-cache-usage"),
            block_cache_capacity: self.property("rocksdb.block-cache-capacity"),
            memtable_bytes: self.property("rocksdb.cur-size-all-mem-tables"),
            estimated_keys: self.property("rocksdb.estimate-num-keys"),
            live_data_size: self.property("rocksdb.estimate-live-data-size"),
            background_errors: self.property("rocksdb.background-errors"),
        }
    }
}

/// A pinned, backend-owned value borrow. Dropping it releases the pin.
pub struct PinnedValue<'a>(DBPinnableSlice<'a>);

impl Deref for PinnedValue<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl BatchOps for WriteBatch {
    fn merge(&mut self, key: &[u8], value: &[u8]) {
        WriteBatch::merge(self, key, value);
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.put(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        WriteBatch::delete(self, key);
    }

    fn len(&self) -> usize {
        WriteBatch::len(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhstore_core::codec::write_section;

    fn open_temp() -> (tempfile::TempDir, RocksBackend) {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = RocksBackend::open(dir.path().join("db"), RocksConfig::default())
            .expect("open backend");
        (dir, backend)
    }

    fn framed(values: &[&[u8]]) -> Vec<u8> {
        let mut buf = Vec::new();
        for v in values {
            write_section(&mut buf, v);
        }
        buf
    }

    fn mhk(seed: u8) -> Vec<u8> {
        let mut key = vec![0x02, 0x56, 0x20];
        key.extend_from_slice(&[seed; 32]);
        key
    }

    #[test]
    fn point_roundtrip() {
        let (_dir, backend) = open_temp();
        backend.set(b"\x03k", b"v", WriteMode::NoSync).unwrap();
        assert_eq!(backend.get(b"\x03k").unwrap().as_deref(), Some(b"v" as &[u8]));
        backend.delete(b"\x03k", WriteMode::NoSync).unwrap();
        assert!(backend.get(b"\x03k").unwrap().is_none());
    }

    #[test]
    fn merges_fold_through_the_operator() {
        let (_dir, backend) = open_temp();
        let key = mhk(1);
        let mut batch = backend.batch();
        batch.merge(&key, &framed(&[b"fish"]));
        batch.merge(&key, &framed(&[b"lobster"]));
        backend.commit(batch, WriteMode::NoSync).unwrap();

        let got = backend.get(&key).unwrap().expect("merged value present");
        assert_eq!(&*got, framed(&[b"fish", b"lobster"]).as_slice());
    }

    #[test]
    fn merges_fold_across_a_flush() {
        let (_dir, backend) = open_temp();
        let key = mhk(2);
        let mut batch = backend.batch();
        batch.merge(&key, &framed(&[b"fish"]));
        backend.commit(batch, WriteMode::NoSync).unwrap();
        backend.flush().unwrap();

        let mut batch = backend.batch();
        batch.merge(&key, &framed(&[b"lobster"]));
        batch.merge(&key, &framed(&[b"fish"]));
        backend.commit(batch, WriteMode::NoSync).unwrap();

        let got = backend.get(&key).unwrap().expect("merged value present");
        assert_eq!(&*got, framed(&[b"fish", b"lobster"]).as_slice());
    }

    #[test]
    fn batch_set_overrides_prior_merges() {
        let (_dir, backend) = open_temp();
        let key = mhk(3);
        let mut batch = backend.batch();
        batch.merge(&key, &framed(&[b"fish"]));
        backend.commit(batch, WriteMode::NoSync).unwrap();

        let mut batch = backend.batch();
        batch.set(&key, &framed(&[b"lobster"]));
        backend.commit(batch, WriteMode::NoSync).unwrap();

        let got = backend.get(&key).unwrap().expect("value present");
        assert_eq!(&*got, framed(&[b"lobster"]).as_slice());
    }

    #[test]
    fn metrics_snapshot_reports_core_properties() {
        let (_dir, backend) = open_temp();
        let metrics = backend.metrics();
        assert!(metrics.estimated_keys.is_some());
        assert!(metrics.memtable_bytes.is_some());
    }

    #[test]
    fn estimate_size_covers_written_data() {
        let (_dir, backend) = open_temp();
        for i in 0..100u8 {
            let mut batch = backend.batch();
            batch.merge(&mhk(i), &framed(&[&[i; 64]]));
            backend.commit(batch, WriteMode::NoSync).unwrap();
        }
        backend.flush().unwrap();
        let size = backend.estimate_size(&[0x00], &[0xff]).unwrap();
        assert!(size > 0);
    }
}
