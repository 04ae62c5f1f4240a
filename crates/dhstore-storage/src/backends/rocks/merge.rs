//! RocksDB callbacks adapting [`ValueKeysMerger`].
//!
//! RocksDB hands merge callbacks the existing value (full merges only) and
//! the pending operands in oldest-to-newest order, so the glue below only
//! ever drives `merge_newer`. Keys outside the multihash keyspace fall back
//! to last-write-wins over opaque bytes.
//!
//! A merge callback cannot ask RocksDB to drop the key, so when the fold
//! comes out empty the callbacks emit an empty value. The read paths treat
//! an empty value as absent, and [`drop_empty_value_keys`] physically
//! removes such keys during compaction.

use rocksdb::compaction_filter::Decision;
use rocksdb::MergeOperands;

use crate::merger::ValueKeysMerger;

pub(super) fn full_merge(
    key: &[u8],
    existing: Option<&[u8]>,
    operands: &MergeOperands,
) -> Option<Vec<u8>> {
    if !ValueKeysMerger::handles_key(key) {
        return last_write_wins(existing, operands);
    }
    let mut merger = ValueKeysMerger::new();
    if let Some(existing) = existing {
        merger.merge_newer(existing).ok()?;
    }
    for operand in operands.iter() {
        merger.merge_newer(operand).ok()?;
    }
    let (bytes, _delete) = merger.finish();
    Some(bytes)
}

pub(super) fn partial_merge(
    key: &[u8],
    _existing: Option<&[u8]>,
    operands: &MergeOperands,
) -> Option<Vec<u8>> {
    if !ValueKeysMerger::handles_key(key) {
        return last_write_wins(None, operands);
    }
    let mut merger = ValueKeysMerger::new();
    for operand in operands.iter() {
        merger.merge_newer(operand).ok()?;
    }
    let (bytes, _delete) = merger.finish();
    Some(bytes)
}

fn last_write_wins(existing: Option<&[u8]>, operands: &MergeOperands) -> Option<Vec<u8>> {
    operands.iter().last().or(existing).map(<[u8]>::to_vec)
}

/// Compaction filter that completes deletion-by-merge: a multihash key
/// whose merged value set came out empty is removed from storage.
pub(super) fn drop_empty_value_keys(_level: u32, key: &[u8], value: &[u8]) -> Decision {
    if value.is_empty() && ValueKeysMerger::handles_key(key) {
        Decision::Remove
    } else {
        Decision::Keep
    }
}
