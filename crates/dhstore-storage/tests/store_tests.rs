//! End-to-end tests for the RocksDB-backed store.

use dhstore_core::{
    multihash, CoreError, EncryptedMetadata, EncryptedValueKey, HashedValueKey, Index, Multihash,
    MAX_VALUE_LEN,
};
use dhstore_storage::{DhStore, RocksConfig, RocksDhStore, StoreError};

/// A double-hashed multihash known to be valid, in its conventional base58
/// text form.
const KNOWN_MH: &str = "2wvdp9y1J63yDvaPawP4kUjXezRLcu9x9u2DAB154dwai82";

fn open_store() -> (tempfile::TempDir, RocksDhStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = RocksDhStore::open(dir.path().join("store"), RocksConfig::default())
        .expect("open store");
    (dir, store)
}

fn known_mh() -> Multihash {
    Multihash::from_base58(KNOWN_MH).expect("valid base58")
}

fn dbl_mh(seed: u8) -> Multihash {
    let mut bytes = vec![0x56, 0x20];
    bytes.extend_from_slice(&[seed; 32]);
    Multihash::new(bytes)
}

fn index(mh: &Multihash, value: &[u8]) -> Index {
    Index { key: mh.clone(), value: EncryptedValueKey::new(value.to_vec()) }
}

fn evks(values: &[&[u8]]) -> Vec<EncryptedValueKey> {
    values.iter().map(|v| EncryptedValueKey::new(v.to_vec())).collect()
}

#[test]
fn lookup_on_empty_store_is_empty() {
    let (_dir, store) = open_store();
    assert_eq!(store.lookup(&known_mh()).unwrap(), Vec::<EncryptedValueKey>::new());
}

#[test]
fn merge_then_lookup_roundtrips() {
    let (_dir, store) = open_store();
    let mh = known_mh();
    store.merge_indexes(vec![index(&mh, b"fish")]).unwrap();
    assert_eq!(store.lookup(&mh).unwrap(), evks(&[b"fish"]));
}

#[test]
fn merged_values_keep_insertion_order() {
    let (_dir, store) = open_store();
    let mh = known_mh();
    store
        .merge_indexes(vec![
            index(&mh, b"fish"),
            index(&mh, b"lobster"),
            index(&mh, b"undadasea"),
        ])
        .unwrap();
    assert_eq!(store.lookup(&mh).unwrap(), evks(&[b"fish", b"lobster", b"undadasea"]));
}

#[test]
fn repeated_merges_fold_duplicates() {
    let (_dir, store) = open_store();
    let mh = known_mh();
    store.merge_indexes(vec![index(&mh, b"fish")]).unwrap();
    store.merge_indexes(vec![index(&mh, b"lobster"), index(&mh, b"fish")]).unwrap();
    store.merge_indexes(vec![index(&mh, b"undadasea")]).unwrap();
    store.merge_indexes(vec![index(&mh, b"fish"), index(&mh, b"lobster")]).unwrap();

    let got = store.lookup(&mh).unwrap();
    assert_eq!(got.len(), 3);
    for want in evks(&[b"fish", b"lobster", b"undadasea"]) {
        assert!(got.contains(&want), "missing {want:?}");
    }
}

#[test]
fn merging_the_same_value_is_idempotent() {
    let (_dir, store) = open_store();
    let mh = known_mh();
    for _ in 0..5 {
        store.merge_indexes(vec![index(&mh, b"fish")]).unwrap();
    }
    assert_eq!(store.lookup(&mh).unwrap(), evks(&[b"fish"]));
}

#[test]
fn merges_survive_a_flush() {
    let (_dir, store) = open_store();
    let mh = known_mh();
    store.merge_indexes(vec![index(&mh, b"fish")]).unwrap();
    store.flush().unwrap();
    store.merge_indexes(vec![index(&mh, b"lobster")]).unwrap();
    assert_eq!(store.lookup(&mh).unwrap(), evks(&[b"fish", b"lobster"]));
}

#[test]
fn invalid_multihash_bytes_are_rejected() {
    let (_dir, store) = open_store();
    let bogus = Multihash::new(b"lobster".to_vec());

    let err = store.merge_indexes(vec![index(&bogus, b"fish")]).unwrap_err();
    assert!(matches!(err, StoreError::Core(CoreError::MultihashDecode { .. })));
    assert!(err.is_client_error());

    let err = store.lookup(&bogus).unwrap_err();
    assert!(matches!(err, StoreError::Core(CoreError::MultihashDecode { .. })));
}

#[test]
fn wrong_codec_multihash_is_rejected() {
    let (_dir, store) = open_store();
    // A perfectly well-formed sha2-256 multihash; still not accepted.
    let mut bytes = vec![0x12, 0x20];
    bytes.extend_from_slice(&[0x5d; 32]);
    let sha = Multihash::new(bytes);

    let err = store.merge_indexes(vec![index(&sha, b"fish")]).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Core(CoreError::UnsupportedMulticodec { code: multihash::SHA2_256 })
    ));
    let err = store.lookup(&sha).unwrap_err();
    assert!(matches!(err, StoreError::Core(CoreError::UnsupportedMulticodec { .. })));
}

#[test]
fn invalid_pair_aborts_the_whole_batch() {
    let (_dir, store) = open_store();
    let good = known_mh();
    let bogus = Multihash::new(b"lobster".to_vec());

    store
        .merge_indexes(vec![index(&good, b"fish"), index(&bogus, b"lobster")])
        .unwrap_err();

    // Nothing from the failed batch may be visible.
    assert!(store.lookup(&good).unwrap().is_empty());
}

#[test]
fn oversized_value_is_rejected() {
    let (_dir, store) = open_store();
    let mh = known_mh();
    let err = store.merge_indexes(vec![index(&mh, &vec![0u8; MAX_VALUE_LEN + 1])]).unwrap_err();
    assert!(matches!(err, StoreError::Core(CoreError::OversizedValue { .. })));
    assert!(err.is_client_error());
}

#[test]
fn deleting_values_preserves_the_rest() {
    let (_dir, store) = open_store();
    let mh = known_mh();
    store
        .merge_indexes(vec![
            index(&mh, b"fish"),
            index(&mh, b"lobster"),
            index(&mh, b"undadasea"),
        ])
        .unwrap();

    store.delete_indexes(vec![index(&mh, b"lobster")]).unwrap();
    assert_eq!(store.lookup(&mh).unwrap(), evks(&[b"fish", b"undadasea"]));

    store.delete_indexes(vec![index(&mh, b"fish"), index(&mh, b"undadasea")]).unwrap();
    assert!(store.lookup(&mh).unwrap().is_empty());
}

#[test]
fn deleting_the_last_value_removes_the_key() {
    let (_dir, store) = open_store();
    let mh = known_mh();
    store.merge_indexes(vec![index(&mh, b"fish"), index(&mh, b"lobster")]).unwrap();
    store.delete_indexes(vec![index(&mh, b"fish")]).unwrap();
    assert_eq!(store.lookup(&mh).unwrap(), evks(&[b"lobster"]));
    store.delete_indexes(vec![index(&mh, b"lobster")]).unwrap();
    assert!(store.lookup(&mh).unwrap().is_empty());
}

#[test]
fn deleting_absent_pairs_is_a_no_op() {
    let (_dir, store) = open_store();
    let mh = known_mh();
    // Nothing stored at all.
    store.delete_indexes(vec![index(&mh, b"fish")]).unwrap();

    // Value not in the stored set.
    store.merge_indexes(vec![index(&mh, b"fish")]).unwrap();
    store.delete_indexes(vec![index(&mh, b"lobster")]).unwrap();
    assert_eq!(store.lookup(&mh).unwrap(), evks(&[b"fish"]));
}

#[test]
fn value_can_be_merged_again_after_deletion() {
    let (_dir, store) = open_store();
    let mh = known_mh();
    store.merge_indexes(vec![index(&mh, b"fish")]).unwrap();
    store.delete_indexes(vec![index(&mh, b"fish")]).unwrap();
    store.merge_indexes(vec![index(&mh, b"fish")]).unwrap();
    assert_eq!(store.lookup(&mh).unwrap(), evks(&[b"fish"]));
}

#[test]
fn distinct_multihashes_do_not_interfere() {
    let (_dir, store) = open_store();
    let one = dbl_mh(1);
    let two = dbl_mh(2);
    store.merge_indexes(vec![index(&one, b"fish"), index(&two, b"lobster")]).unwrap();
    assert_eq!(store.lookup(&one).unwrap(), evks(&[b"fish"]));
    assert_eq!(store.lookup(&two).unwrap(), evks(&[b"lobster"]));
}

#[test]
fn metadata_roundtrip() {
    let (_dir, store) = open_store();
    let hvk = HashedValueKey::new(b"fish".to_vec());
    let em = EncryptedMetadata::new(b"lobster".to_vec());

    assert_eq!(store.get_metadata(&hvk).unwrap(), None);
    store.put_metadata(&hvk, &em).unwrap();
    assert_eq!(store.get_metadata(&hvk).unwrap(), Some(em));
    store.delete_metadata(&hvk).unwrap();
    assert_eq!(store.get_metadata(&hvk).unwrap(), None);
}

#[test]
fn metadata_last_write_wins() {
    let (_dir, store) = open_store();
    let hvk = HashedValueKey::new(vec![0xab; 32]);
    store.put_metadata(&hvk, &EncryptedMetadata::new(b"old".to_vec())).unwrap();
    store.put_metadata(&hvk, &EncryptedMetadata::new(b"new".to_vec())).unwrap();
    assert_eq!(store.get_metadata(&hvk).unwrap(), Some(EncryptedMetadata::new(b"new".to_vec())));
}

#[test]
fn long_hashed_value_keys_are_accepted() {
    let (_dir, store) = open_store();
    let hvk = HashedValueKey::new(vec![0x11; 4096]);
    let em = EncryptedMetadata::new(b"payload".to_vec());
    store.put_metadata(&hvk, &em).unwrap();
    assert_eq!(store.get_metadata(&hvk).unwrap(), Some(em));
}

#[test]
fn oversized_metadata_is_rejected() {
    let (_dir, store) = open_store();
    let hvk = HashedValueKey::new(b"fish".to_vec());
    let em = EncryptedMetadata::new(vec![0u8; MAX_VALUE_LEN + 1]);
    let err = store.put_metadata(&hvk, &em).unwrap_err();
    assert!(matches!(err, StoreError::Core(CoreError::OversizedValue { .. })));
}

#[test]
fn index_and_metadata_keyspaces_are_disjoint() {
    let (_dir, store) = open_store();
    let mh = known_mh();
    // A hashed value key with the same bytes as the multihash must land in
    // a different keyspace.
    let hvk = HashedValueKey::new(mh.as_bytes().to_vec());

    store.merge_indexes(vec![index(&mh, b"fish")]).unwrap();
    store.put_metadata(&hvk, &EncryptedMetadata::new(b"lobster".to_vec())).unwrap();

    assert_eq!(store.lookup(&mh).unwrap(), evks(&[b"fish"]));
    assert_eq!(
        store.get_metadata(&hvk).unwrap(),
        Some(EncryptedMetadata::new(b"lobster".to_vec()))
    );

    store.delete_metadata(&hvk).unwrap();
    assert_eq!(store.lookup(&mh).unwrap(), evks(&[b"fish"]));
}

#[test]
fn size_reports_bytes_after_flush() {
    let (_dir, store) = open_store();
    let mut indexes = Vec::new();
    for i in 0..50u8 {
        indexes.push(index(&dbl_mh(i), &[i; 128]));
    }
    store.merge_indexes(indexes).unwrap();
    store.flush().unwrap();
    assert!(store.size().unwrap() > 0);
}

#[test]
fn closed_store_fails_fast() {
    let (_dir, store) = open_store();
    let mh = known_mh();
    store.merge_indexes(vec![index(&mh, b"fish")]).unwrap();
    store.close().unwrap();
    // Closing again is fine.
    store.close().unwrap();

    assert!(matches!(store.lookup(&mh), Err(StoreError::Closed)));
    assert!(matches!(store.merge_indexes(vec![index(&mh, b"lobster")]), Err(StoreError::Closed)));
    assert!(matches!(
        store.get_metadata(&HashedValueKey::new(b"fish".to_vec())),
        Err(StoreError::Closed)
    ));
    assert!(matches!(store.flush(), Err(StoreError::Closed)));
}

#[test]
fn store_reopens_with_data_intact() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("store");
    let mh = known_mh();
    {
        let store = RocksDhStore::open(&path, RocksConfig::default()).unwrap();
        store.merge_indexes(vec![index(&mh, b"fish"), index(&mh, b"lobster")]).unwrap();
        store.close().unwrap();
    }
    let store = RocksDhStore::open(&path, RocksConfig::default()).unwrap();
    assert_eq!(store.lookup(&mh).unwrap(), evks(&[b"fish", b"lobster"]));
}

#[test]
fn concurrent_merges_and_lookups() {
    use std::sync::Arc;

    let (_dir, store) = open_store();
    let store = Arc::new(store);

    let writers: Vec<_> = (0..4u8)
        .map(|w| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..50u8 {
                    let mh = dbl_mh(i % 8);
                    store.merge_indexes(vec![index(&mh, &[w, i])]).unwrap();
                }
            })
        })
        .collect();
    let readers: Vec<_> = (0..2)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..50u8 {
                    store.lookup(&dbl_mh(i % 8)).unwrap();
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    // Every distinct (writer, i) pair for a multihash must be present
    // exactly once.
    let got = store.lookup(&dbl_mh(0)).unwrap();
    assert_eq!(got.len(), 4 * (50 / 8 + 1));
}
