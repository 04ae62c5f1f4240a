//! dhstore storage
//!
//! This crate provides the storage engine for dhstore: the store facade that
//! implements the domain operations, the log-structured backend abstraction
//! it runs on, and the merge operator that maintains multi-valued index
//! entries without read-before-write.
//!
//! # Overview
//!
//! The write path for index entries never reads existing state. Each merge
//! submits a single framed encrypted value key under the multihash key; the
//! backend folds it into the stored set via [`ValueKeysMerger`] during
//! writes and compactions. Deletion of individual values is the one
//! read-modify-write path, because removal is an absolute replacement
//! rather than a fold.
//!
//! # Core pieces
//!
//! - [`DhStore`] - The domain operations (merge, delete, lookup, metadata)
//! - [`LsmStore`] - The facade implementing [`DhStore`] over any backend
//! - [`LsmBackend`] - The minimum backend capability set the facade consumes
//! - [`ValueKeysMerger`] - The associative value-set merge operator
//! - [`RocksBackend`] - The RocksDB implementation of [`LsmBackend`]
//!
//! # Example
//!
//! ```ignore
//! use dhstore_core::{EncryptedValueKey, Index, Multihash};
//! use dhstore_storage::{DhStore, RocksConfig, RocksDhStore};
//!
//! let store = RocksDhStore::open("indexes.db", RocksConfig::default())?;
//! store.merge_indexes(vec![Index { key: mh, value: evk }])?;
//! let values = store.lookup(&mh)?;
//! store.close()?;
//! ```

pub mod backends;
pub mod engine;
pub mod merger;
pub mod store;

pub use backends::rocks::{RocksBackend, RocksConfig};
pub use engine::{BackendMetrics, BatchOps, LsmBackend, StorageError, WriteMode};
pub use merger::ValueKeysMerger;
pub use store::{DhStore, LsmStore, RocksDhStore, StoreError};
