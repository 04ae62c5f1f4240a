//! dhstore core
//!
//! This crate provides the domain types and byte-level encodings shared by
//! the dhstore storage engine and its HTTP front end.
//!
//! # Overview
//!
//! dhstore indexes content for a privacy-preserving discovery network. Two
//! mappings are maintained:
//!
//! - a double-hashed [`Multihash`] maps to a set of opaque
//!   [`EncryptedValueKey`]s (references to provider records), and
//! - a [`HashedValueKey`] maps to a single [`EncryptedMetadata`] blob.
//!
//! The core crate knows nothing about the backing database. It defines:
//!
//! - **Types**: the opaque byte newtypes above plus the [`Index`] pair
//!   submitted to merge and delete operations
//! - **Multihash validation**: strict decoding of the self-describing hash
//!   header; only `dbl-sha2-256` with a 32-byte digest is accepted
//! - **Key schema**: typed database keys built from a one-byte
//!   [`KeyPrefix`] tag ([`keys`])
//! - **Section framing**: the varint-length-prefixed value layout under a
//!   multihash key ([`codec`])
//! - **Scratch pool**: reusable key and section buffers for hot paths
//!   ([`pool`])
//!
//! # Modules
//!
//! - [`types`] - Domain byte newtypes and the [`Index`] pair
//! - [`multihash`] - Multihash decoding and validation
//! - [`codec`] - Varints and section framing
//! - [`keys`] - Typed database key construction
//! - [`pool`] - Scratch buffer pool
//! - [`error`] - Error types ([`CoreError`])

pub mod codec;
pub mod error;
pub mod keys;
pub mod multihash;
pub mod pool;
pub mod types;


pub use error::CoreError;
pub use keys::{KeyPrefix, Keyer};
pub use multihash::{DecodedMultihash, Multihash};
pub use pool::Pool;
pub use types::{EncryptedMetadata, EncryptedValueKey, HashedValueKey, Index, MAX_VALUE_LEN};
