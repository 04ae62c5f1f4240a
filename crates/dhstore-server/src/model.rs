//! JSON request and response bodies.
//!
//! Field names and casing follow the upstream ingest and find formats, so
//! existing publishers and clients interoperate without translation.

use serde::{Deserialize, Serialize};

use dhstore_core::{EncryptedMetadata, EncryptedValueKey, HashedValueKey, Index, Multihash};

/// Body of `PUT /multihash` and `DELETE /multihash`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MergeIndexRequest {
    /// The `(multihash, encrypted value key)` pairs to merge or remove.
    pub merges: Vec<Index>,
}

/// Body of `PUT /metadata`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PutMetadataRequest {
    /// The hashed value key the metadata is stored under.
    pub key: HashedValueKey,
    /// The encrypted metadata blob.
    pub value: EncryptedMetadata,
}

/// Body of a successful `GET /multihash/{multihash}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LookupResponse {
    /// One result entry per queried multihash.
    #[serde(rename = "EncryptedMultihashResults")]
    pub encrypted_multihash_results: Vec<EncryptedMultihashResult>,
}

/// The value keys found for one multihash.
#[derive(Debug, Serialize, Deserialize)]
pub struct EncryptedMultihashResult {
    /// The queried multihash.
    #[serde(rename = "Multihash")]
    pub multihash: Multihash,
    /// The encrypted value keys stored under it, oldest first.
    #[serde(rename = "EncryptedValueKeys")]
    pub encrypted_value_keys: Vec<EncryptedValueKey>,
}

/// Body of a successful `GET /metadata/{key}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetMetadataResponse {
    /// The stored metadata blob.
    #[serde(rename = "EncryptedMetadata")]
    pub encrypted_metadata: EncryptedMetadata,
}
