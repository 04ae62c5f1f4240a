//! Error types for the core crate.

use thiserror::Error;

/// Errors produced by validation and byte-level decoding.
///
/// Validation errors (everything except [`CoreError::Decode`]) are caused by
/// bad caller input and are surfaced to clients unchanged. A [`Decode`]
/// failure means stored bytes did not round-trip and indicates corruption or
/// a format version mismatch.
///
/// [`Decode`]: CoreError::Decode
#[derive(Debug, Error)]
pub enum CoreError {
    /// The bytes do not parse as a multihash of the required shape.
    #[error("failed to decode multihash {multihash}: {reason}")]
    MultihashDecode {
        /// Base58 rendering of the offending bytes.
        multihash: String,
        /// What went wrong while decoding.
        reason: String,
    },

    /// The multihash decoded, but its multicodec is not `dbl-sha2-256`.
    #[error("multihash must be of code dbl-sha2-256, got {code:#x}")]
    UnsupportedMulticodec {
        /// The multicodec code that was found.
        code: u64,
    },

    /// The hashed value key was rejected.
    #[error("invalid hashed value key {key}: {reason}")]
    InvalidHashedValueKey {
        /// Base58 rendering of the offending key.
        key: String,
        /// What went wrong.
        reason: String,
    },

    /// An encrypted value key or metadata blob exceeds the accepted size.
    #[error("value of {len} bytes exceeds the {max} byte limit")]
    OversizedValue {
        /// Length of the rejected value.
        len: usize,
        /// The enforced limit.
        max: usize,
    },

    /// Stored bytes failed to decode (framing or varint violation).
    #[error("value decode error: {0}")]
    Decode(String),
}

impl CoreError {
    /// Returns `true` if this error was caused by invalid caller input
    /// rather than by malformed stored data.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }
}
