//! Domain byte newtypes.
//!
//! Every payload this store handles is an opaque byte sequence: the store
//! never interprets encrypted content. The newtypes below exist to keep the
//! different roles from being mixed up at compile time. On the JSON wire
//! all of them travel base64-encoded, matching the upstream ingest format.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::multihash::Multihash;

/// Maximum accepted length of an encrypted value key or metadata blob.
pub const MAX_VALUE_LEN: usize = 100 << 10;

macro_rules! opaque_bytes {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Default, PartialEq, Eq, Hash)]
        pub struct $name(Vec<u8>);

        impl $name {
            /// Wraps raw bytes.
            #[must_use]
            pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
                Self(bytes.into())
            }

            /// Borrows the underlying bytes.
            #[inline]
            #[must_use]
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Length in bytes.
            #[inline]
            #[must_use]
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// Returns `true` when the payload is empty.
            #[inline]
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Consumes the newtype, returning the raw bytes.
            #[must_use]
            pub fn into_bytes(self) -> Vec<u8> {
                self.0
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }
        }

        impl From<&[u8]> for $name {
            fn from(bytes: &[u8]) -> Self {
                Self(bytes.to_vec())
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&BASE64.encode(&self.0)).finish()
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&BASE64.encode(&self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let encoded = String::deserialize(deserializer)?;
                BASE64.decode(encoded).map(Self).map_err(de::Error::custom)
            }
        }
    };
}

opaque_bytes! {
    /// An opaque reference to an external provider record, encrypted by the
    /// publisher. Merged into the value set held under a multihash key.
    EncryptedValueKey
}

opaque_bytes! {
    /// An opaque blob describing a provider's retrieval metadata.
    EncryptedMetadata
}

opaque_bytes! {
    /// An opaque identifier for one metadata row. Condensed to a fixed-width
    /// digest before it becomes a database key, so any length is accepted
    /// here.
    HashedValueKey
}

/// One multihash-to-encrypted-value-key pair, the unit of both merge and
/// delete batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// The double-hashed multihash the value is indexed under.
    pub key: Multihash,
    /// The encrypted value key to merge into (or remove from) the set.
    pub value: EncryptedValueKey,
}

/// Rejects values larger than [`MAX_VALUE_LEN`].
///
/// # Errors
///
/// Returns [`CoreError::OversizedValue`] when the value is too large.
///
/// [`CoreError::OversizedValue`]: crate::CoreError::OversizedValue
pub fn check_value_len(bytes: &[u8]) -> Result<(), crate::CoreError> {
    if bytes.len() > MAX_VALUE_LEN {
        return Err(crate::CoreError::OversizedValue { len: bytes.len(), max: MAX_VALUE_LEN });
    }
    Ok(())
}
