//! Multihash decoding and validation.
//!
//! A multihash is a self-describing hash identifier: an unsigned-varint
//! multicodec code, an unsigned-varint digest length, then the digest bytes.
//! This store accepts exactly one shape on its index paths: code
//! [`DBL_SHA2_256`] with a 32-byte digest. Anything else is rejected before
//! the backing database is touched.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::codec;
use crate::error::CoreError;

/// Multicodec code of a double SHA2-256 hash.
pub const DBL_SHA2_256: u64 = 0x56;

/// Multicodec code of a plain SHA2-256 hash. Well-formed, but not accepted
/// by the index paths.
pub const SHA2_256: u64 = 0x12;

/// Digest width required on every index path.
pub const DIGEST_LEN: usize = 32;

/// Raw multihash bytes as supplied by a caller.
///
/// Construction does not validate; call [`Multihash::decode`] or
/// [`Multihash::ensure_dbl_sha2_256`] before trusting the contents. The
/// bytes are kept verbatim because the multihash key form appends them
/// unhashed.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Multihash(Vec<u8>);

/// The parsed header of a [`Multihash`], borrowing its digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedMultihash<'a> {
    /// The multicodec code identifying the hash function.
    pub code: u64,
    /// The digest bytes.
    pub digest: &'a [u8],
}

impl Multihash {
    /// Wraps raw multihash bytes without validating them.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parses a base58btc string into a multihash.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MultihashDecode`] when the string is not valid
    /// base58.
    pub fn from_base58(s: &str) -> Result<Self, CoreError> {
        let bytes = bs58::decode(s).into_vec().map_err(|e| CoreError::MultihashDecode {
            multihash: s.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self(bytes))
    }

    /// Borrows the raw bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Base58btc rendering, the conventional text form of a multihash.
    #[must_use]
    pub fn to_base58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    /// Parses the multihash header.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MultihashDecode`] when the varint header is
    /// malformed or the digest length does not match the remaining bytes.
    pub fn decode(&self) -> Result<DecodedMultihash<'_>, CoreError> {
        let (code, n) =
            codec::read_uvarint(&self.0).map_err(|e| self.decode_error(&e.to_string()))?;
        let rest = &self.0[n..];
        let (len, n) = codec::read_uvarint(rest).map_err(|e| self.decode_error(&e.to_string()))?;
        let digest = &rest[n..];
        if digest.len() as u64 != len {
            return Err(self.decode_error(&format!(
                "digest length {} does not match declared length {len}",
                digest.len()
            )));
        }
        Ok(DecodedMultihash { code, digest })
    }

    /// Validates that this multihash is `dbl-sha2-256` with a 32-byte
    /// digest, the only shape the index paths accept.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MultihashDecode`] when the bytes do not parse or
    /// the digest width is wrong, and [`CoreError::UnsupportedMulticodec`]
    /// when the multicodec differs.
    pub fn ensure_dbl_sha2_256(&self) -> Result<(), CoreError> {
        let decoded = self.decode()?;
        if decoded.code != DBL_SHA2_256 {
            return Err(CoreError::UnsupportedMulticodec { code: decoded.code });
        }
        if decoded.digest.len() != DIGEST_LEN {
            return Err(
                self.decode_error(&format!("digest must be {DIGEST_LEN} bytes, got {}", decoded.digest.len()))
            );
        }
        Ok(())
    }

    fn decode_error(&self, reason: &str) -> CoreError {
        CoreError::MultihashDecode { multihash: self.to_base58(), reason: reason.to_owned() }
    }
}

impl From<Vec<u8>> for Multihash {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Multihash {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for Multihash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Multihash").field(&self.to_base58()).finish()
    }
}

impl fmt::Display for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

// On the JSON wire multihash bytes travel base64-encoded like every other
// byte payload; base58 is reserved for URL paths and human-facing text.
impl Serialize for Multihash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Multihash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map(Self).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_DBL: &str = "2wvdp9y1J63yDvaPawP4kUjXezRLcu9x9u2DAB154dwai82";

    fn dbl_multihash(digest: [u8; 32]) -> Multihash {
        let mut bytes = vec![0x56, 0x20];
        bytes.extend_from_slice(&digest);
        Multihash::new(bytes)
    }

    #[test]
    fn known_base58_vector_is_valid() {
        let mh = Multihash::from_base58(KNOWN_DBL).unwrap();
        let decoded = mh.decode().unwrap();
        assert_eq!(decoded.code, DBL_SHA2_256);
        assert_eq!(decoded.digest.len(), DIGEST_LEN);
        assert!(mh.ensure_dbl_sha2_256().is_ok());
        assert_eq!(mh.to_base58(), KNOWN_DBL);
    }

    #[test]
    fn arbitrary_bytes_fail_decode() {
        let mh = Multihash::new(b"lobster".to_vec());
        assert!(matches!(mh.ensure_dbl_sha2_256(), Err(CoreError::MultihashDecode { .. })));
    }

    #[test]
    fn wrong_codec_is_unsupported() {
        let mut bytes = vec![0x12, 0x20];
        bytes.extend_from_slice(&[0xab; 32]);
        let mh = Multihash::new(bytes);
        // Well-formed as a multihash, but the wrong hash function.
        assert!(mh.decode().is_ok());
        assert!(matches!(
            mh.ensure_dbl_sha2_256(),
            Err(CoreError::UnsupportedMulticodec { code: SHA2_256 })
        ));
    }

    #[test]
    fn truncated_digest_is_rejected() {
        let mh = Multihash::new(vec![0x56, 0x20, 0x01, 0x02]);
        assert!(matches!(mh.decode(), Err(CoreError::MultihashDecode { .. })));
    }

    #[test]
    fn wrong_digest_width_is_rejected() {
        let mut bytes = vec![0x56, 0x10];
        bytes.extend_from_slice(&[0xcd; 16]);
        let mh = Multihash::new(bytes);
        assert!(mh.decode().is_ok());
        assert!(matches!(mh.ensure_dbl_sha2_256(), Err(CoreError::MultihashDecode { .. })));
    }

    #[test]
    fn empty_input_is_rejected() {
        let mh = Multihash::new(Vec::new());
        assert!(mh.decode().is_err());
    }

    #[test]
    fn valid_mh_roundtrips_base58() {
        let mh = dbl_multihash([7u8; 32]);
        let again = Multihash::from_base58(&mh.to_base58()).unwrap();
        assert_eq!(again, mh);
    }
}
