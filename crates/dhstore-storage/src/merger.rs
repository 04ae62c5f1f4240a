//! The value-keys merge operator.
//!
//! Index writes are read-free: every merge submits one framed encrypted
//! value key, and the backend folds submissions into the stored set by
//! calling into [`ValueKeysMerger`] during writes and compactions. The
//! merger therefore defines the effective semantics of the multi-valued
//! mapping:
//!
//! - the stored set is the union of every value ever merged,
//! - duplicates are eliminated by bytewise equality,
//! - insertion order is preserved, oldest first, and
//! - a merge whose result is empty asks for the key to be deleted rather
//!   than written.
//!
//! The fold is associative under these rules, so the backend may combine
//! log segments in either direction and in any grouping. Contributions may
//! arrive newest-first ([`merge_older`]); the `reverse` flag defers the
//! ordering fix-up to [`finish`] so mixed arrival orders still come out
//! oldest-first.
//!
//! Only keys tagged as multihash keys use this operator; every other key
//! keeps last-write-wins semantics. The operator is registered under
//! [`VALUE_KEYS_MERGER_NAME`]; the name is recorded in the database
//! manifest, so changing the merge semantics requires bumping the version
//! embedded in it.
//!
//! [`merge_older`]: ValueKeysMerger::merge_older
//! [`finish`]: ValueKeysMerger::finish

use dhstore_core::codec::{write_section, SectionReader};
use dhstore_core::{CoreError, KeyPrefix};

/// Versioned name the operator is registered under. Part of the on-disk
/// format: a database whose manifest records a different merger name is
/// incompatible with this store.
pub const VALUE_KEYS_MERGER_NAME: &str = "dhstore.v1.valueKeysMerger";

/// Accumulating state of one merge fold.
///
/// Built per backend merge invocation, fed values through
/// [`merge_newer`](Self::merge_newer) / [`merge_older`](Self::merge_older),
/// and consumed by [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct ValueKeysMerger {
    merges: Vec<Vec<u8>>,
    reverse: bool,
    // Accumulated payload length, used to size the output buffer.
    size_hint: usize,
}

impl ValueKeysMerger {
    /// Creates an empty merger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `key` belongs to this operator: only multihash
    /// keys hold merged value sets.
    #[must_use]
    pub fn handles_key(key: &[u8]) -> bool {
        key.first().copied().and_then(KeyPrefix::from_byte) == Some(KeyPrefix::Multihash)
    }

    /// Folds in a value newer than everything accumulated so far.
    ///
    /// The value is a section-framed sequence of encrypted value keys. An
    /// empty value contributes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Decode`] when the value does not decode; the
    /// backend treats this as corruption and fails the triggering
    /// operation.
    pub fn merge_newer(&mut self, value: &[u8]) -> Result<(), CoreError> {
        if value.is_empty() {
            return Ok(());
        }
        if self.merges.is_empty() {
            // First contribution: take the batch wholesale, skipping the
            // membership scan.
            for section in SectionReader::new(value) {
                self.merges.push(section?.to_vec());
            }
            self.size_hint += value.len();
            return Ok(());
        }
        for section in SectionReader::new(value) {
            let section = section?;
            if !self.contains(section) {
                self.size_hint += section.len();
                self.merges.push(section.to_vec());
            }
        }
        Ok(())
    }

    /// Folds in a value older than everything accumulated so far.
    ///
    /// Sets the `reverse` flag permanently: once any contribution has
    /// arrived out of age order, [`finish`](Self::finish) restores
    /// oldest-first ordering by reversing the accumulated sequence.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Decode`] when the value does not decode.
    pub fn merge_older(&mut self, value: &[u8]) -> Result<(), CoreError> {
        self.reverse = true;
        self.merge_newer(value)
    }

    /// Emits the merged value and whether the key should be deleted
    /// instead of written.
    ///
    /// The deletion flag is set exactly when the emitted bytes are empty:
    /// an empty value set is never persisted.
    #[must_use]
    pub fn finish(mut self) -> (Vec<u8>, bool) {
        if self.merges.is_empty() {
            return (Vec::new(), true);
        }
        if self.reverse {
            self.merges.reverse();
        }
        let mut buf = Vec::with_capacity(self.size_hint + self.merges.len());
        for merge in &self.merges {
            write_section(&mut buf, merge);
        }
        (buf, false)
    }

    fn contains(&self, value: &[u8]) -> bool {
        self.merges.iter().any(|m| m == value)
    }
}
