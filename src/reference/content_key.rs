//! Content keys: the durable directory entries of a database
//!
//! A content key maps a (kind, hash) pair to the byte range holding the
//! payload, and remembers the commit that introduced it. Distinct kinds may
//! share a hash; they name distinct byte ranges.

use crate::digest::Digest;

use super::pointer::Pointer;

/// A single directory entry: (kind, hash) → byte range, plus provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentKey {
    /// Digest of the payload bytes.
    pub hash: Digest,
    /// Caller-assigned namespace.
    pub kind: u64,
    /// Where the payload lives in the data region.
    pub content: Pointer,
    /// Hash of the commit that inserted this key.
    pub commit: Digest,
}

impl ContentKey {
    pub fn new(hash: Digest, kind: u64, content: Pointer, commit: Digest) -> Self {
        Self {
            hash,
            kind,
            content,
            commit,
        }
    }
}

/// The ordered list of live content keys in one reference snapshot.
///
/// Pointer ranges follow list order: the data region is the concatenation of
/// the payloads in this order, so `next()` is both the high-water offset and
/// the sum of live lengths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentKeys {
    list: Vec<ContentKey>,
}

impl ContentKeys {
    pub fn new(list: Vec<ContentKey>) -> Self {
        Self { list }
    }

    pub fn list(&self) -> &[ContentKey] {
        &self.list
    }

    /// Looks up the live key for a (kind, hash) pair.
    pub fn fetch(&self, kind: u64, hash: &Digest) -> Option<&ContentKey> {
        self.list
            .iter()
            .find(|key| key.kind == kind && &key.hash == hash)
    }

    /// Returns all keys of the given kind, in list order.
    pub fn list_by_kind(&self, kind: u64) -> Vec<&ContentKey> {
        self.list.iter().filter(|key| key.kind == kind).collect()
    }

    /// The offset at which the next appended payload byte would land.
    pub fn next(&self) -> u64 {
        self.list.iter().map(|key| key.content.length).sum()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}
