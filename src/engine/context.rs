//! Open-session state
//!
//! A context is one open session on one database file: the read handle, the
//! commit lock, the current reference snapshot, and the pending buffers a
//! commit will publish. Buffered changes touch no disk until commit.

use std::collections::BTreeMap;
use std::fs::File;

use crate::digest::Digest;
use crate::reference::{ContentKey, Reference};

use super::lockfile::LockFile;
use super::ContextId;

/// A pending insert: payload bytes waiting in a context's buffer.
///
/// The hash is trusted to be the digest of `data`; the engine never
/// recomputes it.
#[derive(Debug, Clone)]
pub struct Content {
    pub hash: Digest,
    pub kind: u64,
    pub data: Vec<u8>,
}

/// Key of the pending-delete map. Keyed by (kind, hash): two live keys
/// sharing a hash under different kinds stay independent through a delete.
pub(crate) type DeleteKey = (u64, Digest);

#[derive(Debug)]
pub(crate) struct Context {
    pub(crate) id: ContextId,
    pub(crate) name: String,
    /// Read handle on the current source file; replaced after every commit.
    pub(crate) file: File,
    pub(crate) lock: LockFile,
    /// Index snapshot; absent until the first commit lands.
    pub(crate) reference: Option<Reference>,
    /// Absolute offset of the data region in the source file.
    pub(crate) data_offset: u64,
    pub(crate) inserts: Vec<Content>,
    /// Deterministically ordered so the delete tree is reproducible.
    pub(crate) deletes: BTreeMap<DeleteKey, ContentKey>,
}

impl Context {
    pub(crate) fn new(
        id: ContextId,
        name: String,
        file: File,
        lock: LockFile,
        reference: Option<Reference>,
        data_offset: u64,
    ) -> Self {
        Self {
            id,
            name,
            file,
            lock,
            reference,
            data_offset,
            inserts: Vec::new(),
            deletes: BTreeMap::new(),
        }
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.inserts.is_empty() || !self.deletes.is_empty()
    }

    pub(crate) fn clear_pending(&mut self) {
        self.inserts.clear();
        self.deletes.clear();
    }
}
