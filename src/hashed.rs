//! Hash-indexed access layered on the engine
//!
//! The engine deals in pointers; this layer deals in (kind, hash) pairs. A
//! lookup resolves the live content key through the context's reference and
//! delegates the byte work to the engine. The extension trait keeps the
//! layer at the seam: any holder of an [`Engine`] gets the hash-indexed
//! surface for free.

use crate::digest::Digest;
use crate::engine::{ContextId, Engine, EngineError, EngineResult, ErrorKind};
use crate::reference::{Commit, ContentKey};

/// Hash-indexed reads, erasures, and history lookups over an [`Engine`].
pub trait HashIndexed {
    /// Lists the hashes of all live records of a kind.
    fn list(&self, ctx: ContextId, kind: u64) -> EngineResult<Vec<Digest>>;

    /// Reads the payload stored under (kind, hash).
    fn read_by_hash(&self, ctx: ContextId, kind: u64, hash: &Digest) -> EngineResult<Vec<u8>>;

    /// Reads several payloads of one kind in order, failing on the first
    /// missing hash.
    fn read_all_by_hash(
        &self,
        ctx: ContextId,
        kind: u64,
        hashes: &[Digest],
    ) -> EngineResult<Vec<Vec<u8>>>;

    /// Buffers the erasure of the record stored under (kind, hash).
    ///
    /// Fails when the record is not live; the erasure itself lands at the
    /// next commit.
    fn erase_by_hash(&mut self, ctx: ContextId, kind: u64, hash: &Digest) -> EngineResult<()>;

    /// Buffers erasures for several hashes of one kind, failing on the
    /// first that is not live.
    fn erase_all_by_hash(
        &mut self,
        ctx: ContextId,
        kind: u64,
        hashes: &[Digest],
    ) -> EngineResult<()>;

    /// Looks a commit up in the database's history by its hash.
    fn commit_by_hash(&self, ctx: ContextId, hash: &Digest) -> EngineResult<Commit>;
}

impl HashIndexed for Engine {
    fn list(&self, ctx: ContextId, kind: u64) -> EngineResult<Vec<Digest>> {
        let keys = self.content_keys(ctx, kind)?;
        Ok(keys.list().iter().map(|key| key.hash).collect())
    }

    fn read_by_hash(&self, ctx: ContextId, kind: u64, hash: &Digest) -> EngineResult<Vec<u8>> {
        let key = resolve_live_key(self, ctx, kind, hash)?;
        self.read(ctx, &key.content)
    }

    fn read_all_by_hash(
        &self,
        ctx: ContextId,
        kind: u64,
        hashes: &[Digest],
    ) -> EngineResult<Vec<Vec<u8>>> {
        hashes
            .iter()
            .map(|hash| self.read_by_hash(ctx, kind, hash))
            .collect()
    }

    fn erase_by_hash(&mut self, ctx: ContextId, kind: u64, hash: &Digest) -> EngineResult<()> {
        let key = resolve_live_key(self, ctx, kind, hash)?;
        self.erase(ctx, &key)
    }

    fn erase_all_by_hash(
        &mut self,
        ctx: ContextId,
        kind: u64,
        hashes: &[Digest],
    ) -> EngineResult<()> {
        for hash in hashes {
            self.erase_by_hash(ctx, kind, hash)?;
        }
        Ok(())
    }

    fn commit_by_hash(&self, ctx: ContextId, hash: &Digest) -> EngineResult<Commit> {
        let commits = self.commits(ctx)?;
        commits
            .fetch(hash)
            .cloned()
            .ok_or(EngineError::CommitNotFound { hash: *hash })
    }
}

/// Resolves the live content key for (kind, hash).
///
/// An empty database or an empty kind resolves to the same outcome as a
/// missing hash: the record does not exist.
fn resolve_live_key(
    engine: &Engine,
    ctx: ContextId,
    kind: u64,
    hash: &Digest,
) -> EngineResult<ContentKey> {
    let keys = match engine.content_keys(ctx, kind) {
        Ok(keys) => keys,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(EngineError::ContentNotFound { kind, hash: *hash })
        }
        Err(e) => return Err(e),
    };
    keys.fetch(kind, hash)
        .copied()
        .ok_or(EngineError::ContentNotFound { kind, hash: *hash })
}
