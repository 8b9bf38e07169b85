//! The storage engine
//!
//! One engine serves every database under its configured directory. Opening
//! a database yields a context id; reads go straight to disk through the
//! in-memory reference, writes and erasures buffer in the context, and
//! commit publishes the buffered batch atomically by rewriting the file.
//!
//! The engine makes no intra-process concurrency guarantees: callers
//! serialize access to a context themselves. The only cross-process guard
//! is the advisory lock held during the commit window.

mod context;
mod errors;
mod lockfile;
mod recovery;
mod rewrite;

pub use context::Content;
pub use errors::{EngineError, EngineResult, ErrorKind};

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};

use chrono::Utc;
use tracing::{debug, info};

use crate::config::Config;
use crate::digest::Digest;
use crate::hashtree::HashTree;
use crate::reference::{
    codec, Action, Commit, Commits, ContentKey, ContentKeys, Pointer, Reference,
};

use context::Context;
use lockfile::LockFile;

/// Identifier of an open context. Ids come from a generation counter and
/// are never reused, even after the context closes.
pub type ContextId = u32;

/// The storage engine: database lifecycle, buffered writes, atomic commits.
#[derive(Debug)]
pub struct Engine {
    config: Config,
    contexts: HashMap<ContextId, Context>,
    next_context_id: ContextId,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            contexts: HashMap::new(),
            next_context_id: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // -----------------------------------------------------------------
    // Lifecycle

    /// Whether a database of that name exists (directories do not count).
    pub fn exists(&self, name: &str) -> bool {
        fs::metadata(self.config.database_path(name))
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    /// Creates a new, empty database file.
    ///
    /// The parent directory is created when missing. A database file has no
    /// header until its first commit; a fresh database is zero bytes.
    pub fn create(&self, name: &str) -> EngineResult<()> {
        if !self.config.dir_path().exists() {
            fs::create_dir_all(self.config.dir_path())
                .map_err(|e| EngineError::io("create: make directory", e))?;
        }

        let path = self.config.database_path(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                info!(database = name, "created database");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(EngineError::DatabaseExists {
                    name: name.to_string(),
                })
            }
            Err(e) => Err(EngineError::io("create: create file", e)),
        }
    }

    /// Removes a database file. Fails if the path is a directory.
    pub fn destroy(&self, name: &str) -> EngineResult<()> {
        let path = self.config.database_path(name);
        let meta = fs::metadata(&path).map_err(|e| EngineError::io("destroy: stat", e))?;
        if meta.is_dir() {
            return Err(EngineError::NotAFile {
                name: name.to_string(),
            });
        }

        fs::remove_file(&path).map_err(|e| EngineError::io("destroy: remove file", e))?;
        // The commit lock file is a sibling artifact; drop it too.
        let _ = fs::remove_file(self.config.lock_path(name));
        info!(database = name, "destroyed database");
        Ok(())
    }

    /// Opens a context on a database.
    ///
    /// At most one context per database name may be open in an engine.
    /// Repairs any interrupted commit before reading the reference.
    pub fn open(&mut self, name: &str) -> EngineResult<ContextId> {
        if self.contexts.values().any(|c| c.name == name) {
            return Err(EngineError::ContextExists {
                name: name.to_string(),
            });
        }

        recovery::recover(&self.config, name)?;

        let path = self.config.database_path(name);
        let file = File::open(&path).map_err(|e| EngineError::io("open: open database", e))?;
        let (reference, data_offset) = self.retrieve_reference(&file)?;

        let id = self.next_context_id;
        self.next_context_id += 1;
        let lock = LockFile::new(self.config.lock_path(name));
        self.contexts.insert(
            id,
            Context::new(id, name.to_string(), file, lock, reference, data_offset),
        );
        info!(database = name, context = id, "opened context");
        Ok(id)
    }

    /// Closes a context, dropping its file handle and any pending buffers.
    ///
    /// Buffered changes are discarded, not committed: callers that want
    /// persistence commit first.
    pub fn close(&mut self, ctx: ContextId) -> EngineResult<()> {
        let context = self.contexts.remove(&ctx).ok_or(EngineError::UnknownContext {
            operation: "close",
            context: ctx,
        })?;
        info!(database = %context.name, context = context.id, "closed context");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Queries

    /// Returns the live content keys of the given kind.
    pub fn content_keys(&self, ctx: ContextId, kind: u64) -> EngineResult<ContentKeys> {
        let context = self.context(ctx, "content_keys")?;
        let keys = context
            .reference
            .as_ref()
            .and_then(|r| r.content_keys())
            .ok_or(EngineError::NoContent { context: ctx })?;

        let of_kind: Vec<ContentKey> = keys.list_by_kind(kind).into_iter().copied().collect();
        if of_kind.is_empty() {
            return Err(EngineError::KindNotFound { kind });
        }
        Ok(ContentKeys::new(of_kind))
    }

    /// Returns the full commit history of the context's database.
    pub fn commits(&self, ctx: ContextId) -> EngineResult<&Commits> {
        let context = self.context(ctx, "commits")?;
        context
            .reference
            .as_ref()
            .map(|r| r.commits())
            .ok_or(EngineError::NoCommits { context: ctx })
    }

    // -----------------------------------------------------------------
    // Read path

    /// Reads the payload bytes a pointer names, straight from disk.
    pub fn read(&self, ctx: ContextId, pointer: &Pointer) -> EngineResult<Vec<u8>> {
        let context = self.context(ctx, "read")?;
        let offset = context.data_offset + pointer.from;

        let mut file = &context.file;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| EngineError::io("read: seek", e))?;

        let mut payload = vec![0u8; pointer.length as usize];
        file.read_exact(&mut payload).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => EngineError::ShortRead {
                offset,
                expected: pointer.length,
            },
            _ => EngineError::io("read: read payload", e),
        })?;
        Ok(payload)
    }

    /// Reads several pointers in order, failing on the first error.
    pub fn read_all(&self, ctx: ContextId, pointers: &[Pointer]) -> EngineResult<Vec<Vec<u8>>> {
        pointers
            .iter()
            .map(|pointer| self.read(ctx, pointer))
            .collect()
    }

    // -----------------------------------------------------------------
    // Buffered mutations

    /// Buffers a payload for insertion at the next commit.
    ///
    /// The hash is trusted to equal the digest of `data`; the engine does
    /// not recompute it. Nothing touches disk until commit.
    pub fn write(
        &mut self,
        ctx: ContextId,
        kind: u64,
        hash: Digest,
        data: Vec<u8>,
    ) -> EngineResult<()> {
        let context = self.context_mut(ctx, "write")?;
        debug!(
            database = %context.name,
            kind,
            hash = %hash,
            bytes = data.len(),
            "buffered insert"
        );
        context.inserts.push(Content { hash, kind, data });
        Ok(())
    }

    /// Buffers a live content key for erasure at the next commit.
    ///
    /// Idempotent: erasing the same (kind, hash) again overwrites the
    /// buffered entry.
    pub fn erase(&mut self, ctx: ContextId, key: &ContentKey) -> EngineResult<()> {
        let context = self.context_mut(ctx, "erase")?;
        debug!(database = %context.name, kind = key.kind, hash = %key.hash, "buffered erase");
        context.deletes.insert((key.kind, key.hash), *key);
        Ok(())
    }

    /// Drops all pending inserts and erasures without committing them.
    pub fn cancel(&mut self, ctx: ContextId) -> EngineResult<()> {
        let context = self.context_mut(ctx, "cancel")?;
        debug!(
            database = %context.name,
            inserts = context.inserts.len(),
            deletes = context.deletes.len(),
            "cancelled pending changes"
        );
        context.clear_pending();
        Ok(())
    }

    /// Publishes the pending batch as new commits and rewrites the file.
    ///
    /// Within one commit call, erasures apply before inserts: a batch that
    /// erases and re-inserts the same (kind, hash) lands as two commits,
    /// delete first. With nothing pending, this is a no-op that succeeds
    /// without touching the file.
    pub fn commit(&mut self, ctx: ContextId) -> EngineResult<()> {
        let context = self.contexts.get_mut(&ctx).ok_or(EngineError::UnknownContext {
            operation: "commit",
            context: ctx,
        })?;

        let Some(reference) = next_reference(context) else {
            debug!(database = %context.name, "nothing pending, commit is a no-op");
            return Ok(());
        };

        let (file, data_offset) = rewrite::publish(&self.config, context, &reference)?;
        context.file = file;
        context.reference = Some(reference);
        context.data_offset = data_offset;
        context.clear_pending();
        Ok(())
    }

    // -----------------------------------------------------------------
    // Internals

    fn context(&self, ctx: ContextId, operation: &'static str) -> EngineResult<&Context> {
        self.contexts.get(&ctx).ok_or(EngineError::UnknownContext {
            operation,
            context: ctx,
        })
    }

    fn context_mut(&mut self, ctx: ContextId, operation: &'static str) -> EngineResult<&mut Context> {
        self.contexts
            .get_mut(&ctx)
            .ok_or(EngineError::UnknownContext {
                operation,
                context: ctx,
            })
    }

    /// Reads the reference block from the head of a database file.
    ///
    /// A file shorter than the 8-byte length prefix (a fresh database is
    /// zero bytes) has no reference yet. The reference bytes stream in
    /// chunks of at most `read_chunk_size`.
    fn retrieve_reference(&self, file: &File) -> EngineResult<(Option<Reference>, u64)> {
        let mut file = file;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| EngineError::io("open: seek", e))?;

        let mut prefix = [0u8; 8];
        let got = read_available(file, &mut prefix)
            .map_err(|e| EngineError::io("open: read reference length", e))?;
        if got < prefix.len() {
            return Ok((None, 0));
        }

        let length = u64::from_le_bytes(prefix);
        let length_usize = usize::try_from(length)
            .map_err(|_| EngineError::Codec(codec::CodecError::LengthOverflow(length)))?;

        let mut body = vec![0u8; length_usize];
        let mut filled = 0;
        while filled < length_usize {
            let take = self.config.chunk_size(length_usize - filled);
            file.read_exact(&mut body[filled..filled + take])
                .map_err(|e| match e.kind() {
                    io::ErrorKind::UnexpectedEof => EngineError::ShortRead {
                        offset: 8 + filled as u64,
                        expected: length,
                    },
                    _ => EngineError::io("open: read reference", e),
                })?;
            filled += take;
        }

        let reference = codec::decode_reference(&body)?;
        Ok((Some(reference), 8 + length))
    }
}

/// Builds the reference the pending batch commits to, or `None` when the
/// batch is empty.
///
/// Erasures apply first: a delete commit chains onto the current history,
/// erased keys leave the live set, and the survivors are rebased so the
/// data region stays the exact concatenation of live payloads. Inserts
/// then chain onto the delete commit (or the prior history) and extend the
/// live set at the high-water offset.
fn next_reference(context: &Context) -> Option<Reference> {
    if !context.has_pending() {
        return None;
    }

    let mut commits: Vec<Commit> = context
        .reference
        .as_ref()
        .map(|r| r.commits().list().to_vec())
        .unwrap_or_default();
    let mut parent: Option<Digest> = commits.last().map(|c| *c.hash());

    let mut live: Vec<ContentKey> = context
        .reference
        .as_ref()
        .and_then(|r| r.content_keys())
        .map(|keys| keys.list().to_vec())
        .unwrap_or_default();

    if !context.deletes.is_empty() {
        let leaves: Vec<Digest> = context.deletes.values().map(|key| key.hash).collect();
        let commit = Commit::new(parent, Action::Delete(HashTree::build(leaves)), Utc::now());
        live.retain(|key| !context.deletes.contains_key(&(key.kind, key.hash)));
        parent = Some(*commit.hash());
        commits.push(commit);
    }

    // Rebase survivors: pointers are cumulative in list order, so the data
    // region written at publish time matches the index exactly.
    let mut offset: u64 = 0;
    for key in &mut live {
        key.content = Pointer::new(offset, key.content.length);
        offset += key.content.length;
    }

    if !context.inserts.is_empty() {
        let leaves: Vec<Digest> = context.inserts.iter().map(|content| content.hash).collect();
        let commit = Commit::new(parent, Action::Insert(HashTree::build(leaves)), Utc::now());
        let commit_hash = *commit.hash();
        for content in &context.inserts {
            live.push(ContentKey::new(
                content.hash,
                content.kind,
                Pointer::new(offset, content.data.len() as u64),
                commit_hash,
            ));
            offset += content.data.len() as u64;
        }
        commits.push(commit);
    }

    let content_keys = if live.is_empty() {
        None
    } else {
        Some(ContentKeys::new(live))
    };
    Some(Reference::new(content_keys, Commits::new(commits)))
}

fn read_available(mut file: &File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
