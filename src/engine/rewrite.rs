//! Atomic commit publication
//!
//! A commit never patches the source file. It writes a complete destination
//! file (reference plus compacted data region), fsyncs it, then performs the
//! swap: back up the source, unlink it, rename destination over it, drop the
//! backup, reopen. The advisory lock is held across the whole sequence.
//!
//! Readers holding the old handle keep seeing consistent old bytes until
//! they reopen (Unix unlink-while-open semantics).

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};

use tracing::{debug, info};

use crate::config::Config;
use crate::reference::codec;
use crate::reference::Reference;

use super::context::Context;
use super::errors::{EngineError, EngineResult};
use super::lockfile::LockError;

/// Publishes `reference` for the context's database.
///
/// Returns the reopened read handle and the new data-region offset. The
/// context itself is untouched; on any error the source file is either
/// intact or recoverable by the repair pass at the next open.
pub(crate) fn publish(
    config: &Config,
    context: &Context,
    reference: &Reference,
) -> EngineResult<(File, u64)> {
    let _guard = context.lock.try_lock().map_err(|e| match e {
        LockError::Contended => EngineError::LockHeld {
            name: context.name.clone(),
        },
        LockError::Io(source) => EngineError::io("commit: acquire lock", source),
    })?;

    let (destination_path, data_offset) = write_destination(config, context, reference)?;

    let source_path = config.database_path(&context.name);
    let backup_path = config.backup_path(&context.name);

    fs::copy(&source_path, &backup_path)
        .map_err(|e| EngineError::io("commit: back up source", e))?;
    fs::remove_file(&source_path).map_err(|e| EngineError::io("commit: unlink source", e))?;
    fs::rename(&destination_path, &source_path)
        .map_err(|e| EngineError::io("commit: publish destination", e))?;
    fs::remove_file(&backup_path).map_err(|e| EngineError::io("commit: remove backup", e))?;

    let file =
        File::open(&source_path).map_err(|e| EngineError::io("commit: reopen source", e))?;
    info!(database = %context.name, data_offset, "published commit");
    Ok((file, data_offset))
}

/// Writes the complete next state of the database into the destination file.
///
/// Layout: 8-byte LE reference length, reference bytes, then the data
/// region: every surviving payload copied from the source in key order,
/// followed by the pending inserts in insertion order. Any copy failure
/// aborts the commit.
fn write_destination(
    config: &Config,
    context: &Context,
    reference: &Reference,
) -> EngineResult<(std::path::PathBuf, u64)> {
    let path = config.destination_path(&context.name);
    let mut destination =
        File::create(&path).map_err(|e| EngineError::io("commit: create destination", e))?;

    let reference_bytes = codec::encode_reference(reference);
    destination
        .write_all(&(reference_bytes.len() as u64).to_le_bytes())
        .map_err(|e| EngineError::io("commit: write reference length", e))?;
    destination
        .write_all(&reference_bytes)
        .map_err(|e| EngineError::io("commit: write reference", e))?;

    // Surviving payloads, compacted: deleted ranges are simply not copied.
    if let Some(keys) = context.reference.as_ref().and_then(|r| r.content_keys()) {
        let mut source = &context.file;
        for key in keys.list() {
            if context.deletes.contains_key(&(key.kind, key.hash)) {
                debug!(kind = key.kind, hash = %key.hash, "dropping deleted payload");
                continue;
            }

            let offset = context.data_offset + key.content.from;
            source
                .seek(SeekFrom::Start(offset))
                .map_err(|e| EngineError::io("commit: seek source payload", e))?;
            let mut payload = vec![0u8; key.content.length as usize];
            source.read_exact(&mut payload).map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => EngineError::ShortRead {
                    offset,
                    expected: key.content.length,
                },
                _ => EngineError::io("commit: copy source payload", e),
            })?;
            destination
                .write_all(&payload)
                .map_err(|e| EngineError::io("commit: write payload", e))?;
        }
    }

    for content in &context.inserts {
        destination
            .write_all(&content.data)
            .map_err(|e| EngineError::io("commit: write insert", e))?;
    }

    // The swap must never publish a half-written destination.
    destination
        .sync_all()
        .map_err(|e| EngineError::io("commit: sync destination", e))?;

    Ok((path, 8 + reference_bytes.len() as u64))
}
