//! Binary codec for reference structures
//!
//! The serialized reference is the block a database file stores behind its
//! 8-byte length prefix:
//!
//! ```text
//! +------------------+
//! | CRC32            | (u32 LE, over everything that follows)
//! +------------------+
//! | Flags            | (u8: bit 0 = content keys present)
//! +------------------+
//! | Content keys     | (iff flagged: u64 LE count, then fixed-width keys)
//! +------------------+
//! | Commits          | (u64 LE count, then length-prefixed commits)
//! +------------------+
//! ```
//!
//! Component layouts:
//!
//! ```text
//! Pointer      : from (u64 LE) | length (u64 LE)
//! ContentKey   : hash (32) | kind (u64 LE) | pointer (16) | commit (32)
//! HashTree     : leaf count (u64 LE) | leaves (32 each)
//! Action       : tag (u8) | tree length (u64 LE) | tree
//! Commit       : parent flag (u8) | parent (32, iff flagged)
//!                | created_on (i64 LE, ns since epoch)
//!                | action length (u64 LE) | action
//! ```
//!
//! All encodings are deterministic and round-trip byte-identically. Commit
//! hashes are not stored; they are re-derived from the decoded fields, so a
//! tampered history fails to match rather than decoding silently.

use thiserror::Error;

use crate::digest::{Digest, DIGEST_LEN};
use crate::hashtree::HashTree;

use super::action::Action;
use super::commit::{Commit, Commits};
use super::content_key::{ContentKey, ContentKeys};
use super::pointer::Pointer;
use super::Reference;

/// Encoded width of a [`Pointer`].
pub const POINTER_ENCODED_LEN: usize = 8 + 8;

/// Encoded width of a [`ContentKey`].
pub const CONTENT_KEY_ENCODED_LEN: usize = DIGEST_LEN + 8 + POINTER_ENCODED_LEN + DIGEST_LEN;

/// Smallest encoded width of a [`HashTree`] (the empty tree).
pub const MIN_TREE_ENCODED_LEN: usize = 8;

/// Smallest encoded width of an [`Action`].
pub const MIN_ACTION_ENCODED_LEN: usize = 1 + 8 + MIN_TREE_ENCODED_LEN;

/// Smallest encoded width of a [`Commit`] (no parent, empty tree).
pub const MIN_COMMIT_ENCODED_LEN: usize = 1 + 8 + 8 + MIN_ACTION_ENCODED_LEN;

/// Smallest encoded width of a [`Reference`] (no content keys, one commit).
pub const MIN_REFERENCE_ENCODED_LEN: usize = 4 + 1 + 8 + 8 + MIN_COMMIT_ENCODED_LEN;

const FLAG_CONTENT_KEYS: u8 = 0b0000_0001;

/// Decode failures. Encoding is total and cannot fail.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unexpected end of input: needed {needed} more bytes at offset {offset}")]
    UnexpectedEof { offset: usize, needed: usize },
    #[error("{count} trailing bytes after a complete value")]
    TrailingBytes { count: usize },
    #[error("checksum mismatch: computed {computed:08x}, stored {stored:08x}")]
    ChecksumMismatch { computed: u32, stored: u32 },
    #[error("invalid action tag {0}")]
    InvalidActionTag(u8),
    #[error("invalid flag byte {0:#04x}")]
    InvalidFlags(u8),
    #[error("encoded length {0} does not fit in memory")]
    LengthOverflow(u64),
    #[error("reference carries no commits")]
    EmptyCommits,
}

pub type CodecResult<T> = Result<T, CodecError>;

// ---------------------------------------------------------------------------
// Reading primitives

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        let available = self.buf.len() - self.pos;
        if available < n {
            return Err(CodecError::UnexpectedEof {
                offset: self.pos,
                needed: n - available,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u64_le(&mut self) -> CodecResult<u64> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(bytes))
    }

    fn i64_le(&mut self) -> CodecResult<i64> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(bytes))
    }

    fn length(&mut self) -> CodecResult<usize> {
        let raw = self.u64_le()?;
        usize::try_from(raw).map_err(|_| CodecError::LengthOverflow(raw))
    }

    fn digest(&mut self) -> CodecResult<Digest> {
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(self.take(DIGEST_LEN)?);
        Ok(Digest::from_bytes(bytes))
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn finish(self) -> CodecResult<()> {
        if self.remaining() > 0 {
            return Err(CodecError::TrailingBytes {
                count: self.remaining(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pointer

pub fn encode_pointer(pointer: &Pointer) -> Vec<u8> {
    let mut out = Vec::with_capacity(POINTER_ENCODED_LEN);
    write_pointer(&mut out, pointer);
    out
}

pub fn decode_pointer(bytes: &[u8]) -> CodecResult<Pointer> {
    let mut reader = Reader::new(bytes);
    let pointer = read_pointer(&mut reader)?;
    reader.finish()?;
    Ok(pointer)
}

fn write_pointer(out: &mut Vec<u8>, pointer: &Pointer) {
    out.extend_from_slice(&pointer.from.to_le_bytes());
    out.extend_from_slice(&pointer.length.to_le_bytes());
}

fn read_pointer(reader: &mut Reader<'_>) -> CodecResult<Pointer> {
    let from = reader.u64_le()?;
    let length = reader.u64_le()?;
    Ok(Pointer::new(from, length))
}

// ---------------------------------------------------------------------------
// ContentKey

pub fn encode_content_key(key: &ContentKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(CONTENT_KEY_ENCODED_LEN);
    write_content_key(&mut out, key);
    out
}

pub fn decode_content_key(bytes: &[u8]) -> CodecResult<ContentKey> {
    let mut reader = Reader::new(bytes);
    let key = read_content_key(&mut reader)?;
    reader.finish()?;
    Ok(key)
}

fn write_content_key(out: &mut Vec<u8>, key: &ContentKey) {
    out.extend_from_slice(key.hash.as_bytes());
    out.extend_from_slice(&key.kind.to_le_bytes());
    write_pointer(out, &key.content);
    out.extend_from_slice(key.commit.as_bytes());
}

fn read_content_key(reader: &mut Reader<'_>) -> CodecResult<ContentKey> {
    let hash = reader.digest()?;
    let kind = reader.u64_le()?;
    let content = read_pointer(reader)?;
    let commit = reader.digest()?;
    Ok(ContentKey::new(hash, kind, content, commit))
}

// ---------------------------------------------------------------------------
// HashTree

pub fn encode_tree(tree: &HashTree) -> Vec<u8> {
    let mut out = Vec::with_capacity(MIN_TREE_ENCODED_LEN + tree.len() * DIGEST_LEN);
    write_tree(&mut out, tree);
    out
}

pub fn decode_tree(bytes: &[u8]) -> CodecResult<HashTree> {
    let mut reader = Reader::new(bytes);
    let tree = read_tree(&mut reader)?;
    reader.finish()?;
    Ok(tree)
}

fn write_tree(out: &mut Vec<u8>, tree: &HashTree) {
    out.extend_from_slice(&(tree.len() as u64).to_le_bytes());
    for leaf in tree.leaves() {
        out.extend_from_slice(leaf.as_bytes());
    }
}

fn read_tree(reader: &mut Reader<'_>) -> CodecResult<HashTree> {
    let count = reader.length()?;
    let mut leaves = Vec::with_capacity(count.min(reader.remaining() / DIGEST_LEN + 1));
    for _ in 0..count {
        leaves.push(reader.digest()?);
    }
    Ok(HashTree::build(leaves))
}

// ---------------------------------------------------------------------------
// Action

pub fn encode_action(action: &Action) -> Vec<u8> {
    let mut out = Vec::new();
    write_action(&mut out, action);
    out
}

pub fn decode_action(bytes: &[u8]) -> CodecResult<Action> {
    let mut reader = Reader::new(bytes);
    let action = read_action(&mut reader)?;
    reader.finish()?;
    Ok(action)
}

fn write_action(out: &mut Vec<u8>, action: &Action) {
    out.push(action.tag());
    let tree = encode_tree(action.tree());
    out.extend_from_slice(&(tree.len() as u64).to_le_bytes());
    out.extend_from_slice(&tree);
}

fn read_action(reader: &mut Reader<'_>) -> CodecResult<Action> {
    let tag = reader.u8()?;
    let tree_len = reader.length()?;
    let tree = decode_tree(reader.take(tree_len)?)?;
    match tag {
        Action::INSERT_TAG => Ok(Action::Insert(tree)),
        Action::DELETE_TAG => Ok(Action::Delete(tree)),
        other => Err(CodecError::InvalidActionTag(other)),
    }
}

// ---------------------------------------------------------------------------
// Commit

pub fn encode_commit(commit: &Commit) -> Vec<u8> {
    let mut out = Vec::new();
    write_commit(&mut out, commit);
    out
}

pub fn decode_commit(bytes: &[u8]) -> CodecResult<Commit> {
    let mut reader = Reader::new(bytes);
    let commit = read_commit(&mut reader)?;
    reader.finish()?;
    Ok(commit)
}

fn write_commit(out: &mut Vec<u8>, commit: &Commit) {
    match commit.parent() {
        Some(parent) => {
            out.push(1);
            out.extend_from_slice(parent.as_bytes());
        }
        None => out.push(0),
    }
    // Commit construction normalizes timestamps into nanosecond range.
    let nanos = commit
        .created_on()
        .timestamp_nanos_opt()
        .unwrap_or(i64::MAX);
    out.extend_from_slice(&nanos.to_le_bytes());
    let action = encode_action(commit.action());
    out.extend_from_slice(&(action.len() as u64).to_le_bytes());
    out.extend_from_slice(&action);
}

fn read_commit(reader: &mut Reader<'_>) -> CodecResult<Commit> {
    let parent = match reader.u8()? {
        0 => None,
        1 => Some(reader.digest()?),
        other => return Err(CodecError::InvalidFlags(other)),
    };
    let created_on = chrono::DateTime::from_timestamp_nanos(reader.i64_le()?);
    let action_len = reader.length()?;
    let action = decode_action(reader.take(action_len)?)?;
    Ok(Commit::new(parent, action, created_on))
}

// ---------------------------------------------------------------------------
// Reference

pub fn encode_reference(reference: &Reference) -> Vec<u8> {
    let mut body = Vec::new();

    match reference.content_keys() {
        Some(keys) => {
            body.push(FLAG_CONTENT_KEYS);
            body.extend_from_slice(&(keys.len() as u64).to_le_bytes());
            for key in keys.list() {
                write_content_key(&mut body, key);
            }
        }
        None => body.push(0),
    }

    let commits = reference.commits();
    body.extend_from_slice(&(commits.len() as u64).to_le_bytes());
    for commit in commits.list() {
        let encoded = encode_commit(commit);
        body.extend_from_slice(&(encoded.len() as u64).to_le_bytes());
        body.extend_from_slice(&encoded);
    }

    let checksum = crc32fast::hash(&body);
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&checksum.to_le_bytes());
    out.extend_from_slice(&body);
    out
}

pub fn decode_reference(bytes: &[u8]) -> CodecResult<Reference> {
    let mut outer = Reader::new(bytes);
    let mut stored = [0u8; 4];
    stored.copy_from_slice(outer.take(4)?);
    let stored = u32::from_le_bytes(stored);

    let body = outer.take(outer.remaining())?;
    let computed = crc32fast::hash(body);
    if computed != stored {
        return Err(CodecError::ChecksumMismatch { computed, stored });
    }

    let mut reader = Reader::new(body);
    let flags = reader.u8()?;
    let content_keys = match flags {
        0 => None,
        FLAG_CONTENT_KEYS => {
            let count = reader.length()?;
            let mut list = Vec::with_capacity(
                count.min(reader.remaining() / CONTENT_KEY_ENCODED_LEN + 1),
            );
            for _ in 0..count {
                list.push(read_content_key(&mut reader)?);
            }
            Some(ContentKeys::new(list))
        }
        other => return Err(CodecError::InvalidFlags(other)),
    };

    let commit_count = reader.length()?;
    if commit_count == 0 {
        return Err(CodecError::EmptyCommits);
    }
    let mut commits = Vec::with_capacity(
        commit_count.min(reader.remaining() / MIN_COMMIT_ENCODED_LEN + 1),
    );
    for _ in 0..commit_count {
        let commit_len = reader.length()?;
        commits.push(decode_commit(reader.take(commit_len)?)?);
    }
    reader.finish()?;

    Ok(Reference::new(content_keys, Commits::new(commits)))
}
