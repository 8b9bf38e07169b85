//! Hash-indexed façade tests
//!
//! Drives the (kind, hash) surface end to end: listing, bulk reads, bulk
//! erasures, and history lookups, all resolved through the live index.

use hashdb::config::Config;
use hashdb::digest::Digest;
use hashdb::engine::{ContextId, Engine, ErrorKind};
use hashdb::hashed::HashIndexed;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn open_db() -> (TempDir, Engine, ContextId) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut engine = Engine::new(Config::in_dir(dir.path()));
    engine.create("db").unwrap();
    let ctx = engine.open("db").unwrap();
    (dir, engine, ctx)
}

fn put(engine: &mut Engine, ctx: ContextId, kind: u64, data: &[u8]) -> Digest {
    let hash = Digest::of(data);
    engine.write(ctx, kind, hash, data.to_vec()).unwrap();
    hash
}

// =============================================================================
// Listing and bulk reads
// =============================================================================

#[test]
fn test_list_returns_hashes_in_insertion_order() {
    let (_dir, mut engine, ctx) = open_db();
    let a = put(&mut engine, ctx, 7, b"first");
    let b = put(&mut engine, ctx, 7, b"second");
    put(&mut engine, ctx, 8, b"elsewhere");
    engine.commit(ctx).unwrap();

    assert_eq!(engine.list(ctx, 7).unwrap(), vec![a, b]);
}

#[test]
fn test_list_unknown_kind_fails() {
    let (_dir, mut engine, ctx) = open_db();
    put(&mut engine, ctx, 0, b"data");
    engine.commit(ctx).unwrap();

    let err = engine.list(ctx, 3).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_read_all_by_hash_fails_on_first_missing() {
    let (_dir, mut engine, ctx) = open_db();
    let present = put(&mut engine, ctx, 0, b"here");
    engine.commit(ctx).unwrap();

    let missing = Digest::of(b"not here");
    let err = engine
        .read_all_by_hash(ctx, 0, &[present, missing])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// =============================================================================
// Bulk erasure
// =============================================================================

#[test]
fn test_erase_all_by_hash() {
    let (_dir, mut engine, ctx) = open_db();
    let a = put(&mut engine, ctx, 0, b"a");
    let b = put(&mut engine, ctx, 0, b"b");
    let keep = put(&mut engine, ctx, 0, b"keep");
    engine.commit(ctx).unwrap();

    engine.erase_all_by_hash(ctx, 0, &[a, b]).unwrap();
    engine.commit(ctx).unwrap();

    assert_eq!(engine.read_by_hash(ctx, 0, &a).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(engine.read_by_hash(ctx, 0, &b).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(engine.read_by_hash(ctx, 0, &keep).unwrap(), b"keep");
    assert_eq!(engine.list(ctx, 0).unwrap(), vec![keep]);
}

#[test]
fn test_erase_all_stops_at_missing_hash() {
    let (_dir, mut engine, ctx) = open_db();
    let live = put(&mut engine, ctx, 0, b"live");
    engine.commit(ctx).unwrap();

    let missing = Digest::of(b"missing");
    let err = engine.erase_all_by_hash(ctx, 0, &[live, missing]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // The first erasure stayed buffered; committing applies it.
    engine.commit(ctx).unwrap();
    assert_eq!(engine.read_by_hash(ctx, 0, &live).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_erase_is_idempotent_within_a_batch() {
    let (_dir, mut engine, ctx) = open_db();
    let hash = put(&mut engine, ctx, 0, b"once");
    engine.commit(ctx).unwrap();

    engine.erase_by_hash(ctx, 0, &hash).unwrap();
    engine.erase_by_hash(ctx, 0, &hash).unwrap();
    engine.commit(ctx).unwrap();

    // One delete commit, not two.
    let commits = engine.commits(ctx).unwrap();
    assert_eq!(commits.len(), 2);
    assert!(commits.latest().unwrap().action().is_delete());
}

// =============================================================================
// History lookups
// =============================================================================

#[test]
fn test_commit_by_hash_walks_history() {
    let (_dir, mut engine, ctx) = open_db();
    put(&mut engine, ctx, 0, b"one");
    engine.commit(ctx).unwrap();
    put(&mut engine, ctx, 0, b"two");
    engine.commit(ctx).unwrap();

    let hashes: Vec<_> = engine
        .commits(ctx)
        .unwrap()
        .list()
        .iter()
        .map(|c| *c.hash())
        .collect();
    assert_eq!(hashes.len(), 2);

    for hash in &hashes {
        let commit = engine.commit_by_hash(ctx, hash).unwrap();
        assert_eq!(commit.hash(), hash);
    }

    let err = engine.commit_by_hash(ctx, &Digest::of(b"unknown")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_content_keys_carry_their_commit() {
    let (_dir, mut engine, ctx) = open_db();
    let hash = put(&mut engine, ctx, 0, b"payload");
    engine.commit(ctx).unwrap();

    let keys = engine.content_keys(ctx, 0).unwrap();
    let key = keys.fetch(0, &hash).unwrap();

    // The key's commit is resolvable and is the insert that introduced it.
    let commit = engine.commit_by_hash(ctx, &key.commit).unwrap();
    assert!(commit.action().is_insert());
}
