//! End-to-end engine scenarios
//!
//! Exercises the full write → commit → read lifecycle against real files:
//! - round-trip reads after commit
//! - kind separation for records sharing a hash
//! - erase visibility and re-insertion
//! - durability across close/reopen
//! - index and history invariants

use hashdb::config::Config;
use hashdb::digest::Digest;
use hashdb::engine::{ContextId, Engine, ErrorKind};
use hashdb::hashed::HashIndexed;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn new_engine() -> (TempDir, Engine) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let engine = Engine::new(Config::in_dir(dir.path()));
    (dir, engine)
}

fn put(engine: &mut Engine, ctx: ContextId, kind: u64, data: &[u8]) -> Digest {
    let hash = Digest::of(data);
    engine.write(ctx, kind, hash, data.to_vec()).unwrap();
    hash
}

// =============================================================================
// Round-trip and kind separation
// =============================================================================

#[test]
fn test_fresh_database_roundtrip() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();
    let ctx = engine.open("db").unwrap();

    let hash = put(&mut engine, ctx, 0, b"hello");
    engine.commit(ctx).unwrap();

    assert_eq!(engine.read_by_hash(ctx, 0, &hash).unwrap(), b"hello");
}

#[test]
fn test_same_hash_different_kind_independent() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();
    let ctx = engine.open("db").unwrap();

    // The caller vouches for hashes, so one hash can name different bytes
    // under different kinds; each kind keeps its own byte range.
    let shared = Digest::of(b"x");
    engine.write(ctx, 0, shared, b"x".to_vec()).unwrap();
    engine.write(ctx, 1, shared, b"xx".to_vec()).unwrap();
    engine.commit(ctx).unwrap();

    assert_eq!(engine.read_by_hash(ctx, 0, &shared).unwrap(), b"x");
    assert_eq!(engine.read_by_hash(ctx, 1, &shared).unwrap(), b"xx");
}

#[test]
fn test_erasing_one_kind_leaves_the_other() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();
    let ctx = engine.open("db").unwrap();

    let shared = Digest::of(b"x");
    engine.write(ctx, 0, shared, b"x".to_vec()).unwrap();
    engine.write(ctx, 1, shared, b"xx".to_vec()).unwrap();
    engine.commit(ctx).unwrap();

    engine.erase_by_hash(ctx, 0, &shared).unwrap();
    engine.commit(ctx).unwrap();

    let err = engine.read_by_hash(ctx, 0, &shared).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        engine.read_by_hash(ctx, 1, &shared).unwrap(),
        b"xx",
        "erasing (kind 0, h) must not affect (kind 1, h)"
    );
}

// =============================================================================
// Erase visibility and re-insertion
// =============================================================================

#[test]
fn test_erase_then_reinsert() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();
    let ctx = engine.open("db").unwrap();

    let hash = put(&mut engine, ctx, 0, b"document");
    engine.commit(ctx).unwrap();

    engine.erase_by_hash(ctx, 0, &hash).unwrap();
    engine.commit(ctx).unwrap();
    let err = engine.read_by_hash(ctx, 0, &hash).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    put(&mut engine, ctx, 0, b"document");
    engine.commit(ctx).unwrap();
    assert_eq!(engine.read_by_hash(ctx, 0, &hash).unwrap(), b"document");
}

#[test]
fn test_survivors_readable_after_erase() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();
    let ctx = engine.open("db").unwrap();

    // Three records; erase the first so both survivors shift down.
    let first = put(&mut engine, ctx, 0, b"aaaa");
    let second = put(&mut engine, ctx, 0, b"bbbbbb");
    let third = put(&mut engine, ctx, 0, b"cc");
    engine.commit(ctx).unwrap();

    engine.erase_by_hash(ctx, 0, &first).unwrap();
    engine.commit(ctx).unwrap();

    assert_eq!(engine.read_by_hash(ctx, 0, &second).unwrap(), b"bbbbbb");
    assert_eq!(engine.read_by_hash(ctx, 0, &third).unwrap(), b"cc");

    // The data region compacted: high-water offset is the survivors' total.
    let keys = engine.content_keys(ctx, 0).unwrap();
    assert_eq!(keys.next(), 8);
}

// =============================================================================
// Durability across sessions
// =============================================================================

#[test]
fn test_cross_session_read() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();

    let ctx1 = engine.open("db").unwrap();
    let hash = put(&mut engine, ctx1, 0, b"persistent");
    engine.commit(ctx1).unwrap();
    engine.close(ctx1).unwrap();

    let ctx2 = engine.open("db").unwrap();
    assert_eq!(engine.read_by_hash(ctx2, 0, &hash).unwrap(), b"persistent");
}

#[test]
fn test_append_after_reopen_keeps_older_data() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();

    let ctx = engine.open("db").unwrap();
    let a = put(&mut engine, ctx, 0, b"first value");
    engine.commit(ctx).unwrap();
    engine.close(ctx).unwrap();

    let ctx = engine.open("db").unwrap();
    let b = put(&mut engine, ctx, 0, b"second value");
    engine.commit(ctx).unwrap();

    assert_eq!(engine.read_by_hash(ctx, 0, &a).unwrap(), b"first value");
    assert_eq!(engine.read_by_hash(ctx, 0, &b).unwrap(), b"second value");
}

#[test]
fn test_uncommitted_writes_do_not_survive_close() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();

    let ctx = engine.open("db").unwrap();
    let hash = put(&mut engine, ctx, 0, b"ephemeral");
    engine.close(ctx).unwrap();

    let ctx = engine.open("db").unwrap();
    let err = engine.read_by_hash(ctx, 0, &hash).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// =============================================================================
// Lifecycle edges
// =============================================================================

#[test]
fn test_double_open_refused() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();

    let _ctx = engine.open("db").unwrap();
    let err = engine.open("db").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[test]
fn test_unknown_kind_in_fresh_database() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();
    let ctx = engine.open("db").unwrap();

    let err = engine.content_keys(ctx, 42).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_unknown_kind_in_populated_database() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();
    let ctx = engine.open("db").unwrap();
    put(&mut engine, ctx, 0, b"data");
    engine.commit(ctx).unwrap();

    let err = engine.content_keys(ctx, 42).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// =============================================================================
// History invariants
// =============================================================================

#[test]
fn test_commits_enumeration_and_fetch() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();
    let ctx = engine.open("db").unwrap();

    put(&mut engine, ctx, 0, b"data");
    engine.commit(ctx).unwrap();

    let commits = engine.commits(ctx).unwrap();
    assert_eq!(commits.len(), 1);

    let latest = commits.latest().unwrap();
    assert!(latest.parent().is_none(), "first commit has no parent");
    let hash = *latest.hash();
    assert_eq!(commits.fetch(&hash).unwrap().hash(), &hash);
}

#[test]
fn test_commit_chain_is_linear() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();
    let ctx = engine.open("db").unwrap();

    for round in 0..4u8 {
        put(&mut engine, ctx, 0, &[round]);
        engine.commit(ctx).unwrap();
    }

    let commits = engine.commits(ctx).unwrap();
    let list = commits.list();
    assert_eq!(list.len(), 4);
    assert!(list[0].parent().is_none());
    for pair in list.windows(2) {
        assert_eq!(
            pair[1].parent(),
            Some(pair[0].hash()),
            "every commit's parent must be the previous commit"
        );
    }
}

#[test]
fn test_index_monotonicity() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();
    let ctx = engine.open("db").unwrap();

    put(&mut engine, ctx, 0, b"four");
    put(&mut engine, ctx, 1, b"seven..");
    engine.commit(ctx).unwrap();

    let of_kind_0 = engine.content_keys(ctx, 0).unwrap();
    let of_kind_1 = engine.content_keys(ctx, 1).unwrap();
    let total: u64 = of_kind_0.next() + of_kind_1.next();
    assert_eq!(total, 4 + 7, "next() equals the sum of live pointer lengths");
}

#[test]
fn test_history_survives_reopen() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();

    let ctx = engine.open("db").unwrap();
    put(&mut engine, ctx, 0, b"one");
    engine.commit(ctx).unwrap();
    put(&mut engine, ctx, 0, b"two");
    engine.commit(ctx).unwrap();
    let recorded: Vec<_> = engine
        .commits(ctx)
        .unwrap()
        .list()
        .iter()
        .map(|c| *c.hash())
        .collect();
    engine.close(ctx).unwrap();

    let ctx = engine.open("db").unwrap();
    let reloaded: Vec<_> = engine
        .commits(ctx)
        .unwrap()
        .list()
        .iter()
        .map(|c| *c.hash())
        .collect();
    assert_eq!(reloaded, recorded, "commit hashes must survive the codec");
}

#[test]
fn test_read_all_in_pointer_order() {
    let (_dir, mut engine) = new_engine();
    engine.create("db").unwrap();
    let ctx = engine.open("db").unwrap();

    put(&mut engine, ctx, 0, b"alpha");
    put(&mut engine, ctx, 0, b"beta");
    engine.commit(ctx).unwrap();

    let keys = engine.content_keys(ctx, 0).unwrap();
    let pointers: Vec<_> = keys.list().iter().map(|k| k.content).collect();
    let values = engine.read_all(ctx, &pointers).unwrap();
    assert_eq!(values, vec![b"alpha".to_vec(), b"beta".to_vec()]);
}
