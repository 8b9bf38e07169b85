//! hashdb - an embedded, content-addressed, single-file key/value store
//!
//! Records are identified by (kind, hash): a caller-assigned integer
//! namespace plus the SHA-256 digest of the payload. Each named database is
//! one file holding a serialized reference (the live index and commit log)
//! followed by the payload bytes. Writes and erasures buffer in an open
//! context and publish atomically as commits that rewrite the file behind a
//! destination/backup/rename sequence.
//!
//! ```no_run
//! use hashdb::config::Config;
//! use hashdb::digest::Digest;
//! use hashdb::engine::Engine;
//! use hashdb::hashed::HashIndexed;
//!
//! # fn main() -> Result<(), hashdb::engine::EngineError> {
//! let mut engine = Engine::new(Config::in_dir("data"));
//! engine.create("inventory")?;
//! let ctx = engine.open("inventory")?;
//!
//! let payload = b"widget".to_vec();
//! let hash = Digest::of(&payload);
//! engine.write(ctx, 0, hash, payload)?;
//! engine.commit(ctx)?;
//!
//! assert_eq!(engine.read_by_hash(ctx, 0, &hash)?, b"widget");
//! engine.close(ctx)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod digest;
pub mod engine;
pub mod hashed;
pub mod hashtree;
pub mod reference;
