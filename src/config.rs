//! Engine configuration
//!
//! One configured engine serves every database under `dir_path`. A database
//! named `n` occupies `dir_path/n`; commits pass through the transient
//! `dir_path/n.<dst_extension>` and `dir_path/n.<bck_extension>` siblings,
//! and the commit lock lives at `dir_path/n.lock`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default directory holding database files.
pub const DEFAULT_DIR_PATH: &str = "data";

/// Default extension of the transient destination file written by a commit.
pub const DEFAULT_DST_EXTENSION: &str = "dst";

/// Default extension of the transient backup file written by a commit.
pub const DEFAULT_BCK_EXTENSION: &str = "bck";

/// Default chunk size, in bytes, for streaming the reference on open.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

const LOCK_EXTENSION: &str = "lock";

/// Settings for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory containing the database files.
    pub dir_path: PathBuf,
    /// Extension appended to the database name for the destination file.
    pub dst_extension: String,
    /// Extension appended to the database name for the backup file.
    pub bck_extension: String,
    /// Chunk size, in bytes, for streaming the reference header on open.
    pub read_chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir_path: PathBuf::from(DEFAULT_DIR_PATH),
            dst_extension: DEFAULT_DST_EXTENSION.to_string(),
            bck_extension: DEFAULT_BCK_EXTENSION.to_string(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// A configuration rooted at the given directory, defaults elsewhere.
    pub fn in_dir(dir_path: impl Into<PathBuf>) -> Self {
        Self {
            dir_path: dir_path.into(),
            ..Self::default()
        }
    }

    /// Path of the database file for `name`.
    pub fn database_path(&self, name: &str) -> PathBuf {
        self.dir_path.join(name)
    }

    /// Path of the transient destination file for `name`.
    pub fn destination_path(&self, name: &str) -> PathBuf {
        self.extension_path(name, &self.dst_extension)
    }

    /// Path of the transient backup file for `name`.
    pub fn backup_path(&self, name: &str) -> PathBuf {
        self.extension_path(name, &self.bck_extension)
    }

    /// Path of the commit lock file for `name`.
    pub fn lock_path(&self, name: &str) -> PathBuf {
        self.extension_path(name, LOCK_EXTENSION)
    }

    fn extension_path(&self, name: &str, extension: &str) -> PathBuf {
        self.dir_path.join(format!("{name}.{extension}"))
    }

    /// Chunk size actually used per read: never zero, never past `remaining`.
    pub(crate) fn chunk_size(&self, remaining: usize) -> usize {
        self.read_chunk_size.max(1).min(remaining)
    }

    pub fn dir_path(&self) -> &Path {
        &self.dir_path
    }
}
