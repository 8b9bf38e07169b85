//! Advisory commit lock
//!
//! Cross-process exclusion for the commit window uses an OS-level lock on a
//! stable sibling file, never on the database file itself: the commit dance
//! deletes and recreates the database path, which would strand a lock taken
//! on it. The lock is non-blocking; contention is reported, not waited out.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;

use fs2::FileExt;

/// Outcome of a failed lock attempt.
#[derive(Debug)]
pub(crate) enum LockError {
    /// Another process (or context) holds the lock.
    Contended,
    /// The lock file could not be created or locked for another reason.
    Io(io::Error),
}

/// Handle on a database's lock file path. Creating it takes no lock.
#[derive(Debug)]
pub(crate) struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Tries to take the exclusive lock without blocking.
    ///
    /// The returned guard holds the lock until dropped. `flock` on Unix and
    /// `LockFileEx` on Windows both release automatically if the process
    /// dies, so a crashed commit never wedges the database.
    pub(crate) fn try_lock(&self) -> Result<LockGuard, LockError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(LockError::Io)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(LockGuard { file }),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(LockError::Contended),
            // EAGAIN surfaces with other kinds on some platforms (11 on
            // Linux, 35 on macOS).
            Err(e) if e.raw_os_error() == Some(11) || e.raw_os_error() == Some(35) => {
                Err(LockError::Contended)
            }
            Err(e) => Err(LockError::Io(e)),
        }
    }
}

/// An acquired exclusive lock; released on drop.
#[derive(Debug)]
pub(crate) struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Closing the handle also releases; unlock keeps it prompt.
        let _ = FileExt::unlock(&self.file);
    }
}
