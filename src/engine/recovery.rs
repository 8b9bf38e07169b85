//! Interrupted-commit repair
//!
//! A commit publishes by writing a complete destination file, backing up the
//! source, unlinking the source, renaming destination over it, and removing
//! the backup. A crash can strand the file set at any step; each stranded
//! state maps to exactly one repair:
//!
//! - source missing, destination present: the destination was fully written
//!   and synced before the source was unlinked, so the commit is completed
//!   by renaming destination to source.
//! - source missing, destination missing, backup present: the commit is
//!   rolled back by renaming the backup to source.
//! - source present: any destination or backup left behind is stale; the
//!   source is authoritative and the leftovers are removed.
//!
//! The repair runs on every open, before the reference is read.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::config::Config;

use super::errors::{EngineError, EngineResult};

pub(crate) fn recover(config: &Config, name: &str) -> EngineResult<()> {
    let source = config.database_path(name);
    let destination = config.destination_path(name);
    let backup = config.backup_path(name);

    if !source.exists() {
        if destination.exists() {
            fs::rename(&destination, &source)
                .map_err(|e| EngineError::io("recover: promote destination", e))?;
            remove_if_present(&backup, "recover: remove backup")?;
            info!(database = name, "completed interrupted commit from destination file");
            return Ok(());
        }
        if backup.exists() {
            fs::rename(&backup, &source)
                .map_err(|e| EngineError::io("recover: restore backup", e))?;
            info!(database = name, "rolled back interrupted commit from backup file");
        }
        return Ok(());
    }

    if destination.exists() {
        warn!(database = name, "removing stale destination file");
        remove_if_present(&destination, "recover: remove stale destination")?;
    }
    if backup.exists() {
        warn!(database = name, "removing stale backup file");
        remove_if_present(&backup, "recover: remove stale backup")?;
    }
    Ok(())
}

fn remove_if_present(path: &Path, operation: &'static str) -> EngineResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(EngineError::io(operation, e)),
    }
}
