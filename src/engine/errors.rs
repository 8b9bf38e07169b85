//! Engine error types
//!
//! Every failure carries the operation and the offending identifier (name,
//! context id, kind, or hash) in its message, and maps onto a structural
//! [`ErrorKind`] so callers can branch without string matching.

use std::io;

use thiserror::Error;

use crate::digest::Digest;
use crate::reference::codec::CodecError;

use super::ContextId;

/// Structural failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A record, kind, commit, or database was not found.
    NotFound,
    /// A database or open context already exists under that name.
    AlreadyExists,
    /// The commit lock is held elsewhere.
    Conflict,
    /// An underlying file operation failed.
    Io,
    /// The stored reference bytes do not decode.
    Codec,
    /// An engine method was called with an unknown context id.
    InvalidArgument,
}

/// Failures surfaced by the engine and the hash-indexed layer on top of it.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("database {name:?} already exists and cannot be created again")]
    DatabaseExists { name: String },

    #[error("database {name:?} already has an open context")]
    ContextExists { name: String },

    #[error("{operation}: unknown context id {context}")]
    UnknownContext {
        operation: &'static str,
        context: ContextId,
    },

    #[error("database {name:?} is a directory, not a file")]
    NotAFile { name: String },

    #[error("context {context} has no content keys")]
    NoContent { context: ContextId },

    #[error("context {context} has no commits")]
    NoCommits { context: ContextId },

    #[error("kind {kind} has no content keys")]
    KindNotFound { kind: u64 },

    #[error("content (kind: {kind}, hash: {hash}) does not exist")]
    ContentNotFound { kind: u64, hash: Digest },

    #[error("commit {hash} is not part of the history")]
    CommitNotFound { hash: Digest },

    #[error("commit lock for database {name:?} is held elsewhere")]
    LockHeld { name: String },

    #[error("read: expected {expected} bytes at offset {offset}, file ended early")]
    ShortRead { offset: u64, expected: u64 },

    #[error("{operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("reference does not decode: {0}")]
    Codec(#[from] CodecError),
}

impl EngineError {
    /// Wraps an I/O failure with the operation that hit it.
    pub(crate) fn io(operation: &'static str, source: io::Error) -> Self {
        Self::Io { operation, source }
    }

    /// The structural category of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DatabaseExists { .. } | Self::ContextExists { .. } => ErrorKind::AlreadyExists,
            Self::UnknownContext { .. } => ErrorKind::InvalidArgument,
            Self::NoContent { .. }
            | Self::NoCommits { .. }
            | Self::KindNotFound { .. }
            | Self::ContentNotFound { .. }
            | Self::CommitNotFound { .. } => ErrorKind::NotFound,
            Self::LockHeld { .. } => ErrorKind::Conflict,
            Self::NotAFile { .. } | Self::ShortRead { .. } | Self::Io { .. } => ErrorKind::Io,
            Self::Codec(_) => ErrorKind::Codec,
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = EngineError::DatabaseExists {
            name: "db".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        let err = EngineError::UnknownContext {
            operation: "read",
            context: 4,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = EngineError::ContentNotFound {
            kind: 2,
            hash: Digest::of(b"x"),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = EngineError::LockHeld {
            name: "db".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_messages_carry_identifiers() {
        let err = EngineError::UnknownContext {
            operation: "commit",
            context: 7,
        };
        let message = err.to_string();
        assert!(message.contains("commit"));
        assert!(message.contains('7'));

        let hash = Digest::of(b"payload");
        let err = EngineError::ContentNotFound { kind: 3, hash };
        assert!(err.to_string().contains(&hash.to_string()));
    }
}
