//! Commits and the commit log
//!
//! A commit's identity is a digest over its parent (when present), its
//! action's digest, and its creation time. History is a linear chain: every
//! commit's parent is the commit before it, and only the first commit of a
//! database has no parent.

use chrono::{DateTime, Utc};

use crate::digest::Digest;

use super::action::Action;

/// One entry in a database's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    parent: Option<Digest>,
    action: Action,
    created_on: DateTime<Utc>,
    hash: Digest,
}

impl Commit {
    /// Creates a commit and derives its identity hash.
    ///
    /// The creation time is normalized to nanosecond precision (saturating
    /// past the representable range) so identity derivation and the binary
    /// codec agree on the timestamp bytes.
    pub fn new(parent: Option<Digest>, action: Action, created_on: DateTime<Utc>) -> Self {
        let created_on =
            DateTime::from_timestamp_nanos(created_on.timestamp_nanos_opt().unwrap_or(i64::MAX));
        let hash = Self::derive_hash(parent.as_ref(), &action.hash(), &created_on);
        Self {
            parent,
            action,
            created_on,
            hash,
        }
    }

    fn derive_hash(
        parent: Option<&Digest>,
        action_hash: &Digest,
        created_on: &DateTime<Utc>,
    ) -> Digest {
        let nanos = created_on
            .timestamp_nanos_opt()
            .unwrap_or(i64::MAX)
            .to_le_bytes();
        match parent {
            Some(parent) => {
                Digest::of_parts(&[parent.as_bytes(), action_hash.as_bytes(), &nanos])
            }
            None => Digest::of_parts(&[action_hash.as_bytes(), &nanos]),
        }
    }

    pub fn hash(&self) -> &Digest {
        &self.hash
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }

    pub fn parent(&self) -> Option<&Digest> {
        self.parent.as_ref()
    }

    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }
}

/// The append-only list of commits, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commits {
    list: Vec<Commit>,
}

impl Commits {
    pub fn new(list: Vec<Commit>) -> Self {
        Self { list }
    }

    pub fn list(&self) -> &[Commit] {
        &self.list
    }

    /// The most recent commit.
    pub fn latest(&self) -> Option<&Commit> {
        self.list.last()
    }

    /// Looks up a commit by its identity hash.
    pub fn fetch(&self, hash: &Digest) -> Option<&Commit> {
        self.list.iter().find(|commit| commit.hash() == hash)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}
