//! The in-memory reference: a database's entire index
//!
//! A reference is the immutable snapshot read from the head of a database
//! file: the live content keys plus the full commit log. Committing never
//! mutates a reference; it produces a replacement.

mod action;
pub mod codec;
mod commit;
mod content_key;
mod pointer;

pub use action::Action;
pub use commit::{Commit, Commits};
pub use content_key::{ContentKey, ContentKeys};
pub use pointer::Pointer;

/// The complete in-memory index for one database.
///
/// `content_keys` is absent exactly when no live content exists; `commits`
/// is never empty, since a reference only exists once something committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    content_keys: Option<ContentKeys>,
    commits: Commits,
}

impl Reference {
    pub fn new(content_keys: Option<ContentKeys>, commits: Commits) -> Self {
        Self {
            content_keys,
            commits,
        }
    }

    pub fn commits(&self) -> &Commits {
        &self.commits
    }

    pub fn content_keys(&self) -> Option<&ContentKeys> {
        self.content_keys.as_ref()
    }

    pub fn has_content_keys(&self) -> bool {
        self.content_keys.is_some()
    }
}
