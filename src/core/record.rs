//! core::record
//!
//! The observed state of one git working copy.
//!
//! # Lifecycle
//!
//! Records are created and overwritten by the scanner, persisted in the
//! machine snapshot, and selectively patched by the fix engine after an
//! action succeeds. Every mutation of an observable field goes through a
//! method that recomputes the content hash, so callers never need to
//! remember to do it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::types::{ContentHash, OperationInProgress, ReasonSet, RepoKey, UnsyncableReason};

/// One observed git working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// Stable catalog-relative key. `None` when the clone sits outside any
    /// catalog layout and no key could be derived.
    pub repo_key: Option<RepoKey>,
    /// Display name (usually the key's short name or the directory name).
    pub name: String,
    /// Catalog the repository was discovered in.
    pub catalog: String,
    /// Absolute path of the working tree.
    pub path: PathBuf,

    /// URL of the `origin` remote, empty if none.
    #[serde(default)]
    pub origin_url: String,
    /// Upstream ref of the current branch (e.g. `origin/main`), empty if none.
    #[serde(default)]
    pub upstream: String,
    /// Current branch, empty when HEAD is detached or unborn.
    #[serde(default)]
    pub branch: String,

    /// Commits on the branch not on the upstream.
    #[serde(default)]
    pub ahead: u32,
    /// Commits on the upstream not on the branch.
    #[serde(default)]
    pub behind: u32,
    /// Both ahead and behind.
    #[serde(default)]
    pub diverged: bool,

    /// Staged or unstaged changes to tracked files.
    #[serde(default)]
    pub has_dirty_tracked: bool,
    /// Untracked (non-ignored) files present.
    #[serde(default)]
    pub has_untracked: bool,

    /// Git operation paused in the working tree.
    #[serde(default)]
    pub operation: OperationInProgress,

    /// Whether the repository is safe for automatic sync.
    pub syncable: bool,
    /// Why it is not, in first-seen order.
    #[serde(default)]
    pub unsyncable_reasons: ReasonSet,

    /// Hash of the observable fields above.
    #[serde(default)]
    pub state_hash: ContentHash,
}

impl RepositoryRecord {
    /// Create a record with no remote relationship and a clean tree.
    pub fn new(name: impl Into<String>, catalog: impl Into<String>, path: PathBuf) -> Self {
        let mut record = Self {
            repo_key: None,
            name: name.into(),
            catalog: catalog.into(),
            path,
            origin_url: String::new(),
            upstream: String::new(),
            branch: String::new(),
            ahead: 0,
            behind: 0,
            diverged: false,
            has_dirty_tracked: false,
            has_untracked: false,
            operation: OperationInProgress::None,
            syncable: true,
            unsyncable_reasons: ReasonSet::new(),
            state_hash: ContentHash::default(),
        };
        record.recompute_hash();
        record
    }

    /// Whether an `origin` remote is configured.
    pub fn has_origin(&self) -> bool {
        !self.origin_url.trim().is_empty()
    }

    /// Whether the current branch tracks an upstream.
    pub fn has_upstream(&self) -> bool {
        !self.upstream.trim().is_empty()
    }

    /// Whether the current branch is known (not detached or unborn).
    pub fn has_branch(&self) -> bool {
        !self.branch.trim().is_empty()
    }

    /// Tracked changes or untracked files present.
    pub fn is_dirty(&self) -> bool {
        self.has_dirty_tracked || self.has_untracked
    }

    /// Key as a string, or empty when unknown.
    pub fn repo_key_str(&self) -> &str {
        self.repo_key.as_ref().map(RepoKey::as_str).unwrap_or("")
    }

    /// Append a reason (no-op if already present), mark the record
    /// unsyncable and recompute the hash.
    ///
    /// Returns `true` if the reason was new.
    pub fn append_unsyncable_reason(&mut self, reason: UnsyncableReason) -> bool {
        let added = self.unsyncable_reasons.insert(reason);
        self.syncable = self.unsyncable_reasons.is_empty();
        self.recompute_hash();
        added
    }

    /// Replace the reason set and derive `syncable` from it.
    pub fn set_reasons(&mut self, reasons: ReasonSet) {
        self.syncable = reasons.is_empty();
        self.unsyncable_reasons = reasons;
        self.recompute_hash();
    }

    /// Recompute [`RepositoryRecord::state_hash`] from the observable fields.
    pub fn recompute_hash(&mut self) {
        let fields = [
            self.repo_key_str().to_string(),
            self.name.clone(),
            self.catalog.clone(),
            self.path.display().to_string(),
            self.origin_url.clone(),
            self.upstream.clone(),
            self.branch.clone(),
            self.ahead.to_string(),
            self.behind.to_string(),
            self.diverged.to_string(),
            self.has_dirty_tracked.to_string(),
            self.has_untracked.to_string(),
            self.operation.as_str().to_string(),
            self.syncable.to_string(),
            self.unsyncable_reasons.join(),
        ];
        self.state_hash = ContentHash::compute(&fields);
    }
}
