//! core::types
//!
//! Strong types used throughout repofleet.
//!
//! # Types
//!
//! - [`RepoKey`] - Stable catalog-relative repository identifier
//! - [`ContentHash`] - Change-detection hash of a repository record
//! - [`OperationInProgress`] - Git operation currently paused in a working tree
//! - [`UnsyncableReason`] - Reason code explaining why a repository is unsyncable
//! - [`ReasonSet`] - Insertion-ordered, de-duplicated set of reasons
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use repofleet::core::types::{ReasonSet, RepoKey, UnsyncableReason};
//!
//! let key = RepoKey::new("work/api-server").unwrap();
//! assert_eq!(key.short_name(), "api-server");
//! assert!(RepoKey::new("").is_err());
//!
//! let mut reasons = ReasonSet::new();
//! assert!(reasons.insert(UnsyncableReason::Diverged));
//! assert!(!reasons.insert(UnsyncableReason::Diverged));
//! assert_eq!(reasons.len(), 1);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid repo key: {0}")]
    InvalidRepoKey(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),
}

/// A stable, catalog-relative identifier for a repository.
///
/// Repo keys look like relative paths (`group/name`), use `/` as the
/// separator regardless of platform, and never contain empty, `.` or `..`
/// components. They are independent of where the clone currently lives on
/// disk, which is what lets metadata follow a repository across moves.
///
/// # Example
///
/// ```
/// use repofleet::core::types::RepoKey;
///
/// let key = RepoKey::new("acme/tools/cli").unwrap();
/// assert_eq!(key.as_str(), "acme/tools/cli");
/// assert_eq!(key.short_name(), "cli");
///
/// assert!(RepoKey::new("/absolute").is_err());
/// assert!(RepoKey::new("a/../b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoKey(String);

impl RepoKey {
    /// Create a new validated repo key.
    ///
    /// Backslashes are normalized to `/` so keys computed on different
    /// platforms compare equal.
    pub fn new(key: impl Into<String>) -> Result<Self, TypeError> {
        let key = key.into().replace('\\', "/");
        Self::validate(&key)?;
        Ok(Self(key))
    }

    fn validate(key: &str) -> Result<(), TypeError> {
        if key.is_empty() {
            return Err(TypeError::InvalidRepoKey("repo key cannot be empty".into()));
        }
        if key.starts_with('/') || key.ends_with('/') {
            return Err(TypeError::InvalidRepoKey(format!(
                "repo key cannot start or end with '/': {key}"
            )));
        }
        for component in key.split('/') {
            if component.is_empty() || component == "." || component == ".." {
                return Err(TypeError::InvalidRepoKey(format!(
                    "invalid path component in repo key: {key}"
                )));
            }
        }
        if key.chars().any(|c| c.is_ascii_control()) {
            return Err(TypeError::InvalidRepoKey(
                "repo key cannot contain control characters".into(),
            ));
        }
        Ok(())
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last component of the key, used as the repository's short name.
    pub fn short_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Case-insensitive comparison against a user-supplied selector.
    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl TryFrom<String> for RepoKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RepoKey> for String {
    fn from(key: RepoKey) -> Self {
        key.0
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Change-detection hash of a repository record.
///
/// This is a SHA-256 over the record's observable fields. It is used to
/// notice that a repository changed between scans, not for integrity.
///
/// # Example
///
/// ```
/// use repofleet::core::types::ContentHash;
///
/// let a = ContentHash::compute(&["origin", "main", "3"]);
/// let b = ContentHash::compute(&["origin", "main", "3"]);
/// assert_eq!(a, b);
/// assert_ne!(a, ContentHash::compute(&["origin", "main", "4"]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute a hash over an ordered list of field values.
    ///
    /// Fields are separated by a NUL byte so `["ab", "c"]` and `["a", "bc"]`
    /// hash differently.
    pub fn compute<S: AsRef<str>>(fields: &[S]) -> Self {
        let mut hasher = Sha256::new();
        for field in fields {
            hasher.update(field.as_ref().as_bytes());
            hasher.update(b"\0");
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Get the hash as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A git operation paused in the working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationInProgress {
    /// Nothing in progress.
    #[default]
    None,
    /// `git merge` stopped on conflicts.
    Merge,
    /// `git rebase` stopped on conflicts or edits.
    Rebase,
    /// `git cherry-pick` stopped.
    CherryPick,
    /// `git bisect` session active.
    Bisect,
}

impl OperationInProgress {
    /// Check if any operation is in progress.
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, OperationInProgress::None)
    }

    /// Stable lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationInProgress::None => "none",
            OperationInProgress::Merge => "merge",
            OperationInProgress::Rebase => "rebase",
            OperationInProgress::CherryPick => "cherry-pick",
            OperationInProgress::Bisect => "bisect",
        }
    }

    /// Parse a stable name back into an operation.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        match s {
            "none" | "" => Ok(OperationInProgress::None),
            "merge" => Ok(OperationInProgress::Merge),
            "rebase" => Ok(OperationInProgress::Rebase),
            "cherry-pick" => Ok(OperationInProgress::CherryPick),
            "bisect" => Ok(OperationInProgress::Bisect),
            other => Err(TypeError::UnknownOperation(other.to_string())),
        }
    }
}

impl fmt::Display for OperationInProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a diverged branch is reconciled with its upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    /// Replay local commits on top of the upstream.
    #[default]
    Rebase,
    /// Merge the upstream into the local branch.
    Merge,
}

impl SyncStrategy {
    /// Stable lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStrategy::Rebase => "rebase",
            SyncStrategy::Merge => "merge",
        }
    }

    /// Parse a stable name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rebase" => Some(SyncStrategy::Rebase),
            "merge" => Some(SyncStrategy::Merge),
            _ => None,
        }
    }
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason code explaining why a repository cannot be synchronized safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsyncableReason {
    /// A merge/rebase/cherry-pick/bisect is paused in the working tree.
    OperationInProgress,
    /// No `origin` remote configured.
    MissingOrigin,
    /// Current branch has no upstream.
    MissingUpstream,
    /// HEAD is detached.
    DetachedHead,
    /// Tracked files have staged or unstaged changes.
    DirtyWorktree,
    /// Untracked files are present.
    UntrackedFiles,
    /// Local commits not on the upstream.
    Ahead,
    /// Upstream commits not in the local branch.
    Behind,
    /// Both ahead and behind.
    Diverged,
    /// The configured sync strategy would conflict and no strategy is clean.
    SyncConflict,
    /// The feasibility probe itself could not complete.
    SyncProbeFailed,
}

impl UnsyncableReason {
    /// Stable snake_case code, as persisted.
    pub fn code(&self) -> &'static str {
        match self {
            UnsyncableReason::OperationInProgress => "operation_in_progress",
            UnsyncableReason::MissingOrigin => "missing_origin",
            UnsyncableReason::MissingUpstream => "missing_upstream",
            UnsyncableReason::DetachedHead => "detached_head",
            UnsyncableReason::DirtyWorktree => "dirty_worktree",
            UnsyncableReason::UntrackedFiles => "untracked_files",
            UnsyncableReason::Ahead => "ahead",
            UnsyncableReason::Behind => "behind",
            UnsyncableReason::Diverged => "diverged",
            UnsyncableReason::SyncConflict => "sync_conflict",
            UnsyncableReason::SyncProbeFailed => "sync_probe_failed",
        }
    }
}

impl fmt::Display for UnsyncableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An insertion-ordered, de-duplicated set of [`UnsyncableReason`]s.
///
/// Inserting a reason that is already present is a no-op, so the set keeps
/// the order in which each reason was first seen. The reason vocabulary is
/// small, so a linear membership check over a `Vec` is the whole story.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<UnsyncableReason>", into = "Vec<UnsyncableReason>")]
pub struct ReasonSet(Vec<UnsyncableReason>);

impl ReasonSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a reason, returning `true` if it was not already present.
    pub fn insert(&mut self, reason: UnsyncableReason) -> bool {
        if self.contains(reason) {
            return false;
        }
        self.0.push(reason);
        true
    }

    /// Remove a reason, returning `true` if it was present.
    pub fn remove(&mut self, reason: UnsyncableReason) -> bool {
        let before = self.0.len();
        self.0.retain(|r| *r != reason);
        self.0.len() != before
    }

    /// Check membership.
    pub fn contains(&self, reason: UnsyncableReason) -> bool {
        self.0.contains(&reason)
    }

    /// Number of reasons.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = UnsyncableReason> + '_ {
        self.0.iter().copied()
    }

    /// Codes joined with `", "`, for display.
    pub fn join(&self) -> String {
        self.0
            .iter()
            .map(|r| r.code())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<Vec<UnsyncableReason>> for ReasonSet {
    fn from(reasons: Vec<UnsyncableReason>) -> Self {
        reasons.into_iter().collect()
    }
}

impl From<ReasonSet> for Vec<UnsyncableReason> {
    fn from(set: ReasonSet) -> Self {
        set.0
    }
}

impl FromIterator<UnsyncableReason> for ReasonSet {
    fn from_iter<I: IntoIterator<Item = UnsyncableReason>>(iter: I) -> Self {
        let mut set = ReasonSet::new();
        for reason in iter {
            set.insert(reason);
        }
        set
    }
}
