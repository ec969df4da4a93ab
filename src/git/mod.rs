//! git
//!
//! Single interface for all git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to git. No other module imports
//! `git2` or spawns the `git` binary. Callers depend on the [`GitOps`]
//! trait; [`Git`] is the production implementation.
//!
//! # Responsibilities
//!
//! - Remote, branch, upstream and ahead/behind reads
//! - Working tree status, changed paths and line counts
//! - In-progress operation detection and abort
//! - Fetch, merge, rebase, pull, push, stage, commit
//! - Non-destructive sync probes in a disposable worktree
//!
//! # Invariants
//!
//! - Probes never modify the caller's branch, index or working tree
//! - Mutations surface git's own stderr in [`GitError::Command`]

mod interface;
mod probe;

pub use interface::{
    ChangeKind, Git, GitError, GitOps, NumstatEntry, StatusEntry, WorktreeStatus,
};
pub use probe::ProbeOutcome;
