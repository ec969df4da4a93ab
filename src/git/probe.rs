//! git::probe
//!
//! Non-destructive sync trials.
//!
//! A probe checks out the current HEAD as a detached worktree inside a
//! temporary directory, attempts the rebase or merge there, classifies the
//! result and removes the worktree. The caller's branch, index, working
//! tree and refs are never touched. Every probe command runs without hooks
//! and with rerere disabled, so the only shared state written is the
//! object database, which git garbage-collects, and the worktree
//! bookkeeping under `.git/worktrees`, which is pruned on removal.

use std::path::{Path, PathBuf};

use super::interface::{run_git, GitError};
use crate::core::types::SyncStrategy;

/// Result of a sync trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The strategy applied without conflicts.
    Clean,
    /// The strategy stopped on conflicts.
    Conflict,
    /// The probe itself could not complete.
    Failed(String),
}

/// Settings applied to every probe command, including worktree add and
/// remove. Hooks and rerere are disabled, commits are unsigned and branch
/// refs are never rewritten by the rebase.
const PROBE_CONFIG: &[&str] = &[
    "-c",
    "core.hooksPath=/dev/null",
    "-c",
    "rerere.enabled=false",
    "-c",
    "rerere.autoUpdate=false",
    "-c",
    "commit.gpgsign=false",
    "-c",
    "rebase.updateRefs=false",
    "-c",
    "rebase.autoStash=false",
    "-c",
    "user.name=repofleet probe",
    "-c",
    "user.email=probe@repofleet.invalid",
];

/// A linked worktree removed on drop.
struct ProbeWorktree {
    repo: PathBuf,
    path: PathBuf,
}

impl ProbeWorktree {
    fn add(repo: &Path, path: PathBuf) -> Result<Self, GitError> {
        let path_arg = path.to_string_lossy().into_owned();
        run_git(
            repo,
            probe_args(&["worktree", "add", "--detach", path_arg.as_str(), "HEAD"]),
        )?;
        Ok(Self {
            repo: repo.to_path_buf(),
            path,
        })
    }
}

impl Drop for ProbeWorktree {
    fn drop(&mut self) {
        let path_arg = self.path.to_string_lossy().into_owned();
        if let Err(e) = run_git(
            &self.repo,
            probe_args(&["worktree", "remove", "--force", path_arg.as_str()]),
        ) {
            tracing::warn!(error = %e, worktree = %path_arg, "failed to remove probe worktree");
        }
        let _ = run_git(&self.repo, probe_args(&["worktree", "prune"]));
    }
}

/// `PROBE_CONFIG` followed by `args`.
fn probe_args<'a>(args: &[&'a str]) -> Vec<&'a str> {
    let mut all: Vec<&str> = PROBE_CONFIG.to_vec();
    all.extend_from_slice(args);
    all
}

/// Trial `strategy` against `upstream` in a disposable worktree.
pub(crate) fn probe_in_worktree(repo: &Path, upstream: &str, strategy: SyncStrategy) -> ProbeOutcome {
    let temp = match tempfile::Builder::new().prefix("repofleet-probe-").tempdir() {
        Ok(t) => t,
        Err(e) => return ProbeOutcome::Failed(format!("cannot create probe directory: {e}")),
    };

    let worktree = match ProbeWorktree::add(repo, temp.path().join("tree")) {
        Ok(w) => w,
        Err(e) => return ProbeOutcome::Failed(e.to_string()),
    };

    let args = match strategy {
        SyncStrategy::Rebase => probe_args(&["rebase", upstream]),
        SyncStrategy::Merge => probe_args(&["merge", "--no-edit", upstream]),
    };

    let outcome = match run_git(&worktree.path, &args) {
        Ok(_) => ProbeOutcome::Clean,
        Err(GitError::Command { stderr, .. }) => {
            if has_unmerged_paths(&worktree.path) || mentions_conflict(&stderr) {
                ProbeOutcome::Conflict
            } else {
                ProbeOutcome::Failed(stderr)
            }
        }
        Err(e) => ProbeOutcome::Failed(e.to_string()),
    };

    tracing::debug!(
        repo = %repo.display(),
        upstream,
        strategy = %strategy,
        outcome = ?outcome,
        "sync probe finished"
    );

    // Worktree is removed before the temp directory that contains it.
    drop(worktree);
    drop(temp);
    outcome
}

fn has_unmerged_paths(worktree: &Path) -> bool {
    run_git(worktree, ["diff", "--name-only", "--diff-filter=U"])
        .map(|out| !out.trim().is_empty())
        .unwrap_or(false)
}

fn mentions_conflict(output: &str) -> bool {
    output.contains("CONFLICT") || output.contains("could not apply")
}
