//! git::interface
//!
//! The git collaborator: typed reads through `git2`, mutations through the
//! `git` CLI.
//!
//! # Architecture
//!
//! [`GitOps`] is the **single doorway** to git for the rest of the crate.
//! No other module imports `git2` or spawns `git`. Every method takes the
//! working-tree path explicitly, so one [`Git`] value serves a whole fleet.
//!
//! Reads (branch, remotes, upstream, ahead/behind, status, in-progress
//! operation) use `git2` for structured results. Mutations (fetch, merge,
//! rebase, push, commit, abort) shell out to `git` so the user's hooks,
//! credential helpers, signing and config apply exactly as they would on
//! the command line.
//!
//! # Error Handling
//!
//! - [`GitError::NotARepo`]: path is not a git working tree
//! - [`GitError::Command`]: a `git` invocation exited non-zero
//! - [`GitError::Spawn`]: `git` could not be started
//! - [`GitError::Internal`]: a `git2` read failed
//!
//! # Example
//!
//! ```ignore
//! use repofleet::git::{Git, GitOps};
//! use std::path::Path;
//!
//! let git = Git::new();
//! let repo = Path::new("/src/work/tool");
//! if let Some(upstream) = git.upstream(repo)? {
//!     let (ahead, behind) = git.ahead_behind(repo, &upstream)?;
//!     println!("{ahead} ahead, {behind} behind {upstream}");
//! }
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use thiserror::Error;

use super::probe::{self, ProbeOutcome};
use crate::core::types::{OperationInProgress, SyncStrategy};

/// Errors from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not a git working tree.
    #[error("not a git repository: {path}")]
    NotARepo { path: PathBuf },

    /// A `git` command exited unsuccessfully.
    #[error("git {args} failed{}: {stderr}", code.map(|c| format!(" (exit {c})")).unwrap_or_default())]
    Command {
        /// Arguments after `git -C <path>`
        args: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Trimmed stderr (falls back to stdout when stderr is empty)
        stderr: String,
    },

    /// `git` could not be spawned.
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    /// Filesystem error while preparing a git operation.
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal { message: String },
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

/// Summary of working tree status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    /// Number of staged changes
    pub staged: usize,
    /// Number of unstaged changes to tracked files
    pub unstaged: usize,
    /// Number of untracked entries (directories count once)
    pub untracked: usize,
    /// Whether there are unresolved conflicts
    pub has_conflicts: bool,
}

impl WorktreeStatus {
    /// Staged, unstaged or conflicted changes to tracked files.
    pub fn has_tracked_changes(&self) -> bool {
        self.staged > 0 || self.unstaged > 0 || self.has_conflicts
    }

    /// Untracked, non-ignored files present.
    pub fn has_untracked(&self) -> bool {
        self.untracked > 0
    }

    /// No changes of any kind.
    pub fn is_clean(&self) -> bool {
        !self.has_tracked_changes() && !self.has_untracked()
    }
}

/// How a path differs from HEAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
    TypeChange,
    Untracked,
    Conflicted,
}

/// One changed path in the working tree or index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Path relative to the working-tree root. Untracked directories end
    /// in `/`.
    pub path: String,
    pub kind: ChangeKind,
}

/// Line counts for one changed path (`git diff --numstat`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumstatEntry {
    pub path: String,
    /// `None` for binary files.
    pub additions: Option<u32>,
    /// `None` for binary files.
    pub deletions: Option<u32>,
}

/// The git collaborator consumed by the scanner, risk collector and fix
/// engine.
pub trait GitOps {
    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Whether `path` is the root of a non-bare working tree.
    fn is_repository(&self, path: &Path) -> bool;

    /// URL of a remote, `None` if it does not exist.
    fn remote_url(&self, repo: &Path, remote: &str) -> Result<Option<String>, GitError>;

    /// Names of all configured remotes.
    fn remote_names(&self, repo: &Path) -> Result<Vec<String>, GitError>;

    /// Current branch name. `None` when HEAD is detached; an unborn branch
    /// is reported by name.
    fn current_branch(&self, repo: &Path) -> Result<Option<String>, GitError>;

    /// HEAD commit id, `None` when HEAD is unborn.
    fn head_sha(&self, repo: &Path) -> Result<Option<String>, GitError>;

    /// Upstream of the current branch in short form (`origin/main`).
    fn upstream(&self, repo: &Path) -> Result<Option<String>, GitError>;

    /// Commits `(ahead, behind)` of HEAD relative to `upstream`.
    fn ahead_behind(&self, repo: &Path, upstream: &str) -> Result<(u32, u32), GitError>;

    /// Working tree status counts.
    fn worktree_status(&self, repo: &Path) -> Result<WorktreeStatus, GitError>;

    /// Changed paths, untracked directories collapsed.
    fn changed_paths(&self, repo: &Path) -> Result<Vec<StatusEntry>, GitError>;

    /// Line counts of tracked changes against HEAD (or the index when HEAD
    /// is unborn).
    fn numstat(&self, repo: &Path) -> Result<Vec<NumstatEntry>, GitError>;

    /// Operation paused in the working tree.
    fn operation_in_progress(&self, repo: &Path) -> Result<OperationInProgress, GitError>;

    /// Default branch of `remote`, falling back to local conventions.
    fn default_branch(&self, repo: &Path, remote: &str) -> Result<Option<String>, GitError>;

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    fn add_remote(&self, repo: &Path, name: &str, url: &str) -> Result<(), GitError>;

    fn set_remote_url(&self, repo: &Path, name: &str, url: &str) -> Result<(), GitError>;

    /// `git fetch [--prune]` for the default remote set.
    fn fetch(&self, repo: &Path, prune: bool) -> Result<(), GitError>;

    /// `git merge --no-edit <upstream>`
    fn merge_no_edit(&self, repo: &Path, upstream: &str) -> Result<(), GitError>;

    /// `git rebase <upstream>`
    fn rebase(&self, repo: &Path, upstream: &str) -> Result<(), GitError>;

    /// `git pull --ff-only`
    fn pull_ff_only(&self, repo: &Path) -> Result<(), GitError>;

    /// `git push`
    fn push(&self, repo: &Path) -> Result<(), GitError>;

    /// `git push -u <remote> <branch>`
    fn push_set_upstream(&self, repo: &Path, remote: &str, branch: &str) -> Result<(), GitError>;

    /// Abort the paused operation (`bisect reset` for bisect).
    fn abort_operation(&self, repo: &Path, op: OperationInProgress) -> Result<(), GitError>;

    /// `git add -A`
    fn add_all(&self, repo: &Path) -> Result<(), GitError>;

    /// `git commit -m <message>`
    fn commit(&self, repo: &Path, message: &str) -> Result<(), GitError>;

    /// Trial `strategy` against `upstream` without touching the working
    /// tree, index or any branch of `repo`.
    fn probe_sync(&self, repo: &Path, upstream: &str, strategy: SyncStrategy) -> ProbeOutcome;
}

/// The production git collaborator.
#[derive(Debug, Clone, Default)]
pub struct Git {
    _private: (),
}

impl Git {
    /// Create the collaborator.
    pub fn new() -> Self {
        Self::default()
    }

    fn open(repo: &Path) -> Result<git2::Repository, GitError> {
        let r = git2::Repository::open(repo).map_err(|_| GitError::NotARepo {
            path: repo.to_path_buf(),
        })?;
        if r.is_bare() {
            return Err(GitError::NotARepo {
                path: repo.to_path_buf(),
            });
        }
        Ok(r)
    }

    fn statuses(repo: &git2::Repository) -> Result<git2::Statuses<'_>, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(false)
            .include_ignored(false)
            .exclude_submodules(true);
        Ok(repo.statuses(Some(&mut opts))?)
    }
}

/// Run `git -C <repo> <args>` and return stdout.
pub(crate) fn run_git<I, S>(repo: &Path, args: I) -> Result<String, GitError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = git_output(repo, args)?;
    Ok(String::from_utf8_lossy(&output.1.stdout).into_owned())
}

/// Run `git -C <repo> <args>` and return the rendered argument list with
/// the raw output, failing on non-zero exit.
pub(crate) fn git_output<I, S>(repo: &Path, args: I) -> Result<(String, Output), GitError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    let rendered = args
        .iter()
        .map(|a| a.as_ref().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");

    tracing::debug!(repo = %repo.display(), args = %rendered, "running git");

    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(GitError::Spawn)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stderr = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr
        };
        return Err(GitError::Command {
            args: rendered,
            code: output.status.code(),
            stderr,
        });
    }

    Ok((rendered, output))
}

impl GitOps for Git {
    fn is_repository(&self, path: &Path) -> bool {
        Self::open(path)
            .ok()
            .and_then(|r| r.workdir().map(Path::to_path_buf))
            .is_some()
    }

    fn remote_url(&self, repo: &Path, remote: &str) -> Result<Option<String>, GitError> {
        let r = Self::open(repo)?;
        let url = match r.find_remote(remote) {
            Ok(found) => Ok(found.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        };
        url
    }

    fn remote_names(&self, repo: &Path) -> Result<Vec<String>, GitError> {
        let r = Self::open(repo)?;
        let remotes = r.remotes()?;
        Ok(remotes.iter().flatten().map(String::from).collect())
    }

    fn current_branch(&self, repo: &Path) -> Result<Option<String>, GitError> {
        let r = Self::open(repo)?;
        let head = match r.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                let head = r.find_reference("HEAD")?;
                return Ok(head
                    .symbolic_target()
                    .and_then(|t| t.strip_prefix("refs/heads/"))
                    .map(String::from));
            }
            Err(e) => return Err(e.into()),
        };

        if head.is_branch() {
            return Ok(head.shorthand().map(String::from));
        }
        Ok(None)
    }

    fn head_sha(&self, repo: &Path) -> Result<Option<String>, GitError> {
        let r = Self::open(repo)?;
        let head = match r.head() {
            Ok(h) => h,
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                return Ok(None)
            }
            Err(e) => return Err(e.into()),
        };
        Ok(head.target().map(|oid| oid.to_string()))
    }

    fn upstream(&self, repo: &Path) -> Result<Option<String>, GitError> {
        let r = Self::open(repo)?;
        let head = match r.head() {
            Ok(h) if h.is_branch() => h,
            Ok(_) => return Ok(None),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let Some(refname) = head.name() else {
            return Ok(None);
        };

        match r.branch_upstream_name(refname) {
            Ok(buf) => Ok(buf.as_str().map(|full| {
                full.strip_prefix("refs/remotes/")
                    .or_else(|| full.strip_prefix("refs/heads/"))
                    .unwrap_or(full)
                    .to_string()
            })),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn ahead_behind(&self, repo: &Path, upstream: &str) -> Result<(u32, u32), GitError> {
        let r = Self::open(repo)?;
        let Some(local) = r.head().ok().and_then(|h| h.target()) else {
            return Ok((0, 0));
        };
        let remote = match r.revparse_single(upstream) {
            Ok(obj) => obj.peel_to_commit()?.id(),
            // Upstream configured but its ref is gone (deleted remote branch).
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok((0, 0)),
            Err(e) => return Err(e.into()),
        };
        let (ahead, behind) = r.graph_ahead_behind(local, remote)?;
        Ok((
            u32::try_from(ahead).unwrap_or(u32::MAX),
            u32::try_from(behind).unwrap_or(u32::MAX),
        ))
    }

    fn worktree_status(&self, repo: &Path) -> Result<WorktreeStatus, GitError> {
        let r = Self::open(repo)?;
        let statuses = Self::statuses(&r)?;

        let mut result = WorktreeStatus::default();
        for entry in statuses.iter() {
            let status = entry.status();

            if status.is_conflicted() {
                result.has_conflicts = true;
            }
            if status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
            {
                result.staged += 1;
            }
            if status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange()
            {
                result.unstaged += 1;
            }
            if status.is_wt_new() {
                result.untracked += 1;
            }
        }
        Ok(result)
    }

    fn changed_paths(&self, repo: &Path) -> Result<Vec<StatusEntry>, GitError> {
        let r = Self::open(repo)?;
        let statuses = Self::statuses(&r)?;

        let mut entries = Vec::new();
        for entry in statuses.iter() {
            let Some(path) = entry.path() else { continue };
            let s = entry.status();
            let kind = if s.is_conflicted() {
                ChangeKind::Conflicted
            } else if s.is_wt_new() {
                ChangeKind::Untracked
            } else if s.is_index_new() {
                ChangeKind::Added
            } else if s.is_index_deleted() || s.is_wt_deleted() {
                ChangeKind::Deleted
            } else if s.is_index_renamed() || s.is_wt_renamed() {
                ChangeKind::Renamed
            } else if s.is_index_typechange() || s.is_wt_typechange() {
                ChangeKind::TypeChange
            } else if s.is_index_modified() || s.is_wt_modified() {
                ChangeKind::Modified
            } else {
                continue;
            };
            entries.push(StatusEntry {
                path: path.to_string(),
                kind,
            });
        }
        Ok(entries)
    }

    fn numstat(&self, repo: &Path) -> Result<Vec<NumstatEntry>, GitError> {
        let stdout = if self.head_sha(repo)?.is_some() {
            run_git(repo, ["diff", "--numstat", "HEAD"])?
        } else {
            run_git(repo, ["diff", "--numstat", "--cached"])?
        };
        Ok(parse_numstat(&stdout))
    }

    fn operation_in_progress(&self, repo: &Path) -> Result<OperationInProgress, GitError> {
        let r = Self::open(repo)?;
        Ok(match r.state() {
            git2::RepositoryState::Clean => OperationInProgress::None,
            git2::RepositoryState::Merge => OperationInProgress::Merge,
            git2::RepositoryState::Rebase
            | git2::RepositoryState::RebaseInteractive
            | git2::RepositoryState::RebaseMerge
            | git2::RepositoryState::ApplyMailbox
            | git2::RepositoryState::ApplyMailboxOrRebase => OperationInProgress::Rebase,
            // Revert runs on the same sequencer; `cherry-pick --abort` clears it.
            git2::RepositoryState::CherryPick
            | git2::RepositoryState::CherryPickSequence
            | git2::RepositoryState::Revert
            | git2::RepositoryState::RevertSequence => OperationInProgress::CherryPick,
            git2::RepositoryState::Bisect => OperationInProgress::Bisect,
        })
    }

    fn default_branch(&self, repo: &Path, remote: &str) -> Result<Option<String>, GitError> {
        let r = Self::open(repo)?;

        let remote_head = format!("refs/remotes/{remote}/HEAD");
        if let Ok(reference) = r.find_reference(&remote_head) {
            let prefix = format!("refs/remotes/{remote}/");
            if let Some(name) = reference
                .symbolic_target()
                .and_then(|t| t.strip_prefix(prefix.as_str()))
            {
                return Ok(Some(name.to_string()));
            }
        }

        if let Ok(config) = r.config() {
            if let Ok(name) = config.get_string("init.defaultBranch") {
                if r.find_branch(&name, git2::BranchType::Local).is_ok() {
                    return Ok(Some(name));
                }
            }
        }

        for candidate in ["main", "master"] {
            if r.find_branch(candidate, git2::BranchType::Local).is_ok() {
                return Ok(Some(candidate.to_string()));
            }
        }
        Ok(None)
    }

    fn add_remote(&self, repo: &Path, name: &str, url: &str) -> Result<(), GitError> {
        run_git(repo, ["remote", "add", name, url]).map(drop)
    }

    fn set_remote_url(&self, repo: &Path, name: &str, url: &str) -> Result<(), GitError> {
        run_git(repo, ["remote", "set-url", name, url]).map(drop)
    }

    fn fetch(&self, repo: &Path, prune: bool) -> Result<(), GitError> {
        if prune {
            run_git(repo, ["fetch", "--prune"]).map(drop)
        } else {
            run_git(repo, ["fetch"]).map(drop)
        }
    }

    fn merge_no_edit(&self, repo: &Path, upstream: &str) -> Result<(), GitError> {
        run_git(repo, ["merge", "--no-edit", upstream]).map(drop)
    }

    fn rebase(&self, repo: &Path, upstream: &str) -> Result<(), GitError> {
        run_git(repo, ["rebase", upstream]).map(drop)
    }

    fn pull_ff_only(&self, repo: &Path) -> Result<(), GitError> {
        run_git(repo, ["pull", "--ff-only"]).map(drop)
    }

    fn push(&self, repo: &Path) -> Result<(), GitError> {
        run_git(repo, ["push"]).map(drop)
    }

    fn push_set_upstream(&self, repo: &Path, remote: &str, branch: &str) -> Result<(), GitError> {
        run_git(repo, ["push", "-u", remote, branch]).map(drop)
    }

    fn abort_operation(&self, repo: &Path, op: OperationInProgress) -> Result<(), GitError> {
        let args: &[&str] = match op {
            OperationInProgress::None => return Ok(()),
            OperationInProgress::Merge => &["merge", "--abort"],
            OperationInProgress::Rebase => &["rebase", "--abort"],
            OperationInProgress::CherryPick => &["cherry-pick", "--abort"],
            OperationInProgress::Bisect => &["bisect", "reset"],
        };
        run_git(repo, args).map(drop)
    }

    fn add_all(&self, repo: &Path) -> Result<(), GitError> {
        run_git(repo, ["add", "-A"]).map(drop)
    }

    fn commit(&self, repo: &Path, message: &str) -> Result<(), GitError> {
        run_git(repo, ["commit", "-m", message]).map(drop)
    }

    fn probe_sync(&self, repo: &Path, upstream: &str, strategy: SyncStrategy) -> ProbeOutcome {
        probe::probe_in_worktree(repo, upstream, strategy)
    }
}

/// Parse `git diff --numstat` output.
fn parse_numstat(stdout: &str) -> Vec<NumstatEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            let added = parts.next()?;
            let deleted = parts.next()?;
            let path = parts.next()?;
            Some(NumstatEntry {
                path: path.to_string(),
                additions: added.parse().ok(),
                deletions: deleted.parse().ok(),
            })
        })
        .collect()
}
