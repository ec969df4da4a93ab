//! scan
//!
//! Repository discovery and observation.
//!
//! # Responsibilities
//!
//! - Walk catalog roots to their configured depth and find working trees
//! - Observe one working tree into a [`RepositoryRecord`] with base reasons
//! - Rebuild and persist the machine snapshot
//!
//! Feasibility reasons (`sync_conflict`, `sync_probe_failed`) are not
//! assigned here; the fix loader adds them after probing.
//!
//! Callers must hold the fleet lock across [`rescan_catalogs`].

use std::fs;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::core::config::{CatalogConfig, Config};
use crate::core::record::RepositoryRecord;
use crate::core::store::{MachineSnapshot, StateStore, StoreError};
use crate::core::types::{ReasonSet, RepoKey, UnsyncableReason};
use crate::git::{GitError, GitOps};

/// Errors from scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot read catalog directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown catalog: {0}")]
    UnknownCatalog(String),

    #[error("no catalog contains {0}")]
    OutsideCatalogs(PathBuf),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Repo key for `path` relative to `root`, `None` if it is not below it.
pub fn repo_key_for(root: &Path, path: &Path) -> Option<RepoKey> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<_>>()?;
    RepoKey::new(parts.join("/")).ok()
}

/// Base reasons derived from a record's observable fields.
pub fn base_reasons(record: &RepositoryRecord) -> ReasonSet {
    let mut reasons = ReasonSet::new();
    if record.operation.is_in_progress() {
        reasons.insert(UnsyncableReason::OperationInProgress);
    }
    if !record.has_origin() {
        reasons.insert(UnsyncableReason::MissingOrigin);
    }
    if !record.has_branch() {
        reasons.insert(UnsyncableReason::DetachedHead);
    } else if record.has_origin() && !record.has_upstream() {
        reasons.insert(UnsyncableReason::MissingUpstream);
    }
    if record.has_dirty_tracked {
        reasons.insert(UnsyncableReason::DirtyWorktree);
    }
    if record.has_untracked {
        reasons.insert(UnsyncableReason::UntrackedFiles);
    }
    if record.diverged {
        reasons.insert(UnsyncableReason::Diverged);
    } else if record.ahead > 0 {
        reasons.insert(UnsyncableReason::Ahead);
    } else if record.behind > 0 {
        reasons.insert(UnsyncableReason::Behind);
    }
    reasons
}

/// Observe one working tree.
pub fn observe_repository(
    git: &dyn GitOps,
    catalog: &CatalogConfig,
    path: &Path,
) -> Result<RepositoryRecord, GitError> {
    if !git.is_repository(path) {
        return Err(GitError::NotARepo {
            path: path.to_path_buf(),
        });
    }

    let repo_key = repo_key_for(&catalog.root, path);
    let name = match &repo_key {
        Some(key) => key.short_name().to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    let mut record = RepositoryRecord::new(name, catalog.name.clone(), path.to_path_buf());
    record.repo_key = repo_key;
    record.origin_url = git.remote_url(path, "origin")?.unwrap_or_default();
    record.branch = git.current_branch(path)?.unwrap_or_default();
    record.upstream = git.upstream(path)?.unwrap_or_default();

    if record.has_upstream() {
        let (ahead, behind) = git.ahead_behind(path, &record.upstream)?;
        record.ahead = ahead;
        record.behind = behind;
        record.diverged = ahead > 0 && behind > 0;
    }

    let status = git.worktree_status(path)?;
    record.has_dirty_tracked = status.has_tracked_changes();
    record.has_untracked = status.has_untracked();
    record.operation = git.operation_in_progress(path)?;

    let reasons = base_reasons(&record);
    record.set_reasons(reasons);

    tracing::debug!(
        repo = %path.display(),
        syncable = record.syncable,
        reasons = %record.unsyncable_reasons.join(),
        "observed repository"
    );
    Ok(record)
}

/// Find working trees under a catalog root, at most `depth` levels down.
///
/// Hidden directories are skipped and the walk does not descend into a
/// working tree once found. Results are sorted.
pub fn discover_catalog(git: &dyn GitOps, catalog: &CatalogConfig) -> Result<Vec<PathBuf>, ScanError> {
    let mut found = Vec::new();
    if !catalog.root.is_dir() {
        tracing::warn!(catalog = %catalog.name, root = %catalog.root.display(), "catalog root missing");
        return Ok(found);
    }
    walk(git, &catalog.root, catalog.depth(), &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(git: &dyn GitOps, dir: &Path, remaining: usize, found: &mut Vec<PathBuf>) -> Result<(), ScanError> {
    if remaining == 0 {
        return Ok(());
    }
    let entries = fs::read_dir(dir).map_err(|source| ScanError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| ScanError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || !path.is_dir() {
            continue;
        }
        if path.join(".git").exists() && git.is_repository(&path) {
            found.push(path);
        } else {
            walk(git, &path, remaining - 1, found)?;
        }
    }
    Ok(())
}

/// Catalogs selected by name, or all configured catalogs when `names` is
/// empty.
pub fn select_catalogs<'a>(config: &'a Config, names: &[String]) -> Result<Vec<&'a CatalogConfig>, ScanError> {
    if names.is_empty() {
        return Ok(config.catalogs().iter().collect());
    }
    names
        .iter()
        .map(|n| config.catalog(n).ok_or_else(|| ScanError::UnknownCatalog(n.clone())))
        .collect()
}

/// The catalog whose root contains `path` (deepest root wins).
pub fn catalog_containing<'a>(config: &'a Config, path: &Path) -> Option<&'a CatalogConfig> {
    config
        .catalogs()
        .iter()
        .filter(|c| path.starts_with(&c.root))
        .max_by_key(|c| c.root.components().count())
}

/// Rebuild the machine snapshot for the selected catalogs and persist it.
///
/// Records of catalogs outside the selection are carried over from the
/// previous snapshot. A repository that fails to observe is logged and
/// left out.
pub fn rescan_catalogs(
    git: &dyn GitOps,
    config: &Config,
    store: &dyn StateStore,
    catalogs: &[String],
) -> Result<MachineSnapshot, ScanError> {
    let selected = select_catalogs(config, catalogs)?;
    let machine = config.machine();

    let mut repos: Vec<RepositoryRecord> = match store.load_snapshot(&machine)? {
        Some(previous) => previous
            .repos
            .into_iter()
            .filter(|r| !selected.iter().any(|c| c.name == r.catalog))
            .collect(),
        None => Vec::new(),
    };

    for catalog in &selected {
        for path in discover_catalog(git, catalog)? {
            match observe_repository(git, catalog, &path) {
                Ok(record) => repos.push(record),
                Err(e) => {
                    tracing::warn!(repo = %path.display(), error = %e, "skipping repository")
                }
            }
        }
    }

    let snapshot = MachineSnapshot::new(machine, repos);
    store.save_snapshot(&snapshot)?;
    tracing::info!(
        machine = %snapshot.machine,
        repos = snapshot.repos.len(),
        "rescanned catalogs"
    );
    Ok(snapshot)
}
