//! fix::resolve
//!
//! Resolve a user-supplied selector to exactly one loaded repository.
//!
//! Matching order, first hit wins:
//!
//! 1. exact filesystem path (cleaned, relative selectors resolved against
//!    the current directory)
//! 2. case-insensitive repo key
//! 3. exact short name
//!
//! Ambiguity at any stage is an error listing every candidate path; the
//! resolver never picks silently.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use super::load::FixRepoState;

/// Errors from resolving a selector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no repository matches '{0}'")]
    NotFound(String),

    #[error("'{selector}' is ambiguous; matching repositories:\n{}", list_paths(.paths))]
    Ambiguous {
        selector: String,
        /// Candidate paths, sorted.
        paths: Vec<PathBuf>,
    },
}

fn list_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("  {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Lexically normalize a path: drop `.`, fold `..`, no trailing separator.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn absolute_selector(selector: &str) -> Option<PathBuf> {
    let path = Path::new(selector);
    if path.is_absolute() {
        return Some(clean_path(path));
    }
    std::env::current_dir()
        .ok()
        .map(|cwd| clean_path(&cwd.join(path)))
}

fn same_path(a: &Path, b: &Path) -> bool {
    if clean_path(a) == clean_path(b) {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}

fn unique<'a>(
    selector: &str,
    matches: Vec<&'a FixRepoState>,
) -> Result<Option<&'a FixRepoState>, ResolveError> {
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches[0])),
        _ => {
            let mut paths: Vec<PathBuf> = matches.iter().map(|s| s.record.path.clone()).collect();
            paths.sort();
            Err(ResolveError::Ambiguous {
                selector: selector.to_string(),
                paths,
            })
        }
    }
}

/// Resolve `selector` among `repos`.
pub fn resolve_fix_target<'a>(
    selector: &str,
    repos: &'a [FixRepoState],
) -> Result<&'a FixRepoState, ResolveError> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(ResolveError::NotFound(String::new()));
    }

    if let Some(path) = absolute_selector(selector) {
        let by_path = repos
            .iter()
            .filter(|s| same_path(&s.record.path, &path))
            .collect();
        if let Some(hit) = unique(selector, by_path)? {
            return Ok(hit);
        }
    }

    let by_key = repos
        .iter()
        .filter(|s| {
            s.record
                .repo_key
                .as_ref()
                .is_some_and(|k| k.eq_ignore_case(selector))
        })
        .collect();
    if let Some(hit) = unique(selector, by_key)? {
        return Ok(hit);
    }

    let by_name = repos
        .iter()
        .filter(|s| {
            let short = s
                .record
                .repo_key
                .as_ref()
                .map(|k| k.short_name())
                .unwrap_or(s.record.name.as_str());
            short == selector
        })
        .collect();
    if let Some(hit) = unique(selector, by_name)? {
        return Ok(hit);
    }

    Err(ResolveError::NotFound(selector.to_string()))
}
