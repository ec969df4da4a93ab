//! risk
//!
//! Risk snapshot of a working tree's uncommitted changes.
//!
//! The fix engine consults a [`RiskSnapshot`] before offering to stage and
//! commit everything: secret-like files block the action outright, and
//! build noise without a root `.gitignore` blocks it in non-interactive
//! runs (an interactive caller can pick ignore patterns first).

use std::collections::BTreeMap;
use std::path::Path;

use crate::git::{ChangeKind, GitError, GitOps};

/// One changed path with its line counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub path: String,
    pub kind: ChangeKind,
    /// `None` for binary or untracked files.
    pub additions: Option<u32>,
    /// `None` for binary or untracked files.
    pub deletions: Option<u32>,
}

/// What is risky about committing a working tree as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiskSnapshot {
    /// Changed paths that look like credentials or keys.
    pub secret_like_changed_paths: Vec<String>,
    /// Changed paths that look like build output or editor litter.
    pub noisy_changed_paths: Vec<String>,
    /// No `.gitignore` at the working-tree root.
    pub missing_root_gitignore: bool,
    /// Ignore patterns covering the noisy paths, first-seen order.
    pub suggested_gitignore_patterns: Vec<String>,
    /// The subset of suggested patterns not yet in the root `.gitignore`.
    pub missing_gitignore_patterns: Vec<String>,
    pub changed_files: Vec<ChangedFile>,
}

impl RiskSnapshot {
    pub fn has_secret_like_changes(&self) -> bool {
        !self.secret_like_changed_paths.is_empty()
    }

    pub fn has_noisy_changes(&self) -> bool {
        !self.noisy_changed_paths.is_empty()
    }

    /// Noisy changes with no root ignore file to absorb them.
    pub fn has_unignored_noise(&self) -> bool {
        self.has_noisy_changes() && self.missing_root_gitignore
    }
}

/// Produces a [`RiskSnapshot`] for a working tree.
pub trait RiskCollector {
    fn collect(&self, repo: &Path) -> Result<RiskSnapshot, GitError>;
}

/// Collector backed by the git collaborator's status and numstat.
pub struct GitRiskCollector<'a> {
    git: &'a dyn GitOps,
}

impl<'a> GitRiskCollector<'a> {
    pub fn new(git: &'a dyn GitOps) -> Self {
        Self { git }
    }
}

impl RiskCollector for GitRiskCollector<'_> {
    fn collect(&self, repo: &Path) -> Result<RiskSnapshot, GitError> {
        let entries = self.git.changed_paths(repo)?;
        let counts: BTreeMap<String, (Option<u32>, Option<u32>)> = self
            .git
            .numstat(repo)?
            .into_iter()
            .map(|n| (n.path, (n.additions, n.deletions)))
            .collect();

        let gitignore = repo.join(".gitignore");
        let existing = match std::fs::read_to_string(&gitignore) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(GitError::Io {
                    path: gitignore,
                    source,
                })
            }
        };

        let mut snapshot = RiskSnapshot {
            missing_root_gitignore: existing.is_none(),
            ..RiskSnapshot::default()
        };

        for entry in entries {
            if entry.kind != ChangeKind::Deleted && is_secret_like(&entry.path) {
                snapshot.secret_like_changed_paths.push(entry.path.clone());
            }
            if let Some(pattern) = noise_pattern(&entry.path) {
                snapshot.noisy_changed_paths.push(entry.path.clone());
                if !snapshot.suggested_gitignore_patterns.iter().any(|p| p == pattern) {
                    snapshot.suggested_gitignore_patterns.push(pattern.to_string());
                }
            }
            let (additions, deletions) = counts.get(&entry.path).copied().unwrap_or((None, None));
            snapshot.changed_files.push(ChangedFile {
                path: entry.path,
                kind: entry.kind,
                additions,
                deletions,
            });
        }

        snapshot.missing_gitignore_patterns = missing_patterns(
            &snapshot.suggested_gitignore_patterns,
            existing.as_deref().unwrap_or(""),
        );

        tracing::debug!(
            repo = %repo.display(),
            secrets = snapshot.secret_like_changed_paths.len(),
            noisy = snapshot.noisy_changed_paths.len(),
            "collected risk snapshot"
        );
        Ok(snapshot)
    }
}

fn file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

/// Whether a changed path looks like it holds credentials.
pub fn is_secret_like(path: &str) -> bool {
    if path.ends_with('/') {
        return false;
    }
    let name = file_name(path).to_ascii_lowercase();

    if name == ".env" {
        return true;
    }
    if let Some(suffix) = name.strip_prefix(".env.") {
        return !matches!(suffix, "example" | "sample" | "template" | "dist");
    }
    if name.ends_with(".pub") {
        return false;
    }
    if ["id_rsa", "id_dsa", "id_ecdsa", "id_ed25519"]
        .iter()
        .any(|k| name.starts_with(k))
    {
        return true;
    }
    if name.starts_with("credentials") || name == ".netrc" || name == ".pgpass" {
        return true;
    }
    [".pem", ".key", ".p12", ".pfx", ".jks", ".keystore"]
        .iter()
        .any(|ext| name.ends_with(ext))
}

const NOISY_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
    ".gradle",
    ".next",
    ".cache",
    "coverage",
];

const NOISY_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

const NOISY_EXTENSIONS: &[(&str, &str)] = &[
    (".log", "*.log"),
    (".pyc", "*.pyc"),
    (".swp", "*.swp"),
    (".tmp", "*.tmp"),
];

/// The ignore pattern covering a noisy path, if it is noisy.
pub fn noise_pattern(path: &str) -> Option<&'static str> {
    let trimmed = path.trim_end_matches('/');
    let components: Vec<&str> = trimmed.split('/').filter(|c| !c.is_empty()).collect();
    let (last, parents) = components.split_last()?;

    // A directory component anywhere, or the last one when the path is a
    // collapsed untracked directory.
    let dirs = if path.ends_with('/') {
        components.as_slice()
    } else {
        parents
    };
    for dir in dirs {
        if let Some(d) = NOISY_DIRS.iter().find(|d| **d == *dir) {
            return Some(noisy_dir_pattern(d));
        }
    }

    if let Some(f) = NOISY_FILES.iter().find(|f| **f == *last) {
        return Some(f);
    }
    NOISY_EXTENSIONS
        .iter()
        .find(|(ext, _)| last.ends_with(ext))
        .map(|(_, pattern)| *pattern)
}

fn noisy_dir_pattern(dir: &str) -> &'static str {
    match dir {
        "node_modules" => "node_modules/",
        "target" => "target/",
        "dist" => "dist/",
        "build" => "build/",
        "__pycache__" => "__pycache__/",
        ".venv" => ".venv/",
        "venv" => "venv/",
        ".gradle" => ".gradle/",
        ".next" => ".next/",
        ".cache" => ".cache/",
        _ => "coverage/",
    }
}

/// Patterns from `suggested` not already present in `gitignore`.
///
/// `target/`, `target` and `/target/` are treated as the same entry.
pub fn missing_patterns(suggested: &[String], gitignore: &str) -> Vec<String> {
    let normalize = |p: &str| p.trim().trim_start_matches('/').trim_end_matches('/').to_string();
    let present: Vec<String> = gitignore
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(normalize)
        .collect();

    suggested
        .iter()
        .filter(|p| !present.contains(&normalize(p)))
        .cloned()
        .collect()
}
