//! core::metadata::schema
//!
//! Per-repository policy metadata (v1).
//!
//! # Schema Design
//!
//! Metadata is:
//! - Self-describing with `kind` and `schema_version`
//! - Keyed by [`RepoKey`], so it survives the clone moving on disk
//! - Strictly parsed (unknown fields rejected)
//!
//! The fix engine only ever rewrites specific fields of a loaded record
//! (auto-push mode, preferred remote, push-access probe state); it never
//! replaces a stored record with a freshly defaulted one.
//!
//! # Example
//!
//! ```
//! use repofleet::core::metadata::schema::{parse_metadata, RepoMetadata, METADATA_KIND};
//! use repofleet::core::types::RepoKey;
//!
//! let meta = RepoMetadata::new(RepoKey::new("work/tool").unwrap());
//! assert_eq!(meta.kind, METADATA_KIND);
//!
//! let json = serde_json::to_string(&meta).unwrap();
//! let parsed = parse_metadata(&json).unwrap();
//! assert_eq!(parsed.repo_key.as_str(), "work/tool");
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::RepoKey;

/// The kind identifier for repository metadata.
pub const METADATA_KIND: &str = "repofleet.repo-metadata";

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from metadata parsing.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to parse metadata: {0}")]
    ParseError(String),

    #[error("invalid kind '{found}', expected '{}'", METADATA_KIND)]
    InvalidKind { found: String },

    #[error("unsupported schema version {0}, supported: {SCHEMA_VERSION}")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Deserialize)]
struct MetadataEnvelope {
    kind: String,
    schema_version: u32,
}

/// Parse metadata JSON with version dispatch.
pub fn parse_metadata(json: &str) -> Result<RepoMetadata, MetadataError> {
    let envelope: MetadataEnvelope =
        serde_json::from_str(json).map_err(|e| MetadataError::ParseError(e.to_string()))?;

    if envelope.kind != METADATA_KIND {
        return Err(MetadataError::InvalidKind {
            found: envelope.kind,
        });
    }

    match envelope.schema_version {
        1 => serde_json::from_str(json).map_err(|e| MetadataError::ParseError(e.to_string())),
        v => Err(MetadataError::UnsupportedVersion(v)),
    }
}

/// Whether successful local commits may be pushed automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoPushMode {
    /// Never push automatically.
    #[default]
    Disabled,
    /// Push automatically, except on the repository's default branch.
    Enabled,
    /// Push automatically on every branch, default branch included.
    IncludeDefaultBranch,
}

impl AutoPushMode {
    /// Whether auto-push applies on a branch.
    pub fn allows_branch(&self, on_default_branch: bool) -> bool {
        match self {
            AutoPushMode::Disabled => false,
            AutoPushMode::Enabled => !on_default_branch,
            AutoPushMode::IncludeDefaultBranch => true,
        }
    }
}

impl fmt::Display for AutoPushMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AutoPushMode::Disabled => "disabled",
            AutoPushMode::Enabled => "enabled",
            AutoPushMode::IncludeDefaultBranch => "include-default-branch",
        })
    }
}

/// Cached classification of whether the current credentials can push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PushAccess {
    /// Not probed yet, or probe state was reset.
    #[default]
    Unknown,
    /// Credentials can read but not push.
    ReadOnly,
    /// Credentials can push.
    ReadWrite,
}

impl PushAccess {
    /// Whether this classification permits (auto-)pushing.
    ///
    /// `Unknown` permits: a push attempt is how the classification gets
    /// learned in the first place.
    pub fn permits_auto_push(&self) -> bool {
        !matches!(self, PushAccess::ReadOnly)
    }
}

impl fmt::Display for PushAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PushAccess::Unknown => "unknown",
            PushAccess::ReadOnly => "read-only",
            PushAccess::ReadWrite => "read-write",
        })
    }
}

/// Hosting visibility of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    #[default]
    Unknown,
    Public,
    Private,
}

impl Visibility {
    /// Parse a user-supplied visibility (`public` / `private`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }

    /// Whether the hosting service should create the repository private.
    pub fn is_private(&self) -> bool {
        !matches!(self, Visibility::Public)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Visibility::Unknown => "unknown",
            Visibility::Public => "public",
            Visibility::Private => "private",
        })
    }
}

/// Repository metadata (v1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoMetadata {
    /// Always [`METADATA_KIND`].
    pub kind: String,
    /// Always [`SCHEMA_VERSION`].
    pub schema_version: u32,

    /// Repository this metadata belongs to.
    pub repo_key: RepoKey,

    /// Remote to push to when setting an upstream (default: `origin`).
    #[serde(default)]
    pub preferred_remote: Option<String>,

    /// Auto-push policy.
    #[serde(default)]
    pub auto_push: AutoPushMode,

    /// Cached push-access classification.
    #[serde(default)]
    pub push_access: PushAccess,
    /// When push access was last probed.
    #[serde(default)]
    pub push_access_checked_at: Option<DateTime<Utc>>,
    /// Remote the last probe ran against.
    #[serde(default)]
    pub push_access_remote: Option<String>,

    #[serde(default)]
    pub visibility: Visibility,

    /// Catalog this repository should live in.
    #[serde(default)]
    pub preferred_catalog: Option<String>,

    /// Keys this repository was known under before it moved.
    #[serde(default)]
    pub previous_repo_keys: Vec<RepoKey>,
}

impl RepoMetadata {
    /// Create metadata with default policy for a repository.
    pub fn new(repo_key: RepoKey) -> Self {
        Self {
            kind: METADATA_KIND.to_string(),
            schema_version: SCHEMA_VERSION,
            repo_key,
            preferred_remote: None,
            auto_push: AutoPushMode::Disabled,
            push_access: PushAccess::Unknown,
            push_access_checked_at: None,
            push_access_remote: None,
            visibility: Visibility::Unknown,
            preferred_catalog: None,
            previous_repo_keys: Vec::new(),
        }
    }

    /// Remote to use for upstream pushes.
    pub fn preferred_remote_or_origin(&self) -> &str {
        self.preferred_remote
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or("origin")
    }

    /// Forget the cached push-access classification so it gets re-probed.
    pub fn reset_push_access(&mut self) {
        self.push_access = PushAccess::Unknown;
        self.push_access_checked_at = None;
        self.push_access_remote = None;
    }

    /// Record the result of a push-access probe.
    pub fn record_push_access(&mut self, access: PushAccess, remote: &str, at: DateTime<Utc>) {
        self.push_access = access;
        self.push_access_checked_at = Some(at);
        self.push_access_remote = Some(remote.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> RepoKey {
        RepoKey::new("work/tool").unwrap()
    }

    mod parse {
        use super::*;

        #[test]
        fn rejects_wrong_kind() {
            let json = r#"{"kind":"other","schema_version":1,"repo_key":"a"}"#;
            assert!(matches!(
                parse_metadata(json),
                Err(MetadataError::InvalidKind { .. })
            ));
        }

        #[test]
        fn rejects_future_version() {
            let json = format!(
                r#"{{"kind":"{}","schema_version":9,"repo_key":"a"}}"#,
                METADATA_KIND
            );
            assert!(matches!(
                parse_metadata(&json),
                Err(MetadataError::UnsupportedVersion(9))
            ));
        }

        #[test]
        fn rejects_unknown_fields() {
            let json = format!(
                r#"{{"kind":"{}","schema_version":1,"repo_key":"a","extra":true}}"#,
                METADATA_KIND
            );
            assert!(parse_metadata(&json).is_err());
        }

        #[test]
        fn minimal_document_uses_defaults() {
            let json = format!(
                r#"{{"kind":"{}","schema_version":1,"repo_key":"a/b"}}"#,
                METADATA_KIND
            );
            let meta = parse_metadata(&json).unwrap();
            assert_eq!(meta.auto_push, AutoPushMode::Disabled);
            assert_eq!(meta.push_access, PushAccess::Unknown);
            assert!(meta.previous_repo_keys.is_empty());
        }
    }

    mod policy {
        use super::*;

        #[test]
        fn only_read_only_blocks_push() {
            assert!(PushAccess::Unknown.permits_auto_push());
            assert!(PushAccess::ReadWrite.permits_auto_push());
            assert!(!PushAccess::ReadOnly.permits_auto_push());
        }

        #[test]
        fn auto_push_default_branch_gate() {
            assert!(!AutoPushMode::Disabled.allows_branch(false));
            assert!(AutoPushMode::Enabled.allows_branch(false));
            assert!(!AutoPushMode::Enabled.allows_branch(true));
            assert!(AutoPushMode::IncludeDefaultBranch.allows_branch(true));
        }

        #[test]
        fn preferred_remote_falls_back_to_origin() {
            let mut meta = RepoMetadata::new(key());
            assert_eq!(meta.preferred_remote_or_origin(), "origin");
            meta.preferred_remote = Some("fork".into());
            assert_eq!(meta.preferred_remote_or_origin(), "fork");
        }

        #[test]
        fn reset_push_access_clears_probe_state() {
            let mut meta = RepoMetadata::new(key());
            meta.record_push_access(PushAccess::ReadOnly, "origin", Utc::now());
            meta.reset_push_access();
            assert_eq!(meta.push_access, PushAccess::Unknown);
            assert!(meta.push_access_checked_at.is_none());
            assert!(meta.push_access_remote.is_none());
        }
    }

    #[test]
    fn visibility_parse() {
        assert_eq!(Visibility::parse("Public"), Some(Visibility::Public));
        assert_eq!(Visibility::parse("private"), Some(Visibility::Private));
        assert_eq!(Visibility::parse("internal"), None);
        assert!(Visibility::Unknown.is_private());
    }
}
