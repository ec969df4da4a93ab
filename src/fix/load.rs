//! fix::load
//!
//! Joined per-repository view for the fix engine.
//!
//! A [`FixRepoState`] combines the persisted record with its metadata, a
//! fresh risk snapshot and fresh sync feasibility. States are rebuilt on
//! every load and never persisted; only the base record (without
//! feasibility reasons) goes back into the machine snapshot.
//!
//! # Locking
//!
//! [`FixEngine::load_fix_repos`] holds the fleet lock for the whole load.
//! The `*_locked` helpers assume the caller already holds it.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::Utc;

use crate::core::metadata::RepoMetadata;
use crate::core::record::RepositoryRecord;
use crate::core::store::MachineSnapshot;
use crate::core::types::{RepoKey, SyncStrategy};
use crate::risk::{GitRiskCollector, RiskCollector, RiskSnapshot};
use crate::scan::{self, ScanError};

use super::action::FixAction;
use super::eligibility::{eligible_fix_actions, ineligible_reason_with_metadata, EligibilityContext};
use super::error::FixError;
use super::feasibility::{evaluate_sync_feasibility, SyncFeasibility};
use super::FixEngine;

/// When to rebuild the machine snapshot before loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    /// Use the stored snapshot as-is.
    Never,
    /// Rescan when no snapshot exists or it is older than `stale_after`.
    #[default]
    IfStale,
    /// Always rescan.
    Always,
}

impl RefreshMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshMode::Never => "never",
            RefreshMode::IfStale => "if-stale",
            RefreshMode::Always => "always",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Some(RefreshMode::Never),
            "if-stale" | "if_stale" => Some(RefreshMode::IfStale),
            "always" => Some(RefreshMode::Always),
            _ => None,
        }
    }
}

impl FromStr for RefreshMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!("unknown refresh mode '{}' (expected never, if-stale or always)", s)
        })
    }
}

impl fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the evaluator and executor need about one repository.
#[derive(Debug, Clone)]
pub struct FixRepoState {
    /// Record with feasibility reasons applied.
    pub record: RepositoryRecord,
    pub metadata: Option<RepoMetadata>,
    pub risk: RiskSnapshot,
    pub feasibility: SyncFeasibility,
    /// Record belongs to the configured default catalog.
    pub is_default_catalog: bool,
    /// Default branch of the preferred remote, if it could be read.
    pub default_branch: Option<String>,
}

impl FixRepoState {
    /// A state with no metadata, empty risk and unchecked feasibility.
    pub fn bare(record: RepositoryRecord) -> Self {
        Self {
            record,
            metadata: None,
            risk: RiskSnapshot::default(),
            feasibility: SyncFeasibility::unchecked(),
            is_default_catalog: false,
            default_branch: None,
        }
    }

    /// Evaluator context borrowing this state's risk and feasibility.
    pub fn context(&self, interactive: bool, strategy: SyncStrategy) -> EligibilityContext<'_> {
        EligibilityContext {
            interactive,
            risk: &self.risk,
            sync_strategy: strategy,
            sync_feasibility: self.feasibility,
            default_branch: self.default_branch.as_deref(),
        }
    }

    pub fn eligible_actions(&self, interactive: bool, strategy: SyncStrategy) -> Vec<FixAction> {
        eligible_fix_actions(
            &self.record,
            self.metadata.as_ref(),
            &self.context(interactive, strategy),
        )
    }

    /// Explanation for an action that is not offered; empty when there is
    /// nothing specific to say.
    pub fn ineligible_reason(
        &self,
        action: FixAction,
        interactive: bool,
        strategy: SyncStrategy,
    ) -> String {
        ineligible_reason_with_metadata(
            action,
            &self.record,
            self.metadata.as_ref(),
            &self.context(interactive, strategy),
        )
    }

    /// Whether the branch is the default branch of its remote.
    pub fn on_default_branch(&self) -> bool {
        self.record.has_branch() && self.default_branch.as_deref() == Some(self.record.branch.as_str())
    }
}

fn sort_key(record: &RepositoryRecord) -> (bool, &str, &Path) {
    (record.syncable, record.name.as_str(), record.path.as_path())
}

/// Unsyncable first, then by name, then by path.
pub fn sort_records(records: &mut [RepositoryRecord]) {
    records.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
}

/// Same order as [`sort_records`].
pub fn sort_fix_states(states: &mut [FixRepoState]) {
    states.sort_by(|a, b| sort_key(&a.record).cmp(&sort_key(&b.record)));
}

/// Stored metadata keyed by repo key, with fallback to previous keys.
#[derive(Debug, Default)]
pub struct MetadataIndex {
    by_key: HashMap<String, RepoMetadata>,
}

impl MetadataIndex {
    pub fn new(docs: Vec<RepoMetadata>) -> Self {
        let mut by_key = HashMap::new();
        let mut previous = Vec::new();
        for doc in docs {
            for old in &doc.previous_repo_keys {
                previous.push((old.as_str().to_string(), doc.clone()));
            }
            by_key.insert(doc.repo_key.as_str().to_string(), doc);
        }
        // Current keys win over another document's previous key.
        for (old, doc) in previous {
            by_key.entry(old).or_insert(doc);
        }
        Self { by_key }
    }

    pub fn get(&self, key: &RepoKey) -> Option<&RepoMetadata> {
        self.by_key.get(key.as_str())
    }

    pub fn for_record(&self, record: &RepositoryRecord) -> Option<&RepoMetadata> {
        record.repo_key.as_ref().and_then(|k| self.get(k))
    }
}

impl FixEngine<'_> {
    /// Load the joined state of every repository in `catalogs` (all
    /// catalogs when empty), sorted unsyncable first.
    pub fn load_fix_repos(
        &self,
        catalogs: &[String],
        refresh: RefreshMode,
    ) -> Result<Vec<FixRepoState>, FixError> {
        let _lock = self.store.lock()?;
        let snapshot = self.load_snapshot_locked(catalogs, refresh)?;
        self.build_states(&snapshot, catalogs)
    }

    pub(crate) fn load_snapshot_locked(
        &self,
        catalogs: &[String],
        refresh: RefreshMode,
    ) -> Result<MachineSnapshot, FixError> {
        let machine = self.config.machine();
        let existing = self.store.load_snapshot(&machine)?;

        let rescan = match (refresh, &existing) {
            (RefreshMode::Always, _) => true,
            (RefreshMode::IfStale, None) => true,
            (RefreshMode::IfStale, Some(snapshot)) => {
                snapshot.is_stale(self.config.stale_after(), Utc::now())
            }
            (RefreshMode::Never, _) => false,
        };

        if rescan {
            tracing::debug!(%machine, mode = %refresh, "refreshing machine snapshot");
            return Ok(scan::rescan_catalogs(self.git, self.config, self.store, catalogs)?);
        }

        match existing {
            Some(snapshot) => Ok(snapshot),
            None => {
                tracing::warn!(%machine, "no machine snapshot yet; run with --refresh to scan");
                Ok(MachineSnapshot::new(machine, Vec::new()))
            }
        }
    }

    pub(crate) fn metadata_index(&self) -> Result<MetadataIndex, FixError> {
        Ok(MetadataIndex::new(self.store.list_metadata()?))
    }

    pub(crate) fn build_states(
        &self,
        snapshot: &MachineSnapshot,
        catalogs: &[String],
    ) -> Result<Vec<FixRepoState>, FixError> {
        let selected = scan::select_catalogs(self.config, catalogs)?;
        let metadata = self.metadata_index()?;

        let mut states: Vec<FixRepoState> = snapshot
            .repos
            .iter()
            .filter(|r| selected.iter().any(|c| c.name == r.catalog))
            .map(|r| self.build_state(r, &metadata))
            .collect();
        sort_fix_states(&mut states);
        Ok(states)
    }

    /// Join one base record with metadata, risk and feasibility.
    pub(crate) fn build_state(&self, base: &RepositoryRecord, metadata: &MetadataIndex) -> FixRepoState {
        let metadata = metadata.for_record(base).cloned();
        let mut record = base.clone();
        let feasibility = evaluate_sync_feasibility(self.git, &mut record, self.config.sync_strategy());

        let risk = if record.is_dirty() {
            let fallback = GitRiskCollector::new(self.git);
            let collector: &dyn RiskCollector = match self.risk {
                Some(custom) => custom,
                None => &fallback,
            };
            collector.collect(&record.path).unwrap_or_else(|e| {
                tracing::warn!(repo = %record.path.display(), error = %e, "risk collection failed");
                RiskSnapshot::default()
            })
        } else {
            RiskSnapshot::default()
        };

        let default_branch = if record.has_origin() {
            let remote = metadata
                .as_ref()
                .map_or("origin", |m| m.preferred_remote_or_origin());
            self.git
                .default_branch(&record.path, remote)
                .unwrap_or_else(|e| {
                    tracing::debug!(repo = %record.path.display(), error = %e, "default branch unknown");
                    None
                })
        } else {
            None
        };

        let is_default_catalog = self.config.default_catalog() == Some(record.catalog.as_str());

        FixRepoState {
            record,
            metadata,
            risk,
            feasibility,
            is_default_catalog,
            default_branch,
        }
    }

    /// Observe one working tree into a base record.
    pub(crate) fn observe_base(&self, catalog: &str, path: &Path) -> Result<RepositoryRecord, FixError> {
        let catalog = self
            .config
            .catalog(catalog)
            .or_else(|| scan::catalog_containing(self.config, path))
            .ok_or_else(|| ScanError::OutsideCatalogs(path.to_path_buf()))?;
        Ok(scan::observe_repository(self.git, catalog, path)?)
    }

    /// Re-observe one repository after an action and patch it into
    /// `snapshot`, falling back to a full rescan of `catalogs`.
    pub(crate) fn revalidate_locked(
        &self,
        snapshot: &mut MachineSnapshot,
        catalogs: &[String],
        catalog: &str,
        path: &Path,
    ) -> Result<FixRepoState, FixError> {
        let metadata = self.metadata_index()?;

        let targeted = self.observe_base(catalog, path).and_then(|base| {
            let mut patched = snapshot.clone();
            patched.upsert(base.clone());
            sort_records(&mut patched.repos);
            self.store.save_snapshot(&patched)?;
            Ok((patched, base))
        });

        match targeted {
            Ok((patched, base)) => {
                *snapshot = patched;
                tracing::debug!(repo = %path.display(), syncable = base.syncable, "revalidated repository");
                Ok(self.build_state(&base, &metadata))
            }
            Err(first) => {
                tracing::warn!(
                    repo = %path.display(),
                    error = %first,
                    "targeted revalidation failed; rescanning"
                );
                let rescanned = scan::rescan_catalogs(self.git, self.config, self.store, catalogs)
                    .map_err(|e| FixError::Revalidation {
                        path: path.to_path_buf(),
                        message: format!("{}; rescan failed: {}", first, e),
                    })?;
                let base = rescanned.find_by_path(path).cloned().ok_or_else(|| {
                    FixError::Revalidation {
                        path: path.to_path_buf(),
                        message: format!("{}; repository missing after rescan", first),
                    }
                })?;
                *snapshot = rescanned;
                Ok(self.build_state(&base, &metadata))
            }
        }
    }
}
