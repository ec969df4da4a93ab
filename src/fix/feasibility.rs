//! fix::feasibility
//!
//! Sync feasibility probing.
//!
//! A diverged branch can be synced by rebasing or merging onto its
//! upstream. Before offering either, both are trialled with
//! [`GitOps::probe_sync`], which runs in a disposable worktree and never
//! touches the caller's branch, index or working tree.
//!
//! # Invariants
//!
//! - Outcomes are `Clean` or `ProbeFailed` only after a probe ran
//! - A strategy may be attempted only when its outcome is `Clean` or
//!   `ProbeFailed`
//! - Results are never cached across loads

use crate::core::record::RepositoryRecord;
use crate::core::types::{SyncStrategy, UnsyncableReason};
use crate::git::{GitOps, ProbeOutcome};

/// Classified result of one strategy's probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncOutcome {
    /// Not probed.
    #[default]
    Unknown,
    /// Applies without conflicts.
    Clean,
    /// Needs manual conflict resolution.
    Conflict,
    /// The probe could not complete; attempting is allowed.
    ProbeFailed,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Unknown => "unknown",
            SyncOutcome::Clean => "clean",
            SyncOutcome::Conflict => "conflict",
            SyncOutcome::ProbeFailed => "probe_failed",
        }
    }
}

impl From<&ProbeOutcome> for SyncOutcome {
    fn from(outcome: &ProbeOutcome) -> Self {
        match outcome {
            ProbeOutcome::Clean => SyncOutcome::Clean,
            ProbeOutcome::Conflict => SyncOutcome::Conflict,
            ProbeOutcome::Failed(_) => SyncOutcome::ProbeFailed,
        }
    }
}

/// Per-strategy outcomes for one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncFeasibility {
    pub rebase: SyncOutcome,
    pub merge: SyncOutcome,
    /// Whether probes ran at all.
    pub checked: bool,
}

impl SyncFeasibility {
    /// Not probed: both outcomes unknown.
    pub fn unchecked() -> Self {
        Self::default()
    }

    pub fn outcome_for(&self, strategy: SyncStrategy) -> SyncOutcome {
        match strategy {
            SyncStrategy::Rebase => self.rebase,
            SyncStrategy::Merge => self.merge,
        }
    }

    /// Whether `strategy` may be attempted.
    ///
    /// # Example
    ///
    /// ```
    /// use repofleet::core::types::SyncStrategy;
    /// use repofleet::fix::{SyncFeasibility, SyncOutcome};
    ///
    /// let f = SyncFeasibility {
    ///     rebase: SyncOutcome::Conflict,
    ///     merge: SyncOutcome::ProbeFailed,
    ///     checked: true,
    /// };
    /// assert!(!f.can_attempt_for(SyncStrategy::Rebase));
    /// assert!(f.can_attempt_for(SyncStrategy::Merge));
    /// ```
    pub fn can_attempt_for(&self, strategy: SyncStrategy) -> bool {
        matches!(
            self.outcome_for(strategy),
            SyncOutcome::Clean | SyncOutcome::ProbeFailed
        )
    }

    /// Whether either strategy is clean.
    pub fn any_clean(&self) -> bool {
        self.rebase == SyncOutcome::Clean || self.merge == SyncOutcome::Clean
    }
}

/// Whether a record qualifies for probing: origin and upstream set,
/// diverged, clean tree and no paused operation.
pub fn should_probe(record: &RepositoryRecord) -> bool {
    record.has_origin()
        && record.has_upstream()
        && record.diverged
        && !record.is_dirty()
        && !record.operation.is_in_progress()
}

/// Probe both strategies, or return [`SyncFeasibility::unchecked`] when the
/// record does not qualify.
pub fn probe_feasibility(git: &dyn GitOps, record: &RepositoryRecord) -> SyncFeasibility {
    if !should_probe(record) {
        return SyncFeasibility::unchecked();
    }

    let probe = |strategy| {
        let outcome = git.probe_sync(&record.path, &record.upstream, strategy);
        if let ProbeOutcome::Failed(reason) = &outcome {
            tracing::warn!(
                repo = %record.path.display(),
                %strategy,
                reason = %reason,
                "sync probe failed"
            );
        }
        SyncOutcome::from(&outcome)
    };

    SyncFeasibility {
        rebase: probe(SyncStrategy::Rebase),
        merge: probe(SyncStrategy::Merge),
        checked: true,
    }
}

/// Add feasibility reasons to a record.
///
/// When neither strategy is clean: `sync_conflict` if the default strategy
/// conflicts, otherwise `sync_probe_failed` if any probe failed. Appends are
/// idempotent.
pub fn apply_feasibility_reasons(
    record: &mut RepositoryRecord,
    feasibility: &SyncFeasibility,
    default_strategy: SyncStrategy,
) {
    if !feasibility.checked || feasibility.any_clean() {
        return;
    }
    if feasibility.outcome_for(default_strategy) == SyncOutcome::Conflict {
        record.append_unsyncable_reason(UnsyncableReason::SyncConflict);
    } else if feasibility.rebase == SyncOutcome::ProbeFailed
        || feasibility.merge == SyncOutcome::ProbeFailed
    {
        record.append_unsyncable_reason(UnsyncableReason::SyncProbeFailed);
    }
}

/// Probe a record and apply the resulting reasons.
pub fn evaluate_sync_feasibility(
    git: &dyn GitOps,
    record: &mut RepositoryRecord,
    default_strategy: SyncStrategy,
) -> SyncFeasibility {
    let feasibility = probe_feasibility(git, record);
    apply_feasibility_reasons(record, &feasibility, default_strategy);
    feasibility
}
