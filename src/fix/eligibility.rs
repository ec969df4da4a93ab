//! fix::eligibility
//!
//! Which remediation actions are safe to offer for a repository.
//!
//! [`eligible_fix_actions`] is a pure predicate table over the observed
//! record, its optional metadata and an [`EligibilityContext`]. The returned
//! list follows table order, which callers use as display priority.
//!
//! # Invariants
//!
//! - A paused git operation makes `abort-operation` the only eligible action
//! - A repository without `origin` is always offered `create-project`
//! - Read-only push access never yields a push-capable action against origin

use crate::core::metadata::{AutoPushMode, RepoMetadata};
use crate::core::record::RepositoryRecord;
use crate::core::types::SyncStrategy;
use crate::risk::RiskSnapshot;

use super::action::FixAction;
use super::feasibility::{SyncFeasibility, SyncOutcome};

/// Inputs to the evaluator beyond the record and metadata.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityContext<'a> {
    /// Whether a human can answer follow-up questions.
    pub interactive: bool,
    pub risk: &'a RiskSnapshot,
    pub sync_strategy: SyncStrategy,
    pub sync_feasibility: SyncFeasibility,
    /// Default branch of the preferred remote, if known.
    pub default_branch: Option<&'a str>,
}

impl EligibilityContext<'_> {
    fn on_default_branch(&self, record: &RepositoryRecord) -> bool {
        record.has_branch() && self.default_branch == Some(record.branch.as_str())
    }
}

/// No metadata yet, or metadata whose push access permits pushing.
pub fn push_allowed(metadata: Option<&RepoMetadata>) -> bool {
    metadata.map_or(true, |m| m.push_access.permits_auto_push())
}

/// Actions currently safe to offer, in priority order.
///
/// `ignore` is never listed; it is always available to callers.
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use repofleet::core::record::RepositoryRecord;
/// use repofleet::core::types::SyncStrategy;
/// use repofleet::fix::{eligible_fix_actions, EligibilityContext, FixAction, SyncFeasibility};
/// use repofleet::risk::RiskSnapshot;
///
/// let record = RepositoryRecord::new("tool", "work", PathBuf::from("/w/tool"));
/// let risk = RiskSnapshot::default();
/// let ctx = EligibilityContext {
///     interactive: false,
///     risk: &risk,
///     sync_strategy: SyncStrategy::Rebase,
///     sync_feasibility: SyncFeasibility::unchecked(),
///     default_branch: None,
/// };
/// assert!(eligible_fix_actions(&record, None, &ctx).contains(&FixAction::CreateProject));
/// ```
pub fn eligible_fix_actions(
    record: &RepositoryRecord,
    metadata: Option<&RepoMetadata>,
    ctx: &EligibilityContext<'_>,
) -> Vec<FixAction> {
    if record.operation.is_in_progress() {
        return vec![FixAction::AbortOperation];
    }

    let origin = record.has_origin();
    let upstream = record.has_upstream();
    let push_ok = push_allowed(metadata);
    let dirty = record.is_dirty();
    let mut actions = Vec::new();

    if !origin {
        actions.push(FixAction::CreateProject);
    }

    if origin
        && upstream
        && record.diverged
        && !dirty
        && ctx.sync_feasibility.can_attempt_for(ctx.sync_strategy)
    {
        actions.push(FixAction::SyncWithUpstream);
    }

    if origin && upstream && record.ahead > 0 && !record.diverged && push_ok {
        actions.push(FixAction::Push);
    }

    if stage_commit_push_blocker(record, metadata.map(|_| push_ok), ctx).is_none() {
        actions.push(FixAction::StageCommitPush);
    }

    if upstream && record.behind > 0 && record.ahead == 0 && !record.diverged && !dirty {
        actions.push(FixAction::PullFfOnly);
    }

    if origin && !upstream && record.has_branch() && !record.diverged && push_ok {
        actions.push(FixAction::SetUpstreamPush);
    }

    if origin && !push_ok && record.repo_key.is_some() {
        actions.push(FixAction::ForkAndRetarget);
    }

    if let Some(meta) = metadata {
        let blocked_on_default =
            meta.auto_push == AutoPushMode::Enabled && ctx.on_default_branch(record);
        if record.repo_key.is_some()
            && meta.push_access.permits_auto_push()
            && (meta.auto_push == AutoPushMode::Disabled || blocked_on_default)
        {
            actions.push(FixAction::EnableAutoPush);
        }
    }

    actions
}

/// Why `stage-commit-push` is blocked, or `None` if it is eligible.
///
/// `push_ok` is `None` when no metadata exists (pushing allowed) and is
/// only consulted when an origin is set.
fn stage_commit_push_blocker(
    record: &RepositoryRecord,
    push_ok: Option<bool>,
    ctx: &EligibilityContext<'_>,
) -> Option<String> {
    if record.operation.is_in_progress() {
        return Some(format!(
            "a {} is in progress; abort or finish it first",
            record.operation.as_str()
        ));
    }
    if !record.is_dirty() {
        return Some("there are no local changes to commit".to_string());
    }
    if record.diverged {
        return Some(format!(
            "branch has diverged from {}; sync with upstream first",
            record.upstream
        ));
    }
    if record.has_origin() && record.has_upstream() && record.behind > 0 {
        return Some(format!(
            "branch is {} commit(s) behind {}; pull first",
            record.behind, record.upstream
        ));
    }
    if record.has_origin() && push_ok == Some(false) {
        return Some(
            "push access to origin is read-only; fork and retarget first".to_string(),
        );
    }
    if ctx.risk.has_secret_like_changes() {
        return Some(format!(
            "secret-like files changed: {}; remove them or add them to .gitignore",
            ctx.risk.secret_like_changed_paths.join(", ")
        ));
    }
    if ctx.risk.has_unignored_noise() && !ctx.interactive {
        return Some(format!(
            "noisy files changed without a root .gitignore: {}; run interactively to choose ignore patterns",
            ctx.risk.noisy_changed_paths.join(", ")
        ));
    }
    None
}

fn sync_with_upstream_blocker(record: &RepositoryRecord, ctx: &EligibilityContext<'_>) -> Option<String> {
    if record.operation.is_in_progress() {
        return Some(format!(
            "a {} is in progress; abort or finish it first",
            record.operation.as_str()
        ));
    }
    if !record.has_origin() {
        return Some("there is no origin remote".to_string());
    }
    if !record.has_upstream() {
        return Some("the current branch has no upstream".to_string());
    }
    if !record.diverged {
        return Some(format!("branch has not diverged from {}", record.upstream));
    }
    if record.is_dirty() {
        return Some(
            "the working tree has uncommitted changes; commit or stash them first".to_string(),
        );
    }
    let strategy = ctx.sync_strategy;
    match ctx.sync_feasibility.outcome_for(strategy) {
        SyncOutcome::Clean | SyncOutcome::ProbeFailed => None,
        SyncOutcome::Conflict => Some(format!(
            "{} onto {} would conflict; resolve it manually",
            strategy, record.upstream
        )),
        SyncOutcome::Unknown if !ctx.sync_feasibility.checked => {
            Some("sync feasibility has not been probed".to_string())
        }
        SyncOutcome::Unknown => Some(format!(
            "{} feasibility onto {} is unknown",
            strategy, record.upstream
        )),
    }
}

/// User-facing explanation of why an action is not eligible.
///
/// Only `stage-commit-push` and `sync-with-upstream` are explained; every
/// other action, and any eligible action, yields an empty string.
pub fn ineligible_fix_reason(
    action: FixAction,
    record: &RepositoryRecord,
    ctx: &EligibilityContext<'_>,
) -> String {
    ineligible_reason_with_metadata(action, record, None, ctx)
}

/// [`ineligible_fix_reason`] that also reports a read-only origin recorded
/// in `metadata`.
pub(crate) fn ineligible_reason_with_metadata(
    action: FixAction,
    record: &RepositoryRecord,
    metadata: Option<&RepoMetadata>,
    ctx: &EligibilityContext<'_>,
) -> String {
    let push_ok = metadata.map(|m| push_allowed(Some(m)));
    let reason = match action {
        FixAction::StageCommitPush => stage_commit_push_blocker(record, push_ok, ctx),
        FixAction::SyncWithUpstream => sync_with_upstream_blocker(record, ctx),
        FixAction::Ignore
        | FixAction::AbortOperation
        | FixAction::CreateProject
        | FixAction::ForkAndRetarget
        | FixAction::Push
        | FixAction::PullFfOnly
        | FixAction::SetUpstreamPush
        | FixAction::EnableAutoPush => None,
    };
    reason.unwrap_or_default()
}
