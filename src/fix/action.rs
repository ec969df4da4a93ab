//! fix::action
//!
//! The closed set of remediation actions.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A remediation action.
///
/// The evaluator, plan builder and executor all match on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FixAction {
    /// Leave the repository as it is.
    Ignore,
    /// Abort a paused merge, rebase, cherry-pick or bisect.
    AbortOperation,
    /// Create a GitHub repository and attach it as `origin`.
    CreateProject,
    /// Fork a read-only origin and push to the fork instead.
    ForkAndRetarget,
    /// Merge or rebase a diverged branch onto its upstream.
    SyncWithUpstream,
    /// Push commits that are only local.
    Push,
    /// Stage everything, commit and push.
    StageCommitPush,
    /// Fast-forward a branch that is strictly behind.
    PullFfOnly,
    /// Push a branch that has no upstream and start tracking it.
    SetUpstreamPush,
    /// Turn on auto-push for the repository.
    EnableAutoPush,
}

/// Unrecognized action id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown fix action '{0}' (expected one of: {valid})", valid = FixAction::valid_ids())]
pub struct UnknownAction(pub String);

impl FixAction {
    /// Every action, in evaluator order with `ignore` first.
    pub const ALL: [FixAction; 10] = [
        FixAction::Ignore,
        FixAction::AbortOperation,
        FixAction::CreateProject,
        FixAction::ForkAndRetarget,
        FixAction::SyncWithUpstream,
        FixAction::Push,
        FixAction::StageCommitPush,
        FixAction::PullFfOnly,
        FixAction::SetUpstreamPush,
        FixAction::EnableAutoPush,
    ];

    /// Stable kebab-case id.
    pub fn id(&self) -> &'static str {
        match self {
            FixAction::Ignore => "ignore",
            FixAction::AbortOperation => "abort-operation",
            FixAction::CreateProject => "create-project",
            FixAction::ForkAndRetarget => "fork-and-retarget",
            FixAction::SyncWithUpstream => "sync-with-upstream",
            FixAction::Push => "push",
            FixAction::StageCommitPush => "stage-commit-push",
            FixAction::PullFfOnly => "pull-ff-only",
            FixAction::SetUpstreamPush => "set-upstream-push",
            FixAction::EnableAutoPush => "enable-auto-push",
        }
    }

    /// Short human description.
    pub fn label(&self) -> &'static str {
        match self {
            FixAction::Ignore => "Leave as is",
            FixAction::AbortOperation => "Abort the paused git operation",
            FixAction::CreateProject => "Create a GitHub repository and push",
            FixAction::ForkAndRetarget => "Fork origin and push to the fork",
            FixAction::SyncWithUpstream => "Sync the diverged branch with its upstream",
            FixAction::Push => "Push local commits",
            FixAction::StageCommitPush => "Stage all changes, commit and push",
            FixAction::PullFfOnly => "Fast-forward from upstream",
            FixAction::SetUpstreamPush => "Push and set upstream",
            FixAction::EnableAutoPush => "Enable auto-push",
        }
    }

    /// Whether the evaluator can explain why this action is not eligible.
    pub fn is_explainable(&self) -> bool {
        matches!(self, FixAction::StageCommitPush | FixAction::SyncWithUpstream)
    }

    fn valid_ids() -> String {
        Self::ALL.iter().map(|a| a.id()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for FixAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for FixAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.id().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}
