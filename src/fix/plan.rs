//! fix::plan
//!
//! Step plans for remediation actions.
//!
//! [`build_fix_plan`] is pure: it renders the ordered steps of an action
//! from a [`PlanContext`] without touching the repository, so it serves both
//! the preview shown before confirmation and the step ids the executor
//! reports progress against.
//!
//! Every plan ends with [`REVALIDATE_STEP_ID`].

use crate::core::metadata::Visibility;
use crate::core::types::{OperationInProgress, SyncStrategy};
use crate::forge::{remote_url, RemoteProtocol};

use super::action::FixAction;

/// Id of the trailing revalidation step present in every plan.
pub const REVALIDATE_STEP_ID: &str = "revalidate-state";

/// Remote name used for forks created by `fork-and-retarget`.
pub const FORK_REMOTE: &str = "fork";

/// One step of an action's execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixActionPlanEntry {
    pub id: &'static str,
    /// Runs an external command (as opposed to a side effect like writing
    /// metadata or calling the GitHub API).
    pub is_command: bool,
    pub summary: String,
}

impl FixActionPlanEntry {
    fn command(id: &'static str, summary: impl Into<String>) -> Self {
        Self {
            id,
            is_command: true,
            summary: summary.into(),
        }
    }

    fn effect(id: &'static str, summary: impl Into<String>) -> Self {
        Self {
            id,
            is_command: false,
            summary: summary.into(),
        }
    }
}

/// Everything needed to render an action's steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanContext {
    pub operation: OperationInProgress,
    pub branch: String,
    pub upstream: String,
    pub origin_url: String,
    pub strategy: SyncStrategy,
    pub preferred_remote: String,
    pub github_owner: Option<String>,
    pub protocol: RemoteProtocol,
    pub commit_message: String,
    /// Sanitized project name.
    pub project_name: String,
    pub visibility: Visibility,
    /// Patterns the caller chose to add to `.gitignore`.
    pub gitignore_patterns: Vec<String>,
    pub fetch_prune: bool,
    /// HEAD points at a commit.
    pub has_commits: bool,
    /// Branch is the repository's default branch.
    pub on_default_branch: bool,
}

impl PlanContext {
    fn owner_or_placeholder(&self) -> &str {
        self.github_owner.as_deref().unwrap_or("<owner>")
    }

    fn branch_or_placeholder(&self) -> &str {
        if self.branch.is_empty() {
            "<branch>"
        } else {
            &self.branch
        }
    }

    fn remote(&self) -> &str {
        if self.preferred_remote.is_empty() {
            "origin"
        } else {
            &self.preferred_remote
        }
    }

    fn fetch_step(&self) -> FixActionPlanEntry {
        if self.fetch_prune {
            FixActionPlanEntry::command("fetch", "git fetch --prune")
        } else {
            FixActionPlanEntry::command("fetch", "git fetch --prune (disabled)")
        }
    }

    fn push_upstream_summary(&self) -> String {
        format!("git push -u {} {}", self.remote(), self.branch_or_placeholder())
    }
}

/// Git command that aborts a paused operation.
pub fn abort_command(op: OperationInProgress) -> Option<&'static str> {
    match op {
        OperationInProgress::None => None,
        OperationInProgress::Merge => Some("git merge --abort"),
        OperationInProgress::Rebase => Some("git rebase --abort"),
        OperationInProgress::CherryPick => Some("git cherry-pick --abort"),
        OperationInProgress::Bisect => Some("git bisect reset"),
    }
}

/// Ordered steps for `action`.
pub fn build_fix_plan(action: FixAction, ctx: &PlanContext) -> Vec<FixActionPlanEntry> {
    let mut steps = match action {
        FixAction::Ignore => Vec::new(),

        FixAction::AbortOperation => vec![FixActionPlanEntry::command(
            "abort-operation",
            abort_command(ctx.operation).unwrap_or("nothing to abort"),
        )],

        FixAction::CreateProject => {
            let owner = ctx.owner_or_placeholder();
            let url = remote_url(owner, &ctx.project_name, ctx.protocol);
            let mut steps = vec![FixActionPlanEntry::effect(
                "resolve-name",
                format!("Use repository name {}", ctx.project_name),
            )];
            if ctx.origin_url.is_empty() {
                steps.push(FixActionPlanEntry::effect(
                    "create-repo",
                    format!(
                        "Create {} GitHub repository {}/{}",
                        if ctx.visibility.is_private() { "private" } else { "public" },
                        owner,
                        ctx.project_name
                    ),
                ));
                steps.push(FixActionPlanEntry::command(
                    "attach-origin",
                    format!("git remote add origin {}", url),
                ));
            } else {
                // Only previews of an ineligible create-project land here.
                steps.push(FixActionPlanEntry::effect(
                    "validate-origin",
                    format!("Check origin {} matches {}", ctx.origin_url, url),
                ));
            }
            steps.push(FixActionPlanEntry::effect(
                "write-metadata",
                format!("Record metadata (visibility {})", ctx.visibility),
            ));
            let push = if ctx.has_commits && ctx.upstream.is_empty() {
                format!("git push -u origin {}", ctx.branch_or_placeholder())
            } else {
                "git push -u origin (skipped: no commits yet or upstream already set)".to_string()
            };
            steps.push(FixActionPlanEntry::command("initial-push", push));
            steps
        }

        FixAction::ForkAndRetarget => {
            let owner = ctx.owner_or_placeholder();
            let source = crate::forge::parse_github_remote(&ctx.origin_url);
            let (source_label, fork_url) = match &source {
                Some((o, r)) => (format!("{}/{}", o, r), remote_url(owner, r, ctx.protocol)),
                None => (ctx.origin_url.clone(), format!("<fork of {}>", ctx.origin_url)),
            };
            vec![
                FixActionPlanEntry::effect(
                    "create-fork",
                    format!("Fork {} under {}", source_label, owner),
                ),
                FixActionPlanEntry::command(
                    "set-fork-remote",
                    format!("git remote add {} {}", FORK_REMOTE, fork_url),
                ),
                FixActionPlanEntry::command(
                    "push-fork",
                    format!("git push -u {} {}", FORK_REMOTE, ctx.branch_or_placeholder()),
                ),
                FixActionPlanEntry::effect(
                    "write-metadata",
                    format!("Prefer remote {} and reset push access to unknown", FORK_REMOTE),
                ),
            ]
        }

        FixAction::SyncWithUpstream => {
            let upstream = if ctx.upstream.is_empty() {
                "<upstream>"
            } else {
                &ctx.upstream
            };
            let sync = match ctx.strategy {
                SyncStrategy::Rebase => format!("git rebase {}", upstream),
                SyncStrategy::Merge => format!("git merge --no-edit {}", upstream),
            };
            vec![ctx.fetch_step(), FixActionPlanEntry::command("sync", sync)]
        }

        FixAction::Push => vec![FixActionPlanEntry::command("push", "git push")],

        FixAction::StageCommitPush => {
            let gitignore = if ctx.gitignore_patterns.is_empty() {
                "Update .gitignore (skipped: no patterns selected)".to_string()
            } else {
                format!("Add to .gitignore: {}", ctx.gitignore_patterns.join(", "))
            };
            let push = if ctx.origin_url.is_empty() {
                "git push (skipped: no origin)".to_string()
            } else if ctx.upstream.is_empty() {
                ctx.push_upstream_summary()
            } else {
                "git push".to_string()
            };
            vec![
                FixActionPlanEntry::effect("write-gitignore", gitignore),
                FixActionPlanEntry::command("stage", "git add -A"),
                FixActionPlanEntry::command(
                    "commit",
                    format!("git commit -m {:?}", ctx.commit_message),
                ),
                FixActionPlanEntry::command("push", push),
            ]
        }

        FixAction::PullFfOnly => vec![
            ctx.fetch_step(),
            FixActionPlanEntry::command("pull", "git pull --ff-only"),
        ],

        FixAction::SetUpstreamPush => vec![FixActionPlanEntry::command(
            "push-upstream",
            ctx.push_upstream_summary(),
        )],

        FixAction::EnableAutoPush => {
            let mode = if ctx.on_default_branch {
                "include-default-branch"
            } else {
                "enabled"
            };
            vec![FixActionPlanEntry::effect(
                "write-metadata",
                format!("Set auto-push to {}", mode),
            )]
        }
    };

    steps.push(FixActionPlanEntry::effect(
        REVALIDATE_STEP_ID,
        "Re-observe repository state",
    ));
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PlanContext {
        PlanContext {
            branch: "main".into(),
            upstream: "origin/main".into(),
            origin_url: "git@github.com:up/lib.git".into(),
            preferred_remote: "origin".into(),
            github_owner: Some("me".into()),
            commit_message: "repofleet: checkpoint".into(),
            project_name: "lib".into(),
            fetch_prune: true,
            has_commits: true,
            ..PlanContext::default()
        }
    }

    fn ids(plan: &[FixActionPlanEntry]) -> Vec<&'static str> {
        plan.iter().map(|e| e.id).collect()
    }

    #[test]
    fn every_plan_ends_with_revalidation() {
        for action in FixAction::ALL {
            let plan = build_fix_plan(action, &ctx());
            assert_eq!(plan.last().map(|e| e.id), Some(REVALIDATE_STEP_ID), "{action}");
            assert!(!plan.last().unwrap().is_command);
        }
    }

    #[test]
    fn step_ids_are_unique_within_a_plan() {
        for action in FixAction::ALL {
            let plan = build_fix_plan(action, &ctx());
            let mut seen = ids(&plan);
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), plan.len(), "{action}");
        }
    }

    mod sync {
        use super::*;

        #[test]
        fn rebase_and_merge_commands() {
            let mut c = ctx();
            let plan = build_fix_plan(FixAction::SyncWithUpstream, &c);
            assert_eq!(ids(&plan), vec!["fetch", "sync", REVALIDATE_STEP_ID]);
            assert_eq!(plan[1].summary, "git rebase origin/main");

            c.strategy = SyncStrategy::Merge;
            c.fetch_prune = false;
            let plan = build_fix_plan(FixAction::SyncWithUpstream, &c);
            assert_eq!(plan[1].summary, "git merge --no-edit origin/main");
            assert!(plan[0].summary.contains("disabled"));
        }
    }

    mod create_project {
        use super::*;

        #[test]
        fn without_origin_creates_and_attaches() {
            let mut c = ctx();
            c.origin_url.clear();
            c.upstream.clear();
            c.visibility = Visibility::Public;
            let plan = build_fix_plan(FixAction::CreateProject, &c);
            assert_eq!(
                ids(&plan),
                vec![
                    "resolve-name",
                    "create-repo",
                    "attach-origin",
                    "write-metadata",
                    "initial-push",
                    REVALIDATE_STEP_ID
                ]
            );
            assert_eq!(plan[1].summary, "Create public GitHub repository me/lib");
            assert_eq!(plan[2].summary, "git remote add origin git@github.com:me/lib.git");
            assert!(plan[2].is_command);
            assert!(!plan[1].is_command);
        }

        #[test]
        fn with_origin_validates() {
            let plan = build_fix_plan(FixAction::CreateProject, &ctx());
            assert!(ids(&plan).contains(&"validate-origin"));
            assert!(!ids(&plan).contains(&"create-repo"));
        }
    }

    mod stage_commit_push {
        use super::*;

        #[test]
        fn push_variants() {
            let mut c = ctx();
            let plan = build_fix_plan(FixAction::StageCommitPush, &c);
            assert_eq!(plan[3].summary, "git push");

            c.upstream.clear();
            let plan = build_fix_plan(FixAction::StageCommitPush, &c);
            assert_eq!(plan[3].summary, "git push -u origin main");

            c.origin_url.clear();
            let plan = build_fix_plan(FixAction::StageCommitPush, &c);
            assert!(plan[3].summary.contains("skipped"));
        }

        #[test]
        fn gitignore_patterns_listed() {
            let mut c = ctx();
            c.gitignore_patterns = vec!["node_modules/".into(), "*.log".into()];
            let plan = build_fix_plan(FixAction::StageCommitPush, &c);
            assert_eq!(plan[0].summary, "Add to .gitignore: node_modules/, *.log");
        }
    }

    #[test]
    fn fork_targets_owner() {
        let plan = build_fix_plan(FixAction::ForkAndRetarget, &ctx());
        assert_eq!(plan[0].summary, "Fork up/lib under me");
        assert_eq!(plan[1].summary, "git remote add fork git@github.com:me/lib.git");
        assert_eq!(plan[2].summary, "git push -u fork main");
    }

    #[test]
    fn abort_maps_operation() {
        let mut c = ctx();
        c.operation = OperationInProgress::Bisect;
        let plan = build_fix_plan(FixAction::AbortOperation, &c);
        assert_eq!(plan[0].summary, "git bisect reset");
    }

    #[test]
    fn enable_auto_push_mode_depends_on_branch() {
        let mut c = ctx();
        let plan = build_fix_plan(FixAction::EnableAutoPush, &c);
        assert_eq!(plan[0].summary, "Set auto-push to enabled");
        c.on_default_branch = true;
        let plan = build_fix_plan(FixAction::EnableAutoPush, &c);
        assert_eq!(plan[0].summary, "Set auto-push to include-default-branch");
    }

    #[test]
    fn ignore_only_revalidates() {
        assert_eq!(
            ids(&build_fix_plan(FixAction::Ignore, &ctx())),
            vec![REVALIDATE_STEP_ID]
        );
    }
}
