//! fix::exec
//!
//! The action executor.
//!
//! # Executor Contract
//!
//! [`FixEngine::apply_fix_action_with_observer`]:
//! 1. Validates the option shape for the action
//! 2. Acquires the fleet lock for the whole call
//! 3. Re-observes the target and re-checks eligibility against fresh state
//! 4. Runs the plan's steps in order, reporting each to the observer
//! 5. Revalidates only the target, falling back to a full rescan
//!
//! The first failing step stops execution. Steps that already ran stay
//! applied; every step not performed is reported as skipped.
//!
//! # Example
//!
//! ```ignore
//! let mut log = Vec::new();
//! let mut observer = |event: &StepEvent| log.push(event.clone());
//! let state = engine.apply_fix_action_with_observer(
//!     &[],
//!     &path,
//!     FixAction::Push,
//!     &FixOptions::default(),
//!     Some(&mut observer),
//! )?;
//! std::process::exit(FixOutcome::of(&state).exit_code());
//! ```

use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};

use chrono::Utc;

use crate::core::metadata::{AutoPushMode, PushAccess, RepoMetadata, Visibility};
use crate::core::naming::sanitize_repo_name;
use crate::core::types::SyncStrategy;
use crate::forge::{
    parse_github_remote, remote_url, same_github_repo, CreateRepoRequest, ForgeError, ForkRequest,
};
use crate::git::GitError;

use super::action::FixAction;
use super::error::{FixError, StepError};
use super::load::{FixRepoState, RefreshMode};
use super::plan::{build_fix_plan, FixActionPlanEntry, PlanContext, FORK_REMOTE, REVALIDATE_STEP_ID};
use super::resolve::{clean_path, ResolveError};
use super::FixEngine;

/// Caller choices for an action.
///
/// Each field only applies to some actions; [`FixOptions::validate_for`]
/// rejects the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixOptions {
    /// A human can answer follow-up questions.
    pub interactive: bool,
    /// `stage-commit-push`: commit message. Empty or `auto` uses the
    /// configured checkpoint message.
    pub commit_message: Option<String>,
    /// `create-project`: repository name before sanitizing. Defaults to the
    /// local name.
    pub project_name: Option<String>,
    /// `create-project`: hosting visibility.
    pub visibility: Option<Visibility>,
    /// `stage-commit-push`: patterns to add to the root `.gitignore`.
    pub gitignore_patterns: Vec<String>,
    /// `sync-with-upstream` / `pull-ff-only`: override the configured
    /// fetch-before-sync setting.
    pub fetch: Option<bool>,
}

impl FixOptions {
    /// Reject options that `action` does not use.
    pub fn validate_for(&self, action: FixAction) -> Result<(), FixError> {
        let invalid = |message: &str| {
            Err(FixError::InvalidOptions {
                action,
                message: message.to_string(),
            })
        };

        if self.commit_message.is_some() && action != FixAction::StageCommitPush {
            return invalid("a commit message only applies to stage-commit-push");
        }
        if !self.gitignore_patterns.is_empty() {
            if action != FixAction::StageCommitPush {
                return invalid("gitignore patterns only apply to stage-commit-push");
            }
            if self
                .gitignore_patterns
                .iter()
                .any(|p| p.trim().is_empty() || p.contains('\n'))
            {
                return invalid("gitignore patterns must be single non-empty lines");
            }
        }
        if (self.project_name.is_some() || self.visibility.is_some())
            && action != FixAction::CreateProject
        {
            return invalid("project name and visibility only apply to create-project");
        }
        if self.visibility == Some(Visibility::Unknown) {
            return invalid("visibility must be public or private");
        }
        if self.fetch.is_some()
            && !matches!(action, FixAction::SyncWithUpstream | FixAction::PullFfOnly)
        {
            return invalid("the fetch option only applies to sync-with-upstream and pull-ff-only");
        }
        Ok(())
    }

    fn resolved_commit_message<'a>(&'a self, default: &'a str) -> &'a str {
        match self.commit_message.as_deref().map(str::trim) {
            None | Some("") => default,
            Some(m) if m.eq_ignore_ascii_case("auto") => default,
            Some(m) => m,
        }
    }
}

/// Progress of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    Done,
    Failed(String),
    /// Not performed, with the reason.
    Skipped(String),
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Running => "running",
            StepStatus::Done => "done",
            StepStatus::Failed(_) => "failed",
            StepStatus::Skipped(_) => "skipped",
        }
    }
}

/// A status change of one plan step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepEvent {
    pub step_id: &'static str,
    pub summary: String,
    pub status: StepStatus,
}

/// Receives step events synchronously, in order.
pub trait FixObserver {
    fn on_step(&mut self, event: &StepEvent);
}

impl<F: FnMut(&StepEvent)> FixObserver for F {
    fn on_step(&mut self, event: &StepEvent) {
        self(event)
    }
}

/// Keeps every event.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<StepEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(step id, status)` pairs in arrival order.
    pub fn statuses(&self) -> Vec<(&'static str, &'static str)> {
        self.events
            .iter()
            .map(|e| (e.step_id, e.status.as_str()))
            .collect()
    }
}

impl FixObserver for RecordingObserver {
    fn on_step(&mut self, event: &StepEvent) {
        self.events.push(event.clone());
    }
}

/// Forwards events into a channel so a caller can consume them as an
/// iterator.
#[derive(Debug)]
pub struct ChannelObserver {
    tx: Sender<StepEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, Receiver<StepEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl FixObserver for ChannelObserver {
    fn on_step(&mut self, event: &StepEvent) {
        // A dropped receiver only means nobody is listening anymore.
        let _ = self.tx.send(event.clone());
    }
}

/// Result of a completed action, for the CLI's exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    /// Applied and the repository is syncable.
    Synced,
    /// Applied but other reasons remain.
    StillUnsyncable,
}

impl FixOutcome {
    pub fn of(state: &FixRepoState) -> Self {
        if state.record.syncable {
            FixOutcome::Synced
        } else {
            FixOutcome::StillUnsyncable
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            FixOutcome::Synced => 0,
            FixOutcome::StillUnsyncable => 2,
        }
    }
}

/// Reports plan steps to the observer and tracks which were reported.
struct StepRunner<'p, 'o> {
    plan: &'p [FixActionPlanEntry],
    observer: Option<&'o mut dyn FixObserver>,
    finished: Vec<&'static str>,
}

impl<'p, 'o> StepRunner<'p, 'o> {
    fn new(plan: &'p [FixActionPlanEntry], observer: Option<&'o mut dyn FixObserver>) -> Self {
        Self {
            plan,
            observer,
            finished: Vec::new(),
        }
    }

    fn summary(&self, id: &'static str) -> String {
        self.plan
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.summary.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn emit(&mut self, id: &'static str, status: StepStatus) {
        match &status {
            StepStatus::Failed(message) => tracing::warn!(step = id, error = %message, "step failed"),
            StepStatus::Skipped(reason) => tracing::debug!(step = id, %reason, "step skipped"),
            other => tracing::debug!(step = id, status = other.as_str(), "step"),
        }
        if !matches!(status, StepStatus::Running) {
            self.finished.push(id);
        }
        let event = StepEvent {
            step_id: id,
            summary: self.summary(id),
            status,
        };
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.on_step(&event);
        }
    }

    fn run<T>(
        &mut self,
        id: &'static str,
        step: impl FnOnce() -> Result<T, StepError>,
    ) -> Result<T, FixError> {
        self.emit(id, StepStatus::Running);
        match step() {
            Ok(value) => {
                self.emit(id, StepStatus::Done);
                Ok(value)
            }
            Err(source) => Err(self.fail(id, source)),
        }
    }

    /// Report `id` failed, skip everything not yet finished.
    fn fail(&mut self, id: &'static str, source: StepError) -> FixError {
        self.emit(id, StepStatus::Failed(source.to_string()));
        self.skip_remaining("an earlier step failed");
        FixError::StepFailed {
            step_id: id,
            summary: self.summary(id),
            source,
        }
    }

    fn skip(&mut self, id: &'static str, reason: &str) {
        self.emit(id, StepStatus::Skipped(reason.to_string()));
    }

    fn skip_remaining(&mut self, reason: &str) {
        let pending: Vec<&'static str> = self
            .plan
            .iter()
            .map(|e| e.id)
            .filter(|id| !self.finished.contains(id))
            .collect();
        for id in pending {
            self.skip(id, reason);
        }
    }
}

/// Drive a forge future to completion on a private current-thread runtime.
///
/// Must not be called from inside another tokio runtime.
fn block_on<T>(future: impl Future<Output = Result<T, ForgeError>>) -> Result<T, StepError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(StepError::Runtime)?;
    Ok(runtime.block_on(future)?)
}

fn is_permission_denied(err: &GitError) -> bool {
    match err {
        GitError::Command { stderr, .. } => {
            let stderr = stderr.to_ascii_lowercase();
            stderr.contains("permission") || stderr.contains("denied") || stderr.contains("403")
        }
        _ => false,
    }
}

/// Append the patterns not already present to the root `.gitignore`.
/// Returns how many were added.
fn append_gitignore(repo: &Path, patterns: &[String]) -> Result<usize, StepError> {
    let path = repo.join(".gitignore");
    let existing = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(source) => return Err(StepError::Io { path, source }),
    };

    let trimmed: Vec<String> = patterns.iter().map(|p| p.trim().to_string()).collect();
    let missing = crate::risk::missing_patterns(&trimmed, &existing);
    if missing.is_empty() {
        return Ok(0);
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    for pattern in &missing {
        content.push_str(pattern);
        content.push('\n');
    }
    fs::write(&path, content).map_err(|source| StepError::Io { path, source })?;
    Ok(missing.len())
}

fn require_branch(state: &FixRepoState) -> Result<&str, StepError> {
    if state.record.has_branch() {
        Ok(&state.record.branch)
    } else {
        Err(StepError::Precondition("HEAD is detached".to_string()))
    }
}

impl FixEngine<'_> {
    /// [`apply_fix_action_with_observer`](Self::apply_fix_action_with_observer)
    /// without progress reporting.
    pub fn apply_fix_action(
        &self,
        catalogs: &[String],
        path: &Path,
        action: FixAction,
        options: &FixOptions,
    ) -> Result<FixRepoState, FixError> {
        self.apply_fix_action_with_observer(catalogs, path, action, options, None)
    }

    /// Apply `action` to the repository at `path` and return its
    /// revalidated state.
    pub fn apply_fix_action_with_observer(
        &self,
        catalogs: &[String],
        path: &Path,
        action: FixAction,
        options: &FixOptions,
        observer: Option<&mut dyn FixObserver>,
    ) -> Result<FixRepoState, FixError> {
        options.validate_for(action)?;

        let _lock = self.store.lock()?;
        let mut snapshot = self.load_snapshot_locked(catalogs, RefreshMode::Never)?;

        let target = clean_path(path);
        let known = snapshot
            .repos
            .iter()
            .find(|r| clean_path(&r.path) == target)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(path.display().to_string()))?;

        let metadata = self.metadata_index()?;
        let fresh = self.observe_base(&known.catalog, &known.path)?;
        let state = self.build_state(&fresh, &metadata);

        let strategy = self.config.sync_strategy();
        if action != FixAction::Ignore {
            let eligible = state.eligible_actions(options.interactive, strategy);
            if !eligible.contains(&action) {
                let mut reason = state.ineligible_reason(action, options.interactive, strategy);
                if reason.is_empty() {
                    reason = if eligible.is_empty() {
                        "no actions are currently eligible".to_string()
                    } else {
                        let ids: Vec<&str> = eligible.iter().map(|a| a.id()).collect();
                        format!("currently eligible: {}", ids.join(", "))
                    };
                }
                return Err(FixError::Ineligible {
                    action,
                    repo: state.record.path.display().to_string(),
                    reason,
                });
            }
        }

        if matches!(action, FixAction::CreateProject | FixAction::ForkAndRetarget)
            && self.config.github_owner().is_none()
        {
            return Err(FixError::MissingOwner);
        }

        let ctx = self.plan_context(&state, options);
        let plan = build_fix_plan(action, &ctx);
        let mut runner = StepRunner::new(&plan, observer);

        tracing::info!(
            repo = %state.record.path.display(),
            action = %action,
            steps = plan.len(),
            "applying fix"
        );

        if action == FixAction::Ignore {
            runner.skip(REVALIDATE_STEP_ID, "nothing was changed");
            return Ok(state);
        }

        self.execute_steps(action, &state, &ctx, options, &mut runner)?;

        runner.emit(REVALIDATE_STEP_ID, StepStatus::Running);
        match self.revalidate_locked(&mut snapshot, catalogs, &fresh.catalog, &fresh.path) {
            Ok(revalidated) => {
                runner.emit(REVALIDATE_STEP_ID, StepStatus::Done);
                tracing::info!(
                    repo = %revalidated.record.path.display(),
                    syncable = revalidated.record.syncable,
                    "fix applied"
                );
                Ok(revalidated)
            }
            Err(e) => {
                runner.emit(REVALIDATE_STEP_ID, StepStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// The steps `action` would run for `state`, without running them.
    pub fn preview(&self, state: &FixRepoState, action: FixAction, options: &FixOptions) -> Vec<FixActionPlanEntry> {
        build_fix_plan(action, &self.plan_context(state, options))
    }

    pub(crate) fn plan_context(&self, state: &FixRepoState, options: &FixOptions) -> PlanContext {
        let record = &state.record;
        let raw_name = options
            .project_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&record.name);

        PlanContext {
            operation: record.operation,
            branch: record.branch.clone(),
            upstream: record.upstream.clone(),
            origin_url: record.origin_url.clone(),
            strategy: self.config.sync_strategy(),
            preferred_remote: state
                .metadata
                .as_ref()
                .map_or("origin", |m| m.preferred_remote_or_origin())
                .to_string(),
            github_owner: self.config.github_owner().map(str::to_string),
            protocol: self.config.remote_protocol(),
            commit_message: options
                .resolved_commit_message(self.config.commit_message())
                .to_string(),
            project_name: sanitize_repo_name(raw_name).unwrap_or_else(|_| raw_name.to_string()),
            visibility: options.visibility.unwrap_or(self.config.default_visibility()),
            gitignore_patterns: options.gitignore_patterns.clone(),
            fetch_prune: options.fetch.unwrap_or(self.config.fetch_prune()),
            has_commits: matches!(self.git.head_sha(&record.path), Ok(Some(_))),
            on_default_branch: state.on_default_branch(),
        }
    }

    fn execute_steps(
        &self,
        action: FixAction,
        state: &FixRepoState,
        ctx: &PlanContext,
        options: &FixOptions,
        runner: &mut StepRunner<'_, '_>,
    ) -> Result<(), FixError> {
        let record = &state.record;
        let path = record.path.as_path();

        match action {
            FixAction::Ignore => Ok(()),

            FixAction::AbortOperation => runner.run("abort-operation", || {
                let op = self.git.operation_in_progress(path)?;
                if !op.is_in_progress() {
                    return Err(StepError::Precondition(
                        "no git operation is in progress".to_string(),
                    ));
                }
                Ok(self.git.abort_operation(path, op)?)
            }),

            FixAction::Push => runner.run("push", || {
                if record.diverged || record.behind > 0 {
                    return Err(StepError::Precondition(format!(
                        "branch is behind or has diverged from {}; sync first",
                        record.upstream
                    )));
                }
                let remote = ctx.preferred_remote.as_str();
                self.learn_push_access(state, remote, self.git.push(path))
            }),

            FixAction::SyncWithUpstream => {
                let strategy = ctx.strategy;
                // Only a conflict or an unchecked trial stops here; a trial
                // that failed to run leaves the real attempt to git.
                if !state.feasibility.can_attempt_for(strategy) {
                    let outcome = state.feasibility.outcome_for(strategy);
                    return Err(runner.fail(
                        "sync",
                        StepError::Precondition(format!(
                            "{} onto {} is not attemptable ({})",
                            strategy,
                            record.upstream,
                            outcome.as_str()
                        )),
                    ));
                }
                self.fetch_step(ctx, runner, path)?;
                runner.run("sync", || {
                    if !self.git.worktree_status(path)?.is_clean() {
                        return Err(StepError::Precondition(
                            "the working tree is not clean".to_string(),
                        ));
                    }
                    match strategy {
                        SyncStrategy::Rebase => {
                            self.git.rebase(path, &record.upstream)?
                        }
                        SyncStrategy::Merge => {
                            self.git.merge_no_edit(path, &record.upstream)?
                        }
                    }
                    Ok(())
                })
            }

            FixAction::PullFfOnly => {
                self.fetch_step(ctx, runner, path)?;
                runner.run("pull", || Ok(self.git.pull_ff_only(path)?))
            }

            FixAction::SetUpstreamPush => runner.run("push-upstream", || {
                let branch = require_branch(state)?;
                let remote = ctx.preferred_remote.as_str();
                let pushed = self.git.push_set_upstream(path, remote, branch);
                self.learn_push_access(state, remote, pushed)
            }),

            FixAction::StageCommitPush => {
                if options.gitignore_patterns.is_empty() {
                    runner.skip("write-gitignore", "no patterns selected");
                } else {
                    runner.run("write-gitignore", || {
                        let added = append_gitignore(path, &options.gitignore_patterns)?;
                        tracing::debug!(repo = %path.display(), added, "updated .gitignore");
                        Ok(())
                    })?;
                }
                runner.run("stage", || Ok(self.git.add_all(path)?))?;
                runner.run("commit", || Ok(self.git.commit(path, &ctx.commit_message)?))?;

                if !record.has_origin() {
                    runner.skip("push", "no origin remote");
                    return Ok(());
                }
                runner.run("push", || {
                    let remote = ctx.preferred_remote.as_str();
                    if record.has_upstream() {
                        self.learn_push_access(state, remote, self.git.push(path))
                    } else {
                        let branch = require_branch(state)?;
                        let pushed = self.git.push_set_upstream(path, remote, branch);
                        self.learn_push_access(state, remote, pushed)
                    }
                })
            }

            FixAction::CreateProject => self.create_project(state, ctx, runner),

            FixAction::ForkAndRetarget => self.fork_and_retarget(state, ctx, runner),

            FixAction::EnableAutoPush => runner.run("write-metadata", || {
                let mut meta = state.metadata.clone().ok_or_else(|| {
                    StepError::Precondition("repository has no metadata".to_string())
                })?;
                meta.auto_push = if state.on_default_branch() {
                    AutoPushMode::IncludeDefaultBranch
                } else {
                    AutoPushMode::Enabled
                };
                self.store.save_metadata(&meta)?;
                tracing::info!(repo = %meta.repo_key, mode = %meta.auto_push, "auto-push enabled");
                Ok(())
            }),
        }
    }

    fn fetch_step(&self, ctx: &PlanContext, runner: &mut StepRunner<'_, '_>, path: &Path) -> Result<(), FixError> {
        if ctx.fetch_prune {
            runner.run("fetch", || Ok(self.git.fetch(path, true)?))
        } else {
            runner.skip("fetch", "fetch disabled");
            Ok(())
        }
    }

    fn create_project(
        &self,
        state: &FixRepoState,
        ctx: &PlanContext,
        runner: &mut StepRunner<'_, '_>,
    ) -> Result<(), FixError> {
        let record = &state.record;
        let path = record.path.as_path();
        let owner = ctx.github_owner.as_deref().unwrap_or_default();

        let name = runner.run("resolve-name", || Ok(sanitize_repo_name(&ctx.project_name)?))?;
        let expected_url = remote_url(owner, &name, ctx.protocol);

        // Not reachable through eligibility, which requires a missing origin.
        // `preview` shows this step, and execution mirrors the plan.
        if record.has_origin() {
            runner.run("validate-origin", || {
                if same_github_repo(&record.origin_url, &expected_url) {
                    Ok(())
                } else {
                    Err(StepError::Precondition(format!(
                        "origin {} does not point at {}/{}",
                        record.origin_url, owner, name
                    )))
                }
            })?;
        } else {
            runner.run("create-repo", || {
                match block_on(self.forge.get_repo(owner, &name))? {
                    Some(existing) if existing.empty => {
                        tracing::info!(repo = %existing.full_name(), "reusing existing empty repository");
                        Ok(())
                    }
                    Some(existing) => Err(StepError::Precondition(format!(
                        "{} already exists and is not empty",
                        existing.full_name()
                    ))),
                    None => {
                        let created = block_on(self.forge.create_repo(CreateRepoRequest {
                            owner: owner.to_string(),
                            name: name.clone(),
                            private: ctx.visibility.is_private(),
                            description: None,
                        }))?;
                        tracing::info!(repo = %created.full_name(), private = created.private, "created repository");
                        Ok(())
                    }
                }
            })?;
            runner.run("attach-origin", || Ok(self.git.add_remote(path, "origin", &expected_url)?))?;
        }

        match record.repo_key.clone() {
            Some(key) => runner.run("write-metadata", || {
                let mut meta = state
                    .metadata
                    .clone()
                    .unwrap_or_else(|| RepoMetadata::new(key));
                meta.visibility = ctx.visibility;
                meta.preferred_remote = Some("origin".to_string());
                meta.record_push_access(PushAccess::ReadWrite, "origin", Utc::now());
                Ok(self.store.save_metadata(&meta)?)
            })?,
            None => runner.skip("write-metadata", "repository has no key"),
        }

        if !ctx.has_commits {
            runner.skip("initial-push", "no commits yet");
            return Ok(());
        }
        if record.has_upstream() {
            runner.skip("initial-push", "upstream already set");
            return Ok(());
        }
        runner.run("initial-push", || {
            let branch = require_branch(state)?;
            Ok(self.git.push_set_upstream(path, "origin", branch)?)
        })
    }

    fn fork_and_retarget(
        &self,
        state: &FixRepoState,
        ctx: &PlanContext,
        runner: &mut StepRunner<'_, '_>,
    ) -> Result<(), FixError> {
        let record = &state.record;
        let path = record.path.as_path();
        let owner = ctx.github_owner.as_deref().unwrap_or_default();

        let fork = runner.run("create-fork", || {
            let (source_owner, source_name) =
                parse_github_remote(&record.origin_url).ok_or_else(|| {
                    StepError::Precondition(format!(
                        "origin {} is not a GitHub repository",
                        record.origin_url
                    ))
                })?;
            let fork = block_on(self.forge.fork_repo(ForkRequest {
                source_owner,
                source_name,
                target_owner: owner.to_string(),
            }))?;
            tracing::info!(fork = %fork.full_name(), "fork ready");
            Ok(fork)
        })?;

        runner.run("set-fork-remote", || {
            let url = remote_url(&fork.owner, &fork.name, ctx.protocol);
            if self.git.remote_names(path)?.iter().any(|r| r == FORK_REMOTE) {
                self.git.set_remote_url(path, FORK_REMOTE, &url)?;
            } else {
                self.git.add_remote(path, FORK_REMOTE, &url)?;
            }
            Ok(())
        })?;

        runner.run("push-fork", || {
            let branch = require_branch(state)?;
            Ok(self.git.push_set_upstream(path, FORK_REMOTE, branch)?)
        })?;

        runner.run("write-metadata", || {
            let key = record
                .repo_key
                .clone()
                .ok_or_else(|| StepError::Precondition("repository has no key".to_string()))?;
            let mut meta = state
                .metadata
                .clone()
                .unwrap_or_else(|| RepoMetadata::new(key));
            meta.reset_push_access();
            meta.preferred_remote = Some(FORK_REMOTE.to_string());
            Ok(self.store.save_metadata(&meta)?)
        })
    }

    /// Record what a push taught us about push access.
    ///
    /// Success marks existing metadata read-write. A permission failure
    /// probes the forge and records the result, creating metadata when the
    /// repository has a key. Metadata write failures are logged, never
    /// returned; the push result is.
    fn learn_push_access(
        &self,
        state: &FixRepoState,
        remote: &str,
        pushed: Result<(), GitError>,
    ) -> Result<(), StepError> {
        match pushed {
            Ok(()) => {
                if let Some(meta) = &state.metadata {
                    if meta.push_access != PushAccess::ReadWrite
                        || meta.push_access_remote.as_deref() != Some(remote)
                    {
                        let mut meta = meta.clone();
                        meta.record_push_access(PushAccess::ReadWrite, remote, Utc::now());
                        self.save_learned(&meta);
                    }
                }
                Ok(())
            }
            Err(err) => {
                if is_permission_denied(&err) {
                    self.probe_after_denied(state, remote);
                }
                Err(err.into())
            }
        }
    }

    fn probe_after_denied(&self, state: &FixRepoState, remote: &str) {
        let record = &state.record;
        let Some(key) = record.repo_key.clone() else {
            return;
        };
        let url = match self.git.remote_url(&record.path, remote) {
            Ok(Some(url)) => url,
            _ => return,
        };
        let Some((owner, name)) = parse_github_remote(&url) else {
            return;
        };

        let access = match block_on(self.forge.probe_push_access(&owner, &name)) {
            Ok(access) => access,
            Err(e) => {
                tracing::warn!(repo = %key, error = %e, "push access probe failed");
                return;
            }
        };

        let mut meta = state
            .metadata
            .clone()
            .unwrap_or_else(|| RepoMetadata::new(key));
        meta.record_push_access(access, remote, Utc::now());
        self.save_learned(&meta);
    }

    fn save_learned(&self, meta: &RepoMetadata) {
        match self.store.save_metadata(meta) {
            Ok(()) => tracing::info!(
                repo = %meta.repo_key,
                access = %meta.push_access,
                "recorded push access"
            ),
            Err(e) => tracing::warn!(repo = %meta.repo_key, error = %e, "cannot record push access"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn plan(ids: &[&'static str]) -> Vec<FixActionPlanEntry> {
        ids.iter()
            .map(|id| FixActionPlanEntry {
                id,
                is_command: true,
                summary: format!("do {id}"),
            })
            .collect()
    }

    mod options {
        use super::*;

        #[test]
        fn defaults_are_valid_for_every_action() {
            for action in FixAction::ALL {
                assert!(FixOptions::default().validate_for(action).is_ok(), "{action}");
            }
        }

        #[test]
        fn message_only_for_stage_commit_push() {
            let opts = FixOptions {
                commit_message: Some("wip".into()),
                ..FixOptions::default()
            };
            assert!(opts.validate_for(FixAction::StageCommitPush).is_ok());
            let err = opts.validate_for(FixAction::Push).unwrap_err();
            assert!(matches!(err, FixError::InvalidOptions { action: FixAction::Push, .. }));
        }

        #[test]
        fn visibility_must_be_concrete() {
            let opts = FixOptions {
                visibility: Some(Visibility::Unknown),
                ..FixOptions::default()
            };
            assert!(opts.validate_for(FixAction::CreateProject).is_err());
        }

        #[test]
        fn gitignore_patterns_are_single_lines() {
            let opts = FixOptions {
                gitignore_patterns: vec!["a\nb".into()],
                ..FixOptions::default()
            };
            assert!(opts.validate_for(FixAction::StageCommitPush).is_err());
        }

        #[test]
        fn fetch_only_for_fetching_actions() {
            let opts = FixOptions {
                fetch: Some(false),
                ..FixOptions::default()
            };
            assert!(opts.validate_for(FixAction::PullFfOnly).is_ok());
            assert!(opts.validate_for(FixAction::SyncWithUpstream).is_ok());
            assert!(opts.validate_for(FixAction::SetUpstreamPush).is_err());
        }

        #[test]
        fn commit_message_falls_back_to_default() {
            let mut opts = FixOptions::default();
            assert_eq!(opts.resolved_commit_message("checkpoint"), "checkpoint");
            opts.commit_message = Some("  AUTO ".into());
            assert_eq!(opts.resolved_commit_message("checkpoint"), "checkpoint");
            opts.commit_message = Some("   ".into());
            assert_eq!(opts.resolved_commit_message("checkpoint"), "checkpoint");
            opts.commit_message = Some("fix typo".into());
            assert_eq!(opts.resolved_commit_message("checkpoint"), "fix typo");
        }
    }

    mod runner {
        use super::*;

        #[test]
        fn failure_skips_the_rest() {
            let plan = plan(&["fetch", "pull", REVALIDATE_STEP_ID]);
            let mut recorder = RecordingObserver::new();
            {
                let mut runner = StepRunner::new(&plan, Some(&mut recorder));
                runner.run("fetch", || Ok(())).unwrap();
                let err = runner
                    .run("pull", || -> Result<(), StepError> {
                        Err(StepError::Precondition("not fast-forward".into()))
                    })
                    .unwrap_err();
                assert_eq!(err.step_id(), Some("pull"));
                assert!(err.to_string().contains("do pull"));
            }
            assert_eq!(
                recorder.statuses(),
                vec![
                    ("fetch", "running"),
                    ("fetch", "done"),
                    ("pull", "running"),
                    ("pull", "failed"),
                    (REVALIDATE_STEP_ID, "skipped"),
                ]
            );
        }

        #[test]
        fn explicit_skips_are_not_repeated() {
            let plan = plan(&["write-gitignore", "stage", REVALIDATE_STEP_ID]);
            let mut recorder = RecordingObserver::new();
            {
                let mut runner = StepRunner::new(&plan, Some(&mut recorder));
                runner.skip("write-gitignore", "no patterns selected");
                let _ = runner.fail("stage", StepError::Precondition("boom".into()));
            }
            let skipped: Vec<_> = recorder
                .statuses()
                .into_iter()
                .filter(|(_, s)| *s == "skipped")
                .collect();
            assert_eq!(
                skipped,
                vec![("write-gitignore", "skipped"), (REVALIDATE_STEP_ID, "skipped")]
            );
        }

        #[test]
        fn closures_and_channels_observe() {
            let plan = plan(&["push", REVALIDATE_STEP_ID]);
            let mut seen = Vec::new();
            {
                let mut closure = |e: &StepEvent| seen.push(e.status.clone());
                let mut runner = StepRunner::new(&plan, Some(&mut closure));
                runner.run("push", || Ok(())).unwrap();
            }
            assert_eq!(seen, vec![StepStatus::Running, StepStatus::Done]);

            let (mut channel, rx) = ChannelObserver::new();
            {
                let mut runner = StepRunner::new(&plan, Some(&mut channel));
                runner.skip_remaining("nothing to do");
            }
            drop(channel);
            let ids: Vec<_> = rx.iter().map(|e| e.step_id).collect();
            assert_eq!(ids, vec!["push", REVALIDATE_STEP_ID]);
        }

        #[test]
        fn works_without_observer() {
            let plan = plan(&["push"]);
            let mut runner = StepRunner::new(&plan, None);
            assert_eq!(runner.run("push", || Ok(7)).unwrap(), 7);
        }
    }

    mod gitignore {
        use super::*;

        #[test]
        fn creates_file() {
            let dir = TempDir::new().unwrap();
            let added = append_gitignore(dir.path(), &["node_modules/".into(), "*.log".into()]).unwrap();
            assert_eq!(added, 2);
            let content = fs::read_to_string(dir.path().join(".gitignore")).unwrap();
            assert_eq!(content, "node_modules/\n*.log\n");
        }

        #[test]
        fn appends_only_missing_patterns() {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join(".gitignore"), "target/").unwrap();
            let added = append_gitignore(dir.path(), &["target/".into(), ".DS_Store".into()]).unwrap();
            assert_eq!(added, 1);
            let content = fs::read_to_string(dir.path().join(".gitignore")).unwrap();
            assert_eq!(content, "target/\n.DS_Store\n");
        }
    }

    #[test]
    fn permission_denied_detection() {
        let denied = GitError::Command {
            args: "push".into(),
            code: Some(128),
            stderr: "ERROR: Permission to up/lib.git denied to me.".into(),
        };
        let rejected = GitError::Command {
            args: "push".into(),
            code: Some(1),
            stderr: "! [rejected] main -> main (fetch first)".into(),
        };
        assert!(is_permission_denied(&denied));
        assert!(!is_permission_denied(&rejected));
    }

    #[test]
    fn outcome_exit_codes() {
        use crate::core::record::RepositoryRecord;
        use crate::core::types::UnsyncableReason;
        use std::path::PathBuf;

        let mut record = RepositoryRecord::new("tool", "work", PathBuf::from("/w/tool"));
        let state = FixRepoState::bare(record.clone());
        assert_eq!(FixOutcome::of(&state), FixOutcome::Synced);
        assert_eq!(FixOutcome::of(&state).exit_code(), 0);

        record.append_unsyncable_reason(UnsyncableReason::Ahead);
        let state = FixRepoState::bare(record);
        assert_eq!(FixOutcome::of(&state).exit_code(), 2);
    }
}
