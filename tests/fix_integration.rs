//! Integration tests for the fix engine.
//!
//! These tests build a small fleet of real git repositories in a temp
//! directory: one catalog of working trees, bare repositories standing in
//! for hosted remotes, and a state directory. GitHub-style URLs are routed
//! to the bare repositories with `url.<base>.pushInsteadOf`, and the
//! hosting API is a `MockForge`.
//!
//! The executor drives the forge on its own runtime, so none of these are
//! `#[tokio::test]`.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use repofleet::core::config::{CatalogConfig, Config, GitHubConfig, GlobalConfig, SyncConfig};
use repofleet::core::metadata::{AutoPushMode, PushAccess, RepoMetadata, Visibility};
use repofleet::core::paths::FleetPaths;
use repofleet::core::ops::lock::LockError;
use repofleet::core::store::{FileStateStore, StateStore, StoreError};
use repofleet::core::types::{OperationInProgress, RepoKey, SyncStrategy, UnsyncableReason};
use repofleet::fix::{
    FixAction, FixEngine, FixError, FixOptions, FixOutcome, FixRepoState, RecordingObserver,
    RefreshMode, SyncOutcome,
};
use repofleet::forge::mock::{MockForge, MockOperation};
use repofleet::forge::RemoteRepo;
use repofleet::git::{
    Git, GitError, GitOps, NumstatEntry, ProbeOutcome, StatusEntry, WorktreeStatus,
};

// =============================================================================
// Test Fixtures
// =============================================================================

/// A fleet with one catalog (`work`) and a directory of bare remotes.
struct Sandbox {
    dir: TempDir,
    config: Config,
    store: FileStateStore,
    git: Git,
    forge: MockForge,
}

impl Sandbox {
    fn new() -> Self {
        Self::with_github(Some(GitHubConfig {
            owner: Some("me".to_string()),
            protocol: Some("ssh".to_string()),
            api_base: None,
            visibility: None,
        }))
    }

    fn with_github(github: Option<GitHubConfig>) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        for sub in ["work", "remotes", "seeds", "state"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }

        let config = Config::from_global(GlobalConfig {
            machine: Some("test-machine".to_string()),
            default_catalog: Some("work".to_string()),
            state_dir: Some(dir.path().join("state")),
            catalogs: vec![CatalogConfig {
                name: "work".to_string(),
                root: dir.path().join("work"),
                depth: None,
            }],
            github,
            sync: Some(SyncConfig {
                strategy: Some("rebase".to_string()),
                fetch_prune: Some(true),
                stale_after_secs: Some(3600),
            }),
            fix: None,
        });
        let store = FileStateStore::new(FleetPaths::new(dir.path().join("state")));

        Self {
            dir,
            config,
            store,
            git: Git::new(),
            forge: MockForge::new().with_viewer("me"),
        }
    }

    fn engine(&self) -> FixEngine<'_> {
        FixEngine::new(&self.config, &self.store, &self.git, &self.forge)
    }

    fn remotes(&self) -> PathBuf {
        self.dir.path().join("remotes")
    }

    /// An empty bare repository at `remotes/<owner>/<name>.git`.
    fn bare(&self, owner: &str, name: &str) -> PathBuf {
        let path = self.remotes().join(owner).join(format!("{name}.git"));
        fs::create_dir_all(&path).unwrap();
        run_git(&path, &["init", "--bare", "-b", "main"]);
        path
    }

    /// A bare remote with one commit on `main`, its seed working tree and
    /// a clone of it in the catalog.
    fn published(&self, owner: &str, name: &str) -> Published {
        let bare = self.bare(owner, name);

        let seed = self.dir.path().join("seeds").join(format!("{owner}-{name}"));
        fs::create_dir_all(&seed).unwrap();
        init_repo(&seed);
        commit_file(&seed, "README.md", "# seed\n", "Initial commit");
        run_git(&seed, &["remote", "add", "origin", path_str(&bare)]);
        run_git(&seed, &["push", "-u", "origin", "main"]);

        let clone = self.dir.path().join("work").join(name);
        run_git(
            self.dir.path(),
            &["clone", path_str(&bare), path_str(&clone)],
        );
        configure_identity(&clone);

        Published { bare, seed, clone }
    }

    /// A working tree in the catalog with one commit and no remote.
    fn local(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join("work").join(name);
        fs::create_dir_all(&path).unwrap();
        init_repo(&path);
        commit_file(&path, "README.md", "# local\n", "Initial commit");
        path
    }

    /// Route pushes to `git@github.com:` into the bare remotes directory.
    fn route_github_pushes(&self, repo: &Path) {
        let base = format!("{}/", self.remotes().display());
        run_git(
            repo,
            &["config", &format!("url.{base}.pushInsteadOf"), "git@github.com:"],
        );
    }

    fn refresh(&self) -> Vec<FixRepoState> {
        self.engine()
            .load_fix_repos(&[], RefreshMode::Always)
            .expect("refresh failed")
    }

    fn state(&self, path: &Path) -> FixRepoState {
        self.refresh()
            .into_iter()
            .find(|s| s.record.path == path)
            .unwrap_or_else(|| panic!("{} not in the fleet", path.display()))
    }

    fn apply(&self, path: &Path, action: FixAction) -> Result<FixRepoState, FixError> {
        self.engine()
            .apply_fix_action(&[], path, action, &FixOptions::default())
    }

    fn metadata(&self, key: &str) -> Option<RepoMetadata> {
        self.store
            .load_metadata(&RepoKey::new(key).unwrap())
            .unwrap()
    }

    fn eligible(&self, state: &FixRepoState) -> Vec<FixAction> {
        state.eligible_actions(false, self.config.sync_strategy())
    }

    /// An engine over `git` instead of the sandbox's own collaborator.
    fn engine_with<'a>(&'a self, git: &'a dyn GitOps) -> FixEngine<'a> {
        FixEngine::new(&self.config, &self.store, git, &self.forge)
    }
}

/// Real git, except that one repository can be made to vanish for a
/// number of `is_repository` checks and sync trials can be forced to fail.
struct FlakyGit {
    inner: Git,
    target: String,
    /// Checks of the target that succeed before it starts vanishing.
    healthy_checks: Cell<u32>,
    /// Checks of the target that then report "not a repository".
    missing_checks: Cell<u32>,
    failing_probes: bool,
}

impl FlakyGit {
    fn new(target: &Path) -> Self {
        Self {
            inner: Git::new(),
            target: target.file_name().unwrap().to_string_lossy().into_owned(),
            healthy_checks: Cell::new(0),
            missing_checks: Cell::new(0),
            failing_probes: false,
        }
    }

    /// Let `healthy` checks of the target pass, then fail `missing` checks.
    fn vanish_after(self, healthy: u32, missing: u32) -> Self {
        self.healthy_checks.set(healthy);
        self.missing_checks.set(missing);
        self
    }

    fn with_failing_probes(mut self) -> Self {
        self.failing_probes = true;
        self
    }

    fn is_target(&self, path: &Path) -> bool {
        path.file_name().is_some_and(|n| n.to_string_lossy() == self.target)
    }
}

impl GitOps for FlakyGit {
    fn is_repository(&self, path: &Path) -> bool {
        if self.is_target(path) {
            if self.healthy_checks.get() > 0 {
                self.healthy_checks.set(self.healthy_checks.get() - 1);
            } else if self.missing_checks.get() > 0 {
                self.missing_checks.set(self.missing_checks.get() - 1);
                return false;
            }
        }
        self.inner.is_repository(path)
    }

    fn remote_url(&self, repo: &Path, remote: &str) -> Result<Option<String>, GitError> {
        self.inner.remote_url(repo, remote)
    }

    fn remote_names(&self, repo: &Path) -> Result<Vec<String>, GitError> {
        self.inner.remote_names(repo)
    }

    fn current_branch(&self, repo: &Path) -> Result<Option<String>, GitError> {
        self.inner.current_branch(repo)
    }

    fn head_sha(&self, repo: &Path) -> Result<Option<String>, GitError> {
        self.inner.head_sha(repo)
    }

    fn upstream(&self, repo: &Path) -> Result<Option<String>, GitError> {
        self.inner.upstream(repo)
    }

    fn ahead_behind(&self, repo: &Path, upstream: &str) -> Result<(u32, u32), GitError> {
        self.inner.ahead_behind(repo, upstream)
    }

    fn worktree_status(&self, repo: &Path) -> Result<WorktreeStatus, GitError> {
        self.inner.worktree_status(repo)
    }

    fn changed_paths(&self, repo: &Path) -> Result<Vec<StatusEntry>, GitError> {
        self.inner.changed_paths(repo)
    }

    fn numstat(&self, repo: &Path) -> Result<Vec<NumstatEntry>, GitError> {
        self.inner.numstat(repo)
    }

    fn operation_in_progress(&self, repo: &Path) -> Result<OperationInProgress, GitError> {
        self.inner.operation_in_progress(repo)
    }

    fn default_branch(&self, repo: &Path, remote: &str) -> Result<Option<String>, GitError> {
        self.inner.default_branch(repo, remote)
    }

    fn add_remote(&self, repo: &Path, name: &str, url: &str) -> Result<(), GitError> {
        self.inner.add_remote(repo, name, url)
    }

    fn set_remote_url(&self, repo: &Path, name: &str, url: &str) -> Result<(), GitError> {
        self.inner.set_remote_url(repo, name, url)
    }

    fn fetch(&self, repo: &Path, prune: bool) -> Result<(), GitError> {
        self.inner.fetch(repo, prune)
    }

    fn merge_no_edit(&self, repo: &Path, upstream: &str) -> Result<(), GitError> {
        self.inner.merge_no_edit(repo, upstream)
    }

    fn rebase(&self, repo: &Path, upstream: &str) -> Result<(), GitError> {
        self.inner.rebase(repo, upstream)
    }

    fn pull_ff_only(&self, repo: &Path) -> Result<(), GitError> {
        self.inner.pull_ff_only(repo)
    }

    fn push(&self, repo: &Path) -> Result<(), GitError> {
        self.inner.push(repo)
    }

    fn push_set_upstream(&self, repo: &Path, remote: &str, branch: &str) -> Result<(), GitError> {
        self.inner.push_set_upstream(repo, remote, branch)
    }

    fn abort_operation(&self, repo: &Path, op: OperationInProgress) -> Result<(), GitError> {
        self.inner.abort_operation(repo, op)
    }

    fn add_all(&self, repo: &Path) -> Result<(), GitError> {
        self.inner.add_all(repo)
    }

    fn commit(&self, repo: &Path, message: &str) -> Result<(), GitError> {
        self.inner.commit(repo, message)
    }

    fn probe_sync(&self, repo: &Path, upstream: &str, strategy: SyncStrategy) -> ProbeOutcome {
        if self.failing_probes {
            return ProbeOutcome::Failed("simulated probe failure".to_string());
        }
        self.inner.probe_sync(repo, upstream, strategy)
    }
}

struct Published {
    bare: PathBuf,
    seed: PathBuf,
    clone: PathBuf,
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

fn init_repo(dir: &Path) {
    run_git(dir, &["init", "-b", "main"]);
    configure_identity(dir);
}

fn configure_identity(dir: &Path) {
    run_git(dir, &["config", "user.email", "test@example.com"]);
    run_git(dir, &["config", "user.name", "Test User"]);
    // Prevent git from opening editors during tests
    run_git(dir, &["config", "core.editor", "true"]);
}

fn commit_file(dir: &Path, file: &str, content: &str, message: &str) {
    fs::write(dir.join(file), content).unwrap();
    run_git(dir, &["add", file]);
    run_git(dir, &["commit", "-m", message]);
}

/// Run a git command in the given directory.
fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

/// Run a git command and return trimmed stdout.
fn git_stdout(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

// =============================================================================
// Loading
// =============================================================================

mod loading {
    use super::*;

    #[test]
    fn refresh_observes_every_working_tree() {
        let sandbox = Sandbox::new();
        let published = sandbox.published("me", "app");
        let local = sandbox.local("scratch");

        let states = sandbox.refresh();
        assert_eq!(states.len(), 2);

        // Unsyncable first.
        assert_eq!(states[0].record.path, local);
        assert!(states[0]
            .record
            .unsyncable_reasons
            .contains(UnsyncableReason::MissingOrigin));
        assert_eq!(states[1].record.path, published.clone);
        assert!(states[1].record.syncable);
        assert!(states.iter().all(|s| s.is_default_catalog));
    }

    #[test]
    fn never_reuses_the_saved_snapshot() {
        let sandbox = Sandbox::new();
        sandbox.local("scratch");
        assert_eq!(sandbox.refresh().len(), 1);

        sandbox.local("later");
        let states = sandbox
            .engine()
            .load_fix_repos(&[], RefreshMode::Never)
            .unwrap();
        assert_eq!(states.len(), 1);
    }

    #[test]
    fn default_branch_comes_from_origin_head() {
        let sandbox = Sandbox::new();
        let published = sandbox.published("me", "app");
        let state = sandbox.state(&published.clone);
        assert_eq!(state.default_branch.as_deref(), Some("main"));
        assert!(state.on_default_branch());
    }
}

// =============================================================================
// Push and upstream
// =============================================================================

mod push {
    use super::*;

    #[test]
    fn push_publishes_local_commits() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        commit_file(&p.clone, "lib.rs", "fn main() {}\n", "Add lib");

        let state = sandbox.state(&p.clone);
        assert!(state.record.unsyncable_reasons.contains(UnsyncableReason::Ahead));
        assert_eq!(sandbox.eligible(&state), vec![FixAction::Push]);

        let after = sandbox.apply(&p.clone, FixAction::Push).unwrap();
        assert!(after.record.syncable, "{:?}", after.record.unsyncable_reasons);
        assert_eq!(FixOutcome::of(&after), FixOutcome::Synced);
        assert_eq!(
            git_stdout(&p.bare, &["rev-parse", "main"]),
            git_stdout(&p.clone, &["rev-parse", "HEAD"])
        );
    }

    #[test]
    fn set_upstream_push_tracks_new_branch() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        run_git(&p.clone, &["checkout", "-b", "feature"]);
        commit_file(&p.clone, "feature.txt", "wip\n", "Start feature");

        let state = sandbox.state(&p.clone);
        assert!(state
            .record
            .unsyncable_reasons
            .contains(UnsyncableReason::MissingUpstream));
        assert!(sandbox.eligible(&state).contains(&FixAction::SetUpstreamPush));

        let after = sandbox.apply(&p.clone, FixAction::SetUpstreamPush).unwrap();
        assert!(after.record.syncable);
        assert_eq!(after.record.upstream, "origin/feature");
        assert!(!git_stdout(&p.bare, &["rev-parse", "--verify", "feature"]).is_empty());
    }

    #[test]
    fn revalidation_updates_the_snapshot() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        commit_file(&p.clone, "lib.rs", "fn main() {}\n", "Add lib");
        sandbox.refresh();

        sandbox.apply(&p.clone, FixAction::Push).unwrap();

        let states = sandbox
            .engine()
            .load_fix_repos(&[], RefreshMode::Never)
            .unwrap();
        assert!(states[0].record.syncable);
    }
}

// =============================================================================
// Sync and pull
// =============================================================================

mod sync {
    use super::*;

    #[test]
    fn pull_ff_only_fast_forwards() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        commit_file(&p.seed, "news.txt", "upstream\n", "Upstream change");
        run_git(&p.seed, &["push"]);
        run_git(&p.clone, &["fetch"]);

        let state = sandbox.state(&p.clone);
        assert!(state.record.unsyncable_reasons.contains(UnsyncableReason::Behind));
        assert!(sandbox.eligible(&state).contains(&FixAction::PullFfOnly));

        let after = sandbox.apply(&p.clone, FixAction::PullFfOnly).unwrap();
        assert!(after.record.syncable);
        assert!(p.clone.join("news.txt").exists());
    }

    #[test]
    fn sync_rebases_diverged_branch() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        commit_file(&p.seed, "upstream.txt", "theirs\n", "Upstream change");
        run_git(&p.seed, &["push"]);
        commit_file(&p.clone, "local.txt", "ours\n", "Local change");
        run_git(&p.clone, &["fetch"]);

        let state = sandbox.state(&p.clone);
        assert!(state.record.diverged);
        assert!(state.feasibility.checked);
        assert!(sandbox.eligible(&state).contains(&FixAction::SyncWithUpstream));

        let after = sandbox.apply(&p.clone, FixAction::SyncWithUpstream).unwrap();
        assert!(!after.record.diverged);
        assert_eq!(after.record.ahead, 1);
        assert_eq!(after.record.behind, 0);
        assert_eq!(FixOutcome::of(&after), FixOutcome::StillUnsyncable);
        assert!(sandbox.eligible(&after).contains(&FixAction::Push));
    }

    #[test]
    fn failed_trials_still_allow_sync() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        commit_file(&p.seed, "upstream.txt", "theirs\n", "Upstream change");
        run_git(&p.seed, &["push"]);
        commit_file(&p.clone, "local.txt", "ours\n", "Local change");
        run_git(&p.clone, &["fetch"]);
        sandbox.refresh();

        let git = FlakyGit::new(&p.clone).with_failing_probes();
        let engine = sandbox.engine_with(&git);
        let state = engine
            .load_fix_repos(&[], RefreshMode::Never)
            .unwrap()
            .into_iter()
            .find(|s| s.record.path == p.clone)
            .unwrap();
        assert_eq!(
            state.feasibility.outcome_for(SyncStrategy::Rebase),
            SyncOutcome::ProbeFailed
        );
        assert!(state
            .record
            .unsyncable_reasons
            .contains(UnsyncableReason::SyncProbeFailed));
        assert!(sandbox.eligible(&state).contains(&FixAction::SyncWithUpstream));

        // A trial that could not run is not a conflict; the real rebase goes ahead.
        let after = engine
            .apply_fix_action(&[], &p.clone, FixAction::SyncWithUpstream, &FixOptions::default())
            .unwrap();
        assert!(!after.record.diverged);
        assert_eq!(after.record.ahead, 1);
        assert_eq!(after.record.behind, 0);
    }

    #[test]
    fn conflicting_divergence_is_not_offered() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        commit_file(&p.seed, "README.md", "# theirs\n", "Upstream edit");
        run_git(&p.seed, &["push"]);
        commit_file(&p.clone, "README.md", "# ours\n", "Local edit");
        run_git(&p.clone, &["fetch"]);

        let state = sandbox.state(&p.clone);
        assert!(state
            .record
            .unsyncable_reasons
            .contains(UnsyncableReason::SyncConflict));
        assert!(!sandbox.eligible(&state).contains(&FixAction::SyncWithUpstream));
        assert!(state
            .ineligible_reason(FixAction::SyncWithUpstream, false, sandbox.config.sync_strategy())
            .contains("would conflict"));

        let err = sandbox
            .apply(&p.clone, FixAction::SyncWithUpstream)
            .unwrap_err();
        assert!(matches!(err, FixError::Ineligible { .. }), "{err}");
        // The probe left the working tree alone.
        assert_eq!(git_stdout(&p.clone, &["status", "--porcelain"]), "");
    }
}

// =============================================================================
// Stage, commit, push
// =============================================================================

mod stage_commit_push {
    use super::*;

    #[test]
    fn commits_with_default_message_and_pushes() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        fs::write(p.clone.join("README.md"), "# edited\n").unwrap();

        let state = sandbox.state(&p.clone);
        assert!(sandbox.eligible(&state).contains(&FixAction::StageCommitPush));

        let after = sandbox.apply(&p.clone, FixAction::StageCommitPush).unwrap();
        assert!(after.record.syncable);
        assert_eq!(
            git_stdout(&p.clone, &["log", "-1", "--format=%s"]),
            sandbox.config.commit_message()
        );
        assert_eq!(
            git_stdout(&p.bare, &["rev-parse", "main"]),
            git_stdout(&p.clone, &["rev-parse", "HEAD"])
        );
    }

    #[test]
    fn custom_message_is_used() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        fs::write(p.clone.join("notes.txt"), "todo\n").unwrap();
        sandbox.refresh();

        let options = FixOptions {
            commit_message: Some("Add notes".to_string()),
            ..Default::default()
        };
        sandbox
            .engine()
            .apply_fix_action(&[], &p.clone, FixAction::StageCommitPush, &options)
            .unwrap();
        assert_eq!(git_stdout(&p.clone, &["log", "-1", "--format=%s"]), "Add notes");
    }

    #[test]
    fn secret_like_files_block_the_action() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        fs::write(p.clone.join(".env"), "TOKEN=hunter2\n").unwrap();

        let state = sandbox.state(&p.clone);
        assert!(state.risk.has_secret_like_changes());
        assert!(!sandbox.eligible(&state).contains(&FixAction::StageCommitPush));
        assert!(state
            .ineligible_reason(FixAction::StageCommitPush, false, sandbox.config.sync_strategy())
            .contains(".env"));

        let err = sandbox
            .apply(&p.clone, FixAction::StageCommitPush)
            .unwrap_err();
        assert!(matches!(err, FixError::Ineligible { .. }));
        assert_eq!(git_stdout(&p.clone, &["rev-list", "--count", "HEAD"]), "1");
    }

    #[test]
    fn noisy_files_need_interactive_patterns() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        fs::create_dir_all(p.clone.join("node_modules/pkg")).unwrap();
        fs::write(p.clone.join("node_modules/pkg/index.js"), "x\n").unwrap();
        fs::write(p.clone.join("app.js"), "run()\n").unwrap();

        let state = sandbox.state(&p.clone);
        let strategy = sandbox.config.sync_strategy();
        assert!(!state.eligible_actions(false, strategy).contains(&FixAction::StageCommitPush));
        assert!(state.eligible_actions(true, strategy).contains(&FixAction::StageCommitPush));
        assert!(state
            .risk
            .missing_gitignore_patterns
            .contains(&"node_modules/".to_string()));

        let options = FixOptions {
            interactive: true,
            gitignore_patterns: vec!["node_modules/".to_string()],
            ..Default::default()
        };
        let after = sandbox
            .engine()
            .apply_fix_action(&[], &p.clone, FixAction::StageCommitPush, &options)
            .unwrap();

        assert!(after.record.syncable, "{:?}", after.record.unsyncable_reasons);
        let gitignore = fs::read_to_string(p.clone.join(".gitignore")).unwrap();
        assert!(gitignore.lines().any(|l| l == "node_modules/"));
        let tracked = git_stdout(&p.clone, &["ls-files"]);
        assert!(tracked.contains("app.js"));
        assert!(!tracked.contains("node_modules"));
    }

    #[test]
    fn local_only_repo_skips_push() {
        let sandbox = Sandbox::new();
        let path = sandbox.local("scratch");
        fs::write(path.join("README.md"), "# changed\n").unwrap();
        sandbox.refresh();

        let mut observer = RecordingObserver::new();
        let after = sandbox
            .engine()
            .apply_fix_action_with_observer(
                &[],
                &path,
                FixAction::StageCommitPush,
                &FixOptions::default(),
                Some(&mut observer),
            )
            .unwrap();

        assert!(!after.record.is_dirty());
        assert!(observer.statuses().contains(&("push", "skipped")));
        assert!(after
            .record
            .unsyncable_reasons
            .contains(UnsyncableReason::MissingOrigin));
    }
}

// =============================================================================
// Create project
// =============================================================================

mod create_project {
    use super::*;

    #[test]
    fn creates_remote_attaches_origin_and_pushes() {
        let sandbox = Sandbox::new();
        let path = sandbox.local("tool");
        sandbox.route_github_pushes(&path);
        let bare = sandbox.bare("me", "tool");

        let state = sandbox.state(&path);
        assert_eq!(sandbox.eligible(&state), vec![FixAction::CreateProject]);

        let after = sandbox.apply(&path, FixAction::CreateProject).unwrap();
        assert!(after.record.syncable, "{:?}", after.record.unsyncable_reasons);
        assert_eq!(after.record.upstream, "origin/main");
        assert_eq!(
            git_stdout(&path, &["config", "remote.origin.url"]),
            "git@github.com:me/tool.git"
        );
        assert_eq!(
            git_stdout(&bare, &["rev-parse", "main"]),
            git_stdout(&path, &["rev-parse", "HEAD"])
        );

        assert!(sandbox.forge.operations().contains(&MockOperation::CreateRepo {
            owner: "me".to_string(),
            name: "tool".to_string(),
            private: true,
        }));

        let meta = sandbox.metadata("tool").expect("metadata written");
        assert_eq!(meta.visibility, Visibility::Private);
        assert_eq!(meta.preferred_remote.as_deref(), Some("origin"));
        assert_eq!(meta.push_access, PushAccess::ReadWrite);
    }

    #[test]
    fn public_visibility_option() {
        let sandbox = Sandbox::new();
        let path = sandbox.local("tool");
        sandbox.route_github_pushes(&path);
        sandbox.bare("me", "tool");
        sandbox.refresh();

        let options = FixOptions {
            visibility: Some(Visibility::Public),
            ..Default::default()
        };
        sandbox
            .engine()
            .apply_fix_action(&[], &path, FixAction::CreateProject, &options)
            .unwrap();

        assert!(!sandbox.forge.repo_sync("me", "tool").unwrap().private);
        assert_eq!(sandbox.metadata("tool").unwrap().visibility, Visibility::Public);
    }

    #[test]
    fn reuses_existing_empty_repository() {
        let mut sandbox = Sandbox::new();
        sandbox.forge = MockForge::new().with_viewer("me").with_repo(RemoteRepo {
            owner: "me".to_string(),
            name: "tool".to_string(),
            private: true,
            fork: false,
            empty: true,
        });
        let path = sandbox.local("tool");
        sandbox.route_github_pushes(&path);
        sandbox.bare("me", "tool");
        sandbox.refresh();

        let after = sandbox.apply(&path, FixAction::CreateProject).unwrap();
        assert!(after.record.syncable);
        assert!(!sandbox
            .forge
            .operations()
            .iter()
            .any(|op| matches!(op, MockOperation::CreateRepo { .. })));
    }

    #[test]
    fn non_empty_remote_fails_and_skips_the_rest() {
        let mut sandbox = Sandbox::new();
        sandbox.forge = MockForge::new().with_viewer("me").with_repo(RemoteRepo {
            owner: "me".to_string(),
            name: "tool".to_string(),
            private: false,
            fork: false,
            empty: false,
        });
        let path = sandbox.local("tool");
        sandbox.refresh();

        let mut observer = RecordingObserver::new();
        let err = sandbox
            .engine()
            .apply_fix_action_with_observer(
                &[],
                &path,
                FixAction::CreateProject,
                &FixOptions::default(),
                Some(&mut observer),
            )
            .unwrap_err();

        assert_eq!(err.step_id(), Some("create-repo"));
        assert_eq!(
            observer.statuses(),
            vec![
                ("resolve-name", "running"),
                ("resolve-name", "done"),
                ("create-repo", "running"),
                ("create-repo", "failed"),
                ("attach-origin", "skipped"),
                ("write-metadata", "skipped"),
                ("initial-push", "skipped"),
                ("revalidate-state", "skipped"),
            ]
        );
        assert_eq!(git_stdout(&path, &["remote"]), "");
    }

    #[test]
    fn existing_origin_is_not_offered() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        fs::write(p.clone.join("README.md"), "# edited\n").unwrap();

        let state = sandbox.state(&p.clone);
        assert!(!sandbox.eligible(&state).contains(&FixAction::CreateProject));
        let plan = sandbox
            .engine()
            .preview(&state, FixAction::CreateProject, &FixOptions::default());
        assert!(plan.iter().any(|step| step.id == "validate-origin"));

        let err = sandbox.apply(&p.clone, FixAction::CreateProject).unwrap_err();
        assert!(matches!(err, FixError::Ineligible { .. }), "{err}");
        assert!(sandbox.forge.operations().is_empty());
    }

    #[test]
    fn missing_owner_is_rejected() {
        let sandbox = Sandbox::with_github(None);
        let path = sandbox.local("tool");
        sandbox.refresh();

        let err = sandbox.apply(&path, FixAction::CreateProject).unwrap_err();
        assert!(matches!(err, FixError::MissingOwner));
        assert!(sandbox.forge.operations().is_empty());
    }

    #[test]
    fn enable_auto_push_on_default_branch() {
        let sandbox = Sandbox::new();
        let path = sandbox.local("tool");
        sandbox.route_github_pushes(&path);
        sandbox.bare("me", "tool");
        sandbox.refresh();
        sandbox.apply(&path, FixAction::CreateProject).unwrap();

        let state = sandbox.state(&path);
        assert!(sandbox.eligible(&state).contains(&FixAction::EnableAutoPush));

        sandbox.apply(&path, FixAction::EnableAutoPush).unwrap();
        assert_eq!(
            sandbox.metadata("tool").unwrap().auto_push,
            AutoPushMode::IncludeDefaultBranch
        );
        assert!(!sandbox
            .eligible(&sandbox.state(&path))
            .contains(&FixAction::EnableAutoPush));
    }
}

// =============================================================================
// Read-only remotes
// =============================================================================

#[cfg(unix)]
mod read_only {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Reject every push to `bare` the way GitHub does without access.
    fn deny_pushes(bare: &Path, repo: &str) {
        let hook = bare.join("hooks").join("pre-receive");
        fs::create_dir_all(hook.parent().unwrap()).unwrap();
        fs::write(
            &hook,
            format!("#!/bin/sh\necho \"Permission to {repo}.git denied to me.\" >&2\nexit 1\n"),
        )
        .unwrap();
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn denied_push_learns_read_only_then_fork_retargets() {
        let mut sandbox = Sandbox::new();
        sandbox.forge = MockForge::new().with_viewer("me").with_repo(RemoteRepo {
            owner: "upstream-org".to_string(),
            name: "tool".to_string(),
            private: false,
            fork: false,
            empty: false,
        });

        let p = sandbox.published("upstream-org", "tool");
        deny_pushes(&p.bare, "upstream-org/tool");
        run_git(
            &p.clone,
            &["remote", "set-url", "origin", "git@github.com:upstream-org/tool.git"],
        );
        sandbox.route_github_pushes(&p.clone);
        sandbox.bare("me", "tool");
        commit_file(&p.clone, "patch.txt", "fix\n", "Local fix");

        let state = sandbox.state(&p.clone);
        assert_eq!(sandbox.eligible(&state), vec![FixAction::Push]);

        let err = sandbox.apply(&p.clone, FixAction::Push).unwrap_err();
        assert_eq!(err.step_id(), Some("push"));
        let meta = sandbox.metadata("tool").expect("push access recorded");
        assert_eq!(meta.push_access, PushAccess::ReadOnly);
        assert_eq!(meta.push_access_remote.as_deref(), Some("origin"));

        let state = sandbox.state(&p.clone);
        let eligible = sandbox.eligible(&state);
        assert!(!eligible.contains(&FixAction::Push));
        assert!(eligible.contains(&FixAction::ForkAndRetarget));

        let after = sandbox.apply(&p.clone, FixAction::ForkAndRetarget).unwrap();
        assert!(after.record.syncable, "{:?}", after.record.unsyncable_reasons);
        assert_eq!(after.record.upstream, "fork/main");
        assert_eq!(
            git_stdout(&p.clone, &["config", "remote.fork.url"]),
            "git@github.com:me/tool.git"
        );
        assert!(sandbox.forge.repo_sync("me", "tool").unwrap().fork);

        let meta = sandbox.metadata("tool").unwrap();
        assert_eq!(meta.preferred_remote.as_deref(), Some("fork"));
        assert_eq!(meta.push_access, PushAccess::Unknown);
    }
}

// =============================================================================
// Abort, ignore and refusals
// =============================================================================

mod misc {
    use super::*;

    #[test]
    fn abort_operation_clears_merge() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        run_git(&p.clone, &["checkout", "-b", "other"]);
        commit_file(&p.clone, "README.md", "# other\n", "Other edit");
        run_git(&p.clone, &["checkout", "main"]);
        commit_file(&p.clone, "README.md", "# main\n", "Main edit");
        let merged = Command::new("git")
            .args(["merge", "other"])
            .current_dir(&p.clone)
            .output()
            .unwrap();
        assert!(!merged.status.success());

        let state = sandbox.state(&p.clone);
        assert_eq!(state.record.operation, OperationInProgress::Merge);
        assert_eq!(sandbox.eligible(&state), vec![FixAction::AbortOperation]);

        let after = sandbox.apply(&p.clone, FixAction::AbortOperation).unwrap();
        assert_eq!(after.record.operation, OperationInProgress::None);
        assert!(!after
            .record
            .unsyncable_reasons
            .contains(UnsyncableReason::OperationInProgress));
    }

    #[test]
    fn ignore_changes_nothing() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        fs::write(p.clone.join("README.md"), "# edited\n").unwrap();
        sandbox.refresh();

        let mut observer = RecordingObserver::new();
        let state = sandbox
            .engine()
            .apply_fix_action_with_observer(
                &[],
                &p.clone,
                FixAction::Ignore,
                &FixOptions::default(),
                Some(&mut observer),
            )
            .unwrap();

        assert!(state.record.has_dirty_tracked);
        assert_eq!(observer.statuses(), vec![("revalidate-state", "skipped")]);
        assert_eq!(git_stdout(&p.clone, &["rev-list", "--count", "HEAD"]), "1");
    }

    #[test]
    fn ineligible_action_is_refused() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        sandbox.refresh();

        let err = sandbox.apply(&p.clone, FixAction::Push).unwrap_err();
        match err {
            FixError::Ineligible { action, reason, .. } => {
                assert_eq!(action, FixAction::Push);
                assert_eq!(reason, "no actions are currently eligible");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_path_is_not_found() {
        let sandbox = Sandbox::new();
        sandbox.local("scratch");
        sandbox.refresh();

        let missing = sandbox.dir.path().join("work").join("missing");
        let err = sandbox.apply(&missing, FixAction::Ignore).unwrap_err();
        assert!(matches!(err, FixError::Resolve(_)), "{err}");
    }

    #[test]
    fn invalid_options_are_rejected_before_anything_runs() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        commit_file(&p.clone, "lib.rs", "fn main() {}\n", "Add lib");
        sandbox.refresh();

        let options = FixOptions {
            commit_message: Some("nope".to_string()),
            ..Default::default()
        };
        let err = sandbox
            .engine()
            .apply_fix_action(&[], &p.clone, FixAction::Push, &options)
            .unwrap_err();
        assert!(matches!(err, FixError::InvalidOptions { .. }));
        assert_ne!(
            git_stdout(&p.bare, &["rev-parse", "main"]),
            git_stdout(&p.clone, &["rev-parse", "HEAD"])
        );
    }
}

// =============================================================================
// Sync trials
// =============================================================================

#[cfg(unix)]
mod sync_trials {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn leave_hooks_and_rerere_state_alone() {
        let sandbox = Sandbox::new();
        let p = sandbox.published("me", "app");
        run_git(&p.clone, &["config", "rerere.enabled", "true"]);

        let marker = sandbox.dir.path().join("post-checkout.log");
        let hook = p.clone.join(".git").join("hooks").join("post-checkout");
        fs::create_dir_all(hook.parent().unwrap()).unwrap();
        fs::write(
            &hook,
            format!("#!/bin/sh\necho \"$@\" >> '{}'\n", marker.display()),
        )
        .unwrap();
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).unwrap();

        commit_file(&p.seed, "README.md", "# theirs\n", "Upstream edit");
        run_git(&p.seed, &["push"]);
        commit_file(&p.clone, "README.md", "# ours\n", "Local edit");
        run_git(&p.clone, &["fetch"]);
        let head = git_stdout(&p.clone, &["rev-parse", "HEAD"]);

        let state = sandbox.state(&p.clone);
        assert!(state.feasibility.checked);
        assert!(state
            .record
            .unsyncable_reasons
            .contains(UnsyncableReason::SyncConflict));

        assert!(
            !marker.exists(),
            "post-checkout ran: {}",
            fs::read_to_string(&marker).unwrap_or_default()
        );
        assert!(!p.clone.join(".git").join("rr-cache").exists());
        assert_eq!(git_stdout(&p.clone, &["rev-parse", "HEAD"]), head);
        assert_eq!(git_stdout(&p.clone, &["status", "--porcelain"]), "");
        assert_eq!(
            git_stdout(&p.clone, &["worktree", "list", "--porcelain"])
                .lines()
                .filter(|l| l.starts_with("worktree "))
                .count(),
            1
        );
    }
}

// =============================================================================
// Revalidation and locking
// =============================================================================

mod revalidation {
    use super::*;

    fn dirty_scratch(sandbox: &Sandbox) -> PathBuf {
        let path = sandbox.local("scratch");
        fs::write(path.join("README.md"), "# changed\n").unwrap();
        sandbox.refresh();
        path
    }

    #[test]
    fn falls_back_to_a_full_rescan() {
        let sandbox = Sandbox::new();
        let path = dirty_scratch(&sandbox);

        // The pre-action observation passes; the targeted revalidation does not.
        let git = FlakyGit::new(&path).vanish_after(1, 1);
        let mut observer = RecordingObserver::new();
        let after = sandbox
            .engine_with(&git)
            .apply_fix_action_with_observer(
                &[],
                &path,
                FixAction::StageCommitPush,
                &FixOptions::default(),
                Some(&mut observer),
            )
            .unwrap();

        assert_eq!(after.record.path, path);
        assert!(!after.record.is_dirty());
        assert!(observer.statuses().contains(&("revalidate-state", "done")));

        let states = sandbox
            .engine()
            .load_fix_repos(&[], RefreshMode::Never)
            .unwrap();
        assert_eq!(states.len(), 1);
        assert!(!states[0].record.is_dirty());
    }

    #[test]
    fn fails_when_the_rescan_cannot_find_the_repository() {
        let sandbox = Sandbox::new();
        let path = dirty_scratch(&sandbox);

        let git = FlakyGit::new(&path).vanish_after(1, u32::MAX);
        let mut observer = RecordingObserver::new();
        let err = sandbox
            .engine_with(&git)
            .apply_fix_action_with_observer(
                &[],
                &path,
                FixAction::StageCommitPush,
                &FixOptions::default(),
                Some(&mut observer),
            )
            .unwrap_err();

        match &err {
            FixError::Revalidation { path: failed, message } => {
                assert_eq!(failed, &path);
                assert!(message.contains("missing after rescan"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(observer.statuses().contains(&("revalidate-state", "failed")));
        // The commit itself is not undone.
        assert_eq!(git_stdout(&path, &["rev-list", "--count", "HEAD"]), "2");
    }
}

mod locking {
    use super::*;

    fn is_locked(err: &FixError) -> bool {
        matches!(err, FixError::Store(StoreError::Lock(LockError::AlreadyLocked)))
    }

    #[test]
    fn load_and_apply_refuse_while_another_holder_has_the_lock() {
        let sandbox = Sandbox::new();
        let path = sandbox.local("scratch");
        sandbox.refresh();

        let held = sandbox.store.lock().unwrap();

        let err = sandbox
            .engine()
            .load_fix_repos(&[], RefreshMode::Always)
            .unwrap_err();
        assert!(is_locked(&err), "{err}");

        let err = sandbox.apply(&path, FixAction::Ignore).unwrap_err();
        assert!(is_locked(&err), "{err}");

        drop(held);
        assert_eq!(sandbox.refresh().len(), 1);
    }
}
