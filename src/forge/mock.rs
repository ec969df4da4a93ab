//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! Repositories live in memory keyed by case-insensitive `owner/name`.
//! Failure scenarios are configured with [`FailOn`] and every call is
//! recorded as a [`MockOperation`].
//!
//! # Example
//!
//! ```
//! use repofleet::forge::mock::MockForge;
//! use repofleet::forge::{CreateRepoRequest, Forge};
//!
//! # tokio_test::block_on(async {
//! let forge = MockForge::new().with_viewer("me");
//!
//! let repo = forge.create_repo(CreateRepoRequest {
//!     owner: "me".to_string(),
//!     name: "tool".to_string(),
//!     private: true,
//!     description: None,
//! }).await.unwrap();
//!
//! assert_eq!(repo.full_name(), "me/tool");
//! assert!(forge.get_repo("me", "tool").await.unwrap().is_some());
//! # });
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::{CreateRepoRequest, Forge, ForgeError, ForkRequest, RemoteRepo};
use crate::core::metadata::PushAccess;

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone)]
pub struct MockForge {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockForgeInner>>,
}

/// Internal mutable state.
#[derive(Debug)]
struct MockForgeInner {
    /// Login of the authenticated user.
    viewer: String,
    /// Stored repositories by lowercase `owner/name`.
    repos: HashMap<String, RemoteRepo>,
    /// Explicit push access by lowercase `owner/name`.
    push_access: HashMap<String, PushAccess>,
    /// Method to fail on (for testing error paths).
    fail_on: Option<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail get_repo with the given error.
    GetRepo(ForgeError),
    /// Fail create_repo with the given error.
    CreateRepo(ForgeError),
    /// Fail fork_repo with the given error.
    ForkRepo(ForgeError),
    /// Fail probe_push_access with the given error.
    ProbePushAccess(ForgeError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    GetRepo {
        owner: String,
        name: String,
    },
    CreateRepo {
        owner: String,
        name: String,
        private: bool,
    },
    ForkRepo {
        source: String,
        target_owner: String,
    },
    ProbePushAccess {
        owner: String,
        name: String,
    },
}

fn repo_key(owner: &str, name: &str) -> String {
    format!("{}/{}", owner, name).to_ascii_lowercase()
}

impl MockForge {
    /// Create a new empty mock forge authenticated as `mock-user`.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockForgeInner {
                viewer: "mock-user".to_string(),
                repos: HashMap::new(),
                push_access: HashMap::new(),
                fail_on: None,
                operations: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockForgeInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the authenticated user's login.
    pub fn with_viewer(self, login: impl Into<String>) -> Self {
        self.state().viewer = login.into();
        self
    }

    /// Add a pre-existing repository.
    pub fn with_repo(self, repo: RemoteRepo) -> Self {
        self.state()
            .repos
            .insert(repo_key(&repo.owner, &repo.name), repo);
        self
    }

    /// Pin the push access reported for `owner/name`.
    pub fn with_push_access(self, owner: &str, name: &str, access: PushAccess) -> Self {
        self.state()
            .push_access
            .insert(repo_key(owner, name), access);
        self
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// # Example
    ///
    /// ```
    /// use repofleet::forge::mock::{MockForge, FailOn};
    /// use repofleet::forge::ForgeError;
    ///
    /// let forge = MockForge::new()
    ///     .fail_on(FailOn::CreateRepo(ForgeError::RateLimited));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.state().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.state().fail_on = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.state().operations.clone()
    }

    /// Get a repository without recording an operation.
    pub fn repo_sync(&self, owner: &str, name: &str) -> Option<RemoteRepo> {
        self.state().repos.get(&repo_key(owner, name)).cloned()
    }

    /// Number of stored repositories.
    pub fn repo_count(&self) -> usize {
        self.state().repos.len()
    }

    fn record(&self, op: MockOperation) {
        self.state().operations.push(op);
    }

    /// Check if we should fail and return the error if so.
    fn check_fail<T>(&self, expected: &str) -> Option<Result<T, ForgeError>> {
        let inner = self.state();
        match &inner.fail_on {
            Some(FailOn::GetRepo(e)) if expected == "get_repo" => Some(Err(e.clone())),
            Some(FailOn::CreateRepo(e)) if expected == "create_repo" => Some(Err(e.clone())),
            Some(FailOn::ForkRepo(e)) if expected == "fork_repo" => Some(Err(e.clone())),
            Some(FailOn::ProbePushAccess(e)) if expected == "probe_push_access" => {
                Some(Err(e.clone()))
            }
            _ => None,
        }
    }
}

impl Default for MockForge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_repo(&self, owner: &str, name: &str) -> Result<Option<RemoteRepo>, ForgeError> {
        self.record(MockOperation::GetRepo {
            owner: owner.to_string(),
            name: name.to_string(),
        });
        if let Some(result) = self.check_fail("get_repo") {
            return result;
        }
        Ok(self.repo_sync(owner, name))
    }

    async fn create_repo(&self, request: CreateRepoRequest) -> Result<RemoteRepo, ForgeError> {
        self.record(MockOperation::CreateRepo {
            owner: request.owner.clone(),
            name: request.name.clone(),
            private: request.private,
        });
        if let Some(result) = self.check_fail("create_repo") {
            return result;
        }

        let mut inner = self.state();
        let key = repo_key(&request.owner, &request.name);
        if inner.repos.contains_key(&key) {
            return Err(ForgeError::ApiError {
                status: 422,
                message: "name already exists on this account".to_string(),
            });
        }

        let repo = RemoteRepo {
            owner: request.owner,
            name: request.name,
            private: request.private,
            fork: false,
            empty: true,
        };
        inner.repos.insert(key, repo.clone());
        Ok(repo)
    }

    async fn fork_repo(&self, request: ForkRequest) -> Result<RemoteRepo, ForgeError> {
        self.record(MockOperation::ForkRepo {
            source: format!("{}/{}", request.source_owner, request.source_name),
            target_owner: request.target_owner.clone(),
        });
        if let Some(result) = self.check_fail("fork_repo") {
            return result;
        }

        let mut inner = self.state();
        let key = repo_key(&request.target_owner, &request.source_name);
        if let Some(existing) = inner.repos.get(&key) {
            return if existing.fork {
                Ok(existing.clone())
            } else {
                Err(ForgeError::ApiError {
                    status: 422,
                    message: format!("{} already exists and is not a fork", existing.full_name()),
                })
            };
        }

        let private = inner
            .repos
            .get(&repo_key(&request.source_owner, &request.source_name))
            .map(|source| source.private)
            .unwrap_or(false);
        let repo = RemoteRepo {
            owner: request.target_owner,
            name: request.source_name,
            private,
            fork: true,
            empty: false,
        };
        inner.repos.insert(key, repo.clone());
        Ok(repo)
    }

    async fn probe_push_access(&self, owner: &str, name: &str) -> Result<PushAccess, ForgeError> {
        self.record(MockOperation::ProbePushAccess {
            owner: owner.to_string(),
            name: name.to_string(),
        });
        if let Some(result) = self.check_fail("probe_push_access") {
            return result;
        }

        let inner = self.state();
        let key = repo_key(owner, name);
        if let Some(access) = inner.push_access.get(&key) {
            return Ok(*access);
        }
        if inner.repos.contains_key(&key) {
            if inner.viewer.eq_ignore_ascii_case(owner) {
                Ok(PushAccess::ReadWrite)
            } else {
                Ok(PushAccess::ReadOnly)
            }
        } else {
            Err(ForgeError::NotFound(format!("{}/{}", owner, name)))
        }
    }
}
