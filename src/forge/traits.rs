//! forge::traits
//!
//! Forge trait definition for the hosting service.
//!
//! # Design
//!
//! The `Forge` trait is async because forge operations involve network I/O.
//! The fix engine is synchronous and drives it through a current-thread
//! runtime (see [`crate::fix::exec`]).
//!
//! Forge operations are not revertible: a repository or fork created by an
//! earlier step is never deleted when a later step fails.
//!
//! # Example
//!
//! ```ignore
//! use repofleet::forge::{CreateRepoRequest, Forge};
//!
//! async fn publish(forge: &dyn Forge) -> Result<(), ForgeError> {
//!     let repo = forge
//!         .create_repo(CreateRepoRequest {
//!             owner: "me".to_string(),
//!             name: "tool".to_string(),
//!             private: true,
//!             description: None,
//!         })
//!         .await?;
//!     println!("created {}", repo.full_name());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::core::metadata::PushAccess;

/// Errors from forge operations.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Authentication is required but not available.
    #[error("authentication required (set GITHUB_TOKEN or GH_TOKEN)")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),
}

/// Request to create a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRepoRequest {
    /// User or organization to create under
    pub owner: String,
    /// Repository name (already sanitized)
    pub name: String,
    /// Create as private
    pub private: bool,
    /// Optional description
    pub description: Option<String>,
}

/// Request to fork a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkRequest {
    /// Owner of the repository being forked
    pub source_owner: String,
    /// Name of the repository being forked
    pub source_name: String,
    /// User or organization receiving the fork
    pub target_owner: String,
}

/// A hosted repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepo {
    pub owner: String,
    pub name: String,
    pub private: bool,
    /// Whether the repository is a fork
    pub fork: bool,
    /// Whether the repository has no content yet
    pub empty: bool,
}

impl RemoteRepo {
    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// The Forge trait for interacting with the hosting service.
///
/// # Error Handling
///
/// - `AuthRequired` / `AuthFailed`: credentials missing or insufficient
/// - `NotFound`: repository or owner does not exist
/// - `RateLimited`: back off and re-run the action
/// - `ApiError`: display the message to the user
/// - `NetworkError`: check connectivity
#[async_trait]
pub trait Forge: Send + Sync {
    /// Forge name (e.g., "github").
    fn name(&self) -> &'static str;

    /// Look up a repository. `Ok(None)` if it does not exist.
    async fn get_repo(&self, owner: &str, name: &str) -> Result<Option<RemoteRepo>, ForgeError>;

    /// Create a repository under an owner.
    ///
    /// # Errors
    ///
    /// - `ApiError` with status 422 if the name is taken
    async fn create_repo(&self, request: CreateRepoRequest) -> Result<RemoteRepo, ForgeError>;

    /// Fork a repository under the target owner.
    ///
    /// Returns the existing fork if the target owner already has one.
    async fn fork_repo(&self, request: ForkRequest) -> Result<RemoteRepo, ForgeError>;

    /// Classify whether the current credentials can push to `owner/name`.
    async fn probe_push_access(&self, owner: &str, name: &str) -> Result<PushAccess, ForgeError>;
}
