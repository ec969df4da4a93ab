//! forge
//!
//! Abstraction for the repository hosting service.
//!
//! # Architecture
//!
//! The `Forge` trait defines the interface the fix engine uses to create
//! repositories, fork them and classify push access. Callers depend on the
//! trait; [`github::GitHubForge`] is the production implementation and
//! [`mock::MockForge`] backs tests.
//!
//! - Forge operations run only after local eligibility checks pass
//! - Forge results are written only to cached metadata fields
//! - Nothing created on the forge is deleted when a later step fails
//!
//! # Modules
//!
//! - `traits`: Core `Forge` trait and request/response types
//! - [`github`]: GitHub implementation using the REST API
//! - [`mock`]: Mock implementation for deterministic testing
//! - `url`: Remote URL construction and parsing

pub mod github;
pub mod mock;
mod traits;
mod url;

pub use traits::*;
pub use url::{parse_github_remote, remote_url, same_github_repo, RemoteProtocol};
