//! fix::error
//!
//! Error types for the fix engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::naming::NamingError;
use crate::core::store::StoreError;
use crate::forge::ForgeError;
use crate::git::GitError;
use crate::scan::ScanError;

use super::action::FixAction;
use super::resolve::ResolveError;

/// Errors from loading, resolving or applying a fix.
#[derive(Debug, Error)]
pub enum FixError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Git(#[from] GitError),

    /// An option was supplied that the action does not use.
    #[error("invalid options for {action}: {message}")]
    InvalidOptions { action: FixAction, message: String },

    /// The action is not in the eligible set for the repository's current
    /// state. Re-evaluate and choose another action.
    #[error("{action} is not eligible for {repo}: {reason}")]
    Ineligible {
        action: FixAction,
        repo: String,
        reason: String,
    },

    #[error("no GitHub owner configured (set `owner` under [github] in the config file)")]
    MissingOwner,

    /// A step failed. Earlier steps stay applied.
    #[error("step '{step_id}' failed ({summary}): {source}")]
    StepFailed {
        step_id: &'static str,
        summary: String,
        #[source]
        source: StepError,
    },

    /// Targeted revalidation and the full-rescan fallback both failed.
    #[error("cannot revalidate {path}: {message}")]
    Revalidation { path: PathBuf, message: String },
}

impl FixError {
    /// Id of the failed step, if this is a step failure.
    pub fn step_id(&self) -> Option<&'static str> {
        match self {
            FixError::StepFailed { step_id, .. } => Some(*step_id),
            _ => None,
        }
    }
}

/// Why a single step failed.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Forge(#[from] ForgeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// State changed underneath the action.
    #[error("{0}")]
    Precondition(String),
}
