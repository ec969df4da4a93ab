//! core::ops::lock
//!
//! Exclusive fleet lock.
//!
//! # Architecture
//!
//! The fleet lock ensures only one repofleet process loads, mutates and
//! persists fleet state at a time. It is machine-scoped: fix, scan and sync
//! all contend for the same `<state dir>/lock` file.
//!
//! # Invariants
//!
//! - Lock must be held for an entire load-modify-persist cycle
//! - Lock is automatically released on drop, including during unwinding
//! - Lock acquisition is non-blocking (fails fast if locked)
//!
//! # Example
//!
//! ```no_run
//! use repofleet::core::ops::lock::FleetLock;
//! use repofleet::core::paths::FleetPaths;
//! use std::path::PathBuf;
//!
//! let paths = FleetPaths::new(PathBuf::from("/tmp/repofleet-state"));
//! let lock = FleetLock::acquire(&paths).unwrap();
//!
//! // Perform operations while holding lock
//!
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::FleetPaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("fleet state is locked by another repofleet process")]
    AlreadyLocked,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on the fleet state.
///
/// Released when dropped.
#[derive(Debug)]
pub struct FleetLock {
    path: PathBuf,
    /// `Some` while the lock is held.
    file: Option<File>,
}

impl FleetLock {
    /// Attempt to acquire the fleet lock.
    ///
    /// Uses OS-level file locking via `fs2`, which works across processes.
    /// Non-blocking: if another process holds the lock this returns
    /// [`LockError::AlreadyLocked`] immediately.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &FleetPaths) -> Result<Self, LockError> {
        fs::create_dir_all(&paths.root).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", paths.root.display(), e))
        })?;

        let path = paths.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "acquired fleet lock");
                Ok(Self {
                    path,
                    file: Some(file),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Try to acquire the lock, returning `None` if already held.
    pub fn try_acquire(paths: &FleetPaths) -> Result<Option<Self>, LockError> {
        match Self::acquire(paths) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether this guard still holds the lock.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock before the guard goes out of scope.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
            tracing::debug!(path = %self.path.display(), "released fleet lock");
        }
        Ok(())
    }
}

impl Drop for FleetLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
