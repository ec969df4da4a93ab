//! core::paths
//!
//! Centralized path routing for repofleet storage locations.
//!
//! All fleet state lives under a single state directory, shared by every
//! process on the machine (fix, scan, sync). No code outside this module
//! should compute paths under it.
//!
//! # Storage Layout
//!
//! - `lock` - Exclusive fleet lock file
//! - `machines/<machine>.json` - Machine snapshot (repository records)
//! - `metadata/<encoded key>.json` - Per-repository metadata
//!
//! # Location
//!
//! 1. `$REPOFLEET_STATE_DIR` if set
//! 2. `state_dir` from the config file
//! 3. `~/.repofleet/state`
//!
//! # Example
//!
//! ```
//! use repofleet::core::paths::FleetPaths;
//! use std::path::PathBuf;
//!
//! let paths = FleetPaths::new(PathBuf::from("/state"));
//! assert_eq!(paths.lock_path(), PathBuf::from("/state/lock"));
//! assert_eq!(
//!     paths.snapshot_path("laptop"),
//!     PathBuf::from("/state/machines/laptop.json")
//! );
//! ```

use std::path::{Path, PathBuf};

use crate::core::config::{Config, ConfigError};
use crate::core::types::RepoKey;

/// Centralized path routing for fleet state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetPaths {
    /// Root of the state directory.
    pub root: PathBuf,
}

impl FleetPaths {
    /// Create paths rooted at a state directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve the state directory from the environment and config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHomeDir`] when no override is set and the
    /// home directory cannot be determined.
    pub fn resolve(config: &Config) -> Result<Self, ConfigError> {
        if let Ok(dir) = std::env::var("REPOFLEET_STATE_DIR") {
            if !dir.trim().is_empty() {
                return Ok(Self::new(PathBuf::from(dir)));
            }
        }
        if let Some(dir) = config.state_dir() {
            return Ok(Self::new(dir.to_path_buf()));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(Self::new(home.join(".repofleet").join("state")))
    }

    /// Path to the exclusive lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.root.join("lock")
    }

    /// Directory holding machine snapshots.
    pub fn machines_dir(&self) -> PathBuf {
        self.root.join("machines")
    }

    /// Snapshot file for a machine.
    pub fn snapshot_path(&self, machine: &str) -> PathBuf {
        self.machines_dir()
            .join(format!("{}.json", encode_component(machine)))
    }

    /// Directory holding per-repository metadata.
    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join("metadata")
    }

    /// Metadata file for a repository key.
    pub fn metadata_path(&self, key: &RepoKey) -> PathBuf {
        self.metadata_dir()
            .join(format!("{}.json", encode_component(key.as_str())))
    }

    /// Whether a path is inside the state directory.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}

/// Encode a string as a single file-name component.
///
/// ASCII alphanumerics, `-`, `_` and `.` pass through; every other byte is
/// written as `%XX`. The mapping is injective.
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
