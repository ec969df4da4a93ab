//! core::store
//!
//! Persistent fleet state: the machine snapshot and per-repository metadata.
//!
//! # Architecture
//!
//! [`StateStore`] is the narrow interface the fix engine and scanner consume.
//! [`FileStateStore`] implements it with one JSON document per artifact under
//! the [`FleetPaths`] state directory. Every write goes to a temp file in the
//! same directory and is renamed into place, so a reader never observes a
//! half-written document.
//!
//! Writers are expected to hold the [`FleetLock`] for the whole
//! load-modify-persist cycle; the store itself does not lock per call.
//!
//! # Example
//!
//! ```no_run
//! use repofleet::core::paths::FleetPaths;
//! use repofleet::core::store::{FileStateStore, StateStore};
//! use std::path::PathBuf;
//!
//! let store = FileStateStore::new(FleetPaths::new(PathBuf::from("/tmp/state")));
//! let _lock = store.lock().unwrap();
//! if let Some(snapshot) = store.load_snapshot("laptop").unwrap() {
//!     println!("{} repositories", snapshot.repos.len());
//! }
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::metadata::{parse_metadata, MetadataError, RepoMetadata};
use crate::core::ops::lock::{FleetLock, LockError};
use crate::core::paths::FleetPaths;
use crate::core::record::RepositoryRecord;
use crate::core::types::RepoKey;

/// Current snapshot schema version.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Errors from state store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to serialize: {0}")]
    SerializeError(String),

    #[error("unsupported snapshot schema version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid metadata in '{path}': {source}")]
    Metadata {
        path: PathBuf,
        source: MetadataError,
    },

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// The persisted set of repository records observed on one machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    /// Always [`SNAPSHOT_SCHEMA_VERSION`].
    pub schema_version: u32,
    /// Machine id.
    pub machine: String,
    /// When the snapshot was last (re)built.
    pub refreshed_at: DateTime<Utc>,
    /// Observed repositories.
    #[serde(default)]
    pub repos: Vec<RepositoryRecord>,
}

impl MachineSnapshot {
    /// Create a snapshot stamped now.
    pub fn new(machine: impl Into<String>, repos: Vec<RepositoryRecord>) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            machine: machine.into(),
            refreshed_at: Utc::now(),
            repos,
        }
    }

    /// Whether the snapshot is older than `max_age` at `now`.
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.refreshed_at) > max_age
    }

    /// Find a record by working-tree path.
    pub fn find_by_path(&self, path: &Path) -> Option<&RepositoryRecord> {
        self.repos.iter().find(|r| r.path == path)
    }

    /// Replace the record with the same path, or append it.
    pub fn upsert(&mut self, record: RepositoryRecord) {
        match self.repos.iter_mut().find(|r| r.path == record.path) {
            Some(slot) => *slot = record,
            None => self.repos.push(record),
        }
    }
}

/// Storage interface for fleet state.
pub trait StateStore {
    /// Storage locations.
    fn paths(&self) -> &FleetPaths;

    /// Acquire the exclusive fleet lock.
    fn lock(&self) -> Result<FleetLock, StoreError> {
        Ok(FleetLock::acquire(self.paths())?)
    }

    /// Load a machine snapshot, `None` if none was saved yet.
    fn load_snapshot(&self, machine: &str) -> Result<Option<MachineSnapshot>, StoreError>;

    /// Persist a machine snapshot.
    fn save_snapshot(&self, snapshot: &MachineSnapshot) -> Result<(), StoreError>;

    /// Load metadata for one repository.
    fn load_metadata(&self, key: &RepoKey) -> Result<Option<RepoMetadata>, StoreError>;

    /// Persist metadata for one repository.
    fn save_metadata(&self, metadata: &RepoMetadata) -> Result<(), StoreError>;

    /// Load every stored metadata document.
    fn list_metadata(&self) -> Result<Vec<RepoMetadata>, StoreError>;
}

/// JSON-file backed [`StateStore`].
#[derive(Debug, Clone)]
pub struct FileStateStore {
    paths: FleetPaths,
}

impl FileStateStore {
    /// Create a store over a state directory.
    pub fn new(paths: FleetPaths) -> Self {
        Self { paths }
    }

    fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::ReadError {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    fn read_metadata_file(path: &Path) -> Result<Option<RepoMetadata>, StoreError> {
        match Self::read_optional(path)? {
            Some(json) => parse_metadata(&json)
                .map(Some)
                .map_err(|e| StoreError::Metadata {
                    path: path.to_path_buf(),
                    source: e,
                }),
            None => Ok(None),
        }
    }
}

impl StateStore for FileStateStore {
    fn paths(&self) -> &FleetPaths {
        &self.paths
    }

    fn load_snapshot(&self, machine: &str) -> Result<Option<MachineSnapshot>, StoreError> {
        let path = self.paths.snapshot_path(machine);
        let Some(json) = Self::read_optional(&path)? else {
            return Ok(None);
        };
        let snapshot: MachineSnapshot =
            serde_json::from_str(&json).map_err(|e| StoreError::ParseError {
                path: path.clone(),
                message: e.to_string(),
            })?;
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(StoreError::UnsupportedVersion(snapshot.schema_version));
        }
        Ok(Some(snapshot))
    }

    fn save_snapshot(&self, snapshot: &MachineSnapshot) -> Result<(), StoreError> {
        let path = self.paths.snapshot_path(&snapshot.machine);
        write_json_atomic(&path, snapshot)?;
        tracing::debug!(
            machine = %snapshot.machine,
            repos = snapshot.repos.len(),
            "saved machine snapshot"
        );
        Ok(())
    }

    fn load_metadata(&self, key: &RepoKey) -> Result<Option<RepoMetadata>, StoreError> {
        Self::read_metadata_file(&self.paths.metadata_path(key))
    }

    fn save_metadata(&self, metadata: &RepoMetadata) -> Result<(), StoreError> {
        let path = self.paths.metadata_path(&metadata.repo_key);
        write_json_atomic(&path, metadata)?;
        tracing::debug!(repo = %metadata.repo_key, "saved repo metadata");
        Ok(())
    }

    fn list_metadata(&self) -> Result<Vec<RepoMetadata>, StoreError> {
        let dir = self.paths.metadata_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::ReadError {
                    path: dir,
                    source: e,
                })
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::ReadError {
                path: dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut all = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(meta) = Self::read_metadata_file(&path)? {
                all.push(meta);
            }
        }
        Ok(all)
    }
}

/// Write a JSON document atomically (temp file, fsync, rename).
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let contents =
        serde_json::to_vec_pretty(value).map_err(|e| StoreError::SerializeError(e.to_string()))?;

    let temp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp_path).map_err(|e| StoreError::WriteError {
        path: temp_path.clone(),
        source: e,
    })?;
    file.write_all(&contents)
        .and_then(|()| file.sync_all())
        .map_err(|e| StoreError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

    fs::rename(&temp_path, path).map_err(|e| StoreError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}
