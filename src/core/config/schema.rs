//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order of precedence:
//! 1. `$REPOFLEET_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/repofleet/config.toml`
//! 3. `~/.repofleet/config.toml`
//!
//! # Validation
//!
//! Values are validated after parsing: catalog names must be unique and
//! non-empty, the default catalog must exist, and enumerated strings
//! (protocol, visibility, strategy) must parse.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::metadata::Visibility;
use crate::core::types::SyncStrategy;
use crate::forge::RemoteProtocol;

/// Global configuration.
///
/// # Example
///
/// ```toml
/// machine = "laptop"
/// default_catalog = "work"
///
/// [[catalogs]]
/// name = "work"
/// root = "/home/me/src/work"
/// depth = 2
///
/// [github]
/// owner = "me"
/// protocol = "ssh"
/// visibility = "private"
///
/// [sync]
/// strategy = "rebase"
/// fetch_prune = true
/// stale_after_secs = 900
///
/// [fix]
/// commit_message = "checkpoint"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Machine id the snapshot is stored under.
    pub machine: Option<String>,

    /// Catalog treated as this machine's default.
    pub default_catalog: Option<String>,

    /// Override for the state directory.
    pub state_dir: Option<PathBuf>,

    /// Catalog roots.
    pub catalogs: Vec<CatalogConfig>,

    /// GitHub settings.
    pub github: Option<GitHubConfig>,

    /// Sync defaults.
    pub sync: Option<SyncConfig>,

    /// Fix defaults.
    pub fix: Option<FixConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(machine) = &self.machine {
            if machine.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "machine cannot be empty".to_string(),
                ));
            }
        }

        let mut seen = HashSet::new();
        for catalog in &self.catalogs {
            catalog.validate()?;
            if !seen.insert(catalog.name.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "duplicate catalog '{}'",
                    catalog.name
                )));
            }
        }

        if let Some(default) = &self.default_catalog {
            if !seen.contains(default.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "default catalog '{}' is not configured",
                    default
                )));
            }
        }

        if let Some(github) = &self.github {
            github.validate()?;
        }
        if let Some(sync) = &self.sync {
            sync.validate()?;
        }

        Ok(())
    }
}

/// A named catalog root.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Catalog name.
    pub name: String,

    /// Directory repositories are discovered under.
    pub root: PathBuf,

    /// Directory levels between the root and a repository (default: 1).
    #[serde(default)]
    pub depth: Option<usize>,
}

impl CatalogConfig {
    /// Maximum supported layout depth.
    pub const MAX_DEPTH: usize = 6;

    /// Layout depth with the default applied.
    pub fn depth(&self) -> usize {
        self.depth.unwrap_or(1)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "catalog name cannot be empty".to_string(),
            ));
        }
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue(format!(
                "catalog '{}' has an empty root",
                self.name
            )));
        }
        let depth = self.depth();
        if depth == 0 || depth > Self::MAX_DEPTH {
            return Err(ConfigError::InvalidValue(format!(
                "catalog '{}' depth must be between 1 and {}",
                self.name,
                Self::MAX_DEPTH
            )));
        }
        Ok(())
    }
}

/// GitHub settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubConfig {
    /// User or organization new repositories and forks are created under.
    pub owner: Option<String>,

    /// Remote URL protocol ("ssh" or "https")
    pub protocol: Option<String>,

    /// REST API base URL
    pub api_base: Option<String>,

    /// Visibility for new repositories ("public" or "private")
    pub visibility: Option<String>,
}

impl GitHubConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(owner) = &self.owner {
            if owner.trim().is_empty() || owner.contains('/') {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid github owner '{}'",
                    owner
                )));
            }
        }
        if let Some(protocol) = &self.protocol {
            if RemoteProtocol::parse(protocol).is_none() {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid github protocol '{}', must be one of: ssh, https",
                    protocol
                )));
            }
        }
        if let Some(visibility) = &self.visibility {
            if Visibility::parse(visibility).is_none() {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid visibility '{}', must be one of: public, private",
                    visibility
                )));
            }
        }
        Ok(())
    }
}

/// Sync defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Strategy for diverged branches ("rebase" or "merge")
    pub strategy: Option<String>,

    /// Prune remote-tracking refs when fetching
    pub fetch_prune: Option<bool>,

    /// Snapshot age after which it counts as stale
    pub stale_after_secs: Option<u64>,
}

impl SyncConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(strategy) = &self.strategy {
            if SyncStrategy::parse(strategy).is_none() {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid sync strategy '{}', must be one of: rebase, merge",
                    strategy
                )));
            }
        }
        Ok(())
    }
}

/// Fix defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FixConfig {
    /// Message used when a commit is requested without one
    pub commit_message: Option<String>,
}
