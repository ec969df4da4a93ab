//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! repofleet has a single user-level configuration file describing the
//! machine, its catalogs, GitHub settings and sync/fix defaults.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. CLI flags (not handled here)
//!
//! # Locations
//!
//! Searched in order:
//! 1. `$REPOFLEET_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/repofleet/config.toml`
//! 3. `~/.repofleet/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use repofleet::core::config::Config;
//!
//! let result = Config::load().unwrap();
//! let config = result.config;
//!
//! for catalog in config.catalogs() {
//!     println!("{} -> {}", catalog.name, catalog.root.display());
//! }
//! println!("Strategy: {}", config.sync_strategy());
//! ```

pub mod schema;

pub use schema::{CatalogConfig, FixConfig, GitHubConfig, GlobalConfig, SyncConfig};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::metadata::Visibility;
use crate::core::types::SyncStrategy;
use crate::forge::RemoteProtocol;

/// Default GitHub REST endpoint.
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// Commit message used when none (or `auto`) is given.
pub const DEFAULT_CHECKPOINT_MESSAGE: &str = "repofleet: checkpoint";

/// Snapshot age after which `if-stale` refreshes it.
pub const DEFAULT_STALE_AFTER_SECS: u64 = 15 * 60;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents.
    pub global: GlobalConfig,
    /// Path the file was loaded from, if any.
    path: Option<PathBuf>,
}

impl Config {
    /// Wrap an already-parsed config.
    pub fn from_global(global: GlobalConfig) -> Self {
        Self { global, path: None }
    }

    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// fails validation. A missing file is not an error (defaults are used).
    pub fn load() -> Result<ConfigLoadResult, ConfigError> {
        match Self::find_global()? {
            Some(path) => Self::load_from(&path),
            None => Ok(ConfigLoadResult {
                config: Config::default(),
                warnings: Vec::new(),
            }),
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<ConfigLoadResult, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let global: GlobalConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        global.validate()?;

        let warnings = global
            .catalogs
            .iter()
            .filter(|c| !c.root.is_dir())
            .map(|c| ConfigWarning {
                message: format!(
                    "catalog '{}' root '{}' does not exist",
                    c.name,
                    c.root.display()
                ),
                path: path.to_path_buf(),
            })
            .collect();

        Ok(ConfigLoadResult {
            config: Config {
                global,
                path: Some(path.to_path_buf()),
            },
            warnings,
        })
    }

    /// Locate the global config file.
    fn find_global() -> Result<Option<PathBuf>, ConfigError> {
        // 1. $REPOFLEET_CONFIG
        if let Ok(path) = std::env::var("REPOFLEET_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        // 2. $XDG_CONFIG_HOME/repofleet/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("repofleet/config.toml");
            if path.exists() {
                return Ok(Some(path));
            }
        }

        // 3. ~/.repofleet/config.toml
        let path = Self::global_config_path()?;
        if path.exists() {
            return Ok(Some(path));
        }

        Ok(None)
    }

    /// Get the canonical path for the global config.
    ///
    /// Returns `~/.repofleet/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".repofleet/config.toml"))
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Machine id.
    ///
    /// Defaults to `$HOSTNAME`, then "local".
    pub fn machine(&self) -> String {
        self.global
            .machine
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
            .unwrap_or_else(|| "local".to_string())
    }

    /// Configured catalogs.
    pub fn catalogs(&self) -> &[CatalogConfig] {
        &self.global.catalogs
    }

    /// Look up a catalog by name.
    pub fn catalog(&self, name: &str) -> Option<&CatalogConfig> {
        self.global.catalogs.iter().find(|c| c.name == name)
    }

    /// The default catalog.
    ///
    /// Defaults to the first configured catalog.
    pub fn default_catalog(&self) -> Option<&str> {
        self.global
            .default_catalog
            .as_deref()
            .or_else(|| self.global.catalogs.first().map(|c| c.name.as_str()))
    }

    /// State directory override, if configured.
    pub fn state_dir(&self) -> Option<&Path> {
        self.global.state_dir.as_deref()
    }

    /// GitHub owner for new repositories and forks.
    pub fn github_owner(&self) -> Option<&str> {
        self.global.github.as_ref().and_then(|g| g.owner.as_deref())
    }

    /// Remote URL protocol.
    ///
    /// Defaults to SSH.
    pub fn remote_protocol(&self) -> RemoteProtocol {
        self.global
            .github
            .as_ref()
            .and_then(|g| g.protocol.as_deref())
            .and_then(RemoteProtocol::parse)
            .unwrap_or_default()
    }

    /// GitHub REST API base.
    pub fn github_api_base(&self) -> &str {
        self.global
            .github
            .as_ref()
            .and_then(|g| g.api_base.as_deref())
            .unwrap_or(DEFAULT_GITHUB_API)
    }

    /// Visibility for new repositories.
    ///
    /// Defaults to private.
    pub fn default_visibility(&self) -> Visibility {
        self.global
            .github
            .as_ref()
            .and_then(|g| g.visibility.as_deref())
            .and_then(Visibility::parse)
            .unwrap_or(Visibility::Private)
    }

    /// Strategy for diverged branches.
    ///
    /// Defaults to rebase.
    pub fn sync_strategy(&self) -> SyncStrategy {
        self.global
            .sync
            .as_ref()
            .and_then(|s| s.strategy.as_deref())
            .and_then(SyncStrategy::parse)
            .unwrap_or_default()
    }

    /// Whether fetches prune.
    ///
    /// Defaults to `true`.
    pub fn fetch_prune(&self) -> bool {
        self.global
            .sync
            .as_ref()
            .and_then(|s| s.fetch_prune)
            .unwrap_or(true)
    }

    /// Snapshot staleness threshold.
    pub fn stale_after(&self) -> chrono::Duration {
        let secs = self
            .global
            .sync
            .as_ref()
            .and_then(|s| s.stale_after_secs)
            .unwrap_or(DEFAULT_STALE_AFTER_SECS);
        let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
        chrono::Duration::seconds(secs)
    }

    /// Default checkpoint commit message.
    pub fn commit_message(&self) -> &str {
        self.global
            .fix
            .as_ref()
            .and_then(|f| f.commit_message.as_deref())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_CHECKPOINT_MESSAGE)
    }

    /// Get the path to the loaded config file.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// GitHub token from `GITHUB_TOKEN`, then `GH_TOKEN`.
pub fn github_token_from_env() -> Option<String> {
    ["GITHUB_TOKEN", "GH_TOKEN"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty())
}
