//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the fix engine
//! 3. Formats and displays output
//!
//! Handlers do NOT touch repositories directly. Every handler returns the
//! process exit code; hard failures are returned as errors and map to 1.

mod completion;
mod fix;
mod status;

pub use completion::completion;
pub use fix::{fix, FixArgs};
pub use status::status;

use anyhow::{bail, Context as _, Result};

use crate::cli::args::Command;
use crate::cli::Context;
use crate::core::config::{github_token_from_env, Config};
use crate::core::paths::FleetPaths;
use crate::core::store::FileStateStore;
use crate::fix::FixEngine;
use crate::forge::github::GitHubForge;
use crate::git::Git;
use crate::ui::output;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<u8> {
    match command {
        Command::Fix {
            selector,
            action,
            message,
            project_name,
            visibility,
            gitignore,
            no_fetch,
            catalogs,
            refresh,
            dry_run,
            list,
            yes,
        } => fix::fix(
            ctx,
            FixArgs {
                selector,
                action,
                message,
                project_name,
                visibility,
                gitignore,
                no_fetch,
                catalogs,
                refresh,
                dry_run,
                list,
                yes,
            },
        ),
        Command::Status {
            catalogs,
            refresh,
            unsyncable,
        } => status::status(ctx, &catalogs, refresh, unsyncable).map(|()| 0),
        Command::Completion { shell } => completion::completion(shell).map(|()| 0),
    }
}

/// The production collaborators, loaded once per invocation.
pub(crate) struct Fleet {
    pub config: Config,
    pub store: FileStateStore,
    pub git: Git,
    pub forge: GitHubForge,
}

impl Fleet {
    pub fn open(ctx: &Context) -> Result<Self> {
        let loaded = match &ctx.config {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        }
        .context("failed to load configuration")?;

        for warning in &loaded.warnings {
            output::warn(
                format!("{} ({})", warning.message, warning.path.display()),
                ctx.verbosity(),
            );
        }

        let config = loaded.config;
        if config.catalogs().is_empty() {
            match config.loaded_from() {
                Some(path) => bail!("no catalogs configured in {}", path.display()),
                None => bail!(
                    "no config file found; create {} with at least one [[catalogs]] entry",
                    Config::global_config_path()?.display()
                ),
            }
        }

        let paths = FleetPaths::resolve(&config)?;
        output::debug(
            format!("state directory: {}", paths.root.display()),
            ctx.verbosity(),
        );

        let forge = GitHubForge::new(github_token_from_env(), config.github_api_base());
        Ok(Self {
            store: FileStateStore::new(paths),
            git: Git::new(),
            forge,
            config,
        })
    }

    pub fn engine(&self) -> FixEngine<'_> {
        FixEngine::new(&self.config, &self.store, &self.git, &self.forge)
    }
}
