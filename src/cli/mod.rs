//! cli
//!
//! Command-line interface layer for repofleet.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Initialize logging
//! - Delegate to command handlers
//! - Does NOT touch repositories directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::fix`] engine, which owns locking, git access and persistence.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;

use anyhow::Result;

use crate::ui::output::Verbosity;

/// Flags shared by every command handler.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Explicit config file.
    pub config: Option<PathBuf>,
    pub debug: bool,
    pub quiet: bool,
    pub interactive: bool,
}

impl Context {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }
}

/// Run the CLI application and return the process exit code.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<u8> {
    let cli = Cli::parse_args();
    crate::telemetry::init(cli.debug, cli.quiet);

    let ctx = Context {
        config: cli.config.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
        interactive: cli.interactive(),
    };

    commands::dispatch(cli.command, &ctx)
}
