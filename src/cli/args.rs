//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Use this config file
//! - `--debug`: Enable debug logging
//! - `--interactive` / `--no-interactive`: Control prompts
//! - `--quiet` / `-q`: Minimal output

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::core::metadata::Visibility;
use crate::fix::{FixAction, RefreshMode};

/// repofleet - keep a fleet of local git clones syncable
#[derive(Parser, Debug)]
#[command(name = "repofleet")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output; implies --no-interactive
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable interactive prompts
    #[arg(long = "interactive", global = true, conflicts_with = "no_interactive")]
    pub interactive_flag: bool,

    /// Disable interactive prompts
    #[arg(long, global = true)]
    pub no_interactive: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Determine if interactive mode is enabled.
    ///
    /// Returns true if:
    /// - `--interactive` was explicitly set, OR
    /// - Neither `--no-interactive` nor `--quiet` was set AND stdin is a TTY
    pub fn interactive(&self) -> bool {
        if self.interactive_flag {
            true
        } else if self.no_interactive || self.quiet {
            false
        } else {
            std::io::stdin().is_terminal()
        }
    }
}

fn parse_visibility(s: &str) -> Result<Visibility, String> {
    Visibility::parse(s).ok_or_else(|| format!("invalid visibility '{}' (expected public or private)", s))
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Explain and fix unsyncable repositories
    #[command(
        name = "fix",
        long_about = "Explain and fix unsyncable repositories.\n\n\
            Without a selector, lists every unsyncable repository with the actions \
            currently safe to apply. With a selector (path, repo key or short name) \
            and no --action, lists the eligible actions for that repository and why \
            the others are blocked. With --action, applies it step by step and \
            revalidates the repository afterwards.",
        after_help = "\
WORKFLOW EXAMPLES:
    # What is wrong across the fleet, and what can be done
    repofleet fix

    # Actions for one repository
    repofleet fix work/tool

    # Preview the steps of an action
    repofleet fix work/tool --action stage-commit-push --dry-run

    # Commit everything with a message and push
    repofleet fix work/tool --action stage-commit-push --message \"wip\" --yes

    # Publish a local-only repository as a private GitHub repository
    repofleet fix ./scratch --action create-project --visibility private

EXIT STATUS:
    0   action applied and the repository is syncable
    2   action applied but the repository is still unsyncable
    1   the action could not be applied"
    )]
    Fix {
        /// Path, repo key or short name of the repository
        selector: Option<String>,

        /// Action to apply
        #[arg(long, short = 'a', value_name = "ACTION")]
        action: Option<FixAction>,

        /// Commit message for stage-commit-push ("auto" uses the configured default)
        #[arg(long, short = 'm')]
        message: Option<String>,

        /// Repository name for create-project (sanitized)
        #[arg(long, value_name = "NAME")]
        project_name: Option<String>,

        /// Visibility for create-project
        #[arg(long, value_parser = parse_visibility, value_name = "public|private")]
        visibility: Option<Visibility>,

        /// Pattern to add to .gitignore before staging (repeatable)
        #[arg(long = "gitignore", value_name = "PATTERN")]
        gitignore: Vec<String>,

        /// Skip the fetch before sync-with-upstream / pull-ff-only
        #[arg(long)]
        no_fetch: bool,

        /// Restrict to these catalogs (repeatable)
        #[arg(long = "catalog", value_name = "NAME")]
        catalogs: Vec<String>,

        /// When to rescan catalogs before loading
        #[arg(long, default_value = "if-stale", value_name = "never|if-stale|always")]
        refresh: RefreshMode,

        /// Show the steps without running them
        #[arg(long)]
        dry_run: bool,

        /// Machine-readable output
        #[arg(long)]
        list: bool,

        /// Do not ask for confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Show repositories and why they are unsyncable
    #[command(
        name = "status",
        after_help = "\
WORKFLOW EXAMPLES:
    # Use the stored snapshot, rescanning when it is stale
    repofleet status

    # Force a rescan of one catalog
    repofleet status --catalog work --refresh always"
    )]
    Status {
        /// Restrict to these catalogs (repeatable)
        #[arg(long = "catalog", value_name = "NAME")]
        catalogs: Vec<String>,

        /// When to rescan catalogs before loading
        #[arg(long, default_value = "if-stale", value_name = "never|if-stale|always")]
        refresh: RefreshMode,

        /// Only list unsyncable repositories
        #[arg(long)]
        unsyncable: bool,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
INSTALLATION:
    # Bash
    repofleet completion bash > ~/.local/share/bash-completion/completions/repofleet

    # Zsh
    repofleet completion zsh > ~/.zfunc/_repofleet

    # Fish
    repofleet completion fish > ~/.config/fish/completions/repofleet.fish

    # PowerShell
    repofleet completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion generation.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}
