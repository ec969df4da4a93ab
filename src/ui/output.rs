//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag.
//! Diagnostics belong in `tracing`; this module is for what the user asked
//! to see.

use std::fmt::Display;

use crate::core::record::RepositoryRecord;
use crate::fix::{FixActionPlanEntry, StepEvent, StepStatus};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print a debug message (only in debug mode).
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print a success message (respects quiet mode).
pub fn success(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Repo key when known, otherwise the path.
pub fn format_repo(record: &RepositoryRecord) -> String {
    match &record.repo_key {
        Some(key) => key.to_string(),
        None => record.path.display().to_string(),
    }
}

/// `ok` or the comma-separated reason codes.
pub fn format_reasons(record: &RepositoryRecord) -> String {
    if record.syncable {
        "ok".to_string()
    } else {
        record.unsyncable_reasons.join()
    }
}

/// Numbered plan preview.
pub fn format_plan(plan: &[FixActionPlanEntry]) -> String {
    plan.iter()
        .enumerate()
        .map(|(i, step)| {
            let kind = if step.is_command { "$" } else { "*" };
            format!("  {}. {} {}", i + 1, kind, step.summary)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One progress line for a step event, `None` for events not worth a line.
pub fn format_step(event: &StepEvent) -> Option<String> {
    match &event.status {
        StepStatus::Running => None,
        StepStatus::Done => Some(format!("  [done]    {}", event.summary)),
        StepStatus::Failed(message) => Some(format!("  [failed]  {}: {}", event.summary, message)),
        StepStatus::Skipped(reason) => Some(format!("  [skipped] {} ({})", event.summary, reason)),
    }
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}
