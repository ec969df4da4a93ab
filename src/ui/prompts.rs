//! ui::prompts
//!
//! Interactive confirmation.
//!
//! # Design
//!
//! Prompts are only shown in interactive mode. In non-interactive mode,
//! operations requiring user input must either have defaults or fail
//! with a clear error message.

use std::io::{self, BufRead, Write};

use thiserror::Error;

/// Errors from prompts.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("not in interactive mode")]
    NotInteractive,

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Prompt for confirmation (yes/no) on stdin.
///
/// An empty answer or end of input takes `default`.
pub fn confirm(message: &str, default: bool, interactive: bool) -> Result<bool, PromptError> {
    if !interactive {
        return Err(PromptError::NotInteractive);
    }
    let stdin = io::stdin();
    confirm_from(message, default, &mut stdin.lock(), &mut io::stderr())
}

fn confirm_from(
    message: &str,
    default: bool,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<bool, PromptError> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    loop {
        write!(out, "{} {} ", message, hint)?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(default);
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "" => return Ok(default),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => writeln!(out, "please answer y or n")?,
        }
    }
}
