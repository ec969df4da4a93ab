//! core::naming
//!
//! Hosted repository naming rules.

use thiserror::Error;

/// Longest name GitHub accepts.
pub const MAX_REPO_NAME_LEN: usize = 100;

/// Errors from name sanitization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("'{0}' does not contain any usable characters for a repository name")]
    Empty(String),
}

/// Sanitize a user-supplied project name into a hosted repository name.
///
/// - Lowercase ASCII
/// - Runs of anything other than alphanumerics, `.` and `_` become one `-`
/// - Leading and trailing `-`/`.` are trimmed
/// - Truncated to [`MAX_REPO_NAME_LEN`]
///
/// # Example
///
/// ```
/// use repofleet::core::naming::sanitize_repo_name;
///
/// assert_eq!(sanitize_repo_name("My Cool Tool").unwrap(), "my-cool-tool");
/// assert_eq!(sanitize_repo_name("--dotfiles--").unwrap(), "dotfiles");
/// assert!(sanitize_repo_name("!!!").is_err());
/// ```
pub fn sanitize_repo_name(raw: &str) -> Result<String, NamingError> {
    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;

    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    let trimmed: String = out
        .trim_matches(|c| c == '-' || c == '.')
        .chars()
        .take(MAX_REPO_NAME_LEN)
        .collect();
    let trimmed = trimmed.trim_end_matches(|c| c == '-' || c == '.');

    if trimmed.is_empty() {
        return Err(NamingError::Empty(raw.to_string()));
    }
    Ok(trimmed.to_string())
}
