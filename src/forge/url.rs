//! forge::url
//!
//! GitHub remote URL construction and parsing.

use std::fmt;

/// Transport used in generated remote URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteProtocol {
    /// `git@github.com:owner/name.git`
    #[default]
    Ssh,
    /// `https://github.com/owner/name.git`
    Https,
}

impl RemoteProtocol {
    /// Parse `ssh` or `https`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssh" => Some(RemoteProtocol::Ssh),
            "https" => Some(RemoteProtocol::Https),
            _ => None,
        }
    }
}

impl fmt::Display for RemoteProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RemoteProtocol::Ssh => "ssh",
            RemoteProtocol::Https => "https",
        })
    }
}

/// Build the remote URL for `owner/name` over `protocol`.
///
/// # Example
///
/// ```
/// use repofleet::forge::{remote_url, RemoteProtocol};
///
/// assert_eq!(
///     remote_url("me", "tool", RemoteProtocol::Ssh),
///     "git@github.com:me/tool.git"
/// );
/// assert_eq!(
///     remote_url("me", "tool", RemoteProtocol::Https),
///     "https://github.com/me/tool.git"
/// );
/// ```
pub fn remote_url(owner: &str, name: &str, protocol: RemoteProtocol) -> String {
    match protocol {
        RemoteProtocol::Ssh => format!("git@github.com:{}/{}.git", owner, name),
        RemoteProtocol::Https => format!("https://github.com/{}/{}.git", owner, name),
    }
}

/// Parse a GitHub remote URL into `(owner, repo)`.
///
/// Handles SCP-style SSH, `ssh://` and HTTPS forms, with or without a
/// `.git` suffix. Returns `None` for other hosts.
///
/// # Example
///
/// ```
/// use repofleet::forge::parse_github_remote;
///
/// assert_eq!(
///     parse_github_remote("git@github.com:octocat/hello.git"),
///     Some(("octocat".to_string(), "hello".to_string()))
/// );
/// assert_eq!(parse_github_remote("https://gitlab.com/a/b.git"), None);
/// ```
pub fn parse_github_remote(url: &str) -> Option<(String, String)> {
    let url = url.trim();
    let rest = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))
        .or_else(|| url.strip_prefix("https://github.com/"))
        .or_else(|| url.strip_prefix("http://github.com/"))?;

    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let (owner, repo) = rest.split_once('/')?;

    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

/// Whether two remote URLs name the same GitHub repository, regardless of
/// protocol, suffix or case.
pub fn same_github_repo(a: &str, b: &str) -> bool {
    match (parse_github_remote(a), parse_github_remote(b)) {
        (Some((oa, ra)), Some((ob, rb))) => {
            oa.eq_ignore_ascii_case(&ob) && ra.eq_ignore_ascii_case(&rb)
        }
        _ => a.trim() == b.trim(),
    }
}
