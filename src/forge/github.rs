//! forge::github
//!
//! GitHub forge implementation using the REST API.
//!
//! # Authentication
//!
//! A static bearer token, normally read from `GITHUB_TOKEN` or `GH_TOKEN`
//! (see [`crate::core::config::github_token_from_env`]). Every call that needs
//! credentials fails with [`ForgeError::AuthRequired`] when no token is set.
//!
//! # Owner resolution
//!
//! Creating a repository or a fork under an organization uses a different
//! endpoint from doing so under the authenticated user. The login of the
//! token's user is fetched once from `GET /user` and cached.
//!
//! # Rate Limiting
//!
//! Returns `ForgeError::RateLimited` when limits are hit. No automatic retry.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::traits::{CreateRepoRequest, Forge, ForgeError, ForkRequest, RemoteRepo};
use crate::core::config::DEFAULT_GITHUB_API;
use crate::core::metadata::PushAccess;

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "repofleet";

/// GitHub forge implementation.
pub struct GitHubForge {
    client: Client,
    token: Option<String>,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
    /// Cached login of the authenticated user
    viewer: Mutex<Option<String>>,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubForge")
            .field("has_token", &self.token.is_some())
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubForge {
    /// Create a forge against `api_base` (trailing slashes are ignored).
    pub fn new(token: Option<String>, api_base: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        Self {
            client: Client::new(),
            token: token.filter(|t| !t.trim().is_empty()),
            api_base: api_base.trim_end_matches('/').to_string(),
            viewer: Mutex::new(None),
        }
    }

    /// Create a forge against public GitHub.
    pub fn public(token: Option<String>) -> Self {
        Self::new(token, DEFAULT_GITHUB_API)
    }

    /// API base URL in use.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Whether a token is configured.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn headers(&self) -> Result<HeaderMap, ForgeError> {
        let token = self.token.as_deref().ok_or(ForgeError::AuthRequired)?;
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ForgeError::AuthFailed("token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    async fn get(&self, path: &str) -> Result<Response, ForgeError> {
        self.client
            .get(self.url(path))
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, ForgeError> {
        self.client
            .post(self.url(path))
            .headers(self.headers()?)
            .json(body)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))
    }

    /// Login of the token's user, fetched once.
    async fn viewer_login(&self) -> Result<String, ForgeError> {
        if let Some(login) = self.cached_viewer() {
            return Ok(login);
        }
        let response = self.get("user").await?;
        let user: GitHubUser = self.handle_response(response).await?;
        if let Ok(mut cached) = self.viewer.lock() {
            *cached = Some(user.login.clone());
        }
        Ok(user.login)
    }

    fn cached_viewer(&self) -> Option<String> {
        self.viewer.lock().ok().and_then(|v| v.clone())
    }

    /// `Some(owner)` when `owner` is an organization rather than the viewer.
    async fn organization_for(&self, owner: &str) -> Result<Option<String>, ForgeError> {
        let viewer = self.viewer_login().await?;
        if viewer.eq_ignore_ascii_case(owner) {
            Ok(None)
        } else {
            Ok(Some(owner.to_string()))
        }
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, ForgeError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            })
        } else {
            self.handle_error_response(response, status).await
        }
    }

    async fn handle_error_response<T>(
        &self,
        response: Response,
        status: StatusCode,
    ) -> Result<T, ForgeError> {
        let required_scopes = response
            .headers()
            .get("X-Accepted-OAuth-Scopes")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.detail(),
            Err(_) => "Unknown error".to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("Invalid or expired token".into()),
            StatusCode::FORBIDDEN => {
                if message.to_ascii_lowercase().contains("rate limit") {
                    ForgeError::RateLimited
                } else {
                    let mut err_msg = format!("Permission denied: {}", message);
                    if let Some(scopes) = required_scopes.filter(|s| !s.is_empty()) {
                        err_msg.push_str(&format!(" [required scopes: {}]", scopes));
                    }
                    ForgeError::AuthFailed(err_msg)
                }
            }
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ if status.is_server_error() => ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl Forge for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn get_repo(&self, owner: &str, name: &str) -> Result<Option<RemoteRepo>, ForgeError> {
        let response = self.get(&format!("repos/{}/{}", owner, name)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let repo: GitHubRepo = self.handle_response(response).await?;
        Ok(Some(repo.into()))
    }

    async fn create_repo(&self, request: CreateRepoRequest) -> Result<RemoteRepo, ForgeError> {
        let body = CreateRepoBody {
            name: &request.name,
            private: request.private,
            description: request.description.as_deref(),
            auto_init: false,
        };

        let path = match self.organization_for(&request.owner).await? {
            Some(org) => format!("orgs/{}/repos", org),
            None => "user/repos".to_string(),
        };

        tracing::debug!(owner = %request.owner, name = %request.name, %path, "creating repository");
        let response = self.post(&path, &body).await?;
        let repo: GitHubRepo = self.handle_response(response).await?;
        Ok(repo.into())
    }

    async fn fork_repo(&self, request: ForkRequest) -> Result<RemoteRepo, ForgeError> {
        let organization = self.organization_for(&request.target_owner).await?;
        let body = ForkBody {
            organization: organization.as_deref(),
        };

        let path = format!("repos/{}/{}/forks", request.source_owner, request.source_name);
        tracing::debug!(
            source = %format!("{}/{}", request.source_owner, request.source_name),
            target = %request.target_owner,
            "forking repository"
        );
        // 202 Accepted; an existing fork is returned as-is.
        let response = self.post(&path, &body).await?;
        let repo: GitHubRepo = self.handle_response(response).await?;
        Ok(repo.into())
    }

    async fn probe_push_access(&self, owner: &str, name: &str) -> Result<PushAccess, ForgeError> {
        let response = self.get(&format!("repos/{}/{}", owner, name)).await?;
        let repo: GitHubRepo = self.handle_response(response).await?;
        Ok(match repo.permissions {
            Some(p) if p.push || p.admin => PushAccess::ReadWrite,
            Some(_) => PushAccess::ReadOnly,
            None => PushAccess::Unknown,
        })
    }
}

// =============================================================================
// GitHub API types
// =============================================================================

#[derive(Serialize)]
struct CreateRepoBody<'a> {
    name: &'a str,
    private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    auto_init: bool,
}

#[derive(Serialize)]
struct ForkBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    organization: Option<&'a str>,
}

#[derive(Deserialize)]
struct GitHubUser {
    login: String,
}

#[derive(Deserialize)]
struct GitHubOwner {
    login: String,
}

#[derive(Deserialize)]
struct GitHubPermissions {
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    push: bool,
}

#[derive(Deserialize)]
struct GitHubRepo {
    name: String,
    owner: GitHubOwner,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    size: u64,
    /// Present only for authenticated requests.
    permissions: Option<GitHubPermissions>,
}

impl From<GitHubRepo> for RemoteRepo {
    fn from(repo: GitHubRepo) -> Self {
        RemoteRepo {
            owner: repo.owner.login,
            name: repo.name,
            private: repo.private,
            fork: repo.fork,
            empty: repo.size == 0,
        }
    }
}

#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
    #[serde(default)]
    errors: Vec<GitHubErrorDetail>,
}

#[derive(Deserialize)]
struct GitHubErrorDetail {
    message: Option<String>,
}

impl GitHubErrorResponse {
    fn detail(self) -> String {
        let details: Vec<String> = self.errors.into_iter().filter_map(|e| e.message).collect();
        if details.is_empty() {
            self.message
        } else {
            format!("{} ({})", self.message, details.join("; "))
        }
    }
}
