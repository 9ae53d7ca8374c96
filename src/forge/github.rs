//! forge::github
//!
//! GitHub forge implementation using the REST API.
//!
//! # Design
//!
//! This module implements [`TreeFetcher`] and [`CommitSource`] for GitHub:
//! - `GET /repos/{owner}/{repo}/git/trees/{sha}` for one tree level
//! - `GET /repos/{owner}/{repo}/commits?sha={branch}&path={path}` for the
//!   latest commit, sent with `If-None-Match` when a validator is known
//!
//! # Authentication
//!
//! A caller-supplied [`Credential`] is sent as a bearer token. Without one,
//! the configured [`AppCredentials`] pair is sent as HTTP basic auth, which
//! GitHub counts against the application's shared quota. With neither the
//! request goes out unauthenticated.
//!
//! # Rate Limiting
//!
//! Returns `ForgeError::RateLimited` on 429, and on 403 when
//! `x-ratelimit-remaining` is `0`. No automatic retry.
//!
//! # Example
//!
//! ```ignore
//! use trellis::forge::github::{AppCredentials, GitHubForge};
//! use trellis::forge::TreeFetcher;
//!
//! let forge = GitHubForge::new()
//!     .with_app_credentials(AppCredentials::new("Iv1.abc", "secret"));
//! let tree = forge.fetch_tree("octocat", "hello-world", "7fd1a60b", None).await?;
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ETAG, IF_NONE_MATCH, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::traits::{
    CommitQuery, CommitReply, CommitSource, Credential, EntryKind, Forge, ForgeError, Tree,
    TreeEntry, TreeFetcher,
};

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default User-Agent header value for API requests.
pub const DEFAULT_USER_AGENT: &str = "trellis";

/// Shared application credential pair used for anonymous requests.
#[derive(Clone, PartialEq, Eq)]
pub struct AppCredentials {
    client_id: String,
    client_secret: String,
}

impl AppCredentials {
    /// Create an application credential pair.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// The application client id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

// Custom Debug to avoid exposing client_secret
impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// GitHub forge implementation.
pub struct GitHubForge {
    /// HTTP client for making requests
    client: Client,
    /// Shared credentials for requests without a caller credential
    app: Option<AppCredentials>,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
    /// User-Agent sent with every request
    user_agent: String,
}

impl std::fmt::Debug for GitHubForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubForge")
            .field("has_app_credentials", &self.app.is_some())
            .field("api_base", &self.api_base)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for GitHubForge {
    fn default() -> Self {
        Self::new()
    }
}

impl GitHubForge {
    /// Create a forge pointed at `api.github.com` with no shared credentials.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            app: None,
            api_base: DEFAULT_API_BASE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Use a custom API base URL (e.g., `https://github.example.com/api/v3`).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Use an application credential pair for anonymous requests.
    pub fn with_app_credentials(mut self, app: AppCredentials) -> Self {
        self.app = Some(app);
        self
    }

    /// Override the User-Agent header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// The API base URL in use.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Whether anonymous requests carry the application credentials.
    pub fn has_app_credentials(&self) -> bool {
        self.app.is_some()
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, owner: &str, repo: &str, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_base, owner, repo, path)
    }

    /// Common headers for API requests.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Ok(value) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, value);
        } else {
            headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        }
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers
    }

    /// Start a GET request with headers and the right authorization attached.
    fn get(&self, url: &str, credential: Option<&Credential>) -> RequestBuilder {
        let request = self.client.get(url).headers(self.headers());
        match (credential, &self.app) {
            (Some(credential), _) => request.bearer_auth(credential.token()),
            (None, Some(app)) => request.basic_auth(&app.client_id, Some(&app.client_secret)),
            (None, None) => request,
        }
    }

    /// Send a request, mapping transport failures.
    async fn send(request: RequestBuilder) -> Result<Response, ForgeError> {
        request
            .send()
            .await
            .map_err(|e| ForgeError::Network(e.to_string()))
    }

    /// Map a non-success response to a [`ForgeError`].
    async fn error_from_response(response: Response) -> ForgeError {
        let status = response.status();
        let rate_exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0");

        // Try to get error message from body
        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        match status {
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::UNPROCESSABLE_ENTITY => ForgeError::Unprocessable(message),
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            StatusCode::FORBIDDEN if rate_exhausted => ForgeError::RateLimited,
            _ if status.is_server_error() => ForgeError::Api {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => ForgeError::Api {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Parse a JSON body, mapping shape mismatches to `ForgeError::Parse`.
    async fn parse_body<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, ForgeError> {
        response
            .json()
            .await
            .map_err(|e| ForgeError::Parse(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl TreeFetcher for GitHubForge {
    async fn fetch_tree(
        &self,
        owner: &str,
        repo: &str,
        id: &str,
        credential: Option<&Credential>,
    ) -> Result<Tree, ForgeError> {
        let url = self.repo_url(owner, repo, &format!("git/trees/{}", id));
        debug!(owner, repo, tree = id, "fetching tree");

        let response = Self::send(self.get(&url, credential)).await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: GitHubTree = Self::parse_body(response).await?;
        let tree = body.into_tree()?;
        if tree.truncated {
            warn!(owner, repo, tree = id, "upstream truncated tree listing");
        }
        Ok(tree)
    }
}

#[async_trait]
impl CommitSource for GitHubForge {
    async fn latest_commit(&self, query: CommitQuery<'_>) -> Result<CommitReply, ForgeError> {
        let url = self.repo_url(query.owner, query.repo, "commits");

        let mut params = vec![("sha", query.branch), ("per_page", "1")];
        if !query.path.is_empty() {
            params.push(("path", query.path));
        }

        let mut request = self.get(&url, query.credential).query(&params);
        if let Some(validator) = query.validator {
            if let Ok(value) = HeaderValue::from_str(validator) {
                request = request.header(IF_NONE_MATCH, value);
            }
        }

        let response = Self::send(request).await?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            return Ok(CommitReply::NotModified);
        }
        if !status.is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let validator = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let commits: Vec<GitHubCommit> = Self::parse_body(response).await?;
        // An empty list is a reply without an identifier, not a missing ref.
        let first = commits.into_iter().next().ok_or_else(|| {
            ForgeError::Parse(format!(
                "no commit in response for '{}' at '{}'",
                query.branch, query.path
            ))
        })?;
        let id = first
            .sha
            .ok_or_else(|| ForgeError::Parse("commit is missing sha".into()))?;

        Ok(CommitReply::Found { id, validator })
    }
}

impl Forge for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }
}

// --------------------------------------------------------------------------
// Wire types
// --------------------------------------------------------------------------

/// GitHub error response format.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

/// GitHub tree response.
#[derive(Deserialize)]
struct GitHubTree {
    sha: String,
    tree: Vec<GitHubTreeEntry>,
    #[serde(default)]
    truncated: bool,
}

/// GitHub tree entry.
#[derive(Deserialize)]
struct GitHubTreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    size: Option<u64>,
}

/// GitHub commit list item (only the sha is read).
#[derive(Deserialize)]
struct GitHubCommit {
    sha: Option<String>,
}

impl GitHubTree {
    fn into_tree(self) -> Result<Tree, ForgeError> {
        let entries = self
            .tree
            .into_iter()
            .map(|e| {
                let kind = match e.kind.as_str() {
                    "blob" => EntryKind::Blob,
                    "tree" => EntryKind::Tree,
                    "commit" => EntryKind::Commit,
                    other => {
                        return Err(ForgeError::Parse(format!(
                            "unknown entry type '{}' for '{}'",
                            other, e.path
                        )))
                    }
                };
                Ok(TreeEntry {
                    path: e.path,
                    kind,
                    id: e.sha,
                    size: e.size,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Tree {
            id: self.sha,
            entries,
            truncated: self.truncated,
        })
    }
}
