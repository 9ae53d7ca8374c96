//! forge::traits
//!
//! Upstream traits and wire-independent types for talking to a hosted forge.
//!
//! # Design
//!
//! The traits are async because every operation is a network call. They are
//! narrow: one tree level per [`TreeFetcher::fetch_tree`] call and
//! one "latest commit" lookup per [`CommitSource::latest_commit`] call. Retries,
//! caching and reconciliation live above this layer.
//!
//! # Example
//!
//! ```ignore
//! use trellis::forge::{TreeFetcher, ForgeError};
//!
//! async fn count_entries(forge: &dyn TreeFetcher) -> Result<usize, ForgeError> {
//!     let tree = forge.fetch_tree("octocat", "hello-world", "7fd1a60b", None).await?;
//!     Ok(tree.entries.len())
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from forge operations.
///
/// Variants map onto the failure classes callers need to tell apart: the
/// commit resolver retries on `NotFound` and `Unprocessable` only, everything
/// else propagates unchanged.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// The requested resource was not found (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was understood but rejected (HTTP 422).
    #[error("unprocessable: {0}")]
    Unprocessable(String),

    /// Authentication failed (HTTP 401).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error not otherwise classified.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("unexpected response: {0}")]
    Parse(String),

    /// Network or connection error.
    #[error("network error: {0}")]
    Network(String),
}

impl ForgeError {
    /// HTTP status code reported by upstream, if the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ForgeError::NotFound(_) => Some(404),
            ForgeError::Unprocessable(_) => Some(422),
            ForgeError::AuthFailed(_) => Some(401),
            ForgeError::RateLimited => Some(429),
            ForgeError::Api { status, .. } => Some(*status),
            ForgeError::Parse(_) | ForgeError::Network(_) => None,
        }
    }

    /// Whether this failure may mean a branch name swallowed part of the path.
    pub fn is_ambiguous_ref(&self) -> bool {
        matches!(self, ForgeError::NotFound(_) | ForgeError::Unprocessable(_))
    }
}

/// Kind of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A file.
    Blob,
    /// A directory.
    Tree,
    /// A submodule pointer. Never expanded.
    Commit,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Blob => write!(f, "blob"),
            EntryKind::Tree => write!(f, "tree"),
            EntryKind::Commit => write!(f, "commit"),
        }
    }
}

/// One child of a directory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Name relative to the fetched directory, or repository-root-relative
    /// once spliced by the reconciler.
    pub path: String,
    /// Entry kind
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Content identifier (object hash)
    pub id: String,
    /// Size in bytes, for blobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl TreeEntry {
    /// Create a blob entry.
    pub fn blob(path: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Blob,
            id: id.into(),
            size: None,
        }
    }

    /// Create a tree (directory) entry.
    pub fn tree(path: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Tree,
            id: id.into(),
            size: None,
        }
    }

    /// Whether this entry is a directory.
    pub fn is_tree(&self) -> bool {
        self.kind == EntryKind::Tree
    }
}

/// A directory snapshot as returned by upstream, one level deep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    /// Content identifier the snapshot was fetched from
    pub id: String,
    /// Entries in upstream order
    pub entries: Vec<TreeEntry>,
    /// Upstream omitted entries (very large directory)
    pub truncated: bool,
}

impl Tree {
    /// Paths of all entries, in order.
    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.path.as_str()).collect()
    }
}

/// A caller-supplied credential.
///
/// Requests made with a credential use the caller's own quota. Requests
/// without one fall back to the shared application credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a bearer token.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token. Never log this.
    pub fn token(&self) -> &str {
        &self.0
    }
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Query for the most recent commit touching `path` on `branch`.
#[derive(Debug, Clone)]
pub struct CommitQuery<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub branch: &'a str,
    /// Empty means the whole branch.
    pub path: &'a str,
    /// Validator from a previous reply, sent as a revalidation precondition.
    pub validator: Option<&'a str>,
    pub credential: Option<&'a Credential>,
}

/// Reply to a [`CommitQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitReply {
    /// The precondition matched; the previously returned commit is current.
    NotModified,
    /// A fresh answer.
    Found {
        /// Commit identifier
        id: String,
        /// Validator to present next time, if upstream sent one
        validator: Option<String>,
    },
}

/// Fetches single tree levels by content identifier.
///
/// Implementations translate one network call into a [`Tree`]; no retries, no
/// caching. Entry order must be preserved as received.
#[async_trait]
pub trait TreeFetcher: Send + Sync {
    /// Fetch one level of the tree `id`.
    ///
    /// # Errors
    ///
    /// Any non-success response, classified as a [`ForgeError`].
    async fn fetch_tree(
        &self,
        owner: &str,
        repo: &str,
        id: &str,
        credential: Option<&Credential>,
    ) -> Result<Tree, ForgeError>;
}

/// Answers "latest commit touching a path on a branch" queries.
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Look up the latest commit.
    ///
    /// # Errors
    ///
    /// - `NotFound` / `Unprocessable` when upstream does not recognize the
    ///   branch or no commit touches the path
    /// - `Parse` when the reply lacks a commit identifier
    async fn latest_commit(&self, query: CommitQuery<'_>) -> Result<CommitReply, ForgeError>;
}

/// A forge that can do both.
pub trait Forge: TreeFetcher + CommitSource {
    /// Get the forge name (e.g., "github").
    fn name(&self) -> &'static str;
}
