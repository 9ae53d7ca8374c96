//! resolve::resolver
//!
//! Cached "latest commit touching a path on a branch" lookups.
//!
//! # Protocol
//!
//! For key `(owner, repo, branch, path)`:
//!
//! 1. Unless `skip_cache`, a fresh-cache hit returns without a network call.
//! 2. Otherwise upstream is queried, carrying the cached validator if any.
//! 3. "Not modified" reuses the id stored with that validator.
//! 4. A new validator is stored only for requests without a caller
//!    credential; credentialed quota does not need protecting.
//! 5. Every successful lookup refreshes the fresh cache.
//!
//! # Disambiguation
//!
//! `feature/x` as a branch and `x/...` as a path prefix look the same in a
//! URL. When upstream answers 404 or 422 and there is path left, the first
//! path segment moves onto the branch and the lookup repeats on the new key,
//! bypassing the fresh cache. Running out of path yields
//! [`ResolveError::NotFound`].

use serde::Serialize;
use tracing::debug;

use super::errors::ResolveError;
use crate::cache::{CacheKey, CacheStore, ValidatorEntry};
use crate::forge::{CommitQuery, CommitReply, CommitSource, Credential, ForgeError};

/// A resolved commit and the branch/path split it was found under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    /// Commit id
    #[serde(rename = "contentId")]
    pub id: String,
    pub owner: String,
    pub repo: String,
    /// Branch that resolved (may have absorbed leading path segments)
    pub branch: String,
    /// Path that resolved
    pub path: String,
}

/// Where a resolution stands.
#[derive(Debug)]
enum State {
    /// Querying one branch/path split.
    Resolving {
        branch: String,
        path: String,
        skip_cache: bool,
    },
    /// The last split was rejected; try moving a segment onto the branch.
    Disambiguating {
        depth: usize,
        branch: String,
        remaining: String,
        cause: ForgeError,
    },
    /// No split left.
    Failed { depth: usize, cause: ForgeError },
}

/// Resolves commits through a [`CacheStore`] in front of a [`CommitSource`].
pub struct CommitResolver<'a, S: CommitSource + ?Sized> {
    source: &'a S,
    cache: &'a CacheStore,
}

impl<'a, S: CommitSource + ?Sized> CommitResolver<'a, S> {
    pub fn new(source: &'a S, cache: &'a CacheStore) -> Self {
        Self { source, cache }
    }

    /// Resolve the latest commit touching `path` on `branch`.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::NotFound`] when no branch/path split resolves
    /// - [`ResolveError::Forge`] for any other upstream failure
    pub async fn resolve(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
        skip_cache: bool,
        credential: Option<&Credential>,
    ) -> Result<ResolutionResult, ResolveError> {
        let mut depth = 0;
        let mut state = State::Resolving {
            branch: branch.to_string(),
            path: path.to_string(),
            skip_cache,
        };

        loop {
            state = match state {
                State::Resolving {
                    branch,
                    path,
                    skip_cache,
                } => {
                    let key = CacheKey::new(owner, repo, &branch, &path);
                    match self.resolve_key(&key, skip_cache, credential).await {
                        Ok(id) => {
                            return Ok(ResolutionResult {
                                id,
                                owner: owner.to_string(),
                                repo: repo.to_string(),
                                branch,
                                path,
                            })
                        }
                        Err(cause) if cause.is_ambiguous_ref() => State::Disambiguating {
                            depth,
                            branch,
                            remaining: path,
                            cause,
                        },
                        Err(cause) => return Err(cause.into()),
                    }
                }
                State::Disambiguating {
                    depth: d,
                    branch,
                    remaining,
                    cause,
                } => match peel(&remaining) {
                    Some((segment, rest)) => {
                        depth = d + 1;
                        let branch = format!("{}/{}", branch, segment);
                        debug!(%branch, path = rest, depth, "retrying with segment moved onto branch");
                        State::Resolving {
                            branch,
                            path: rest.to_string(),
                            skip_cache: true,
                        }
                    }
                    None => State::Failed { depth: d, cause },
                },
                State::Failed { depth, cause } => {
                    debug!(
                        owner,
                        repo,
                        branch,
                        path,
                        depth,
                        status = ?cause.status(),
                        %cause,
                        "no branch/path split resolved"
                    );
                    return Err(ResolveError::NotFound {
                        owner: owner.to_string(),
                        repo: repo.to_string(),
                        branch: branch.to_string(),
                        path: path.to_string(),
                    });
                }
            };
        }
    }

    /// Resolve a single key, no disambiguation.
    async fn resolve_key(
        &self,
        key: &CacheKey,
        skip_cache: bool,
        credential: Option<&Credential>,
    ) -> Result<String, ForgeError> {
        if !skip_cache {
            if let Some(id) = self.cache.get_fresh(key) {
                debug!(%key, "fresh cache hit");
                return Ok(id);
            }
        }

        let cached = self.cache.get_validator(key);
        let reply = self
            .source
            .latest_commit(CommitQuery {
                owner: &key.owner,
                repo: &key.repo,
                branch: &key.branch,
                path: &key.path,
                validator: cached.as_ref().map(|c| c.validator.as_str()),
                credential,
            })
            .await?;

        let id = match (reply, cached) {
            (CommitReply::NotModified, Some(cached)) => {
                debug!(%key, "not modified, reusing validated commit");
                cached.id
            }
            (CommitReply::NotModified, None) => {
                return Err(ForgeError::Parse(
                    "not modified reply to an unconditional request".into(),
                ))
            }
            (CommitReply::Found { id, validator }, _) => {
                if let (Some(validator), None) = (validator, credential) {
                    self.cache.set_validator(
                        key.clone(),
                        ValidatorEntry {
                            validator,
                            id: id.clone(),
                        },
                    );
                }
                id
            }
        };

        self.cache.set_fresh(key.clone(), id.clone());
        Ok(id)
    }
}

/// Split off the first path segment. `None` once there is nothing to move.
fn peel(path: &str) -> Option<(&str, &str)> {
    let (segment, rest) = path.split_once('/').unwrap_or((path, ""));
    if segment.is_empty() {
        None
    } else {
        Some((segment, rest))
    }
}
