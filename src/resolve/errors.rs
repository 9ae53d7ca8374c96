//! resolve::errors
//!
//! Error types for commit resolution.
//!
//! # Example
//!
//! ```
//! use trellis::resolve::{ResolveError, NOT_FOUND_MESSAGE};
//!
//! let err = ResolveError::NotFound {
//!     owner: "octocat".into(),
//!     repo: "hello-world".into(),
//!     branch: "main".into(),
//!     path: "missing.txt".into(),
//! };
//! assert_eq!(err.to_string(), NOT_FOUND_MESSAGE);
//! ```

use thiserror::Error;

use crate::forge::ForgeError;

/// Message reported when no branch/path split resolves.
pub const NOT_FOUND_MESSAGE: &str = "Could not find a commit for the given branch and path";

/// Errors from [`CommitResolver::resolve`](super::CommitResolver::resolve).
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Every branch/path split was tried and none resolved.
    ///
    /// Carries the caller's original arguments, not the last split tried.
    #[error("{}", NOT_FOUND_MESSAGE)]
    NotFound {
        owner: String,
        repo: String,
        branch: String,
        path: String,
    },

    /// Any other upstream failure, unchanged.
    #[error(transparent)]
    Forge(#[from] ForgeError),
}
