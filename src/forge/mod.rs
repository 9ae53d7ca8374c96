//! forge
//!
//! Abstraction for the hosted forge (GitHub) the crate talks to.
//!
//! # Architecture
//!
//! The [`TreeFetcher`] and [`CommitSource`] traits are the only seams through
//! which the reconciler and resolver reach upstream. [`Forge`] bundles both.
//!
//! # Modules
//!
//! - `traits`: Upstream traits, tree types and `ForgeError`
//! - [`github`]: GitHub implementation using the REST API
//! - [`mock`]: Mock implementation for deterministic testing
//!
//! # Example
//!
//! ```ignore
//! use trellis::forge::github::GitHubForge;
//! use trellis::forge::{CommitQuery, CommitSource};
//!
//! let forge = GitHubForge::new();
//! let reply = forge.latest_commit(CommitQuery {
//!     owner: "octocat",
//!     repo: "hello-world",
//!     branch: "main",
//!     path: "README",
//!     validator: None,
//!     credential: None,
//! }).await?;
//! ```

pub mod github;
pub mod mock;
mod traits;

pub use traits::*;
