//! resolve
//!
//! Commit resolution: which commit last touched a path on a branch.
//!
//! # Components
//!
//! - [`CommitResolver`] - cache-first lookup with branch/path disambiguation
//! - [`ResolutionResult`] - what a successful lookup returns
//! - [`ResolveError`] - `NotFound` after disambiguation, or the upstream error

mod errors;
mod resolver;

pub use errors::{ResolveError, NOT_FOUND_MESSAGE};
pub use resolver::{CommitResolver, ResolutionResult};
