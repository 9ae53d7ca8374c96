//! Trellis - commit resolution and tree reconciliation for hosted forges
//!
//! Trellis answers two questions about a GitHub repository without callers
//! talking to the REST API themselves:
//!
//! - which commit last touched a path on a branch, cheaply and repeatedly,
//!   even when the branch name itself contains `/`
//! - what a tree looks like once a set of files is deleted from it, fetching
//!   only the directories on the way to those files
//!
//! # Architecture
//!
//! - [`forge`] - Upstream traits and the GitHub adapter
//! - [`tree`] - Deletion-aware tree flattening
//! - [`cache`] - Fresh and validator caches
//! - [`resolve`] - Cached commit resolution with branch/path disambiguation
//! - [`core`] - Configuration
//! - [`cli`] - Command-line front end
//!
//! [`Trellis`] ties them together.
//!
//! # Invariants
//!
//! 1. Each subtree is fetched at most once per reconciliation
//! 2. Reconciled path sets do not depend on deletion order
//! 3. Validators are only stored for requests on the shared quota
//! 4. Nothing is persisted across restarts

pub mod cache;
pub mod cli;
pub mod core;
pub mod forge;
pub mod resolve;
mod service;
pub mod tree;

pub use service::Trellis;
