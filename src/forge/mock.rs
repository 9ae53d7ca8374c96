//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! The mock forge stores trees and branch heads in memory, records every
//! upstream call, and can be configured to fail. Commit replies carry a
//! validator derived from the commit id, and a query presenting that
//! validator gets `NotModified`, mirroring conditional requests.
//!
//! # Example
//!
//! ```
//! use trellis::forge::mock::MockForge;
//! use trellis::forge::{Tree, TreeEntry, TreeFetcher};
//!
//! # tokio_test::block_on(async {
//! let forge = MockForge::new().with_tree(Tree {
//!     id: "t0".to_string(),
//!     entries: vec![TreeEntry::blob("README.md", "b1")],
//!     truncated: false,
//! });
//!
//! let tree = forge.fetch_tree("owner", "repo", "t0", None).await.unwrap();
//! assert_eq!(tree.entries.len(), 1);
//! assert_eq!(forge.tree_fetches(), vec!["t0".to_string()]);
//! # });
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::{
    CommitQuery, CommitReply, CommitSource, Credential, Forge, ForgeError, Tree, TreeFetcher,
};

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone, Default)]
pub struct MockForge {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockForgeInner>>,
}

/// Internal mutable state.
#[derive(Debug, Default)]
struct MockForgeInner {
    /// Stored trees by id.
    trees: HashMap<String, Tree>,
    /// Latest commit id by (branch, path).
    commits: HashMap<(String, String), String>,
    /// Operation to fail on (for testing error paths).
    fail_on: Option<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail fetch_tree for the given tree id.
    FetchTree(String, ForgeError),
    /// Fail every latest_commit query.
    LatestCommit(ForgeError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    FetchTree {
        id: String,
        credentialed: bool,
    },
    LatestCommit {
        branch: String,
        path: String,
        validator: Option<String>,
        credentialed: bool,
    },
}

/// Validator the mock hands out for a commit id.
pub fn validator_for(commit_id: &str) -> String {
    format!("W/\"{}\"", commit_id)
}

impl MockForge {
    /// Create a new empty mock forge.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockForgeInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a tree snapshot.
    pub fn with_tree(self, tree: Tree) -> Self {
        self.lock().trees.insert(tree.id.clone(), tree);
        self
    }

    /// Make `commit_id` the latest commit touching `path` on `branch`.
    pub fn with_commit(self, branch: &str, path: &str, commit_id: &str) -> Self {
        self.set_commit(branch, path, commit_id);
        self
    }

    /// Move the latest commit for `(branch, path)`, as if someone pushed.
    pub fn set_commit(&self, branch: &str, path: &str, commit_id: &str) {
        self.lock()
            .commits
            .insert((branch.to_string(), path.to_string()), commit_id.to_string());
    }

    /// Configure the mock to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.lock().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.lock().fail_on = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.lock().operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.lock().operations.clear();
    }

    /// Tree ids fetched so far, in call order.
    pub fn tree_fetches(&self) -> Vec<String> {
        self.lock()
            .operations
            .iter()
            .filter_map(|op| match op {
                MockOperation::FetchTree { id, .. } => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of commit queries issued so far.
    pub fn commit_queries(&self) -> usize {
        self.lock()
            .operations
            .iter()
            .filter(|op| matches!(op, MockOperation::LatestCommit { .. }))
            .count()
    }
}

#[async_trait]
impl TreeFetcher for MockForge {
    async fn fetch_tree(
        &self,
        _owner: &str,
        _repo: &str,
        id: &str,
        credential: Option<&Credential>,
    ) -> Result<Tree, ForgeError> {
        let mut inner = self.lock();
        inner.operations.push(MockOperation::FetchTree {
            id: id.to_string(),
            credentialed: credential.is_some(),
        });

        if let Some(FailOn::FetchTree(ref failing, ref err)) = inner.fail_on {
            if failing == id {
                return Err(err.clone());
            }
        }

        inner
            .trees
            .get(id)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("tree {}", id)))
    }
}

#[async_trait]
impl CommitSource for MockForge {
    async fn latest_commit(&self, query: CommitQuery<'_>) -> Result<CommitReply, ForgeError> {
        let mut inner = self.lock();
        inner.operations.push(MockOperation::LatestCommit {
            branch: query.branch.to_string(),
            path: query.path.to_string(),
            validator: query.validator.map(str::to_string),
            credentialed: query.credential.is_some(),
        });

        if let Some(FailOn::LatestCommit(ref err)) = inner.fail_on {
            return Err(err.clone());
        }

        let key = (query.branch.to_string(), query.path.to_string());
        let id = inner
            .commits
            .get(&key)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound("No commit found for the ref".into()))?;

        let validator = validator_for(&id);
        if query.validator == Some(validator.as_str()) {
            return Ok(CommitReply::NotModified);
        }

        Ok(CommitReply::Found {
            id,
            validator: Some(validator),
        })
    }
}

impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }
}
