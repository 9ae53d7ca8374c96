//! tree::reconcile
//!
//! Flatten a remote tree just enough to drop a set of deleted files.
//!
//! # Algorithm
//!
//! The accumulator starts as the root tree. For each deletion, in order, every
//! ancestor directory (root-most first) that is still present in the
//! accumulator as a `tree` entry is replaced by its children, re-pathed with
//! the directory prefix and appended at the end. Ancestors that are already
//! gone were expanded by an earlier deletion and are skipped. Finally the entry
//! whose path equals the deletion is dropped.
//!
//! # Invariants
//!
//! - Each distinct subtree id is fetched at most once per run.
//! - The resulting path set is the flattened original minus the deletions;
//!   it does not depend on deletion order.
//! - Deleting an absent path is a no-op.
//! - Sibling order within a directory is preserved; spliced children are
//!   appended, so the global order is not alphabetical.
//! - Any fetch failure aborts the run; no partial tree is returned.

use std::collections::HashMap;

use tracing::debug;

use crate::forge::{Credential, ForgeError, Tree, TreeFetcher};

/// Reconciles a root tree against a list of deleted paths.
///
/// Generic over the fetcher so it accepts both concrete forges and
/// `dyn Forge` trait objects.
pub struct TreeReconciler<'a, F: TreeFetcher + ?Sized> {
    fetcher: &'a F,
}

impl<'a, F: TreeFetcher + ?Sized> TreeReconciler<'a, F> {
    /// Create a reconciler over `fetcher`.
    pub fn new(fetcher: &'a F) -> Self {
        Self { fetcher }
    }

    /// Fetch `root_id` and remove every path in `deletions` from it.
    ///
    /// Returns the partially flattened tree: expanded directories are gone,
    /// their children carry repository-root-relative paths.
    ///
    /// # Errors
    ///
    /// The first [`ForgeError`] from any tree fetch, unchanged.
    pub async fn reconcile<S: AsRef<str>>(
        &self,
        owner: &str,
        repo: &str,
        root_id: &str,
        deletions: &[S],
        credential: Option<&Credential>,
    ) -> Result<Tree, ForgeError> {
        let mut run = Run {
            fetcher: self.fetcher,
            owner,
            repo,
            credential,
            fetched: HashMap::new(),
        };

        let mut acc = run.fetch(root_id).await?;

        for deletion in deletions {
            let deletion = normalize(deletion.as_ref());
            if deletion.is_empty() {
                continue;
            }

            for dir in ancestors(deletion) {
                acc = run.expand(acc, dir).await?;
            }

            if let Some(pos) = acc.entries.iter().position(|e| e.path == deletion) {
                acc.entries.remove(pos);
                debug!(path = deletion, "removed deleted entry");
            } else {
                debug!(path = deletion, "deleted path not present");
            }
        }

        Ok(acc)
    }
}

/// State for one reconciliation run.
struct Run<'a, F: TreeFetcher + ?Sized> {
    fetcher: &'a F,
    owner: &'a str,
    repo: &'a str,
    credential: Option<&'a Credential>,
    /// Subtrees fetched so far in this run, by id.
    fetched: HashMap<String, Tree>,
}

impl<F: TreeFetcher + ?Sized> Run<'_, F> {
    async fn fetch(&mut self, id: &str) -> Result<Tree, ForgeError> {
        if let Some(tree) = self.fetched.get(id) {
            return Ok(tree.clone());
        }
        let tree = self
            .fetcher
            .fetch_tree(self.owner, self.repo, id, self.credential)
            .await?;
        self.fetched.insert(id.to_string(), tree.clone());
        Ok(tree)
    }

    /// Splice the children of directory `dir` into `acc`, if it is still there.
    async fn expand(&mut self, mut acc: Tree, dir: &str) -> Result<Tree, ForgeError> {
        let Some(pos) = acc.entries.iter().position(|e| e.is_tree() && e.path == dir) else {
            return Ok(acc);
        };

        let subtree = self.fetch(&acc.entries[pos].id).await?;
        acc.entries.remove(pos);

        let count = subtree.entries.len();
        acc.truncated |= subtree.truncated;
        acc.entries
            .extend(subtree.entries.into_iter().map(|mut child| {
                child.path = format!("{}/{}", dir, child.path);
                child
            }));

        debug!(dir, tree = %subtree.id, children = count, "expanded subtree");
        Ok(acc)
    }
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

/// Ancestor directories of `path`, root-most first.
///
/// `"a/b/c.txt"` yields `"a"`, `"a/b"`.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(i, _)| &path[..i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::{FailOn, MockForge};
    use crate::forge::{EntryKind, TreeEntry};

    fn tree(id: &str, entries: Vec<TreeEntry>) -> Tree {
        Tree {
            id: id.to_string(),
            entries,
            truncated: false,
        }
    }

    /// t0: src/ (t1), README.md
    /// t1: index.js, utils.js, lib/ (t2)
    /// t2: a.rs, b.rs
    fn sample_forge() -> MockForge {
        MockForge::new()
            .with_tree(tree(
                "t0",
                vec![TreeEntry::tree("src", "t1"), TreeEntry::blob("README.md", "b1")],
            ))
            .with_tree(tree(
                "t1",
                vec![
                    TreeEntry::blob("index.js", "b2"),
                    TreeEntry::blob("utils.js", "b3"),
                    TreeEntry::tree("lib", "t2"),
                ],
            ))
            .with_tree(tree(
                "t2",
                vec![TreeEntry::blob("a.rs", "b4"), TreeEntry::blob("b.rs", "b5")],
            ))
    }

    mod ancestor_dirs {
        use super::*;

        #[test]
        fn nested_path() {
            assert_eq!(ancestors("a/b/c.txt").collect::<Vec<_>>(), vec!["a", "a/b"]);
        }

        #[test]
        fn top_level_file_has_none() {
            assert_eq!(ancestors("README.md").count(), 0);
        }
    }

    #[tokio::test]
    async fn removes_file_from_expanded_directory() {
        let forge = MockForge::new()
            .with_tree(tree(
                "t0",
                vec![TreeEntry::tree("src", "t1"), TreeEntry::blob("README.md", "b1")],
            ))
            .with_tree(tree(
                "t1",
                vec![TreeEntry::blob("index.js", "b2"), TreeEntry::blob("utils.js", "b3")],
            ));

        let result = TreeReconciler::new(&forge)
            .reconcile("o", "r", "t0", &["src/index.js"], None)
            .await
            .unwrap();

        assert_eq!(
            result.entries,
            vec![
                TreeEntry::blob("README.md", "b1"),
                TreeEntry::blob("src/utils.js", "b3"),
            ]
        );
        assert_eq!(result.id, "t0");
    }

    #[tokio::test]
    async fn no_deletions_returns_root_unchanged() {
        let forge = sample_forge();
        let result = TreeReconciler::new(&forge)
            .reconcile::<&str>("o", "r", "t0", &[], None)
            .await
            .unwrap();

        assert_eq!(result.paths(), vec!["src", "README.md"]);
        assert_eq!(forge.tree_fetches(), vec!["t0".to_string()]);
    }

    #[tokio::test]
    async fn shared_ancestors_are_fetched_once() {
        let forge = sample_forge();
        let result = TreeReconciler::new(&forge)
            .reconcile(
                "o",
                "r",
                "t0",
                &["src/lib/a.rs", "src/index.js", "src/lib/b.rs"],
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            forge.tree_fetches(),
            vec!["t0".to_string(), "t1".to_string(), "t2".to_string()]
        );
        assert_eq!(result.paths(), vec!["README.md", "src/utils.js"]);
    }

    #[tokio::test]
    async fn spliced_children_are_appended() {
        let forge = sample_forge();
        let result = TreeReconciler::new(&forge)
            .reconcile("o", "r", "t0", &["src/lib/a.rs"], None)
            .await
            .unwrap();

        assert_eq!(
            result.paths(),
            vec!["README.md", "src/index.js", "src/utils.js", "src/lib/b.rs"]
        );
    }

    #[tokio::test]
    async fn absent_path_is_noop() {
        let forge = sample_forge();
        let result = TreeReconciler::new(&forge)
            .reconcile("o", "r", "t0", &["docs/missing.md", "nope.txt"], None)
            .await
            .unwrap();

        assert_eq!(result.paths(), vec!["src", "README.md"]);
        assert_eq!(forge.tree_fetches(), vec!["t0".to_string()]);
    }

    #[tokio::test]
    async fn absent_file_in_existing_directory_still_expands() {
        let forge = sample_forge();
        let result = TreeReconciler::new(&forge)
            .reconcile("o", "r", "t0", &["src/ghost.js"], None)
            .await
            .unwrap();

        assert_eq!(
            result.paths(),
            vec!["README.md", "src/index.js", "src/utils.js", "src/lib"]
        );
    }

    #[tokio::test]
    async fn identical_subtrees_share_one_fetch() {
        let forge = MockForge::new()
            .with_tree(tree(
                "t0",
                vec![TreeEntry::tree("a", "same"), TreeEntry::tree("b", "same")],
            ))
            .with_tree(tree("same", vec![TreeEntry::blob("x", "bx")]));

        let result = TreeReconciler::new(&forge)
            .reconcile("o", "r", "t0", &["a/x", "b/x"], None)
            .await
            .unwrap();

        assert!(result.entries.is_empty());
        assert_eq!(
            forge.tree_fetches(),
            vec!["t0".to_string(), "same".to_string()]
        );
    }

    #[tokio::test]
    async fn submodules_are_not_expanded() {
        let forge = MockForge::new().with_tree(tree(
            "t0",
            vec![TreeEntry {
                path: "vendor".into(),
                kind: EntryKind::Commit,
                id: "c1".into(),
                size: None,
            }],
        ));

        let result = TreeReconciler::new(&forge)
            .reconcile("o", "r", "t0", &["vendor/file"], None)
            .await
            .unwrap();

        assert_eq!(result.paths(), vec!["vendor"]);
        assert_eq!(forge.tree_fetches(), vec!["t0".to_string()]);
    }

    #[tokio::test]
    async fn truncated_subtree_marks_result() {
        let forge = MockForge::new()
            .with_tree(tree("t0", vec![TreeEntry::tree("big", "t1")]))
            .with_tree(Tree {
                id: "t1".into(),
                entries: vec![TreeEntry::blob("one", "b1")],
                truncated: true,
            });

        let result = TreeReconciler::new(&forge)
            .reconcile("o", "r", "t0", &["big/one"], None)
            .await
            .unwrap();

        assert!(result.truncated);
    }

    #[tokio::test]
    async fn subtree_failure_aborts() {
        let forge =
            sample_forge().fail_on(FailOn::FetchTree("t2".into(), ForgeError::RateLimited));

        let result = TreeReconciler::new(&forge)
            .reconcile("o", "r", "t0", &["src/index.js", "src/lib/a.rs"], None)
            .await;

        assert!(matches!(result, Err(ForgeError::RateLimited)));
    }

    #[tokio::test]
    async fn root_failure_propagates() {
        let forge = MockForge::new();
        let result = TreeReconciler::new(&forge)
            .reconcile("o", "r", "missing", &["a"], None)
            .await;
        assert!(matches!(result, Err(ForgeError::NotFound(_))));
    }

    #[tokio::test]
    async fn credential_is_forwarded() {
        let forge = sample_forge();
        let cred = Credential::bearer("tok");
        TreeReconciler::new(&forge)
            .reconcile("o", "r", "t0", &["src/index.js"], Some(&cred))
            .await
            .unwrap();

        assert!(forge.operations().iter().all(|op| matches!(
            op,
            crate::forge::mock::MockOperation::FetchTree {
                credentialed: true,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn leading_slash_is_ignored() {
        let forge = sample_forge();
        let result = TreeReconciler::new(&forge)
            .reconcile("o", "r", "t0", &["/README.md"], None)
            .await
            .unwrap();
        assert_eq!(result.paths(), vec!["src"]);
    }
}
