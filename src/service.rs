//! service
//!
//! [`Trellis`], the entry point other layers call.
//!
//! # Operations
//!
//! - [`Trellis::reconcile_tree_with_deletions`] - flatten a tree minus deleted files
//! - [`Trellis::resolve_commit`] - latest commit touching a path on a branch
//! - [`Trellis::invalidate_resolution`] - bust the fresh cache after a known write
//!
//! # Example
//!
//! ```ignore
//! use trellis::Trellis;
//!
//! let trellis = Trellis::from_config(&config);
//! let commit = trellis
//!     .resolve_commit("octocat", "hello-world", "main", "README", false, None)
//!     .await?;
//! println!("{}", commit.id);
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::cache::{CacheKey, CacheStore};
use crate::core::config::Config;
use crate::forge::github::GitHubForge;
use crate::forge::{Credential, Forge, ForgeError, Tree};
use crate::resolve::{CommitResolver, ResolutionResult, ResolveError};
use crate::tree::TreeReconciler;

/// Facade over a forge and a cache store.
#[derive(Clone)]
pub struct Trellis {
    forge: Arc<dyn Forge>,
    cache: Arc<CacheStore>,
}

impl std::fmt::Debug for Trellis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trellis")
            .field("forge", &self.forge.name())
            .field("cache", &self.cache)
            .finish()
    }
}

impl Trellis {
    /// Use `forge` with the process-wide cache store.
    pub fn new(forge: Arc<dyn Forge>) -> Self {
        Self::with_cache(forge, CacheStore::global())
    }

    /// Use `forge` with an explicit cache store.
    pub fn with_cache(forge: Arc<dyn Forge>, cache: Arc<CacheStore>) -> Self {
        Self { forge, cache }
    }

    /// Build a GitHub-backed instance from configuration.
    ///
    /// The cache store is private to the returned instance (and its clones)
    /// so configured capacities take effect.
    pub fn from_config(config: &Config) -> Self {
        let mut forge = GitHubForge::new()
            .with_api_base(config.api_base())
            .with_user_agent(config.user_agent());
        if let Some(app) = config.app_credentials() {
            forge = forge.with_app_credentials(app);
        }
        debug!(
            api_base = forge.api_base(),
            app_credentials = forge.has_app_credentials(),
            "configured GitHub forge"
        );
        Self::with_cache(
            Arc::new(forge),
            Arc::new(CacheStore::new(config.cache_settings())),
        )
    }

    /// The cache store in use.
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Fetch tree `root_id` and drop every path in `deletions` from it.
    ///
    /// # Errors
    ///
    /// The first upstream failure; no partial tree is returned.
    pub async fn reconcile_tree_with_deletions<S: AsRef<str>>(
        &self,
        owner: &str,
        repo: &str,
        root_id: &str,
        deletions: &[S],
        credential: Option<&Credential>,
    ) -> Result<Tree, ForgeError> {
        TreeReconciler::new(&*self.forge)
            .reconcile(owner, repo, root_id, deletions, credential)
            .await
    }

    /// Resolve the latest commit touching `path` on `branch`.
    ///
    /// # Errors
    ///
    /// See [`CommitResolver::resolve`].
    pub async fn resolve_commit(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
        skip_cache: bool,
        credential: Option<&Credential>,
    ) -> Result<ResolutionResult, ResolveError> {
        CommitResolver::new(&*self.forge, &self.cache)
            .resolve(owner, repo, branch, path, skip_cache, credential)
            .await
    }

    /// Forget the fresh resolution for `(owner, repo, branch, path)`.
    ///
    /// The validator entry is kept; the next lookup revalidates against
    /// upstream instead of trusting the short-lived value.
    pub fn invalidate_resolution(&self, owner: &str, repo: &str, branch: &str, path: &str) {
        let key = CacheKey::new(owner, repo, branch, path);
        debug!(%key, "invalidating fresh resolution");
        self.cache.invalidate_fresh(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheSettings;
    use crate::forge::mock::MockForge;
    use crate::forge::TreeEntry;

    fn trellis(forge: &MockForge) -> Trellis {
        Trellis::with_cache(
            Arc::new(forge.clone()),
            Arc::new(CacheStore::new(CacheSettings::default())),
        )
    }

    #[tokio::test]
    async fn reconcile_goes_through_forge() {
        let forge = MockForge::new()
            .with_tree(Tree {
                id: "t0".into(),
                entries: vec![TreeEntry::tree("src", "t1"), TreeEntry::blob("README.md", "b1")],
                truncated: false,
            })
            .with_tree(Tree {
                id: "t1".into(),
                entries: vec![TreeEntry::blob("index.js", "b2"), TreeEntry::blob("utils.js", "b3")],
                truncated: false,
            });

        let tree = trellis(&forge)
            .reconcile_tree_with_deletions("o", "r", "t0", &["src/index.js"], None)
            .await
            .unwrap();

        assert_eq!(tree.paths(), vec!["README.md", "src/utils.js"]);
    }

    #[tokio::test]
    async fn invalidate_resolution_forces_requery() {
        let forge = MockForge::new().with_commit("main", "a.txt", "c1");
        let t = trellis(&forge);

        t.resolve_commit("o", "r", "main", "a.txt", false, None).await.unwrap();
        forge.set_commit("main", "a.txt", "c2");

        let cached = t.resolve_commit("o", "r", "main", "a.txt", false, None).await.unwrap();
        assert_eq!(cached.id, "c1");

        t.invalidate_resolution("o", "r", "main", "a.txt");
        let fresh = t.resolve_commit("o", "r", "main", "a.txt", false, None).await.unwrap();
        assert_eq!(fresh.id, "c2");
        assert_eq!(forge.commit_queries(), 2);
    }

    #[test]
    fn clones_share_the_cache() {
        let forge = MockForge::new();
        let a = trellis(&forge);
        let b = a.clone();
        assert!(Arc::ptr_eq(a.cache(), b.cache()));
    }

    #[test]
    fn new_uses_global_store() {
        let t = Trellis::new(Arc::new(MockForge::new()));
        assert!(Arc::ptr_eq(t.cache(), &CacheStore::global()));
    }

    #[test]
    fn debug_shows_forge_name() {
        let t = trellis(&MockForge::new());
        assert!(format!("{:?}", t).contains("mock"));
    }
}
