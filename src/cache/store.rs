//! cache::store
//!
//! The two resolution caches and the [`CacheStore`] that pairs them.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;

use super::clock::{Clock, SystemClock};

/// Default capacity of the fresh cache.
pub const DEFAULT_FRESH_CAPACITY: usize = 500;

/// Default fresh-cache TTL in seconds.
pub const DEFAULT_FRESH_TTL_SECS: i64 = 5;

/// Default capacity of the validator cache.
pub const DEFAULT_VALIDATOR_CAPACITY: usize = 50_000;

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
}

impl CacheKey {
    pub fn new(owner: &str, repo: &str, branch: &str, path: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
            path: path.to_string(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}:{}", self.owner, self.repo, self.branch, self.path)
    }
}

/// Last known validator and the commit id it vouches for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorEntry {
    pub validator: String,
    pub id: String,
}

/// Capacities and TTL for a [`CacheStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub fresh_capacity: usize,
    pub fresh_ttl: Duration,
    pub validator_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            fresh_capacity: DEFAULT_FRESH_CAPACITY,
            fresh_ttl: Duration::seconds(DEFAULT_FRESH_TTL_SECS),
            validator_capacity: DEFAULT_VALIDATOR_CAPACITY,
        }
    }
}

fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone)]
struct FreshEntry {
    id: String,
    expires_at: DateTime<Utc>,
}

/// Short-lived cache of resolved commit ids.
///
/// Bounded by count (LRU) and by age. Expired entries are dropped lazily
/// when looked up.
pub struct FreshCache {
    entries: Mutex<LruCache<CacheKey, FreshEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl FreshCache {
    pub fn new(cap: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity(cap))),
            ttl,
            clock,
        }
    }

    /// Cached id for `key`, if present and not expired.
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let now = self.clock.now();
        let mut entries = lock(&self.entries);
        let entry = entries.get(key)?.clone();
        if entry.expires_at > now {
            return Some(entry.id);
        }
        entries.pop(key);
        None
    }

    /// Store `id` for `key`, expiring one TTL from now.
    pub fn set(&self, key: CacheKey, id: String) {
        let expires_at = self.clock.now() + self.ttl;
        lock(&self.entries).put(key, FreshEntry { id, expires_at });
    }

    /// Drop `key`.
    pub fn invalidate(&self, key: &CacheKey) {
        lock(&self.entries).pop(key);
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for FreshCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreshCache")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Long-lived cache of validators, evicted only by capacity.
pub struct ValidatorCache {
    entries: Mutex<LruCache<CacheKey, ValidatorEntry>>,
}

impl ValidatorCache {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity(cap))),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<ValidatorEntry> {
        lock(&self.entries).get(key).cloned()
    }

    pub fn set(&self, key: CacheKey, entry: ValidatorEntry) {
        lock(&self.entries).put(key, entry);
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ValidatorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorCache")
            .field("len", &self.len())
            .finish()
    }
}

/// The fresh and validator caches used by commit resolution.
///
/// Each map has its own lock; no operation needs both at once.
#[derive(Debug)]
pub struct CacheStore {
    fresh: FreshCache,
    validator: ValidatorCache,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

impl CacheStore {
    /// Create a store on the system clock.
    pub fn new(settings: CacheSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Create a store on an explicit clock.
    pub fn with_clock(settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            fresh: FreshCache::new(settings.fresh_capacity, settings.fresh_ttl, clock),
            validator: ValidatorCache::new(settings.validator_capacity),
        }
    }

    /// The process-wide store, created with default settings on first use.
    pub fn global() -> Arc<CacheStore> {
        static GLOBAL: OnceLock<Arc<CacheStore>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(CacheStore::default())).clone()
    }

    pub fn get_fresh(&self, key: &CacheKey) -> Option<String> {
        self.fresh.get(key)
    }

    pub fn set_fresh(&self, key: CacheKey, id: String) {
        self.fresh.set(key, id)
    }

    /// Bust the fresh entry for `key`, e.g. right after writing a commit.
    pub fn invalidate_fresh(&self, key: &CacheKey) {
        self.fresh.invalidate(key)
    }

    pub fn get_validator(&self, key: &CacheKey) -> Option<ValidatorEntry> {
        self.validator.get(key)
    }

    pub fn set_validator(&self, key: CacheKey, entry: ValidatorEntry) {
        self.validator.set(key, entry)
    }

    pub fn fresh(&self) -> &FreshCache {
        &self.fresh
    }

    pub fn validators(&self) -> &ValidatorCache {
        &self.validator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;

    fn key(path: &str) -> CacheKey {
        CacheKey::new("o", "r", "main", path)
    }

    fn store_with_clock(settings: CacheSettings) -> (CacheStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (CacheStore::with_clock(settings, clock.clone()), clock)
    }

    mod fresh {
        use super::*;

        #[test]
        fn hit_within_ttl() {
            let (store, clock) = store_with_clock(CacheSettings::default());
            store.set_fresh(key("a"), "c1".into());
            clock.advance(Duration::seconds(4));
            assert_eq!(store.get_fresh(&key("a")), Some("c1".to_string()));
        }

        #[test]
        fn expires_after_ttl() {
            let (store, clock) = store_with_clock(CacheSettings::default());
            store.set_fresh(key("a"), "c1".into());
            clock.advance(Duration::seconds(5));
            assert_eq!(store.get_fresh(&key("a")), None);
            assert!(store.fresh().is_empty());
        }

        #[test]
        fn set_refreshes_expiry() {
            let (store, clock) = store_with_clock(CacheSettings::default());
            store.set_fresh(key("a"), "c1".into());
            clock.advance(Duration::seconds(4));
            store.set_fresh(key("a"), "c1".into());
            clock.advance(Duration::seconds(4));
            assert_eq!(store.get_fresh(&key("a")), Some("c1".to_string()));
        }

        #[test]
        fn invalidate_removes_entry() {
            let (store, _clock) = store_with_clock(CacheSettings::default());
            store.set_fresh(key("a"), "c1".into());
            store.invalidate_fresh(&key("a"));
            assert_eq!(store.get_fresh(&key("a")), None);
        }

        #[test]
        fn evicts_least_recently_used() {
            let (store, _clock) = store_with_clock(CacheSettings {
                fresh_capacity: 2,
                ..CacheSettings::default()
            });
            store.set_fresh(key("a"), "c1".into());
            store.set_fresh(key("b"), "c2".into());
            // touch a so b is the oldest
            assert!(store.get_fresh(&key("a")).is_some());
            store.set_fresh(key("c"), "c3".into());

            assert!(store.get_fresh(&key("a")).is_some());
            assert!(store.get_fresh(&key("b")).is_none());
            assert!(store.get_fresh(&key("c")).is_some());
        }

        #[test]
        fn keys_differ_by_every_component() {
            let (store, _clock) = store_with_clock(CacheSettings::default());
            store.set_fresh(CacheKey::new("o", "r", "main", "a"), "c1".into());
            assert!(store.get_fresh(&CacheKey::new("o", "r", "dev", "a")).is_none());
            assert!(store.get_fresh(&CacheKey::new("o", "x", "main", "a")).is_none());
            assert!(store.get_fresh(&CacheKey::new("x", "r", "main", "a")).is_none());
        }

        #[test]
        fn zero_capacity_holds_one() {
            let (store, _clock) = store_with_clock(CacheSettings {
                fresh_capacity: 0,
                ..CacheSettings::default()
            });
            store.set_fresh(key("a"), "c1".into());
            assert_eq!(store.fresh().len(), 1);
        }
    }

    mod validator {
        use super::*;

        fn entry(v: &str, id: &str) -> ValidatorEntry {
            ValidatorEntry {
                validator: v.into(),
                id: id.into(),
            }
        }

        #[test]
        fn never_expires() {
            let (store, clock) = store_with_clock(CacheSettings::default());
            store.set_validator(key("a"), entry("\"v1\"", "c1"));
            clock.advance(Duration::days(30));
            assert_eq!(store.get_validator(&key("a")), Some(entry("\"v1\"", "c1")));
        }

        #[test]
        fn bounded_by_capacity() {
            let (store, _clock) = store_with_clock(CacheSettings {
                validator_capacity: 1,
                ..CacheSettings::default()
            });
            store.set_validator(key("a"), entry("v1", "c1"));
            store.set_validator(key("b"), entry("v2", "c2"));
            assert!(store.get_validator(&key("a")).is_none());
            assert_eq!(store.validators().len(), 1);
        }

        #[test]
        fn independent_of_fresh() {
            let (store, _clock) = store_with_clock(CacheSettings::default());
            store.set_validator(key("a"), entry("v1", "c1"));
            store.invalidate_fresh(&key("a"));
            assert!(store.get_validator(&key("a")).is_some());
            assert!(store.get_fresh(&key("a")).is_none());
        }
    }

    mod concurrent {
        use super::*;

        const THREADS: usize = 8;
        const ROUNDS: usize = 200;

        fn pair(id: &str) -> ValidatorEntry {
            ValidatorEntry {
                validator: format!("W/\"{}\"", id),
                id: id.to_string(),
            }
        }

        #[test]
        fn one_key_stays_consistent() {
            let store = Arc::new(CacheStore::new(CacheSettings::default()));
            let shared = key("shared");

            std::thread::scope(|s| {
                for t in 0..THREADS {
                    let store = Arc::clone(&store);
                    let shared = shared.clone();
                    s.spawn(move || {
                        for i in 0..ROUNDS {
                            let id = format!("c{}-{}", t, i);
                            store.set_fresh(shared.clone(), id.clone());
                            store.set_validator(shared.clone(), pair(&id));

                            let seen = store.get_fresh(&shared).unwrap();
                            assert!(seen.starts_with('c'), "torn fresh value {}", seen);

                            let entry = store.get_validator(&shared).unwrap();
                            assert_eq!(entry, pair(&entry.id));
                        }
                    });
                }
            });

            assert_eq!(store.fresh().len(), 1);
            assert_eq!(store.validators().len(), 1);
            let last = store.get_fresh(&shared).unwrap();
            assert!(last.ends_with(&format!("-{}", ROUNDS - 1)), "last write {}", last);
        }

        #[test]
        fn distinct_keys_do_not_interfere() {
            let store = Arc::new(CacheStore::new(CacheSettings::default()));

            std::thread::scope(|s| {
                for t in 0..THREADS {
                    let store = Arc::clone(&store);
                    s.spawn(move || {
                        let own = key(&format!("file{}.txt", t));
                        for i in 0..ROUNDS {
                            store.set_fresh(own.clone(), format!("c{}-{}", t, i));
                            if i % 3 == 0 {
                                store.invalidate_fresh(&own);
                            }
                        }
                        store.set_fresh(own.clone(), format!("final{}", t));
                    });
                }
            });

            for t in 0..THREADS {
                let own = key(&format!("file{}.txt", t));
                assert_eq!(store.get_fresh(&own), Some(format!("final{}", t)));
            }
        }
    }

    #[test]
    fn global_is_shared() {
        let a = CacheStore::global();
        let b = CacheStore::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn key_display() {
        assert_eq!(
            CacheKey::new("octo", "hello", "feature/x", "src/a.rs").to_string(),
            "octo/hello@feature/x:src/a.rs"
        );
    }
}
