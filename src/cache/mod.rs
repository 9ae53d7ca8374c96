//! cache
//!
//! In-memory caches that keep commit resolution off the rate-limited
//! upstream.
//!
//! # Design
//!
//! [`CacheStore`] holds two independent maps keyed by
//! `(owner, repo, branch, path)`:
//!
//! - **fresh**: resolved commit ids, 500 entries, 5 second TTL. A hit means
//!   no network call at all.
//! - **validator**: `(validator, id)` pairs, 50 000 entries, no TTL. Lets a
//!   repeat query go out as a conditional request that upstream can answer
//!   with "not modified" without spending anonymous quota.
//!
//! Neither map survives a restart. Capacities, TTL and the [`Clock`] are
//! injectable; [`CacheStore::global`] returns the shared default instance.
//!
//! # Example
//!
//! ```
//! use trellis::cache::{CacheKey, CacheStore};
//!
//! let store = CacheStore::default();
//! let key = CacheKey::new("octocat", "hello-world", "main", "README");
//! store.set_fresh(key.clone(), "7fd1a60b".to_string());
//! assert_eq!(store.get_fresh(&key).as_deref(), Some("7fd1a60b"));
//! ```

mod clock;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{
    CacheKey, CacheSettings, CacheStore, FreshCache, ValidatorCache, ValidatorEntry,
    DEFAULT_FRESH_CAPACITY, DEFAULT_FRESH_TTL_SECS, DEFAULT_VALIDATOR_CAPACITY,
};
