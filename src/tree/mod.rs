//! tree
//!
//! Deletion-aware flattening of remote directory trees.
//!
//! See [`TreeReconciler`] for the algorithm. The reconciler only ever talks to
//! upstream through [`crate::forge::TreeFetcher`] and keeps no state between
//! runs.

mod reconcile;

pub use reconcile::{ancestors, TreeReconciler};
