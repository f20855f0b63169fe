//! Published tree cache using moka
//!
//! Trees are immutable once published, so entries never go stale; the cache
//! only bounds memory.

use crate::types::DecisionTree;
use moka::future::Cache;
use std::sync::Arc;

/// Cache of published trees keyed by tree id
#[derive(Debug, Clone)]
pub struct TreeCache {
    inner: Cache<String, Arc<DecisionTree>>,
}

impl TreeCache {
    /// Create cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Insert a published tree
    pub async fn insert(&self, tree: Arc<DecisionTree>) {
        self.inner.insert(tree.tree_id.clone(), tree).await;
    }

    /// Get a cached tree
    pub async fn get(&self, tree_id: &str) -> Option<Arc<DecisionTree>> {
        self.inner.get(tree_id).await
    }

    /// Approximate number of cached trees
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }
}

impl Default for TreeCache {
    fn default() -> Self {
        Self::new(256)
    }
}
