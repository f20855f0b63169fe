//! Decision tree engine configuration

use serde::{Deserialize, Serialize};

/// Default GST rate applied to estimates
pub const DEFAULT_GST_RATE: f64 = 0.18;

/// Decision tree engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// GST rate applied to the estimate subtotal
    pub gst_rate: f64,
    /// Max published trees held in the cache
    pub tree_cache_capacity: u64,
}

impl TreeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set GST rate
    #[inline]
    #[must_use]
    pub fn with_gst_rate(mut self, rate: f64) -> Self {
        self.gst_rate = rate;
        self
    }

    /// Set cache capacity
    #[inline]
    #[must_use]
    pub fn with_tree_cache_capacity(mut self, capacity: u64) -> Self {
        self.tree_cache_capacity = capacity;
        self
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            gst_rate: DEFAULT_GST_RATE,
            tree_cache_capacity: 256,
        }
    }
}
