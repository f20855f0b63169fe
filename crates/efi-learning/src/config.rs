//! Learning pipeline configuration

use serde::{Deserialize, Serialize};

/// Longest accepted pattern window (ten years)
pub const MAX_PATTERN_WINDOW_DAYS: i64 = 3650;

/// Learning pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Trailing window for pattern detection, 1 to [`MAX_PATTERN_WINDOW_DAYS`]
    pub pattern_window_days: i64,
    /// Matching events needed to raise an alert
    pub pattern_threshold: usize,
    /// Batch size when the caller passes zero
    pub default_batch_size: usize,
    /// `created_by` on cards drafted without a technician id
    pub pipeline_actor: String,
}

impl LearningConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pattern window
    #[inline]
    #[must_use]
    pub fn with_pattern_window_days(mut self, days: i64) -> Self {
        self.pattern_window_days = days;
        self
    }

    /// Set alert threshold
    #[inline]
    #[must_use]
    pub fn with_pattern_threshold(mut self, threshold: usize) -> Self {
        self.pattern_threshold = threshold;
        self
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            pattern_window_days: 30,
            pattern_threshold: 3,
            default_batch_size: 50,
            pipeline_actor: "learning-pipeline".to_string(),
        }
    }
}
