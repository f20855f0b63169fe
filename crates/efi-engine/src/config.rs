//! Engine configuration
//!
//! Loaded from TOML; every section and field is optional and falls back to
//! its default.
//!
//! ```toml
//! [tree]
//! gst_rate = 0.18
//!
//! [ranking.weights]
//! model_match = 0.35
//!
//! [learning]
//! pattern_window_days = 30
//! pattern_threshold = 3
//! ```

use crate::error::EngineError;
use efi_knowledge::KnowledgeConfig;
use efi_learning::{LearningConfig, MAX_PATTERN_WINDOW_DAYS};
use efi_ranking::RankingConfig;
use efi_tree::TreeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Log output settings for the binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Failure Intelligence Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Search limits
    pub knowledge: KnowledgeConfig,
    /// GST rate and tree cache size
    pub tree: TreeConfig,
    /// Weights and confidence thresholds
    pub ranking: RankingConfig,
    /// Pattern window and threshold
    pub learning: LearningConfig,
    /// Logging
    pub telemetry: TelemetryConfig,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With knowledge settings
    #[inline]
    #[must_use]
    pub fn with_knowledge(mut self, knowledge: KnowledgeConfig) -> Self {
        self.knowledge = knowledge;
        self
    }

    /// With tree settings
    #[inline]
    #[must_use]
    pub fn with_tree(mut self, tree: TreeConfig) -> Self {
        self.tree = tree;
        self
    }

    /// With ranking settings
    #[inline]
    #[must_use]
    pub fn with_ranking(mut self, ranking: RankingConfig) -> Self {
        self.ranking = ranking;
        self
    }

    /// With learning settings
    #[inline]
    #[must_use]
    pub fn with_learning(mut self, learning: LearningConfig) -> Self {
        self.learning = learning;
        self
    }

    /// Parse configuration from a TOML string
    ///
    /// # Errors
    /// `EngineError::Config` for malformed TOML or out-of-range values
    pub fn parse(contents: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| {
                EngineError::Config(format!("failed to parse config: {e}"))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// `EngineError::Io` if unreadable, `EngineError::Config` if invalid
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::parse(&contents)?;
        tracing::debug!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// `EngineError::Config` if serialization fails
    pub fn to_toml(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `EngineError::Config` naming the offending field
    pub fn validate(&self) -> Result<(), EngineError> {
        let bad = |field: &str| Err(EngineError::Config(format!("{field} is out of range")));

        if !(0.0..=1.0).contains(&self.tree.gst_rate) {
            return bad("tree.gst_rate");
        }
        if self.knowledge.default_search_limit == 0
            || self.knowledge.default_search_limit > self.knowledge.max_search_limit
        {
            return bad("knowledge.default_search_limit");
        }
        if self.learning.pattern_threshold == 0 {
            return bad("learning.pattern_threshold");
        }
        if !(1..=MAX_PATTERN_WINDOW_DAYS).contains(&self.learning.pattern_window_days) {
            return bad("learning.pattern_window_days");
        }
        let c = &self.ranking.confidence;
        if c.low_score > c.high_score {
            return bad("ranking.confidence.low_score");
        }
        Ok(())
    }
}
