//! Ranking weights and thresholds

use serde::{Deserialize, Serialize};

/// Additive scoring weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    /// Exact vehicle model match
    pub model_match: f64,
    /// DTC intersection non-empty
    pub dtc_match: f64,
    /// Symptom intersection non-empty
    pub symptom_match: f64,
    /// Vehicle make match, only counted without a model match
    pub make_match: f64,
    /// Bonus above `high_success_threshold`
    pub high_success_bonus: f64,
    /// Linear weight on the success rate otherwise
    pub success_rate_weight: f64,
    /// Success rate above which the bonus applies
    pub high_success_threshold: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            model_match: 0.35,
            dtc_match: 0.30,
            symptom_match: 0.20,
            make_match: 0.15,
            high_success_bonus: 0.15,
            success_rate_weight: 0.10,
            high_success_threshold: 0.7,
        }
    }
}

/// Confidence tier thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceThresholds {
    /// Minimum top score for `high`
    pub high_score: f64,
    /// Minimum matching factors on the top cause for `high`
    pub high_min_factors: usize,
    /// Top score below this is `low`
    pub low_score: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high_score: 0.70,
            high_min_factors: 2,
            low_score: 0.30,
        }
    }
}

/// Ranking service configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Scoring weights
    pub weights: RankingWeights,
    /// Tier thresholds
    pub confidence: ConfidenceThresholds,
    /// Causes returned (never more than 3)
    pub max_causes: usize,
}

/// Hard cap on ranked causes
pub const MAX_RANKED_CAUSES: usize = 3;

impl RankingConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set weights
    #[inline]
    #[must_use]
    pub fn with_weights(mut self, weights: RankingWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Set confidence thresholds
    #[inline]
    #[must_use]
    pub fn with_confidence(mut self, confidence: ConfidenceThresholds) -> Self {
        self.confidence = confidence;
        self
    }

    /// Set number of causes returned, capped at 3
    #[inline]
    #[must_use]
    pub fn with_max_causes(mut self, max: usize) -> Self {
        self.max_causes = max;
        self
    }

    /// Effective cause limit
    #[inline]
    #[must_use]
    pub fn cause_limit(&self) -> usize {
        self.max_causes.clamp(1, MAX_RANKED_CAUSES)
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            confidence: ConfidenceThresholds::default(),
            max_causes: MAX_RANKED_CAUSES,
        }
    }
}
