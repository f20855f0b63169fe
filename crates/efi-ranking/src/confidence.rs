//! Confidence tiers and escalation

use crate::config::ConfidenceThresholds;
use crate::service::RankedCause;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse certainty of a ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Nothing ranked, or top score below the low threshold
    Low,
    /// Neither low nor high
    Medium,
    /// Top score and factor count meet the high thresholds
    High,
}

impl Confidence {
    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier a ranking by its top cause
#[must_use]
pub fn confidence_for(causes: &[RankedCause], thresholds: &ConfidenceThresholds) -> Confidence {
    let Some(top) = causes.first() else {
        return Confidence::Low;
    };
    if top.score < thresholds.low_score {
        Confidence::Low
    } else if top.score >= thresholds.high_score
        && top.matching_factors.len() >= thresholds.high_min_factors
    {
        Confidence::High
    } else {
        Confidence::Medium
    }
}

/// Whether a human expert should take over, with the reason.
///
/// Returns `(false, "")` when the ranking can be trusted.
#[must_use]
pub fn should_escalate(causes: &[RankedCause], confidence: Confidence) -> (bool, String) {
    if causes.is_empty() {
        return (
            true,
            "No approved failure knowledge matches this vehicle and symptoms; \
             escalate to a senior technician."
                .to_string(),
        );
    }
    if confidence == Confidence::Low {
        return (
            true,
            format!(
                "Low confidence in the top cause ({:.2}); \
                 confirm with a senior technician before repair.",
                causes[0].score
            ),
        );
    }
    (false, String::new())
}
