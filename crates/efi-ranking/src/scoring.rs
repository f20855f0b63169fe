//! Candidate scoring
//!
//! Additive weighted sum over independent factors. Each factor that fires is
//! recorded in `matching_factors` so the ranking can be explained.

use crate::config::RankingWeights;
use crate::context::NormalizedContext;
use efi_knowledge::normalize::{normalize_term, normalize_terms};
use efi_knowledge::StructuredFailureCard;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Named scoring factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingFactor {
    /// Vehicle model matched
    ModelMatch,
    /// Only the make matched
    MakeMatch,
    /// At least one DTC matched
    DtcMatch,
    /// At least one symptom matched
    SymptomMatch,
    /// Success rate above the bonus threshold
    HighSuccessRate,
}

impl MatchingFactor {
    /// Tag used in ranking output
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ModelMatch => "model_match",
            Self::MakeMatch => "make_match",
            Self::DtcMatch => "dtc_match",
            Self::SymptomMatch => "symptom_match",
            Self::HighSuccessRate => "high_success_rate",
        }
    }
}

impl fmt::Display for MatchingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score and the factors behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Additive score
    pub value: f64,
    /// Factors that fired, in evaluation order
    pub matching_factors: Vec<MatchingFactor>,
}

/// Score one card against a context
#[must_use]
pub fn calculate_score(
    card: &StructuredFailureCard,
    context: &NormalizedContext,
    weights: &RankingWeights,
) -> Score {
    let mut value = 0.0;
    let mut factors = Vec::new();

    let same = |wanted: &Option<String>, actual: &Option<String>| match (wanted, actual) {
        (Some(w), Some(a)) => *w == normalize_term(a),
        _ => false,
    };

    if same(&context.vehicle_model, &card.vehicle_model) {
        value += weights.model_match;
        factors.push(MatchingFactor::ModelMatch);
    } else if same(&context.vehicle_make, &card.vehicle_make) {
        value += weights.make_match;
        factors.push(MatchingFactor::MakeMatch);
    }

    if card
        .dtc_codes
        .iter()
        .any(|code| context.dtc_codes.iter().any(|c| c.eq_ignore_ascii_case(code)))
    {
        value += weights.dtc_match;
        factors.push(MatchingFactor::DtcMatch);
    }

    if !context.symptoms.is_empty()
        && normalize_terms(&card.symptom_cluster)
            .iter()
            .any(|s| context.symptoms.contains(s))
    {
        value += weights.symptom_match;
        factors.push(MatchingFactor::SymptomMatch);
    }

    let rate = card.historical_success_rate.clamp(0.0, 1.0);
    if rate > weights.high_success_threshold {
        value += weights.high_success_bonus;
        factors.push(MatchingFactor::HighSuccessRate);
    } else {
        value += rate * weights.success_rate_weight;
    }

    Score {
        value,
        matching_factors: factors,
    }
}

/// Ranking order: score desc, `usage_count` desc, `failure_card_id` asc
#[must_use]
pub fn compare_ranked(
    a: (&Score, &StructuredFailureCard),
    b: (&Score, &StructuredFailureCard),
) -> Ordering {
    b.0.value
        .partial_cmp(&a.0.value)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.1.usage_count.cmp(&a.1.usage_count))
        .then_with(|| a.1.failure_card_id.cmp(&b.1.failure_card_id))
}
