//! Model-aware ranking service

use crate::checklist::safe_checklist;
use crate::config::RankingConfig;
use crate::confidence::{confidence_for, should_escalate, Confidence};
use crate::context::DiagnosticContext;
use crate::error::RankingError;
use crate::scoring::{calculate_score, compare_ranked, MatchingFactor, Score};
use efi_knowledge::{Citation, KnowledgeDocument, KnowledgeStore, StructuredFailureCard};
use serde::{Deserialize, Serialize};

/// One candidate root cause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCause {
    /// Card behind this cause
    pub failure_card_id: String,
    /// Card title
    pub title: String,
    /// Affected subsystem
    pub subsystem: String,
    /// Diagnosed root cause
    pub probable_root_cause: String,
    /// Fix confirmed in the field
    pub verified_fix: String,
    /// Ordered repair steps
    pub fix_steps: Vec<String>,
    /// Parts the fix consumes
    pub parts_required: Vec<String>,
    /// Additive ranking score
    pub score: f64,
    /// Factors that fired
    pub matching_factors: Vec<MatchingFactor>,
    /// Card success rate in [0, 1]
    pub historical_success_rate: f64,
    /// Sessions started from the card
    pub usage_count: u32,
    /// `global` or `tenant`
    pub scope: String,
}

impl RankedCause {
    fn new(card: &StructuredFailureCard, score: Score) -> Self {
        Self {
            failure_card_id: card.failure_card_id.clone(),
            title: card.title.clone(),
            subsystem: card.subsystem.clone(),
            probable_root_cause: card.probable_root_cause.clone(),
            verified_fix: card.verified_fix.clone(),
            fix_steps: card.fix_steps.clone(),
            parts_required: card.parts_required.clone(),
            score: score.value,
            matching_factors: score.matching_factors,
            historical_success_rate: card.historical_success_rate,
            usage_count: card.usage_count,
            scope: card.scope.label().to_string(),
        }
    }

    /// Check if a factor fired for this cause
    #[must_use]
    pub fn has_factor(&self, factor: MatchingFactor) -> bool {
        self.matching_factors.contains(&factor)
    }
}

/// Ranked causes with their confidence tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingResult {
    /// At most three causes, best first
    pub causes: Vec<RankedCause>,
    /// Tier derived from the top score
    pub confidence: Confidence,
}

/// Full diagnosis for a context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingReport {
    /// At most three causes, best first
    pub causes: Vec<RankedCause>,
    /// Tier derived from the top score
    pub confidence: Confidence,
    /// Hand off to a senior technician
    pub escalate: bool,
    /// Empty unless `escalate`
    pub escalation_reason: String,
    /// Present only for `low` confidence
    pub safe_checklist: Vec<String>,
    /// One per cause, same order
    pub citations: Vec<Citation>,
}

/// Ranks approved failure cards for a diagnostic context
#[derive(Debug, Clone)]
pub struct RankingService {
    knowledge: KnowledgeStore,
    config: RankingConfig,
}

impl RankingService {
    /// Create service over a knowledge store
    #[must_use]
    pub fn new(knowledge: KnowledgeStore, config: RankingConfig) -> Self {
        Self { knowledge, config }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Top causes with a confidence tier
    ///
    /// # Errors
    /// `RankingError::Validation` for a malformed context
    pub async fn rank_causes(
        &self,
        context: &DiagnosticContext,
    ) -> Result<RankingResult, RankingError> {
        let ranked = self.ranked_cards(context).await?;
        let causes: Vec<RankedCause> = ranked
            .into_iter()
            .map(|(score, card)| RankedCause::new(&card, score))
            .collect();
        let confidence = confidence_for(&causes, &self.config.confidence);

        tracing::debug!(
            organization_id = %context.organization_id,
            causes = causes.len(),
            %confidence,
            "causes ranked"
        );
        Ok(RankingResult { causes, confidence })
    }

    /// Escalation decision for a ranking
    #[must_use]
    pub fn should_escalate(
        &self,
        causes: &[RankedCause],
        confidence: Confidence) -> (bool, String,
    ) {
        should_escalate(causes, confidence)
    }

    /// Safety actions for the context's subsystem
    #[must_use]
    pub fn get_safe_checklist(&self, context: &DiagnosticContext) -> Vec<String> {
        safe_checklist(context.subsystem.as_deref())
            .iter()
            .map(|s| (*s).to_string())
            .collect()
    }

    /// Rank, tier, decide escalation and cite sources in one pass
    ///
    /// # Errors
    /// `RankingError::Validation` for a malformed context
    pub async fn diagnose(
        &self,
        context: &DiagnosticContext,
    ) -> Result<RankingReport, RankingError> {
        let ranked = self.ranked_cards(context).await?;
        let citations = ranked
            .iter()
            .map(|(_, card)| Citation::for_document(&KnowledgeDocument::FailureCard(card.clone())))
            .collect();
        let causes: Vec<RankedCause> = ranked
            .into_iter()
            .map(|(score, card)| RankedCause::new(&card, score))
            .collect();

        let confidence = confidence_for(&causes, &self.config.confidence);
        let (escalate, escalation_reason) = should_escalate(&causes, confidence);
        let safe_checklist = if confidence == Confidence::Low {
            self.get_safe_checklist(context)
        } else {
            Vec::new()
        };

        if escalate {
            tracing::info!(
                organization_id = %context.organization_id,
                subsystem = ?context.subsystem,
                %confidence,
                "diagnosis escalated"
            );
        }

        Ok(RankingReport {
            causes,
            confidence,
            escalate,
            escalation_reason,
            safe_checklist,
            citations,
        })
    }

    async fn ranked_cards(
        &self,
        context: &DiagnosticContext,
    ) -> Result<Vec<(Score, StructuredFailureCard)>, RankingError> {
        let normalized = context.normalize()?;
        let candidates = self
            .knowledge
            .approved_cards(
                Some(normalized.organization_id.as_str()),
                normalized.subsystem.as_deref(),
            )
            .await?;

        let mut scored: Vec<(Score, StructuredFailureCard)> = candidates
            .into_iter()
            .map(|card| (calculate_score(&card, &normalized, &self.config.weights), card))
            .collect();
        scored.sort_by(|a, b| compare_ranked((&a.0, &a.1), (&b.0, &b.1)));
        scored.truncate(self.config.cause_limit());
        Ok(scored)
    }
}
