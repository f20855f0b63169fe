//! Knowledge store service
//!
//! Owns articles, failure cards and error codes. All creation goes in as
//! `draft`; only approved documents reach search and ranking.

use crate::error::KnowledgeError;
use crate::normalize::{
    normalize_dtc, normalize_dtc_codes, normalize_optional, normalize_term, normalize_terms,
};
use crate::search::{rank_hits, MatchCriteria, SearchHit, SearchQuery};
use crate::types::{
    ApprovalStatus, CardSource, CardUpdate, ErrorCodeDefinition, KnowledgeArticle,
    KnowledgeDocument, NewErrorCode, NewFailureCard, NewKnowledgeArticle, Review, Reviewable,
    StructuredFailureCard, TicketResolution, DEFAULT_SUCCESS_RATE,
};
use efi_store::{
    new_id, Collection, MemoryCollection, Scope, SharedClock, UpdateOutcome, Visibility,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Knowledge store configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Hits returned when a query has no limit
    pub default_search_limit: usize,
    /// Upper bound on any query limit
    pub max_search_limit: usize,
}

impl KnowledgeConfig {
    fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_search_limit)
            .min(self.max_search_limit)
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            default_search_limit: 10,
            max_search_limit: 50,
        }
    }
}

/// Collections backing the knowledge store
#[derive(Debug, Clone)]
pub struct KnowledgeCollections {
    /// Knowledge articles
    pub articles: Arc<dyn Collection<KnowledgeArticle>>,
    /// Structured failure cards
    pub failure_cards: Arc<dyn Collection<StructuredFailureCard>>,
    /// DTC reference definitions
    pub error_codes: Arc<dyn Collection<ErrorCodeDefinition>>,
}

impl KnowledgeCollections {
    /// Fresh in-memory collections
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            articles: Arc::new(MemoryCollection::new()),
            failure_cards: Arc::new(MemoryCollection::new()),
            error_codes: Arc::new(MemoryCollection::new()),
        }
    }
}

/// Per-status document counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Documents in draft
    pub draft: usize,
    /// Documents awaiting review
    pub pending: usize,
    /// Approved documents
    pub approved: usize,
    /// Rejected documents
    pub rejected: usize,
    /// All documents
    pub total: usize,
}

impl StatusCounts {
    fn tally(statuses: impl IntoIterator<Item = ApprovalStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            match status {
                ApprovalStatus::Draft => counts.draft += 1,
                ApprovalStatus::Pending => counts.pending += 1,
                ApprovalStatus::Approved => counts.approved += 1,
                ApprovalStatus::Rejected => counts.rejected += 1,
            }
            counts.total += 1;
        }
        counts
    }
}

/// Knowledge base statistics for one caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeStats {
    /// Article counts
    pub articles: StatusCounts,
    /// Failure card counts
    pub failure_cards: StatusCounts,
    /// Visible error code definitions
    pub error_codes: usize,
}

/// Knowledge store service
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    articles: Arc<dyn Collection<KnowledgeArticle>>,
    cards: Arc<dyn Collection<StructuredFailureCard>>,
    error_codes: Arc<dyn Collection<ErrorCodeDefinition>>,
    clock: SharedClock,
    config: KnowledgeConfig,
}

impl KnowledgeStore {
    /// Create store over the given collections
    #[must_use]
    pub fn new(
        collections: KnowledgeCollections,
        clock: SharedClock,
        config: KnowledgeConfig,
    ) -> Self {
        Self {
            articles: collections.articles,
            cards: collections.failure_cards,
            error_codes: collections.error_codes,
            clock,
            config,
        }
    }

    /// Create store over fresh in-memory collections
    #[must_use]
    pub fn in_memory(clock: SharedClock) -> Self {
        Self::new(KnowledgeCollections::in_memory(), clock, KnowledgeConfig::default())
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Search approved, visible knowledge
    ///
    /// # Errors
    /// `KnowledgeError::Validation` for malformed DTC codes
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, KnowledgeError> {
        let criteria = MatchCriteria::from_query(query)?;
        let visibility = Visibility::for_caller(query.organization_id.as_deref());
        let limit = self.config.effective_limit(query.limit);

        let articles = self
            .articles
            .find(&|a: &KnowledgeArticle| {
                a.approval_status == ApprovalStatus::Approved && visibility.permits(&a.scope)
            })
            .await?;
        let cards = self
            .cards
            .find(&|c: &StructuredFailureCard| {
                c.approval_status == ApprovalStatus::Approved && visibility.permits(&c.scope)
            })
            .await?;

        let hits: Vec<SearchHit> = articles
            .into_iter()
            .map(KnowledgeDocument::Article)
            .chain(cards.into_iter().map(KnowledgeDocument::FailureCard))
            .filter_map(|document| {
                criteria.score(&document).map(|(relevance_score, matched_on)| SearchHit {
                    document,
                    relevance_score,
                    matched_on,
                })
            })
            .collect();

        let ranked = rank_hits(hits, limit);
        tracing::debug!(
            organization_id = ?query.organization_id,
            hits = ranked.len(),
            "knowledge search"
        );
        Ok(ranked)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a draft knowledge article
    ///
    /// # Errors
    /// `KnowledgeError::Validation` for a blank title or malformed DTC code
    pub async fn create_knowledge_article(
        &self,
        input: NewKnowledgeArticle,
    ) -> Result<KnowledgeArticle, KnowledgeError> {
        if input.title.trim().is_empty() {
            return Err(KnowledgeError::Validation("article title is required".into()));
        }

        let now = self.clock.now();
        let article = KnowledgeArticle {
            knowledge_id: new_id("ka"),
            scope: Scope::from_organization(input.organization_id.as_deref()),
            knowledge_type: input.knowledge_type,
            title: input.title.trim().to_string(),
            content: input.content,
            tags: normalize_terms(&input.tags),
            symptoms: normalize_terms(&input.symptoms),
            dtc_codes: normalize_dtc_codes(&input.dtc_codes)?,
            vehicle_make: input.vehicle_make.filter(|m| !m.trim().is_empty()),
            vehicle_model: input.vehicle_model.filter(|m| !m.trim().is_empty()),
            subsystem: normalize_optional(input.subsystem.as_deref()),
            confidence_score: input
                .confidence_score
                .unwrap_or(DEFAULT_SUCCESS_RATE)
                .clamp(0.0, 1.0),
            approval_status: ApprovalStatus::Draft,
            version: 1,
            created_by: input.created_by,
            review: None,
            created_at: now,
            updated_at: now,
        };

        self.articles.insert(article.clone()).await?;
        tracing::info!(
            knowledge_id = %article.knowledge_id,
            scope = article.scope.label(),
            "knowledge article drafted"
        );
        Ok(article)
    }

    /// Create a draft failure card
    ///
    /// # Errors
    /// `KnowledgeError::Validation` for a blank subsystem or root cause, or a
    /// malformed DTC code
    pub async fn create_failure_card(
        &self,
        input: NewFailureCard,
    ) -> Result<StructuredFailureCard, KnowledgeError> {
        let subsystem = normalize_term(&input.subsystem);
        if subsystem.is_empty() {
            return Err(KnowledgeError::Validation("failure card subsystem is required".into()));
        }
        if input.probable_root_cause.trim().is_empty() {
            return Err(KnowledgeError::Validation(
                "failure card root cause is required".into(),
            ));
        }

        let now = self.clock.now();
        let title = if input.title.trim().is_empty() {
            format!("{}: {}", subsystem, input.probable_root_cause.trim())
        } else {
            input.title.trim().to_string()
        };

        let card = StructuredFailureCard {
            failure_card_id: new_id("fc"),
            knowledge_id: input.knowledge_id,
            scope: Scope::from_organization(input.organization_id.as_deref()),
            title,
            subsystem,
            vehicle_make: input.vehicle_make.filter(|m| !m.trim().is_empty()),
            vehicle_model: input.vehicle_model.filter(|m| !m.trim().is_empty()),
            vehicle_category: input.vehicle_category.filter(|m| !m.trim().is_empty()),
            symptom_cluster: normalize_terms(&input.symptom_cluster),
            dtc_codes: normalize_dtc_codes(&input.dtc_codes)?,
            probable_root_cause: input.probable_root_cause.trim().to_string(),
            verified_fix: input.verified_fix,
            fix_steps: input.fix_steps,
            parts_required: input.parts_required,
            historical_success_rate: input
                .historical_success_rate
                .unwrap_or(DEFAULT_SUCCESS_RATE)
                .clamp(0.0, 1.0),
            outcomes_recorded: 0,
            recurrence_counter: 0,
            usage_count: 0,
            approval_status: ApprovalStatus::Draft,
            source: input.source,
            version: 1,
            created_by: input.created_by,
            review: None,
            created_at: now,
            updated_at: now,
        };

        self.cards.insert(card.clone()).await?;
        tracing::info!(
            failure_card_id = %card.failure_card_id,
            subsystem = %card.subsystem,
            scope = card.scope.label(),
            "failure card drafted"
        );
        Ok(card)
    }

    /// Write a resolved ticket up as a tenant-scoped draft card
    ///
    /// # Errors
    /// Same as [`create_failure_card`](Self::create_failure_card), plus a
    /// blank ticket id
    pub async fn create_failure_card_from_ticket(
        &self,
        resolution: TicketResolution,
    ) -> Result<StructuredFailureCard, KnowledgeError> {
        if resolution.ticket_id.trim().is_empty() {
            return Err(KnowledgeError::Validation("ticket id is required".into()));
        }

        self.create_failure_card(NewFailureCard {
            organization_id: Some(resolution.organization_id),
            knowledge_id: None,
            title: resolution.title.unwrap_or_default(),
            subsystem: resolution.subsystem,
            vehicle_make: resolution.vehicle_make,
            vehicle_model: resolution.vehicle_model,
            vehicle_category: resolution.vehicle_category,
            symptom_cluster: resolution.symptoms,
            dtc_codes: resolution.dtc_codes,
            probable_root_cause: resolution.root_cause,
            verified_fix: resolution.fix_description,
            fix_steps: resolution.fix_steps,
            parts_required: resolution.parts_used,
            historical_success_rate: None,
            source: CardSource::Ticket {
                ticket_id: resolution.ticket_id,
            },
            created_by: resolution.created_by,
        })
        .await
    }

    // ------------------------------------------------------------------
    // Review workflow
    // ------------------------------------------------------------------

    /// Move a draft article or card to `pending`
    ///
    /// Returns `false` for unknown ids.
    ///
    /// # Errors
    /// `KnowledgeError::InvalidState` if the document is not a draft
    pub async fn submit_for_review(&self, id: &str) -> Result<bool, KnowledgeError> {
        let now = self.clock.now();
        if transition(self.articles.as_ref(), id, ApprovalStatus::Pending, None, now)
            .await?
            .is_some()
        {
            return Ok(true);
        }
        Ok(transition(self.cards.as_ref(), id, ApprovalStatus::Pending, None, now)
            .await?
            .is_some())
    }

    /// Approve an article or card.
    ///
    /// Approving an article cascades to failure cards linked to it that are
    /// still awaiting review. Returns `false` for unknown ids.
    ///
    /// # Errors
    /// `KnowledgeError::InvalidState` if already approved or rejected
    pub async fn approve_knowledge(
        &self,
        id: &str,
        approver: &str,
    ) -> Result<bool, KnowledgeError> {
        self.review(id, ApprovalStatus::Approved, approver, None).await
    }

    /// Reject an article or card. Returns `false` for unknown ids.
    ///
    /// # Errors
    /// `KnowledgeError::InvalidState` if already approved or rejected
    pub async fn reject_knowledge(
        &self,
        id: &str,
        approver: &str,
        reason: &str,
    ) -> Result<bool, KnowledgeError> {
        self.review(id, ApprovalStatus::Rejected, approver, Some(reason.to_string()))
            .await
    }

    async fn review(
        &self,
        id: &str,
        status: ApprovalStatus,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<bool, KnowledgeError> {
        let now = self.clock.now();
        let review = Review {
            status,
            reviewer: reviewer.to_string(),
            notes,
            reviewed_at: now,
        };

        if let Some(article) =
            transition(self.articles.as_ref(), id, status, Some(review.clone()), now).await?
        {
            tracing::info!(
                knowledge_id = %article.knowledge_id,
                %status,
                reviewer,
                "article reviewed"
            );
            if status == ApprovalStatus::Approved {
                self.cascade_approval(&article.knowledge_id, &review).await?;
            }
            return Ok(true);
        }

        match transition(self.cards.as_ref(), id, status, Some(review), now).await? {
            Some(card) => {
                tracing::info!(
                    failure_card_id = %card.failure_card_id,
                    %status,
                    reviewer,
                    "failure card reviewed"
                );
                Ok(true)
            }
            None => {
                tracing::debug!(id, "review requested for unknown document");
                Ok(false)
            }
        }
    }

    async fn cascade_approval(
        &self,
        knowledge_id: &str,
        review: &Review,
    ) -> Result<(), KnowledgeError> {
        let linked = self
            .cards
            .find(&|c: &StructuredFailureCard| {
                c.knowledge_id.as_deref() == Some(knowledge_id)
                    && c.approval_status.can_transition_to(ApprovalStatus::Approved)
            })
            .await?;

        for card in linked {
            let outcome = self
                .cards
                .update_if(
                    &card.failure_card_id,
                    &|c| c.approval_status.can_transition_to(ApprovalStatus::Approved),
                    &mut |c| {
                        c.apply_status(
                            ApprovalStatus::Approved,
                            Some(review.clone()),
                            review.reviewed_at,
                        );
                    },
                )
                .await?;
            if outcome.is_updated() {
                tracing::info!(
                    failure_card_id = %card.failure_card_id,
                    knowledge_id,
                    "linked failure card approved"
                );
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Counts by approval status, scoped like search
    ///
    /// # Errors
    /// Store failures only
    pub async fn get_stats(
        &self,
        organization_id: Option<&str>,
    ) -> Result<KnowledgeStats, KnowledgeError> {
        let visibility = Visibility::for_caller(organization_id);
        let articles = self
            .articles
            .find(&|a: &KnowledgeArticle| visibility.permits(&a.scope))
            .await?;
        let cards = self
            .cards
            .find(&|c: &StructuredFailureCard| visibility.permits(&c.scope))
            .await?;
        let error_codes = self
            .error_codes
            .count(&|e: &ErrorCodeDefinition| visibility.permits(&e.scope))
            .await?;

        Ok(KnowledgeStats {
            articles: StatusCounts::tally(articles.iter().map(|a| a.approval_status)),
            failure_cards: StatusCounts::tally(cards.iter().map(|c| c.approval_status)),
            error_codes,
        })
    }

    /// Fetch a failure card visible to the caller (any status)
    ///
    /// # Errors
    /// Store failures only
    pub async fn get_failure_card(
        &self,
        failure_card_id: &str,
        organization_id: Option<&str>,
    ) -> Result<Option<StructuredFailureCard>, KnowledgeError> {
        let visibility = Visibility::for_caller(organization_id);
        Ok(self
            .cards
            .get(failure_card_id)
            .await?
            .filter(|c| visibility.permits(&c.scope)))
    }

    /// Fetch an article visible to the caller (any status)
    ///
    /// # Errors
    /// Store failures only
    pub async fn get_article(
        &self,
        knowledge_id: &str,
        organization_id: Option<&str>,
    ) -> Result<Option<KnowledgeArticle>, KnowledgeError> {
        let visibility = Visibility::for_caller(organization_id);
        Ok(self
            .articles
            .get(knowledge_id)
            .await?
            .filter(|a| visibility.permits(&a.scope)))
    }

    /// Approved cards visible to the caller, optionally for one subsystem
    ///
    /// # Errors
    /// Store failures only
    pub async fn approved_cards(
        &self,
        organization_id: Option<&str>,
        subsystem: Option<&str>,
    ) -> Result<Vec<StructuredFailureCard>, KnowledgeError> {
        let visibility = Visibility::for_caller(organization_id);
        let subsystem = normalize_optional(subsystem);
        Ok(self
            .cards
            .find(&|c: &StructuredFailureCard| {
                c.approval_status == ApprovalStatus::Approved
                    && visibility.permits(&c.scope)
                    && subsystem
                        .as_deref()
                        .map_or(true, |s| c.subsystem.eq_ignore_ascii_case(s))
            })
            .await?)
    }

    // ------------------------------------------------------------------
    // Card statistics
    // ------------------------------------------------------------------

    /// Count one use of a card (technician picked it). `false` if the card
    /// is unknown or not visible to the caller.
    ///
    /// # Errors
    /// Store failures only
    pub async fn record_card_usage(
        &self,
        failure_card_id: &str,
        organization_id: Option<&str>,
    ) -> Result<bool, KnowledgeError> {
        let visibility = Visibility::for_caller(organization_id);
        let now = self.clock.now();
        let outcome = self
            .cards
            .update_if(
                failure_card_id,
                &|c: &StructuredFailureCard| visibility.permits(&c.scope),
                &mut |c| {
                    c.usage_count += 1;
                    c.updated_at = now;
                },
            )
            .await?;
        Ok(outcome.is_updated())
    }

    /// Fold a repair outcome score (0.0 – 1.0) into the card's success rate.
    /// `false` if the card is unknown or not visible to the caller.
    ///
    /// # Errors
    /// Store failures only
    pub async fn record_card_outcome(
        &self,
        failure_card_id: &str,
        organization_id: Option<&str>,
        score: f64,
    ) -> Result<bool, KnowledgeError> {
        let visibility = Visibility::for_caller(organization_id);
        let now = self.clock.now();
        let outcome = self
            .cards
            .update_if(
                failure_card_id,
                &|c: &StructuredFailureCard| visibility.permits(&c.scope),
                &mut |c| c.record_outcome(score, now),
            )
            .await?;
        if let UpdateOutcome::Updated(card) = &outcome {
            tracing::debug!(
                failure_card_id,
                rate = card.historical_success_rate,
                outcomes = card.outcomes_recorded,
                "card outcome recorded"
            );
        }
        Ok(outcome.is_updated())
    }

    /// Merge field feedback into a card visible to the caller
    ///
    /// # Errors
    /// `KnowledgeError::NotFound` for an unknown or foreign card,
    /// `KnowledgeError::Validation` for malformed DTC codes
    pub async fn apply_card_update(
        &self,
        failure_card_id: &str,
        organization_id: Option<&str>,
        update: CardUpdate,
    ) -> Result<StructuredFailureCard, KnowledgeError> {
        let visibility = Visibility::for_caller(organization_id);
        let update = CardUpdate {
            additional_dtc_codes: normalize_dtc_codes(&update.additional_dtc_codes)?,
            additional_symptoms: normalize_terms(&update.additional_symptoms),
            ..update
        };
        let now = self.clock.now();
        match self
            .cards
            .update_if(
                failure_card_id,
                &|c: &StructuredFailureCard| visibility.permits(&c.scope),
                &mut |c| c.apply_update(&update, now),
            )
            .await?
        {
            UpdateOutcome::Updated(card) => {
                tracing::info!(
                    failure_card_id,
                    version = card.version,
                    recurrence = card.recurrence_counter,
                    "failure card updated from field feedback"
                );
                Ok(card)
            }
            UpdateOutcome::NotFound | UpdateOutcome::PreconditionFailed(_) => {
                Err(KnowledgeError::NotFound {
                    kind: "failure card",
                    id: failure_card_id.to_string(),
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Error codes
    // ------------------------------------------------------------------

    /// Insert or replace an error code definition
    ///
    /// # Errors
    /// `KnowledgeError::Validation` for a malformed code or blank description
    pub async fn upsert_error_code(
        &self,
        input: NewErrorCode,
    ) -> Result<ErrorCodeDefinition, KnowledgeError> {
        let code = normalize_dtc(&input.code)?;
        if input.description.trim().is_empty() {
            return Err(KnowledgeError::Validation("error code description is required".into()));
        }

        let scope = Scope::from_organization(input.organization_id.as_deref());
        let definition = ErrorCodeDefinition {
            definition_id: ErrorCodeDefinition::definition_id_for(&scope, &code),
            code,
            scope,
            description: input.description.trim().to_string(),
            subsystem: normalize_optional(input.subsystem.as_deref()),
            severity: input.severity,
            possible_causes: input.possible_causes,
            vehicle_make: input.vehicle_make,
            updated_at: self.clock.now(),
        };

        let replacement = definition.clone();
        let outcome = self
            .error_codes
            .update(&definition.definition_id, &mut |existing| *existing = replacement.clone())
            .await?;
        if !outcome.is_updated() {
            self.error_codes.insert(definition.clone()).await?;
        }
        tracing::debug!(definition_id = %definition.definition_id, "error code upserted");
        Ok(definition)
    }

    /// Look up a code; a tenant definition shadows the global one
    ///
    /// # Errors
    /// `KnowledgeError::Validation` for a malformed code
    pub async fn lookup_error_code(
        &self,
        code: &str,
        organization_id: Option<&str>,
    ) -> Result<Option<ErrorCodeDefinition>, KnowledgeError> {
        let code = normalize_dtc(code)?;
        let tenant_scope = Scope::from_organization(organization_id);
        if !tenant_scope.is_global() {
            let tenant_id = ErrorCodeDefinition::definition_id_for(&tenant_scope, &code);
            if let Some(def) = self.error_codes.get(&tenant_id).await? {
                return Ok(Some(def));
            }
        }
        let global_id = ErrorCodeDefinition::definition_id_for(&Scope::Global, &code);
        Ok(self.error_codes.get(&global_id).await?)
    }
}

/// Validated review transition on one document.
///
/// `Ok(None)` if the id is unknown, `InvalidState` if the current status
/// cannot move to `to`.
async fn transition<D: Reviewable>(
    collection: &dyn Collection<D>,
    id: &str,
    to: ApprovalStatus,
    review: Option<Review>,
    at: chrono::DateTime<chrono::Utc>,
) -> Result<Option<D>, KnowledgeError> {
    match collection
        .update_if(id, &|d: &D| d.approval_status().can_transition_to(to), &mut |d| {
            d.apply_status(to, review.clone(), at);
        })
        .await?
    {
        UpdateOutcome::Updated(doc) => Ok(Some(doc)),
        UpdateOutcome::NotFound => Ok(None),
        UpdateOutcome::PreconditionFailed(doc) => Err(KnowledgeError::InvalidState {
            id: id.to_string(),
            from: doc.approval_status(),
            to,
        }),
    }
}
