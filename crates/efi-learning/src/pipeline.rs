//! Continuous learning pipeline
//!
//! Every closed ticket becomes a [`LearningEvent`]. Enrichment (card
//! statistics, pattern detection, draft cards) is best-effort: a failure is
//! logged and the capture still succeeds. Each event is enriched exactly
//! once; the `processed` flag is claimed with a conditional update before
//! any side effect runs. Reviews claim the event the same way, moving it to
//! `in_review` before touching any card.

use crate::config::LearningConfig;
use crate::error::LearningError;
use crate::patterns::{distinct_tickets, PatternKey, Window};
use crate::types::{
    AlertAction, AlertStatus, BatchReport, CaptureReceipt, ClosureData, LearningEvent,
    LearningReview, LearningStats, LearningStatus, ModelRiskAlert, PatternResult, RepairOutcome,
    ReviewAction, ReviewOutcome,
};
use efi_knowledge::normalize::{normalize_dtc_codes, normalize_terms};
use efi_knowledge::{CardSource, CardUpdate, KnowledgeError, KnowledgeStore, NewFailureCard};
use efi_store::{new_id, Collection, MemoryCollection, SharedClock, UpdateOutcome};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Collections backing the pipeline
#[derive(Debug, Clone)]
pub struct LearningCollections {
    /// Learning events
    pub events: Arc<dyn Collection<LearningEvent>>,
    /// Model risk alerts
    pub alerts: Arc<dyn Collection<ModelRiskAlert>>,
}

impl LearningCollections {
    /// Fresh in-memory collections
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            events: Arc::new(MemoryCollection::new()),
            alerts: Arc::new(MemoryCollection::new()),
        }
    }
}

/// Continuous learning pipeline
#[derive(Debug, Clone)]
pub struct LearningPipeline {
    knowledge: KnowledgeStore,
    events: Arc<dyn Collection<LearningEvent>>,
    alerts: Arc<dyn Collection<ModelRiskAlert>>,
    clock: SharedClock,
    config: LearningConfig,
    // Serializes alert create-or-bump so two captures cannot both create
    pattern_lock: Arc<Mutex<()>>,
}

impl LearningPipeline {
    /// Create pipeline over a knowledge store and its own collections
    #[must_use]
    pub fn new(
        knowledge: KnowledgeStore,
        collections: LearningCollections,
        clock: SharedClock,
        config: LearningConfig,
    ) -> Self {
        Self {
            knowledge,
            events: collections.events,
            alerts: collections.alerts,
            clock,
            config,
            pattern_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Capture
    // ------------------------------------------------------------------

    /// Record a ticket closure and run enrichment
    ///
    /// A guiding card the organization cannot see is dropped from the event.
    ///
    /// # Errors
    /// `LearningError::Validation` for a blank ticket id, organization or
    /// subsystem, or a malformed DTC code
    pub async fn capture_ticket_closure(
        &self,
        ticket_id: &str,
        organization_id: &str,
        closure: ClosureData,
    ) -> Result<CaptureReceipt, LearningError> {
        let ticket_id = ticket_id.trim();
        let organization_id = organization_id.trim();
        if ticket_id.is_empty() {
            return Err(LearningError::Validation("ticket_id is required".into()));
        }
        if organization_id.is_empty() {
            return Err(LearningError::Validation("organization_id is required".into()));
        }
        if closure.subsystem.trim().is_empty() {
            return Err(LearningError::Validation("subsystem is required".into()));
        }
        let failure_card_id = self
            .visible_card(closure.failure_card_id.as_deref(), organization_id)
            .await?;

        let event = LearningEvent {
            event_id: new_id("le"),
            organization_id: organization_id.to_string(),
            ticket_id: ticket_id.to_string(),
            session_id: closure.session_id,
            failure_card_id,
            vehicle_make: closure.vehicle_make.filter(|m| !m.trim().is_empty()),
            vehicle_model: closure.vehicle_model.filter(|m| !m.trim().is_empty()),
            vehicle_category: closure.vehicle_category,
            subsystem: closure.subsystem.trim().to_string(),
            symptoms: normalize_terms(&closure.symptoms),
            dtc_codes: normalize_dtc_codes(&closure.dtc_codes)?,
            actual_root_cause: closure.actual_root_cause.trim().to_string(),
            actual_parts_used: closure.parts_replaced,
            repair_actions: closure.repair_actions,
            deviation_notes: closure.deviation_notes,
            outcome: closure.outcome,
            ai_was_correct: closure.ai_was_correct,
            unsafe_incident: closure.unsafe_incident,
            technician_id: closure.technician_id,
            status: LearningStatus::PendingReview,
            suggest_new_card: false,
            processed: false,
            draft_card_id: None,
            review: None,
            created_at: self.clock.now(),
        };
        self.events.insert(event.clone()).await?;

        tracing::info!(
            event_id = %event.event_id,
            ticket_id,
            organization_id,
            outcome = %event.outcome,
            unsafe_incident = event.unsafe_incident,
            "ticket closure captured"
        );
        if event.unsafe_incident {
            tracing::warn!(
                event_id = %event.event_id,
                ticket_id,
                "unsafe incident reported on closure"
            );
        }

        let enrichment = self.process_event(&event).await;
        Ok(CaptureReceipt {
            event_id: event.event_id,
            pattern: enrichment.as_ref().and_then(|e| e.pattern.clone()),
            draft_card_id: enrichment.and_then(|e| e.draft_card_id),
        })
    }

    async fn visible_card(
        &self,
        failure_card_id: Option<&str>,
        organization_id: &str,
    ) -> Result<Option<String>, LearningError> {
        let Some(card_id) = failure_card_id.map(str::trim).filter(|id| !id.is_empty()) else {
            return Ok(None);
        };
        let card = self
            .knowledge
            .get_failure_card(card_id, Some(organization_id))
            .await?;
        if card.is_none() {
            tracing::warn!(
                failure_card_id = card_id,
                organization_id,
                "guiding card not visible to organization, dropped"
            );
        }
        Ok(card.map(|c| c.failure_card_id))
    }

    /// Enrich up to `batch_size` unprocessed pending events, oldest first.
    ///
    /// Re-running a batch is a no-op for events already processed. A zero
    /// batch size uses the configured default.
    ///
    /// # Errors
    /// Store failures while listing events
    pub async fn process_pending_events(
        &self,
        batch_size: usize,
    ) -> Result<BatchReport, LearningError> {
        let batch_size = if batch_size == 0 {
            self.config.default_batch_size
        } else {
            batch_size
        };

        let mut pending = self
            .events
            .find(&|e: &LearningEvent| e.is_pending() && !e.processed)
            .await?;
        pending.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        pending.truncate(batch_size);

        let mut report = BatchReport::default();
        for event in &pending {
            match self.process_event(event).await {
                Some(enrichment) => {
                    report.processed += 1;
                    match enrichment.pattern.as_ref().map(|p| p.action) {
                        Some(AlertAction::CreatedNew) => report.alerts_created += 1,
                        Some(AlertAction::UpdatedExisting) => report.alerts_updated += 1,
                        None => {}
                    }
                    if enrichment.draft_card_id.is_some() {
                        report.drafts_created += 1;
                    }
                }
                None => report.skipped += 1,
            }
        }

        tracing::info!(
            processed = report.processed,
            skipped = report.skipped,
            alerts_created = report.alerts_created,
            "pending learning events processed"
        );
        Ok(report)
    }

    /// Claim and enrich one event; `None` if already claimed
    async fn process_event(&self, event: &LearningEvent) -> Option<Enrichment> {
        let claim = self
            .events
            .update_if(&event.event_id, &|e: &LearningEvent| !e.processed, &mut |e| {
                e.processed = true;
            })
            .await;
        match claim {
            Ok(UpdateOutcome::Updated(_)) => {}
            Ok(_) => return None,
            Err(err) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    error = %err,
                    "could not claim learning event"
                );
                return None;
            }
        }

        self.record_card_statistics(event).await;

        let pattern = match self.detect_pattern(event).await {
            Ok(pattern) => pattern,
            Err(err) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    error = %err,
                    "pattern detection skipped"
                );
                None
            }
        };

        let draft_card_id = match self.create_draft_card(event).await {
            Ok(draft) => draft,
            Err(err) => {
                tracing::warn!(event_id = %event.event_id, error = %err, "draft card skipped");
                None
            }
        };

        Some(Enrichment {
            pattern,
            draft_card_id,
        })
    }

    async fn record_card_statistics(&self, event: &LearningEvent) {
        let Some(card_id) = event.failure_card_id.as_deref() else {
            return;
        };
        let recorded = self
            .knowledge
            .record_card_outcome(card_id, Some(&event.organization_id), event.outcome.score())
            .await;
        match recorded {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    failure_card_id = card_id,
                    "guiding card not found"
                );
            }
            Err(err) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    error = %err,
                    "card outcome not recorded"
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Pattern detection
    // ------------------------------------------------------------------

    async fn detect_pattern(
        &self,
        event: &LearningEvent,
    ) -> Result<Option<PatternResult>, LearningError> {
        let Some(key) = PatternKey::for_event(event) else {
            return Ok(None);
        };
        let window = Window::trailing(event.created_at, self.config.pattern_window_days);

        let mut matching = self
            .events
            .find(&|e: &LearningEvent| key.matches_event(e) && window.contains(e.created_at))
            .await?;
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        // A ticket closed more than once counts once
        let ticket_ids = distinct_tickets(&matching);
        if ticket_ids.len() < self.config.pattern_threshold {
            return Ok(None);
        }

        let _guard = self.pattern_lock.lock().await;

        let open = self
            .alerts
            .find(&|a: &ModelRiskAlert| a.status.is_open() && key.matches_alert(a))
            .await?;

        if let Some(existing) = open.into_iter().max_by_key(|a| a.last_occurrence) {
            let ticket = event.ticket_id.clone();
            let at = event.created_at;
            let outcome = self
                .alerts
                .update_if(
                    &existing.alert_id,
                    &|a: &ModelRiskAlert| {
                        a.status.is_open() && !a.affected_ticket_ids.contains(&ticket)
                    },
                    &mut |a| {
                        a.occurrence_count += 1;
                        a.affected_ticket_ids.push(ticket.clone());
                        a.last_occurrence = a.last_occurrence.max(at);
                    },
                )
                .await?;

            match outcome {
                UpdateOutcome::Updated(alert) => {
                    tracing::info!(
                        alert_id = %alert.alert_id,
                        occurrences = alert.occurrence_count,
                        ticket_id = %event.ticket_id,
                        "model risk alert updated"
                    );
                    return Ok(Some(PatternResult {
                        action: AlertAction::UpdatedExisting,
                        alert,
                    }));
                }
                UpdateOutcome::PreconditionFailed(alert) if alert.status.is_open() => {
                    tracing::debug!(
                        alert_id = %alert.alert_id,
                        ticket_id = %event.ticket_id,
                        "ticket already on alert"
                    );
                    return Ok(Some(PatternResult {
                        action: AlertAction::UpdatedExisting,
                        alert,
                    }));
                }
                // Closed or removed underneath us: start a fresh alert
                UpdateOutcome::PreconditionFailed(_) | UpdateOutcome::NotFound => {}
            }
        }

        let now = self.clock.now();
        let alert = ModelRiskAlert {
            alert_id: new_id("mra"),
            organization_id: event.organization_id.clone(),
            vehicle_make: event.vehicle_make.clone(),
            vehicle_model: event.vehicle_model.clone().unwrap_or_default(),
            subsystem: event.subsystem.clone(),
            occurrence_count: u32::try_from(ticket_ids.len()).unwrap_or(u32::MAX),
            first_occurrence: matching.first().map_or(event.created_at, |e| e.created_at),
            last_occurrence: matching.last().map_or(event.created_at, |e| e.created_at),
            affected_ticket_ids: ticket_ids,
            status: AlertStatus::Active,
            acknowledged_by: None,
            acknowledged_at: None,
            resolution_notes: None,
            resolved_at: None,
            created_at: now,
        };
        self.alerts.insert(alert.clone()).await?;

        tracing::warn!(
            alert_id = %alert.alert_id,
            organization_id = %alert.organization_id,
            vehicle_model = %alert.vehicle_model,
            subsystem = %alert.subsystem,
            occurrences = alert.occurrence_count,
            "model risk alert raised"
        );
        Ok(Some(PatternResult {
            action: AlertAction::CreatedNew,
            alert,
        }))
    }

    // ------------------------------------------------------------------
    // Draft cards
    // ------------------------------------------------------------------

    async fn create_draft_card(
        &self,
        event: &LearningEvent,
    ) -> Result<Option<String>, LearningError> {
        if !event.warrants_draft_card() || event.actual_root_cause.is_empty() {
            return Ok(None);
        }

        let card = self.knowledge.create_failure_card(self.card_from_event(event)).await?;
        let draft_id = card.failure_card_id;
        self.events
            .update(&event.event_id, &mut |e| {
                e.suggest_new_card = true;
                e.draft_card_id = Some(draft_id.clone());
            })
            .await?;

        tracing::info!(
            event_id = %event.event_id,
            failure_card_id = %draft_id,
            "draft failure card proposed"
        );
        Ok(Some(draft_id))
    }

    fn card_from_event(&self, event: &LearningEvent) -> NewFailureCard {
        NewFailureCard {
            organization_id: Some(event.organization_id.clone()),
            knowledge_id: None,
            title: String::new(),
            subsystem: event.subsystem.clone(),
            vehicle_make: event.vehicle_make.clone(),
            vehicle_model: event.vehicle_model.clone(),
            vehicle_category: event.vehicle_category.clone(),
            symptom_cluster: event.symptoms.clone(),
            dtc_codes: event.dtc_codes.clone(),
            probable_root_cause: event.actual_root_cause.clone(),
            verified_fix: event.repair_actions.join("; "),
            fix_steps: event.repair_actions.clone(),
            parts_required: event.actual_parts_used.clone(),
            historical_success_rate: None,
            source: CardSource::Learning {
                event_id: event.event_id.clone(),
            },
            created_by: event
                .technician_id
                .clone()
                .unwrap_or_else(|| self.config.pipeline_actor.clone()),
        }
    }

    // ------------------------------------------------------------------
    // Review
    // ------------------------------------------------------------------

    /// Apply a reviewer decision to a pending learning event
    ///
    /// The event is claimed (`pending_review` to `in_review`) before any card
    /// is touched, so concurrent reviews of one event have a single winner.
    /// A failed review releases the claim.
    ///
    /// # Errors
    /// - `LearningError::NotFound` for an unknown event
    /// - `LearningError::InvalidState` if it was already reviewed or another
    ///   review holds it
    /// - `LearningError::Validation` for a blank reviewer, `create_card` with
    ///   no draft and no root cause, or `update_card` with no guiding card
    pub async fn approve_learning_item(
        &self,
        entry_id: &str,
        action: ReviewAction,
        reviewer: &str,
        notes: Option<&str>,
    ) -> Result<ReviewOutcome, LearningError> {
        let event = self
            .events
            .get(entry_id)
            .await?
            .ok_or_else(|| event_not_found(entry_id))?;
        if !event.is_pending() {
            return Err(already_reviewed(entry_id));
        }
        if reviewer.trim().is_empty() {
            return Err(LearningError::Validation("reviewer is required".into()));
        }
        check_review(&event, action)?;

        let claim = self
            .events
            .update_if(entry_id, &|e: &LearningEvent| e.is_pending(), &mut |e| {
                e.status = LearningStatus::InReview;
            })
            .await?;
        match claim {
            UpdateOutcome::Updated(_) => {}
            UpdateOutcome::PreconditionFailed(_) => return Err(already_reviewed(entry_id)),
            UpdateOutcome::NotFound => return Err(event_not_found(entry_id)),
        }

        let failure_card_id = match self.apply_review(&event, action, reviewer, notes).await {
            Ok(card_id) => card_id,
            Err(err) => {
                self.release_claim(entry_id).await;
                return Err(err);
            }
        };

        let review = LearningReview {
            action,
            reviewer: reviewer.to_string(),
            notes: notes.map(str::to_string),
            failure_card_id: failure_card_id.clone(),
            reviewed_at: self.clock.now(),
        };
        let outcome = self
            .events
            .update_if(
                entry_id,
                &|e: &LearningEvent| e.status == LearningStatus::InReview,
                &mut |e| {
                    e.status = LearningStatus::Reviewed;
                    e.review = Some(review.clone());
                },
            )
            .await?;

        match outcome {
            UpdateOutcome::Updated(event) => {
                tracing::info!(event_id = entry_id, %action, reviewer, "learning item reviewed");
                Ok(ReviewOutcome {
                    event,
                    failure_card_id,
                })
            }
            UpdateOutcome::PreconditionFailed(_) => Err(already_reviewed(entry_id)),
            UpdateOutcome::NotFound => Err(event_not_found(entry_id)),
        }
    }

    async fn apply_review(
        &self,
        event: &LearningEvent,
        action: ReviewAction,
        reviewer: &str,
        notes: Option<&str>,
    ) -> Result<Option<String>, LearningError> {
        match action {
            ReviewAction::CreateCard => {
                let card_id = self.approve_or_create_card(event, reviewer).await?;
                Ok(Some(card_id))
            }
            ReviewAction::UpdateCard => {
                let card_id = self.fold_into_guiding_card(event).await?;
                self.reject_draft(event, reviewer, "folded into existing card")
                    .await?;
                Ok(Some(card_id))
            }
            ReviewAction::Dismiss => {
                self.reject_draft(event, reviewer, notes.unwrap_or("dismissed"))
                    .await?;
                Ok(None)
            }
        }
    }

    async fn release_claim(&self, entry_id: &str) {
        let released = self
            .events
            .update_if(
                entry_id,
                &|e: &LearningEvent| e.status == LearningStatus::InReview,
                &mut |e| e.status = LearningStatus::PendingReview,
            )
            .await;
        if let Err(err) = released {
            tracing::warn!(event_id = entry_id, error = %err, "review claim not released");
        }
    }

    async fn approve_or_create_card(
        &self,
        event: &LearningEvent,
        reviewer: &str,
    ) -> Result<String, LearningError> {
        let card_id = match &event.draft_card_id {
            Some(draft) => draft.clone(),
            None => {
                self.knowledge
                    .create_failure_card(self.card_from_event(event))
                    .await?
                    .failure_card_id
            }
        };

        if !self.knowledge.approve_knowledge(&card_id, reviewer).await? {
            return Err(LearningError::NotFound {
                kind: "failure card",
                id: card_id,
            });
        }
        Ok(card_id)
    }

    async fn fold_into_guiding_card(&self, event: &LearningEvent) -> Result<String, LearningError> {
        let Some(card_id) = event.failure_card_id.clone() else {
            return Err(missing_guiding_card());
        };
        let update = CardUpdate {
            additional_parts: event.actual_parts_used.clone(),
            additional_symptoms: event.symptoms.clone(),
            additional_dtc_codes: event.dtc_codes.clone(),
            verified_fix: None,
            probable_root_cause: None,
        };
        self.knowledge
            .apply_card_update(&card_id, Some(&event.organization_id), update)
            .await?;
        Ok(card_id)
    }

    async fn reject_draft(
        &self,
        event: &LearningEvent,
        reviewer: &str,
        reason: &str,
    ) -> Result<(), LearningError> {
        let Some(draft) = event.draft_card_id.as_deref() else {
            return Ok(());
        };
        match self.knowledge.reject_knowledge(draft, reviewer, reason).await {
            Ok(_) => Ok(()),
            // Reviewed directly in the knowledge base already
            Err(KnowledgeError::InvalidState { .. }) => {
                tracing::debug!(failure_card_id = draft, "draft already reviewed");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    // ------------------------------------------------------------------
    // Alerts and reads
    // ------------------------------------------------------------------

    /// Alerts for a tenant, most recent occurrence first
    ///
    /// # Errors
    /// Store failures only
    pub async fn list_alerts(
        &self,
        organization_id: &str,
        status: Option<AlertStatus>,
    ) -> Result<Vec<ModelRiskAlert>, LearningError> {
        let mut alerts = self
            .alerts
            .find(&|a: &ModelRiskAlert| {
                a.organization_id == organization_id && status.map_or(true, |s| a.status == s)
            })
            .await?;
        alerts.sort_by(|a, b| b.last_occurrence.cmp(&a.last_occurrence));
        Ok(alerts)
    }

    /// Acknowledge an active alert. `false` for unknown, foreign or
    /// non-active alerts.
    ///
    /// # Errors
    /// Store failures only
    pub async fn acknowledge_alert(
        &self,
        alert_id: &str,
        organization_id: &str,
        acknowledged_by: &str,
    ) -> Result<bool, LearningError> {
        let now = self.clock.now();
        let outcome = self
            .alerts
            .update_if(
                alert_id,
                &|a: &ModelRiskAlert| {
                    a.organization_id == organization_id && a.status == AlertStatus::Active
                },
                &mut |a| {
                    a.status = AlertStatus::Acknowledged;
                    a.acknowledged_by = Some(acknowledged_by.to_string());
                    a.acknowledged_at = Some(now);
                },
            )
            .await?;
        if outcome.is_updated() {
            tracing::info!(alert_id, acknowledged_by, "model risk alert acknowledged");
        }
        Ok(outcome.is_updated())
    }

    /// Resolve an open alert. `false` for unknown, foreign or resolved alerts.
    ///
    /// # Errors
    /// Store failures only
    pub async fn resolve_alert(
        &self,
        alert_id: &str,
        organization_id: &str,
        resolution_notes: &str,
    ) -> Result<bool, LearningError> {
        let now = self.clock.now();
        let outcome = self
            .alerts
            .update_if(
                alert_id,
                &|a: &ModelRiskAlert| a.organization_id == organization_id && a.status.is_open(),
                &mut |a| {
                    a.status = AlertStatus::Resolved;
                    a.resolution_notes = Some(resolution_notes.to_string());
                    a.resolved_at = Some(now);
                },
            )
            .await?;
        if outcome.is_updated() {
            tracing::info!(alert_id, "model risk alert resolved");
        }
        Ok(outcome.is_updated())
    }

    /// Fetch one learning event for a tenant
    ///
    /// # Errors
    /// Store failures only
    pub async fn get_event(
        &self,
        event_id: &str,
        organization_id: &str,
    ) -> Result<Option<LearningEvent>, LearningError> {
        Ok(self
            .events
            .get(event_id)
            .await?
            .filter(|e| e.organization_id == organization_id))
    }

    /// Events awaiting review for a tenant, oldest first
    ///
    /// # Errors
    /// Store failures only
    pub async fn pending_events(
        &self,
        organization_id: &str,
    ) -> Result<Vec<LearningEvent>, LearningError> {
        let mut events = self
            .events
            .find(&|e: &LearningEvent| e.organization_id == organization_id && e.is_pending())
            .await?;
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(events)
    }

    /// Dashboard counters for a tenant
    ///
    /// # Errors
    /// Store failures only
    pub async fn learning_stats(
        &self,
        organization_id: &str,
    ) -> Result<LearningStats, LearningError> {
        let events = self
            .events
            .find(&|e: &LearningEvent| e.organization_id == organization_id)
            .await?;
        let alerts = self
            .alerts
            .find(&|a: &ModelRiskAlert| a.organization_id == organization_id)
            .await?;

        let judged: Vec<bool> = events.iter().filter_map(|e| e.ai_was_correct).collect();
        #[allow(clippy::cast_precision_loss)]
        let ai_accuracy = (!judged.is_empty())
            .then(|| judged.iter().filter(|c| **c).count() as f64 / judged.len() as f64);

        Ok(LearningStats {
            total_events: events.len(),
            pending_review: events.iter().filter(|e| e.is_pending()).count(),
            reviewed: events
                .iter()
                .filter(|e| e.status == LearningStatus::Reviewed)
                .count(),
            unprocessed: events.iter().filter(|e| !e.processed).count(),
            draft_cards: events.iter().filter(|e| e.draft_card_id.is_some()).count(),
            unsafe_incidents: events.iter().filter(|e| e.unsafe_incident).count(),
            successful_repairs: events
                .iter()
                .filter(|e| e.outcome == RepairOutcome::Success)
                .count(),
            ai_accuracy,
            active_alerts: alerts.iter().filter(|a| a.status == AlertStatus::Active).count(),
            acknowledged_alerts: alerts
                .iter()
                .filter(|a| a.status == AlertStatus::Acknowledged)
                .count(),
            resolved_alerts: alerts
                .iter()
                .filter(|a| a.status == AlertStatus::Resolved)
                .count(),
        })
    }
}

#[derive(Debug)]
struct Enrichment {
    pattern: Option<PatternResult>,
    draft_card_id: Option<String>,
}

fn check_review(event: &LearningEvent, action: ReviewAction) -> Result<(), LearningError> {
    match action {
        ReviewAction::CreateCard
            if event.draft_card_id.is_none() && event.actual_root_cause.is_empty() =>
        {
            Err(LearningError::Validation(
                "cannot create a card without a root cause".into(),
            ))
        }
        ReviewAction::UpdateCard if event.failure_card_id.is_none() => Err(missing_guiding_card()),
        _ => Ok(()),
    }
}

fn missing_guiding_card() -> LearningError {
    LearningError::Validation("update_card needs a guiding failure card".into())
}

fn event_not_found(entry_id: &str) -> LearningError {
    LearningError::NotFound {
        kind: "learning event",
        id: entry_id.to_string(),
    }
}

fn already_reviewed(entry_id: &str) -> LearningError {
    LearningError::InvalidState {
        id: entry_id.to_string(),
        reason: "learning item already reviewed".to_string(),
    }
}
