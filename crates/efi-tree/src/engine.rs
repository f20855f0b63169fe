//! Decision tree engine
//!
//! Publishes immutable trees and drives per-ticket diagnostic sessions:
//! `active → active | completed` on each recorded step, `active → abandoned`
//! on request. Every session write is a single conditional update, so two
//! technicians answering the same step concurrently cannot both win.

use crate::audit::{AuditAction, AuditEntry, AuditLog, AuditRecord};
use crate::cache::TreeCache;
use crate::config::TreeConfig;
use crate::error::TreeError;
use crate::estimate::estimate_for;
use crate::state_machine::{branch, can_transition, Branch};
use crate::types::{
    CostEstimate, DecisionTree, EfiSession, SessionStatus, SessionView, StepOutcome, StepReport,
    TreeDraft,
};
use crate::validate::validate_draft;
use efi_store::{new_id, Collection, MemoryCollection, SharedClock, StoreError, UpdateOutcome};
use std::sync::Arc;

const PUBLISH_ATTEMPTS: usize = 3;

/// Collections backing the tree engine
#[derive(Debug, Clone)]
pub struct TreeCollections {
    /// Published trees
    pub trees: Arc<dyn Collection<DecisionTree>>,
    /// Technician sessions
    pub sessions: Arc<dyn Collection<EfiSession>>,
    /// Hash-chained audit trail
    pub audit: Arc<dyn Collection<AuditEntry>>,
}

impl TreeCollections {
    /// Fresh in-memory collections
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            trees: Arc::new(MemoryCollection::new()),
            sessions: Arc::new(MemoryCollection::new()),
            audit: Arc::new(MemoryCollection::new()),
        }
    }
}

/// Session start request
#[derive(Debug, Clone)]
pub struct StartSession<'a> {
    /// Ticket being diagnosed
    pub ticket_id: &'a str,
    /// Card whose latest tree is walked
    pub failure_card_id: &'a str,
    /// Owning tenant
    pub organization_id: &'a str,
    /// Technician doing the work
    pub technician_id: &'a str,
}

/// Decision tree engine
#[derive(Debug, Clone)]
pub struct DecisionTreeEngine {
    trees: Arc<dyn Collection<DecisionTree>>,
    sessions: Arc<dyn Collection<EfiSession>>,
    cache: TreeCache,
    audit: Arc<AuditLog>,
    clock: SharedClock,
    config: TreeConfig,
}

impl DecisionTreeEngine {
    /// Create engine over the given collections
    #[must_use]
    pub fn new(collections: TreeCollections, clock: SharedClock, config: TreeConfig) -> Self {
        Self {
            trees: collections.trees,
            sessions: collections.sessions,
            cache: TreeCache::new(config.tree_cache_capacity),
            audit: Arc::new(AuditLog::new(collections.audit)),
            clock,
            config,
        }
    }

    /// Create engine over fresh in-memory collections
    #[must_use]
    pub fn in_memory(clock: SharedClock) -> Self {
        Self::new(TreeCollections::in_memory(), clock, TreeConfig::default())
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Audit trail of technician actions
    #[inline]
    #[must_use]
    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    // ------------------------------------------------------------------
    // Trees
    // ------------------------------------------------------------------

    /// Validate and publish a new tree version for a failure card
    ///
    /// # Errors
    /// `TreeError::Validation` for a malformed draft,
    /// `TreeError::Conflict` if concurrent publishers took every version tried
    pub async fn publish_tree(&self, draft: TreeDraft) -> Result<DecisionTree, TreeError> {
        let entry_step_id = validate_draft(&draft)?;

        for _ in 0..PUBLISH_ATTEMPTS {
            let version = self
                .latest_version(&draft.failure_card_id)
                .await?
                .map_or(1, |v| v + 1);

            let tree = DecisionTree {
                tree_id: format!("dt_{}_v{version}", draft.failure_card_id),
                failure_card_id: draft.failure_card_id.clone(),
                version,
                title: draft.title.clone(),
                steps: draft.steps.clone(),
                resolutions: draft.resolutions.clone(),
                entry_step_id: entry_step_id.clone(),
                published_at: self.clock.now(),
            };

            match self.trees.insert(tree.clone()).await {
                Ok(()) => {
                    self.cache.insert(Arc::new(tree.clone())).await;
                    tracing::info!(
                        tree_id = %tree.tree_id,
                        failure_card_id = %tree.failure_card_id,
                        version,
                        steps = tree.steps.len(),
                        "decision tree published"
                    );
                    return Ok(tree);
                }
                // Another publisher took this version; retry with the next
                Err(StoreError::Duplicate { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(TreeError::Conflict(format!(
            "could not allocate a tree version for {} after {PUBLISH_ATTEMPTS} attempts",
            draft.failure_card_id
        )))
    }

    /// Fetch a published tree by id
    ///
    /// # Errors
    /// `TreeError::NotFound` for an unknown tree
    pub async fn get_tree(&self, tree_id: &str) -> Result<Arc<DecisionTree>, TreeError> {
        if let Some(tree) = self.cache.get(tree_id).await {
            return Ok(tree);
        }
        let tree = self
            .trees
            .get(tree_id)
            .await?
            .map(Arc::new)
            .ok_or_else(|| TreeError::not_found("decision tree", tree_id))?;
        self.cache.insert(Arc::clone(&tree)).await;
        Ok(tree)
    }

    /// Latest published tree for a failure card
    ///
    /// # Errors
    /// Store failures only
    pub async fn tree_for_card(
        &self,
        failure_card_id: &str,
    ) -> Result<Option<DecisionTree>, TreeError> {
        let trees = self
            .trees
            .find(&|t: &DecisionTree| t.failure_card_id == failure_card_id)
            .await?;
        Ok(trees.into_iter().max_by_key(|t| t.version))
    }

    async fn latest_version(&self, failure_card_id: &str) -> Result<Option<u32>, TreeError> {
        Ok(self.tree_for_card(failure_card_id).await?.map(|t| t.version))
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Start a session on the latest tree for a card
    ///
    /// # Errors
    /// `TreeError::NotFound` if the card has no tree,
    /// `TreeError::Validation` for blank identifiers
    pub async fn start_session(&self, request: StartSession<'_>) -> Result<SessionView, TreeError> {
        for (field, value) in [
            ("ticket_id", request.ticket_id),
            ("failure_card_id", request.failure_card_id),
            ("organization_id", request.organization_id),
            ("technician_id", request.technician_id),
        ] {
            if value.trim().is_empty() {
                return Err(TreeError::Validation(format!("{field} is required")));
            }
        }

        let tree = self
            .tree_for_card(request.failure_card_id)
            .await?
            .ok_or_else(|| {
                TreeError::not_found("decision tree for card", request.failure_card_id)
            })?;

        let session = EfiSession {
            session_id: new_id("sess"),
            ticket_id: request.ticket_id.to_string(),
            organization_id: request.organization_id.to_string(),
            tree_id: tree.tree_id.clone(),
            failure_card_id: tree.failure_card_id.clone(),
            current_step_id: Some(tree.entry_step_id.clone()),
            completed_steps: Vec::new(),
            status: SessionStatus::Active,
            selected_resolution_id: None,
            technician_id: request.technician_id.to_string(),
            started_at: self.clock.now(),
            completed_at: None,
        };
        self.sessions.insert(session.clone()).await?;

        tracing::info!(
            session_id = %session.session_id,
            ticket_id = %session.ticket_id,
            tree_id = %session.tree_id,
            "diagnostic session started"
        );
        Ok(SessionView::for_session(session, &tree))
    }

    /// Fetch a session owned by the caller's organization
    ///
    /// # Errors
    /// `TreeError::NotFound` if unknown or owned by another tenant
    pub async fn get_session(
        &self,
        session_id: &str,
        organization_id: &str,
    ) -> Result<EfiSession, TreeError> {
        self.sessions
            .get(session_id)
            .await?
            .filter(|s| s.organization_id == organization_id)
            .ok_or_else(|| TreeError::not_found("session", session_id))
    }

    /// Session plus its current step / resolution
    ///
    /// # Errors
    /// `TreeError::NotFound` if unknown or owned by another tenant
    pub async fn session_view(
        &self,
        session_id: &str,
        organization_id: &str,
    ) -> Result<SessionView, TreeError> {
        let session = self.get_session(session_id, organization_id).await?;
        let tree = self.get_tree(&session.tree_id).await?;
        Ok(SessionView::for_session(session, &tree))
    }

    /// Sessions for a ticket, oldest first
    ///
    /// # Errors
    /// Store failures only
    pub async fn sessions_for_ticket(
        &self,
        ticket_id: &str,
        organization_id: &str,
    ) -> Result<Vec<EfiSession>, TreeError> {
        let mut sessions = self
            .sessions
            .find(&|s: &EfiSession| {
                s.ticket_id == ticket_id && s.organization_id == organization_id
            })
            .await?;
        sessions.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(sessions)
    }

    /// Record the answer to the current step and advance the session
    ///
    /// # Errors
    /// - `TreeError::NotFound` for an unknown session or step
    /// - `TreeError::InvalidState` if the session is not active, the step is
    ///   not the current one, or a concurrent writer got there first
    pub async fn record_step_outcome(
        &self,
        session_id: &str,
        organization_id: &str,
        report: StepReport,
    ) -> Result<SessionView, TreeError> {
        let session = self.get_session(session_id, organization_id).await?;
        if !session.is_active() {
            return Err(TreeError::invalid_state(
                session_id,
                format!("session is {}", session.status),
            ));
        }

        let tree = self.get_tree(&session.tree_id).await?;
        let step = tree
            .step(&report.step_id)
            .ok_or_else(|| TreeError::not_found("step", report.step_id.as_str()))?;
        if session.current_step_id.as_deref() != Some(step.step_id.as_str()) {
            return Err(TreeError::invalid_state(
                session_id,
                format!(
                    "step {} is not the current step ({})",
                    step.step_id,
                    session.current_step_id.as_deref().unwrap_or("none")
                ),
            ));
        }

        let next = branch(&tree, step, report.outcome).ok_or_else(|| {
            TreeError::invalid_state(session_id, format!("step {} leads nowhere", step.step_id))
        })?;
        debug_assert!(can_transition(session.status, next.status()));

        let now = self.clock.now();
        let outcome = StepOutcome {
            step_id: report.step_id.clone(),
            outcome: report.outcome,
            actual_measurement: report.actual_measurement,
            notes: report.notes,
            time_taken_seconds: report.time_taken_seconds,
            completed_at: now,
        };

        let expected_len = session.completed_steps.len();
        let current = step.step_id.clone();
        let update = self
            .sessions
            .update_if(
                session_id,
                &|s: &EfiSession| {
                    s.is_active()
                        && s.current_step_id.as_deref() == Some(current.as_str())
                        && s.completed_steps.len() == expected_len
                },
                &mut |s| {
                    s.completed_steps.push(outcome.clone());
                    match &next {
                        Branch::Step(step_id) => s.current_step_id = Some(step_id.clone()),
                        Branch::Resolve(resolution_id) => {
                            s.current_step_id = None;
                            s.status = SessionStatus::Completed;
                            s.selected_resolution_id = Some(resolution_id.clone());
                            s.completed_at = Some(now);
                        }
                    }
                },
            )
            .await?;

        let updated = match update {
            UpdateOutcome::Updated(session) => session,
            UpdateOutcome::NotFound => return Err(TreeError::not_found("session", session_id)),
            UpdateOutcome::PreconditionFailed(_) => {
                return Err(TreeError::invalid_state(
                    session_id,
                    "session changed while the step was being recorded",
                ));
            }
        };

        let audit_sequence = self
            .audit_action(
                &updated,
                AuditAction::StepRecorded {
                    step_id: report.step_id,
                    outcome: report.outcome,
                },
                now,
            )
            .await;
        tracing::info!(
            session_id,
            ticket_id = %updated.ticket_id,
            technician_id = %updated.technician_id,
            step_id = %current,
            outcome = %outcome.outcome,
            status = %updated.status,
            audit_sequence,
            "step outcome recorded"
        );

        Ok(SessionView::for_session(updated, &tree))
    }

    /// Abandon an active session
    ///
    /// # Errors
    /// `TreeError::NotFound` for an unknown session,
    /// `TreeError::InvalidState` if it is no longer active
    pub async fn abandon_session(
        &self,
        session_id: &str,
        organization_id: &str,
        reason: Option<&str>,
    ) -> Result<EfiSession, TreeError> {
        // Ownership check before touching the document
        self.get_session(session_id, organization_id).await?;

        let now = self.clock.now();
        let update = self
            .sessions
            .update_if(
                session_id,
                &|s: &EfiSession| can_transition(s.status, SessionStatus::Abandoned),
                &mut |s| {
                    s.status = SessionStatus::Abandoned;
                    s.current_step_id = None;
                    s.completed_at = Some(now);
                },
            )
            .await?;

        match update {
            UpdateOutcome::Updated(session) => {
                let action = AuditAction::SessionAbandoned {
                    reason: reason.map(str::to_string),
                };
                self.audit_action(&session, action, now).await;
                tracing::info!(
                    session_id,
                    ticket_id = %session.ticket_id,
                    "diagnostic session abandoned"
                );
                Ok(session)
            }
            UpdateOutcome::NotFound => Err(TreeError::not_found("session", session_id)),
            UpdateOutcome::PreconditionFailed(session) => Err(TreeError::invalid_state(
                session_id,
                format!("session is {}", session.status),
            )),
        }
    }

    // The session write has already committed; a failed append is logged,
    // never surfaced to the technician.
    async fn audit_action(
        &self,
        session: &EfiSession,
        action: AuditAction,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Option<u64> {
        let record = AuditRecord {
            session_id: session.session_id.clone(),
            ticket_id: session.ticket_id.clone(),
            technician_id: session.technician_id.clone(),
            action,
            recorded_at: at,
        };
        match self.audit.append(record).await {
            Ok(entry) => Some(entry.sequence),
            Err(err) => {
                tracing::error!(
                    session_id = %session.session_id,
                    error = %err,
                    "audit entry not written"
                );
                None
            }
        }
    }

    /// Estimate for a completed session's resolution.
    ///
    /// `Ok(None)` while the session is active or abandoned, or if the selected
    /// resolution is not in the tree.
    ///
    /// # Errors
    /// `TreeError::NotFound` for an unknown session
    pub async fn get_suggested_estimate(
        &self,
        session_id: &str,
        organization_id: &str,
    ) -> Result<Option<CostEstimate>, TreeError> {
        let session = self.get_session(session_id, organization_id).await?;
        if session.status != SessionStatus::Completed {
            return Ok(None);
        }
        let Some(resolution_id) = session.selected_resolution_id.as_deref() else {
            return Ok(None);
        };

        let tree = self.get_tree(&session.tree_id).await?;
        let estimate = tree
            .resolution(resolution_id)
            .map(|r| estimate_for(r, self.config.gst_rate));
        tracing::debug!(
            session_id,
            resolution_id,
            found = estimate.is_some(),
            "estimate requested"
        );
        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiagnosticStep, Outcome, PartLine, ResolutionNode, StepAction};
    use async_trait::async_trait;
    use efi_store::{Document, SystemClock};

    /// Tree collection where every version is already taken
    #[derive(Debug, Default)]
    struct ContendedTrees(MemoryCollection<DecisionTree>);

    #[async_trait]
    impl Collection<DecisionTree> for ContendedTrees {
        async fn insert(&self, doc: DecisionTree) -> Result<(), StoreError> {
            Err(StoreError::Duplicate {
                collection: DecisionTree::COLLECTION,
                id: doc.tree_id,
            })
        }

        async fn get(&self, id: &str) -> Result<Option<DecisionTree>, StoreError> {
            self.0.get(id).await
        }

        async fn find(
            &self,
            filter: &(dyn for<'d> Fn(&'d DecisionTree) -> bool + Send + Sync),
        ) -> Result<Vec<DecisionTree>, StoreError> {
            self.0.find(filter).await
        }

        async fn update_if(
            &self,
            id: &str,
            guard: &(dyn for<'d> Fn(&'d DecisionTree) -> bool + Send + Sync),
            mutate: &mut (dyn for<'d> FnMut(&'d mut DecisionTree) + Send),
        ) -> Result<UpdateOutcome<DecisionTree>, StoreError> {
            self.0.update_if(id, guard, mutate).await
        }
    }

    fn draft(card: &str) -> TreeDraft {
        TreeDraft {
            failure_card_id: card.to_string(),
            title: "BMS imbalance".to_string(),
            steps: vec![
                DiagnosticStep {
                    step_id: "s1".to_string(),
                    order: 1,
                    instruction: "Measure pack voltage".to_string(),
                    pass_action: StepAction::Next,
                    fail_action: StepAction::Resolve("r_pack".to_string()),
                    ..DiagnosticStep::default()
                },
                DiagnosticStep {
                    step_id: "s2".to_string(),
                    order: 2,
                    instruction: "Check cell delta".to_string(),
                    pass_action: StepAction::Resolve("r_bms".to_string()),
                    fail_action: StepAction::Resolve("r_pack".to_string()),
                    ..DiagnosticStep::default()
                },
            ],
            resolutions: vec![
                ResolutionNode {
                    resolution_id: "r_bms".to_string(),
                    title: "Replace BMS".to_string(),
                    parts_required: vec![PartLine {
                        name: "BMS".to_string(),
                        part_number: None,
                        price: 1000.0,
                        quantity: 1,
                    }],
                    labor_hours: 1.0,
                    labor_rate: 500.0,
                    ..ResolutionNode::default()
                },
                ResolutionNode {
                    resolution_id: "r_pack".to_string(),
                    title: "Replace pack".to_string(),
                    ..ResolutionNode::default()
                },
            ],
            entry_step_id: None,
        }
    }

    fn start<'a>(card: &'a str, org: &'a str) -> StartSession<'a> {
        StartSession {
            ticket_id: "T-100",
            failure_card_id: card,
            organization_id: org,
            technician_id: "tech-1",
        }
    }

    #[tokio::test]
    async fn exhausted_version_allocation_is_a_conflict() {
        let collections = TreeCollections {
            trees: Arc::new(ContendedTrees::default()),
            ..TreeCollections::in_memory()
        };
        let engine =
            DecisionTreeEngine::new(collections, Arc::new(SystemClock), TreeConfig::default());

        let err = engine.publish_tree(draft("fc_1")).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(!err.is_invalid_state());
        assert!(!matches!(err, TreeError::Validation(_)));
    }

    #[tokio::test]
    async fn versions_are_monotonic_per_card() {
        let engine = DecisionTreeEngine::in_memory(Arc::new(SystemClock));
        let v1 = engine.publish_tree(draft("fc_1")).await.unwrap();
        let v2 = engine.publish_tree(draft("fc_1")).await.unwrap();
        let other = engine.publish_tree(draft("fc_2")).await.unwrap();

        assert_eq!((v1.version, v2.version, other.version), (1, 2, 1));
        assert_eq!(engine.tree_for_card("fc_1").await.unwrap().unwrap().tree_id, v2.tree_id);
    }

    #[tokio::test]
    async fn start_without_tree_is_not_found() {
        let engine = DecisionTreeEngine::in_memory(Arc::new(SystemClock));
        let err = engine.start_session(start("fc_none", "org-1")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn walk_to_resolution_then_estimate() {
        let engine = DecisionTreeEngine::in_memory(Arc::new(SystemClock));
        engine.publish_tree(draft("fc_1")).await.unwrap();

        let view = engine.start_session(start("fc_1", "org-1")).await.unwrap();
        let id = view.session.session_id.clone();
        assert_eq!(view.current_step.unwrap().step_id, "s1");
        assert!(engine.get_suggested_estimate(&id, "org-1").await.unwrap().is_none());

        let view = engine
            .record_step_outcome(&id, "org-1", StepReport::new("s1", Outcome::Pass))
            .await
            .unwrap();
        assert_eq!(view.session.current_step_id.as_deref(), Some("s2"));

        let view = engine
            .record_step_outcome(
                &id,
                "org-1",
                StepReport::new("s2", Outcome::Pass).with_elapsed(90),
            )
            .await
            .unwrap();
        assert_eq!(view.session.status, SessionStatus::Completed);
        assert!(view.session.current_step_id.is_none());
        assert_eq!(view.resolution.unwrap().resolution_id, "r_bms");

        let estimate = engine.get_suggested_estimate(&id, "org-1").await.unwrap().unwrap();
        assert!((estimate.grand_total - 1770.0).abs() < 1e-9);

        assert_eq!(engine.audit_log().entries_for_session(&id).await.unwrap().len(), 2);
        assert!(engine.audit_log().verify_integrity().await.is_ok());
    }

    #[tokio::test]
    async fn wrong_step_and_foreign_tenant_are_refused() {
        let engine = DecisionTreeEngine::in_memory(Arc::new(SystemClock));
        engine.publish_tree(draft("fc_1")).await.unwrap();
        let id = engine.start_session(start("fc_1", "org-1")).await.unwrap().session.session_id;

        let err = engine
            .record_step_outcome(&id, "org-1", StepReport::new("s2", Outcome::Pass))
            .await
            .unwrap_err();
        assert!(err.is_invalid_state());

        let err = engine
            .record_step_outcome(&id, "org-1", StepReport::new("s9", Outcome::Pass))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = engine.get_session(&id, "org-2").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn abandoned_session_rejects_steps() {
        let engine = DecisionTreeEngine::in_memory(Arc::new(SystemClock));
        engine.publish_tree(draft("fc_1")).await.unwrap();
        let id = engine.start_session(start("fc_1", "org-1")).await.unwrap().session.session_id;

        let abandoned = engine.abandon_session(&id, "org-1", Some("customer left")).await.unwrap();
        assert_eq!(abandoned.status, SessionStatus::Abandoned);

        let err = engine
            .record_step_outcome(&id, "org-1", StepReport::new("s1", Outcome::Pass))
            .await
            .unwrap_err();
        assert!(err.is_invalid_state());
        assert!(engine.abandon_session(&id, "org-1", None).await.unwrap_err().is_invalid_state());
        assert!(engine.get_suggested_estimate(&id, "org-1").await.unwrap().is_none());
    }
}
