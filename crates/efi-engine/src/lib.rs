//! Failure Intelligence Engine
//!
//! Wires the four EFI services over one set of collections and one clock:
//!
//! ```text
//! diagnose ──► RankingService ──► KnowledgeStore (approved cards)
//! start_diagnostic_session ──► DecisionTreeEngine (+ card usage)
//! close_ticket ──► LearningPipeline ──► card stats, risk alerts, draft cards
//! ```
//!
//! There are no globals: build an engine from [`EngineConfig`],
//! [`EngineCollections`] and a [`Clock`](efi_store::Clock), and share it
//! behind an `Arc`.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod snapshot;
pub mod telemetry;

pub use config::{EngineConfig, TelemetryConfig};
pub use error::EngineError;
pub use snapshot::Snapshot;

use efi_knowledge::{KnowledgeCollections, KnowledgeStore};
use efi_learning::{CaptureReceipt, ClosureData, LearningCollections, LearningPipeline};
use efi_ranking::{DiagnosticContext, RankingReport, RankingService};
use efi_store::SharedClock;
use efi_tree::{DecisionTreeEngine, SessionView, StartSession, TreeCollections};

/// Every collection the engine reads and writes
#[derive(Debug, Clone)]
pub struct EngineCollections {
    /// Articles, failure cards, error codes
    pub knowledge: KnowledgeCollections,
    /// Trees and sessions
    pub tree: TreeCollections,
    /// Learning events and alerts
    pub learning: LearningCollections,
}

impl EngineCollections {
    /// Fresh in-memory collections
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            knowledge: KnowledgeCollections::in_memory(),
            tree: TreeCollections::in_memory(),
            learning: LearningCollections::in_memory(),
        }
    }
}

/// Failure Intelligence Engine facade
#[derive(Debug, Clone)]
pub struct FailureIntelligenceEngine {
    knowledge: KnowledgeStore,
    trees: DecisionTreeEngine,
    ranking: RankingService,
    learning: LearningPipeline,
    config: EngineConfig,
}

impl FailureIntelligenceEngine {
    /// Build the engine
    #[must_use]
    pub fn new(config: EngineConfig, collections: EngineCollections, clock: SharedClock) -> Self {
        let knowledge = KnowledgeStore::new(collections.knowledge, clock.clone(), config.knowledge);
        let trees = DecisionTreeEngine::new(collections.tree, clock.clone(), config.tree);
        let ranking = RankingService::new(knowledge.clone(), config.ranking);
        let learning = LearningPipeline::new(
            knowledge.clone(),
            collections.learning,
            clock,
            config.learning.clone(),
        );
        tracing::debug!("failure intelligence engine assembled");
        Self {
            knowledge,
            trees,
            ranking,
            learning,
            config,
        }
    }

    /// Build the engine over fresh in-memory collections
    #[must_use]
    pub fn in_memory(config: EngineConfig, clock: SharedClock) -> Self {
        Self::new(config, EngineCollections::in_memory(), clock)
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Knowledge store
    #[inline]
    #[must_use]
    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    /// Decision tree engine
    #[inline]
    #[must_use]
    pub fn trees(&self) -> &DecisionTreeEngine {
        &self.trees
    }

    /// Ranking service
    #[inline]
    #[must_use]
    pub fn ranking(&self) -> &RankingService {
        &self.ranking
    }

    /// Learning pipeline
    #[inline]
    #[must_use]
    pub fn learning(&self) -> &LearningPipeline {
        &self.learning
    }

    /// Rank causes for a ticket's context
    ///
    /// # Errors
    /// Validation errors for a malformed context
    pub async fn diagnose(
        &self,
        context: &DiagnosticContext,
    ) -> Result<RankingReport, EngineError> {
        Ok(self.ranking.diagnose(context).await?)
    }

    /// Start a tree session on a card visible to the caller and count the
    /// card as used
    ///
    /// # Errors
    /// `NotFound` if the card is not visible or has no tree
    pub async fn start_diagnostic_session(
        &self,
        request: StartSession<'_>,
    ) -> Result<SessionView, EngineError> {
        if self
            .knowledge
            .get_failure_card(request.failure_card_id, Some(request.organization_id))
            .await?
            .is_none()
        {
            return Err(efi_knowledge::KnowledgeError::NotFound {
                kind: "failure card",
                id: request.failure_card_id.to_string(),
            }
            .into());
        }

        let organization_id = request.organization_id;
        let view = self.trees.start_session(request).await?;
        match self
            .knowledge
            .record_card_usage(&view.session.failure_card_id, Some(organization_id))
            .await {
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(
                    failure_card_id = %view.session.failure_card_id,
                    error = %err,
                    "card usage not recorded"
                );
            }
        }
        Ok(view)
    }

    /// Feed a closed ticket to the learning pipeline.
    ///
    /// When the closure names a session but no card, the session's card is
    /// used as the guiding card. A card the caller cannot see is dropped by
    /// the pipeline.
    ///
    /// # Errors
    /// Validation errors for a malformed closure
    pub async fn close_ticket(
        &self,
        ticket_id: &str,
        organization_id: &str,
        mut closure: ClosureData,
    ) -> Result<CaptureReceipt, EngineError> {
        if closure.failure_card_id.is_none() {
            if let Some(session_id) = closure.session_id.as_deref() {
                match self.trees.get_session(session_id, organization_id).await {
                    Ok(session) => closure.failure_card_id = Some(session.failure_card_id),
                    Err(err) => {
                        tracing::warn!(session_id, error = %err, "closure session not resolved");
                    }
                }
            }
        }
        Ok(self
            .learning
            .capture_ticket_closure(ticket_id, organization_id, closure)
            .await?)
    }
}

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for engine consumers
    pub use crate::{EngineCollections, EngineConfig, EngineError, FailureIntelligenceEngine};
    pub use efi_learning::{ClosureData, RepairOutcome, ReviewAction};
    pub use efi_ranking::{Confidence, DiagnosticContext};
    pub use efi_tree::{Outcome, StartSession, StepReport};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
