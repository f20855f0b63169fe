//! JSON snapshot of every engine collection
//!
//! Used by the `efi` binary to rank and sweep offline against an export of
//! the shared store.

use crate::error::EngineError;
use crate::EngineCollections;
use efi_knowledge::{ErrorCodeDefinition, KnowledgeArticle, StructuredFailureCard};
use efi_learning::{LearningEvent, ModelRiskAlert};
use efi_store::{Collection, Document, MemoryCollection};
use efi_tree::{AuditEntry, DecisionTree, EfiSession};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Exported documents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Knowledge articles
    pub articles: Vec<KnowledgeArticle>,
    /// Structured failure cards
    pub failure_cards: Vec<StructuredFailureCard>,
    /// DTC definitions
    pub error_codes: Vec<ErrorCodeDefinition>,
    /// Published decision trees
    pub trees: Vec<DecisionTree>,
    /// Technician sessions
    pub sessions: Vec<EfiSession>,
    /// Hash-chained audit trail of session actions
    pub audit_entries: Vec<AuditEntry>,
    /// Captured ticket closures
    pub learning_events: Vec<LearningEvent>,
    /// Model risk alerts
    pub alerts: Vec<ModelRiskAlert>,
}

impl Snapshot {
    /// Read a snapshot file
    ///
    /// # Errors
    /// `EngineError::Io` or `EngineError::Snapshot`
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let bytes = std::fs::read(path)?;
        let snapshot: Self = serde_json::from_slice(&bytes)?;
        tracing::debug!(
            path = %path.display(),
            failure_cards = snapshot.failure_cards.len(),
            learning_events = snapshot.learning_events.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Write the snapshot as pretty JSON
    ///
    /// # Errors
    /// `EngineError::Io` or `EngineError::Snapshot`
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// In-memory collections seeded with this snapshot
    #[must_use]
    pub fn into_collections(self) -> EngineCollections {
        let mut collections = EngineCollections::in_memory();
        collections.knowledge.articles = seeded(self.articles);
        collections.knowledge.failure_cards = seeded(self.failure_cards);
        collections.knowledge.error_codes = seeded(self.error_codes);
        collections.tree.trees = seeded(self.trees);
        collections.tree.sessions = seeded(self.sessions);
        collections.tree.audit = seeded(self.audit_entries);
        collections.learning.events = seeded(self.learning_events);
        collections.learning.alerts = seeded(self.alerts);
        collections
    }

    /// Export the current contents of a set of collections
    ///
    /// # Errors
    /// Store failures
    pub async fn capture(collections: &EngineCollections) -> Result<Self, EngineError> {
        Ok(Self {
            articles: dump(collections.knowledge.articles.as_ref()).await?,
            failure_cards: dump(collections.knowledge.failure_cards.as_ref()).await?,
            error_codes: dump(collections.knowledge.error_codes.as_ref()).await?,
            trees: dump(collections.tree.trees.as_ref()).await?,
            sessions: dump(collections.tree.sessions.as_ref()).await?,
            audit_entries: dump(collections.tree.audit.as_ref()).await?,
            learning_events: dump(collections.learning.events.as_ref()).await?,
            alerts: dump(collections.learning.alerts.as_ref()).await?,
        })
    }
}

fn seeded<D: Document>(docs: Vec<D>) -> Arc<MemoryCollection<D>> {
    Arc::new(MemoryCollection::with_documents(docs))
}

async fn dump<D: Document>(collection: &dyn Collection<D>) -> Result<Vec<D>, EngineError> {
    Ok(collection.find(&|_| true).await?)
}
