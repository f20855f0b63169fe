//! Engine error type

use efi_knowledge::KnowledgeError;
use efi_learning::LearningError;
use efi_ranking::RankingError;
use efi_store::StoreError;
use efi_tree::TreeError;

/// Failure Intelligence Engine error
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Knowledge store failure
    #[error("knowledge: {0}")]
    Knowledge(#[from] KnowledgeError),

    /// Decision tree failure
    #[error("decision tree: {0}")]
    Tree(#[from] TreeError),

    /// Ranking failure
    #[error("ranking: {0}")]
    Ranking(#[from] RankingError),

    /// Learning pipeline failure
    #[error("learning: {0}")]
    Learning(#[from] LearningError),

    /// Underlying store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Snapshot (de)serialization failure
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// File access failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Subscriber already installed or bad filter
    #[error("telemetry error: {0}")]
    Telemetry(String),
}

impl EngineError {
    /// Unknown tree, session, step, card or learning entry
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Knowledge(e) => e.is_not_found(),
            Self::Tree(e) => e.is_not_found(),
            Self::Learning(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Operation refused by the target's current state
    #[must_use]
    pub fn is_invalid_state(&self) -> bool {
        match self {
            Self::Knowledge(e) => e.is_invalid_state(),
            Self::Tree(e) => e.is_invalid_state(),
            Self::Learning(e) => e.is_invalid_state(),
            _ => false,
        }
    }

    /// Malformed caller input
    #[must_use]
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Knowledge(KnowledgeError::Validation(_))
            | Self::Tree(TreeError::Validation(_)) => true,
            Self::Ranking(e) => e.is_validation(),
            Self::Learning(e) => e.is_validation(),
            _ => false,
        }
    }
}
