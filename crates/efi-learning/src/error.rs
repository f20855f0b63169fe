//! Learning pipeline errors

use efi_knowledge::KnowledgeError;
use efi_store::StoreError;

/// Learning pipeline error
#[derive(Debug, thiserror::Error)]
pub enum LearningError {
    /// Unknown learning event or alert
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up
        kind: &'static str,
        /// Requested id
        id: String,
    },

    /// Item was already reviewed or otherwise cannot change
    #[error("invalid state for {id}: {reason}")]
    InvalidState {
        /// Item id
        id: String,
        /// Why the operation was refused
        reason: String,
    },

    /// Malformed closure payload or review request
    #[error("validation failed: {0}")]
    Validation(String),

    /// Knowledge store failure
    #[error("knowledge store error: {0}")]
    Knowledge(#[source] KnowledgeError),

    /// Underlying store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<KnowledgeError> for LearningError {
    fn from(err: KnowledgeError) -> Self {
        match err {
            KnowledgeError::Validation(msg) => Self::Validation(msg),
            KnowledgeError::NotFound { kind, id } => Self::NotFound { kind, id },
            KnowledgeError::InvalidState { ref id, .. } => Self::InvalidState {
                id: id.clone(),
                reason: err.to_string(),
            },
            other => Self::Knowledge(other),
        }
    }
}

impl LearningError {
    /// Check if this is a not-found condition
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an invalid-state condition
    #[inline]
    #[must_use]
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    /// Check if this is a caller-input error
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
