//! Ranking errors

use efi_knowledge::KnowledgeError;

/// Ranking service error
#[derive(Debug, thiserror::Error)]
pub enum RankingError {
    /// Malformed diagnostic context
    #[error("validation failed: {0}")]
    Validation(String),

    /// Knowledge store failure
    #[error("knowledge store error: {0}")]
    Knowledge(#[source] KnowledgeError),
}

impl From<KnowledgeError> for RankingError {
    fn from(err: KnowledgeError) -> Self {
        match err {
            KnowledgeError::Validation(msg) => Self::Validation(msg),
            other => Self::Knowledge(other),
        }
    }
}

impl RankingError {
    /// Check if this is a caller-input error
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
