//! Knowledge store errors

use crate::types::ApprovalStatus;
use efi_store::StoreError;

/// Knowledge store error
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    /// Unknown document id where the operation requires one
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Document kind
        kind: &'static str,
        /// Requested id
        id: String,
    },

    /// Review transition not allowed from the current status
    #[error("invalid state for {id}: cannot move from {from} to {to}")]
    InvalidState {
        /// Document id
        id: String,
        /// Current status
        from: ApprovalStatus,
        /// Requested status
        to: ApprovalStatus,
    },

    /// Malformed input (blank required field, bad DTC code, ...)
    #[error("validation failed: {0}")]
    Validation(String),

    /// Underlying store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl KnowledgeError {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_display() {
        let err = KnowledgeError::InvalidState {
            id: "fc_1".to_string(),
            from: ApprovalStatus::Approved,
            to: ApprovalStatus::Rejected,
        };
        assert_eq!(
            err.to_string(),
            "invalid state for fc_1: cannot move from approved to rejected"
        );
        assert!(err.is_invalid_state());
        assert!(!err.is_not_found());
    }
}
