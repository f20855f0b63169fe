//! Decision tree errors

use efi_store::StoreError;

/// Decision tree engine error
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Unknown tree, session, step or card
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up
        kind: &'static str,
        /// Requested id
        id: String,
    },

    /// Session cannot accept the operation in its current state
    #[error("invalid state for session {session_id}: {reason}")]
    InvalidState {
        /// Session id
        session_id: String,
        /// Why the operation was refused
        reason: String,
    },

    /// Malformed tree or request
    #[error("validation failed: {0}")]
    Validation(String),

    /// Concurrent writers kept winning; retry later
    #[error("conflict: {0}")]
    Conflict(String),

    /// Audit chain does not verify
    #[error("audit log integrity violation at entry {index}")]
    AuditIntegrity {
        /// First entry that fails verification
        index: usize,
    },

    /// Underlying store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TreeError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn invalid_state(session_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            session_id: session_id.into(),
            reason: reason.into(),
        }
    }

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

    /// Check if this is a write conflict
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
