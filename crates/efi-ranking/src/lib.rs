//! EFI Model-Aware Ranking Service
//!
//! Scores approved failure cards against a vehicle / symptom context:
//! - **Scoring**: additive weights with named `matching_factors`
//! - **Confidence**: `low | medium | high` from the top cause
//! - **Escalation**: when confidence is low or nothing matches
//! - **Safety**: subsystem checklist shown with low-confidence results

#![warn(missing_docs)]

pub mod checklist;
pub mod confidence;
pub mod config;
pub mod context;
pub mod error;
pub mod scoring;
pub mod service;

pub use checklist::safe_checklist;
pub use confidence::{confidence_for, should_escalate, Confidence};
pub use config::{ConfidenceThresholds, RankingConfig, RankingWeights, MAX_RANKED_CAUSES};
pub use context::{DiagnosticContext, NormalizedContext};
pub use error::RankingError;
pub use scoring::{calculate_score, MatchingFactor, Score};
pub use service::{RankedCause, RankingReport, RankingResult, RankingService};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for ranking consumers
    pub use crate::{Confidence, DiagnosticContext, RankedCause, RankingError, RankingService};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
