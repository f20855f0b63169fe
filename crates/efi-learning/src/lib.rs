//! EFI Continuous Learning Pipeline
//!
//! Turns closed tickets into knowledge:
//! - **Capture**: each closure becomes a `pending_review` learning event
//! - **Statistics**: the guiding card's success rate absorbs the outcome
//! - **Patterns**: three or more events for one tenant, model and subsystem
//!   within 30 days raise (or grow) a model risk alert
//! - **Drafts**: deviations from guidance propose a draft failure card
//! - **Review**: a human approves, folds in or dismisses each event

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod patterns;
pub mod pipeline;
pub mod types;

pub use config::{LearningConfig, MAX_PATTERN_WINDOW_DAYS};
pub use error::LearningError;
pub use patterns::{PatternKey, Window};
pub use pipeline::{LearningCollections, LearningPipeline};
pub use types::{
    AlertAction, AlertStatus, BatchReport, CaptureReceipt, ClosureData, LearningEvent,
    LearningReview, LearningStats, LearningStatus, ModelRiskAlert, PatternResult, RepairOutcome,
    ReviewAction, ReviewOutcome,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for learning consumers
    pub use crate::{
        AlertAction, ClosureData, LearningError, LearningPipeline, ReviewAction, RepairOutcome,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
