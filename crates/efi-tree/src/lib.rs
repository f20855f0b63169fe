//! EFI Decision Tree Engine
//!
//! Walks a technician through a failure card's diagnostic tree:
//! - **Trees**: validated, versioned per failure card, immutable once published
//! - **Sessions**: tenant-owned, one step answered at a time, PASS/FAIL branching
//! - **Estimates**: parts + labor + GST for the selected resolution
//! - **Audit**: hash-chained record of every technician action
//!
//! # Example
//!
//! ```rust,ignore
//! use efi_tree::{DecisionTreeEngine, Outcome, StartSession, StepReport};
//!
//! let engine = DecisionTreeEngine::in_memory(clock);
//! engine.publish_tree(draft).await?;
//! let view = engine.start_session(StartSession {
//!     ticket_id: "T-1",
//!     failure_card_id: "fc_1",
//!     organization_id: "org-1",
//!     technician_id: "tech-1",
//! }).await?;
//! let view = engine
//!     .record_step_outcome(
//!         &view.session.session_id,
//!         "org-1",
//!         StepReport::new("s1", Outcome::Pass),
//!     )
//!     .await?;
//! ```

#![warn(missing_docs)]

pub mod audit;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod state_machine;
pub mod types;
pub mod validate;

pub use audit::{verify_chain, AuditAction, AuditEntry, AuditLog, AuditRecord};
pub use cache::TreeCache;
pub use config::{TreeConfig, DEFAULT_GST_RATE};
pub use engine::{DecisionTreeEngine, StartSession, TreeCollections};
pub use error::TreeError;
pub use estimate::{estimate_for, round2};
pub use state_machine::{allowed_transitions, branch, can_transition, Branch};
pub use types::{
    CostEstimate, DecisionTree, DiagnosticStep, EfiSession, Outcome, ParseStepActionError,
    PartLine, ResolutionNode, SessionStatus, SessionView, StepAction, StepOutcome, StepReport,
    TreeDraft,
};
pub use validate::validate_draft;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for tree consumers
    pub use crate::{
        DecisionTreeEngine, Outcome, SessionStatus, SessionView, StartSession, StepAction,
        StepReport, TreeDraft, TreeError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
