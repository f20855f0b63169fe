//! EFI Knowledge Store
//!
//! Owns the diagnostic knowledge the rest of the engine reasons over:
//! - **KnowledgeArticle**: free-form guides, bulletins and notes
//! - **StructuredFailureCard**: reusable symptom → root cause → fix records
//! - **ErrorCodeDefinition**: DTC reference entries
//!
//! Every document is either global or tenant-private, and moves through the
//! `draft → pending → approved | rejected` review workflow. Only approved
//! documents are searchable.
//!
//! # Example
//!
//! ```rust,ignore
//! use efi_knowledge::{KnowledgeStore, SearchQuery};
//!
//! let store = KnowledgeStore::in_memory(clock);
//! let hits = store
//!     .search(
//!         &SearchQuery::new("cell imbalance")
//!             .for_organization("org-1")
//!             .with_dtc_codes(["P0A80"]),
//!     )
//!     .await?;
//! for hit in &hits {
//!     println!("{}", efi_knowledge::format_citation(hit));
//! }
//! ```

#![warn(missing_docs)]

pub mod citation;
pub mod error;
pub mod normalize;
pub mod search;
pub mod store;
pub mod types;

pub use citation::{format_citation, Citation};
pub use error::KnowledgeError;
pub use search::{MatchKind, SearchHit, SearchQuery};
pub use store::{
    KnowledgeCollections, KnowledgeConfig, KnowledgeStats, KnowledgeStore, StatusCounts,
};
pub use types::{
    ApprovalStatus, CardSource, CardUpdate, ErrorCodeDefinition, KnowledgeArticle,
    KnowledgeDocument, KnowledgeType, NewErrorCode, NewFailureCard, NewKnowledgeArticle, Review,
    Severity, StructuredFailureCard, TicketResolution,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for knowledge consumers
    pub use crate::{
        ApprovalStatus, KnowledgeError, KnowledgeStore, NewFailureCard, SearchHit, SearchQuery,
        StructuredFailureCard,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
