//! EFI Store
//!
//! The persistence seam shared by every Failure Intelligence component:
//! - **Collection**: async document collection with an atomic conditional update
//! - **MemoryCollection**: DashMap-backed implementation
//! - **Scope / Visibility**: tenant vs. global knowledge and the read rule between them
//! - **Clock**: injectable time source
//!
//! # Example
//!
//! ```rust,ignore
//! use efi_store::{Collection, MemoryCollection, UpdateOutcome};
//!
//! let sessions: MemoryCollection<Session> = MemoryCollection::new();
//! sessions.insert(session).await?;
//!
//! let outcome = sessions
//!     .update_if(&id, &|s| s.is_active(), &mut |s| s.complete())
//!     .await?;
//! assert!(outcome.is_updated());
//! ```

#![warn(missing_docs)]

pub mod clock;
pub mod collection;
pub mod error;
pub mod ids;
pub mod memory;
pub mod scope;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use collection::{Collection, Document, UpdateOutcome};
pub use error::StoreError;
pub use ids::new_id;
pub use memory::MemoryCollection;
pub use scope::{Scope, Visibility};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for store consumers
    pub use crate::{
        Clock, Collection, Document, MemoryCollection, Scope, SharedClock, StoreError,
        UpdateOutcome, Visibility,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
