//! Document collection trait
//!
//! Every EFI document lives in a collection keyed by its own id. Mutations are
//! single-document and go through [`Collection::update_if`], which checks a
//! guard and applies the change as one atomic step.

use crate::error::StoreError;
use async_trait::async_trait;

/// A document stored in a collection
pub trait Document: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Collection name (for errors and logs)
    const COLLECTION: &'static str;

    /// Unique document id
    fn id(&self) -> &str;
}

/// Result of a conditional update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome<D> {
    /// Guard held, mutation applied; carries the new document
    Updated(D),
    /// No document with that id
    NotFound,
    /// Guard rejected the current document; carries it unchanged
    PreconditionFailed(D),
}

impl<D> UpdateOutcome<D> {
    /// Check if the update was applied
    #[inline]
    #[must_use]
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }

    /// Updated document, if the mutation was applied
    #[inline]
    #[must_use]
    pub fn updated(self) -> Option<D> {
        match self {
            Self::Updated(doc) => Some(doc),
            _ => None,
        }
    }
}

// Closure parameters name their lifetime with `for<'d>` so `#[async_trait]` keeps them
// higher-ranked instead of tying them to the call.

/// Async document collection
///
/// Implementations must make `update_if` atomic with respect to other
/// updates of the same id (compare-and-swap semantics).
#[async_trait]
pub trait Collection<D: Document>: Send + Sync + std::fmt::Debug {
    /// Insert a new document
    ///
    /// # Errors
    /// `StoreError::Duplicate` if the id already exists
    async fn insert(&self, doc: D) -> Result<(), StoreError>;

    /// Fetch a document by id
    async fn get(&self, id: &str) -> Result<Option<D>, StoreError>;

    /// All documents matching a filter, ordered by id
    async fn find(
        &self,
        filter: &(dyn for<'d> Fn(&'d D) -> bool + Send + Sync),
    ) -> Result<Vec<D>, StoreError>;

    /// Apply `mutate` only if `guard` holds on the current document
    async fn update_if(
        &self,
        id: &str,
        guard: &(dyn for<'d> Fn(&'d D) -> bool + Send + Sync),
        mutate: &mut (dyn for<'d> FnMut(&'d mut D) + Send),
    ) -> Result<UpdateOutcome<D>, StoreError>;

    /// Count documents matching a filter
    async fn count(
        &self,
        filter: &(dyn for<'d> Fn(&'d D) -> bool + Send + Sync),
    ) -> Result<usize, StoreError> {
        Ok(self.find(filter).await?.len())
    }

    /// Unconditional single-document update
    async fn update(
        &self,
        id: &str,
        mutate: &mut (dyn for<'d> FnMut(&'d mut D) + Send),
    ) -> Result<UpdateOutcome<D>, StoreError> {
        self.update_if(id, &|_| true, mutate).await
    }
}
