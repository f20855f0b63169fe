//! In-memory collection backed by DashMap
//!
//! The shard write lock held by `get_mut` covers guard evaluation and the
//! mutation, so `update_if` is a compare-and-swap.

use crate::collection::{Collection, Document, UpdateOutcome};
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// DashMap-backed document collection
#[derive(Debug)]
pub struct MemoryCollection<D: Document> {
    docs: DashMap<String, D>,
}

impl<D: Document> MemoryCollection<D> {
    /// Create empty collection
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            docs: DashMap::new(),
        }
    }

    /// Create collection pre-seeded with documents (later duplicates win)
    #[must_use]
    pub fn with_documents(docs: impl IntoIterator<Item = D>) -> Self {
        let collection = Self::new();
        for doc in docs {
            collection.docs.insert(doc.id().to_string(), doc);
        }
        collection
    }

    /// Number of stored documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Check if collection is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Snapshot of all documents, ordered by id
    #[must_use]
    pub fn snapshot(&self) -> Vec<D> {
        let mut all: Vec<D> = self.docs.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }
}

impl<D: Document> Default for MemoryCollection<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<D: Document> Collection<D> for MemoryCollection<D> {
    async fn insert(&self, doc: D) -> Result<(), StoreError> {
        match self.docs.entry(doc.id().to_string()) {
            Entry::Occupied(entry) => Err(StoreError::Duplicate {
                collection: D::COLLECTION,
                id: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(doc);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<D>, StoreError> {
        Ok(self.docs.get(id).map(|entry| entry.value().clone()))
    }

    async fn find(
        &self,
        filter: &(dyn for<'d> Fn(&'d D) -> bool + Send + Sync),
    ) -> Result<Vec<D>, StoreError> {
        let mut matched: Vec<D> = self
            .docs
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(matched)
    }

    async fn update_if(
        &self,
        id: &str,
        guard: &(dyn for<'d> Fn(&'d D) -> bool + Send + Sync),
        mutate: &mut (dyn for<'d> FnMut(&'d mut D) + Send),
    ) -> Result<UpdateOutcome<D>, StoreError> {
        let Some(mut entry) = self.docs.get_mut(id) else {
            return Ok(UpdateOutcome::NotFound);
        };

        if !guard(entry.value()) {
            tracing::debug!(collection = D::COLLECTION, id, "conditional update rejected");
            return Ok(UpdateOutcome::PreconditionFailed(entry.value().clone()));
        }

        mutate(entry.value_mut());
        Ok(UpdateOutcome::Updated(entry.value().clone()))
    }
}
