//! Store error types

/// Errors raised by a document collection
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A document with this id already exists
    #[error("duplicate document in {collection}: {id}")]
    Duplicate {
        /// Collection name
        collection: &'static str,
        /// Document id
        id: String,
    },

    /// Backend failure (connection, serialization, ...)
    #[error("store backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_display_names_collection() {
        let err = StoreError::Duplicate {
            collection: "failure_cards",
            id: "fc_1".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate document in failure_cards: fc_1");
    }
}
