//! Citation formatting for search and ranking output

use crate::search::SearchHit;
use crate::types::KnowledgeDocument;
use serde::{Deserialize, Serialize};
use std::fmt;

const EXCERPT_CHARS: usize = 160;

/// Reference to the knowledge behind a suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Cited document id
    pub source_id: String,
    /// `article` or `failure_card`
    pub source_type: String,
    /// Cited document title
    pub title: String,
    /// `global` or `tenant`
    pub scope: String,
    /// Document version at citation time
    pub version: u32,
    /// Short quote from the document
    pub excerpt: String,
}

impl Citation {
    /// Build citation for a document
    #[must_use]
    pub fn for_document(doc: &KnowledgeDocument) -> Self {
        Self {
            source_id: doc.id().to_string(),
            source_type: doc.kind().to_string(),
            title: doc.title().to_string(),
            scope: doc.scope().label().to_string(),
            version: doc.version(),
            excerpt: excerpt(doc.body()),
        }
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}, v{})",
            self.source_id, self.title, self.scope, self.version
        )
    }
}

/// One-line citation for a search hit
#[must_use]
pub fn format_citation(hit: &SearchHit) -> String {
    Citation::for_document(&hit.document).to_string()
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    out.push('…');
    out
}
