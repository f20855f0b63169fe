//! Keyword / filter search
//!
//! Matching precedence, highest first:
//! 1. exact DTC-code membership (0.95)
//! 2. symptom-set overlap (0.85)
//! 3. free-text match on title/content/tags, `0.7 × confidence`

use crate::error::KnowledgeError;
use crate::normalize::{normalize_dtc_codes, normalize_optional, normalize_terms, tokenize};
use crate::types::KnowledgeDocument;
use serde::{Deserialize, Serialize};

/// Score for a DTC-code match
pub const DTC_MATCH_SCORE: f64 = 0.95;
/// Score for a symptom overlap
pub const SYMPTOM_MATCH_SCORE: f64 = 0.85;
/// Base score for a free-text match, scaled by document confidence
pub const TEXT_MATCH_BASE: f64 = 0.7;

/// Search request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    /// Free text
    pub text: String,
    /// Caller organization (`None` searches global knowledge only)
    pub organization_id: Option<String>,
    /// Subsystem filter
    pub subsystem: Option<String>,
    /// Make filter
    pub vehicle_make: Option<String>,
    /// DTCs to match; any overlap counts
    pub dtc_codes: Vec<String>,
    /// Symptoms to match; any overlap counts
    pub symptoms: Vec<String>,
    /// Maximum hits; `None` uses the configured default
    pub limit: Option<usize>,
}

impl SearchQuery {
    /// Create query from free text
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Scope the query to a tenant
    #[inline]
    #[must_use]
    pub fn for_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Restrict to a subsystem
    #[inline]
    #[must_use]
    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    /// Restrict to a vehicle make
    #[inline]
    #[must_use]
    pub fn with_vehicle_make(mut self, make: impl Into<String>) -> Self {
        self.vehicle_make = Some(make.into());
        self
    }

    /// Match DTC codes
    #[must_use]
    pub fn with_dtc_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dtc_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Match symptoms
    #[must_use]
    pub fn with_symptoms<I, S>(mut self, symptoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symptoms = symptoms.into_iter().map(Into::into).collect();
        self
    }

    /// Cap the number of hits
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Which rule produced a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// DTC code membership
    DtcCode,
    /// Symptom overlap
    Symptom,
    /// Free-text (or filter-only listing)
    Text,
}

/// A ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Matched article or failure card
    pub document: KnowledgeDocument,
    /// Relevance in [0, 1]
    pub relevance_score: f64,
    /// Strongest signal behind the match
    pub matched_on: MatchKind,
}

/// Normalized query terms, ready to score documents
#[derive(Debug, Clone, Default)]
pub(crate) struct MatchCriteria {
    dtc_codes: Vec<String>,
    symptoms: Vec<String>,
    terms: Vec<String>,
    subsystem: Option<String>,
    vehicle_make: Option<String>,
}

impl MatchCriteria {
    /// Normalize a query
    pub(crate) fn from_query(query: &SearchQuery) -> Result<Self, KnowledgeError> {
        Ok(Self {
            dtc_codes: normalize_dtc_codes(&query.dtc_codes)?,
            symptoms: normalize_terms(&query.symptoms),
            terms: tokenize(&query.text),
            subsystem: normalize_optional(query.subsystem.as_deref()),
            vehicle_make: normalize_optional(query.vehicle_make.as_deref()),
        })
    }

    fn has_match_terms(&self) -> bool {
        !(self.dtc_codes.is_empty() && self.symptoms.is_empty() && self.terms.is_empty())
    }

    /// Documents without a subsystem or make are generic and pass those filters
    fn passes_filters(&self, doc: &KnowledgeDocument) -> bool {
        let subsystem_ok = match (&self.subsystem, doc.subsystem()) {
            (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual.trim()),
            _ => true,
        };
        let make_ok = match (&self.vehicle_make, doc.vehicle_make()) {
            (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual.trim()),
            _ => true,
        };
        subsystem_ok && make_ok
    }

    /// Score a document, `None` if it does not match
    pub(crate) fn score(&self, doc: &KnowledgeDocument) -> Option<(f64, MatchKind)> {
        if !self.passes_filters(doc) {
            return None;
        }

        if !self.dtc_codes.is_empty()
            && doc
                .dtc_codes()
                .iter()
                .any(|code| self.dtc_codes.iter().any(|c| c.eq_ignore_ascii_case(code)))
        {
            return Some((DTC_MATCH_SCORE, MatchKind::DtcCode));
        }

        if !self.symptoms.is_empty() {
            let doc_symptoms = normalize_terms(doc.symptoms());
            if doc_symptoms.iter().any(|s| self.symptoms.contains(s)) {
                return Some((SYMPTOM_MATCH_SCORE, MatchKind::Symptom));
            }
        }

        let text_score = TEXT_MATCH_BASE * doc.confidence().clamp(0.0, 1.0);
        if !self.has_match_terms() {
            return Some((text_score, MatchKind::Text));
        }

        if !self.terms.is_empty() {
            let haystack = doc.haystack();
            if self.terms.iter().any(|t| haystack.contains(t.as_str())) {
                return Some((text_score, MatchKind::Text));
            }
        }

        None
    }
}

/// Order hits by score (desc) then id, keeping the first hit per document id
pub(crate) fn rank_hits(mut hits: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.relevance_score
            .total_cmp(&a.relevance_score)
            .then_with(|| a.document.id().cmp(b.document.id()))
    });
    let mut seen = std::collections::HashSet::new();
    hits.retain(|hit| seen.insert(hit.document.id().to_string()));
    hits.truncate(limit);
    hits
}
