//! Knowledge document types
//!
//! Defines the documents owned by the knowledge store and the review
//! workflow they share.

use chrono::{DateTime, Utc};
use efi_store::{Document, Scope};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default success rate for a card with no recorded outcomes
pub const DEFAULT_SUCCESS_RATE: f64 = 0.5;

/// Review workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Newly created, not yet submitted
    #[default]
    Draft,
    /// Submitted for review
    Pending,
    /// Approved, visible to search and ranking
    Approved,
    /// Rejected by a reviewer
    Rejected,
}

impl ApprovalStatus {
    /// Statuses reachable from this one
    #[must_use]
    pub fn allowed_transitions(self) -> &'static [ApprovalStatus] {
        use ApprovalStatus::{Approved, Draft, Pending, Rejected};
        match self {
            Draft => &[Pending, Approved, Rejected],
            Pending => &[Approved, Rejected],
            Approved | Rejected => &[],
        }
    }

    /// Check if `to` is reachable from this status
    #[inline]
    #[must_use]
    pub fn can_transition_to(self, to: ApprovalStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reviewer decision recorded on a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Resulting status
    pub status: ApprovalStatus,
    /// Reviewer user id
    pub reviewer: String,
    /// Approval note or rejection reason
    pub notes: Option<String>,
    /// Decision time
    pub reviewed_at: DateTime<Utc>,
}

/// Documents that go through the review workflow
pub trait Reviewable: Document {
    /// Current status
    fn approval_status(&self) -> ApprovalStatus;

    /// Apply a status change (transition already validated)
    fn apply_status(&mut self, status: ApprovalStatus, review: Option<Review>, at: DateTime<Utc>);
}

/// Kind of knowledge article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeType {
    /// Step-by-step diagnostic guide
    #[default]
    DiagnosticGuide,
    /// Repair or replacement procedure
    RepairProcedure,
    /// Manufacturer service bulletin
    ServiceBulletin,
    /// Field note written by a technician
    TechnicianNote,
}

/// Free-form knowledge article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeArticle {
    /// Stable article id
    pub knowledge_id: String,
    #[serde(flatten)]
    pub scope: Scope,
    /// Kind of document
    pub knowledge_type: KnowledgeType,
    /// Display title
    pub title: String,
    /// Body text used for search
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub dtc_codes: Vec<String>,
    /// Make filter, if any
    pub vehicle_make: Option<String>,
    /// Model filter, if any
    pub vehicle_model: Option<String>,
    /// Subsystem filter, if any
    pub subsystem: Option<String>,
    /// Author confidence, 0.0 - 1.0
    pub confidence_score: f64,
    /// Lifecycle status
    pub approval_status: ApprovalStatus,
    /// Bumped on every edit
    pub version: u32,
    /// Author
    pub created_by: String,
    #[serde(default)]
    pub review: Option<Review>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Document for KnowledgeArticle {
    const COLLECTION: &'static str = "knowledge_articles";

    fn id(&self) -> &str {
        &self.knowledge_id
    }
}

impl Reviewable for KnowledgeArticle {
    fn approval_status(&self) -> ApprovalStatus {
        self.approval_status
    }

    fn apply_status(&mut self, status: ApprovalStatus, review: Option<Review>, at: DateTime<Utc>) {
        self.approval_status = status;
        if review.is_some() {
            self.review = review;
        }
        self.updated_at = at;
    }
}

/// Where a failure card came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardSource {
    /// Entered by a knowledge engineer
    #[default]
    Manual,
    /// Written up from a resolved ticket
    Ticket {
        /// Source ticket
        ticket_id: String,
    },
    /// Synthesized by the learning pipeline
    Learning {
        /// Source learning event
        event_id: String,
    },
}

/// Structured, reusable diagnosis-and-fix record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredFailureCard {
    /// Stable card id
    pub failure_card_id: String,
    /// Back-reference to the article this card was extracted from
    pub knowledge_id: Option<String>,
    #[serde(flatten)]
    pub scope: Scope,
    /// Display title
    pub title: String,
    /// Affected subsystem
    pub subsystem: String,
    /// Make the card applies to, if narrowed
    pub vehicle_make: Option<String>,
    /// Model the card applies to, if narrowed
    pub vehicle_model: Option<String>,
    /// Vehicle category, e.g. scooter
    pub vehicle_category: Option<String>,
    #[serde(default)]
    pub symptom_cluster: Vec<String>,
    #[serde(default)]
    pub dtc_codes: Vec<String>,
    /// Diagnosed root cause
    pub probable_root_cause: String,
    /// Fix confirmed in the field
    pub verified_fix: String,
    #[serde(default)]
    pub fix_steps: Vec<String>,
    #[serde(default)]
    pub parts_required: Vec<String>,
    /// Running success rate in [0, 1]
    pub historical_success_rate: f64,
    #[serde(default)]
    pub outcomes_recorded: u32,
    #[serde(default)]
    pub recurrence_counter: u32,
    #[serde(default)]
    pub usage_count: u32,
    /// Lifecycle status
    pub approval_status: ApprovalStatus,
    #[serde(default)]
    pub source: CardSource,
    /// Bumped on every edit
    pub version: u32,
    /// Author
    pub created_by: String,
    #[serde(default)]
    pub review: Option<Review>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl StructuredFailureCard {
    /// Fold one repair outcome (0.0 failure … 1.0 success) into the success rate.
    ///
    /// The prior rate counts as one observation, so a single early outcome
    /// moves the rate halfway rather than all the way.
    pub fn record_outcome(&mut self, score: f64, at: DateTime<Utc>) {
        let score = score.clamp(0.0, 1.0);
        let weight = f64::from(self.outcomes_recorded) + 1.0;
        self.historical_success_rate =
            ((self.historical_success_rate * weight + score) / (weight + 1.0)).clamp(0.0, 1.0);
        self.outcomes_recorded += 1;
        self.updated_at = at;
    }

    /// Merge field feedback into the card
    pub fn apply_update(&mut self, update: &CardUpdate, at: DateTime<Utc>) {
        merge_unique(&mut self.parts_required, &update.additional_parts);
        merge_unique(&mut self.symptom_cluster, &update.additional_symptoms);
        merge_unique(&mut self.dtc_codes, &update.additional_dtc_codes);
        if let Some(fix) = update.verified_fix.as_ref().filter(|f| !f.trim().is_empty()) {
            self.verified_fix = fix.clone();
        }
        if let Some(cause) = update
            .probable_root_cause
            .as_ref()
            .filter(|c| !c.trim().is_empty())
        {
            self.probable_root_cause = cause.clone();
        }
        self.recurrence_counter += 1;
        self.version += 1;
        self.updated_at = at;
    }
}

fn merge_unique(target: &mut Vec<String>, additions: &[String]) {
    for item in additions {
        if !target.iter().any(|t| t.eq_ignore_ascii_case(item)) {
            target.push(item.clone());
        }
    }
}

impl Document for StructuredFailureCard {
    const COLLECTION: &'static str = "failure_cards";

    fn id(&self) -> &str {
        &self.failure_card_id
    }
}

impl Reviewable for StructuredFailureCard {
    fn approval_status(&self) -> ApprovalStatus {
        self.approval_status
    }

    fn apply_status(&mut self, status: ApprovalStatus, review: Option<Review>, at: DateTime<Utc>) {
        self.approval_status = status;
        if review.is_some() {
            self.review = review;
        }
        self.updated_at = at;
    }
}

/// Fault severity of an error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational
    Info,
    /// Degraded operation
    #[default]
    Warning,
    /// Unsafe to operate
    Critical,
}

/// Reference entry for a diagnostic trouble code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCodeDefinition {
    /// `<scope key>:<code>`
    pub definition_id: String,
    /// Normalized DTC
    pub code: String,
    #[serde(flatten)]
    pub scope: Scope,
    /// Human-readable meaning
    pub description: String,
    /// Subsystem the code belongs to
    pub subsystem: Option<String>,
    /// How urgently the code must be handled
    pub severity: Severity,
    #[serde(default)]
    pub possible_causes: Vec<String>,
    /// Make-specific definition, if any
    pub vehicle_make: Option<String>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl ErrorCodeDefinition {
    /// Document id for a code within a scope
    #[must_use]
    pub fn definition_id_for(scope: &Scope, code: &str) -> String {
        format!("{}:{}", scope.organization_id().unwrap_or("global"), code)
    }
}

impl Document for ErrorCodeDefinition {
    const COLLECTION: &'static str = "error_codes";

    fn id(&self) -> &str {
        &self.definition_id
    }
}

/// Any searchable knowledge document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "document_type", rename_all = "snake_case")]
pub enum KnowledgeDocument {
    /// Knowledge article
    Article(KnowledgeArticle),
    /// Failure card
    FailureCard(StructuredFailureCard),
}

impl KnowledgeDocument {
    /// Document id
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Article(a) => &a.knowledge_id,
            Self::FailureCard(c) => &c.failure_card_id,
        }
    }

    /// Title
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Article(a) => &a.title,
            Self::FailureCard(c) => &c.title,
        }
    }

    /// Scope
    #[must_use]
    pub fn scope(&self) -> &Scope {
        match self {
            Self::Article(a) => &a.scope,
            Self::FailureCard(c) => &c.scope,
        }
    }

    /// Document version
    #[must_use]
    pub fn version(&self) -> u32 {
        match self {
            Self::Article(a) => a.version,
            Self::FailureCard(c) => c.version,
        }
    }

    /// Short type label
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Article(_) => "article",
            Self::FailureCard(_) => "failure_card",
        }
    }

    /// Subsystem, if the document names one
    #[must_use]
    pub fn subsystem(&self) -> Option<&str> {
        match self {
            Self::Article(a) => a.subsystem.as_deref(),
            Self::FailureCard(c) => Some(&c.subsystem),
        }
    }

    /// Vehicle make, if the document is make-specific
    #[must_use]
    pub fn vehicle_make(&self) -> Option<&str> {
        match self {
            Self::Article(a) => a.vehicle_make.as_deref(),
            Self::FailureCard(c) => c.vehicle_make.as_deref(),
        }
    }

    /// DTC codes
    #[must_use]
    pub fn dtc_codes(&self) -> &[String] {
        match self {
            Self::Article(a) => &a.dtc_codes,
            Self::FailureCard(c) => &c.dtc_codes,
        }
    }

    /// Symptoms
    #[must_use]
    pub fn symptoms(&self) -> &[String] {
        match self {
            Self::Article(a) => &a.symptoms,
            Self::FailureCard(c) => &c.symptom_cluster,
        }
    }

    /// Confidence used to weight text matches
    #[must_use]
    pub fn confidence(&self) -> f64 {
        match self {
            Self::Article(a) => a.confidence_score,
            Self::FailureCard(c) => c.historical_success_rate,
        }
    }

    /// Body text used for excerpts
    #[must_use]
    pub fn body(&self) -> &str {
        match self {
            Self::Article(a) => &a.content,
            Self::FailureCard(c) => &c.probable_root_cause,
        }
    }

    /// Lowercased text searched by free-text queries
    #[must_use]
    pub fn haystack(&self) -> String {
        let parts: Vec<&str> = match self {
            Self::Article(a) => std::iter::once(a.title.as_str())
                .chain(std::iter::once(a.content.as_str()))
                .chain(a.tags.iter().map(String::as_str))
                .collect(),
            Self::FailureCard(c) => [
                c.title.as_str(),
                c.probable_root_cause.as_str(),
                c.verified_fix.as_str(),
            ]
            .into_iter()
            .chain(c.symptom_cluster.iter().map(String::as_str))
            .chain(c.fix_steps.iter().map(String::as_str))
            .collect(),
        };
        parts.join(" ").to_lowercase()
    }
}

/// Input for a new knowledge article
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewKnowledgeArticle {
    /// Owning organization; `None` creates a global article
    pub organization_id: Option<String>,
    /// Kind of document
    pub knowledge_type: KnowledgeType,
    /// Display title
    pub title: String,
    /// Body text
    pub content: String,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Symptoms the article covers
    pub symptoms: Vec<String>,
    /// DTCs the article covers
    pub dtc_codes: Vec<String>,
    /// Make filter
    pub vehicle_make: Option<String>,
    /// Model filter
    pub vehicle_model: Option<String>,
    /// Subsystem filter
    pub subsystem: Option<String>,
    /// Author confidence in [0, 1]
    pub confidence_score: Option<f64>,
    /// Author
    pub created_by: String,
}

/// Input for a new failure card
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewFailureCard {
    /// Owning organization; `None` creates a global card
    pub organization_id: Option<String>,
    /// Article the card was derived from
    pub knowledge_id: Option<String>,
    /// Display title
    pub title: String,
    /// Affected subsystem
    pub subsystem: String,
    /// Make filter
    pub vehicle_make: Option<String>,
    /// Model filter
    pub vehicle_model: Option<String>,
    /// Vehicle category
    pub vehicle_category: Option<String>,
    /// Symptoms observed together
    pub symptom_cluster: Vec<String>,
    /// Associated DTCs
    pub dtc_codes: Vec<String>,
    /// Diagnosed root cause
    pub probable_root_cause: String,
    /// Fix confirmed in the field
    pub verified_fix: String,
    /// Ordered repair steps
    pub fix_steps: Vec<String>,
    /// Parts the fix consumes
    pub parts_required: Vec<String>,
    /// Initial success rate; defaults to 0.5
    pub historical_success_rate: Option<f64>,
    /// Where the card came from
    pub source: CardSource,
    /// Author
    pub created_by: String,
}

/// A resolved ticket written up as a failure card
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketResolution {
    /// Closed ticket
    pub ticket_id: String,
    /// Owning organization
    pub organization_id: String,
    /// Card title, if the technician gave one
    pub title: Option<String>,
    /// Affected subsystem
    pub subsystem: String,
    /// Vehicle make
    pub vehicle_make: Option<String>,
    /// Vehicle model
    pub vehicle_model: Option<String>,
    /// Vehicle category
    pub vehicle_category: Option<String>,
    /// Symptoms reported on the ticket
    pub symptoms: Vec<String>,
    /// DTCs read on the ticket
    pub dtc_codes: Vec<String>,
    /// Root cause found by the technician
    pub root_cause: String,
    /// Fix that closed the ticket
    pub fix_description: String,
    /// Steps taken
    pub fix_steps: Vec<String>,
    /// Parts consumed
    pub parts_used: Vec<String>,
    /// Technician
    pub created_by: String,
}

/// Field feedback merged into an existing card
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CardUpdate {
    /// Parts to merge into `parts_required`
    pub additional_parts: Vec<String>,
    /// Symptoms to merge into `symptom_cluster`
    pub additional_symptoms: Vec<String>,
    /// DTCs to merge into `dtc_codes`
    pub additional_dtc_codes: Vec<String>,
    /// Replacement fix text
    pub verified_fix: Option<String>,
    /// Replacement root cause
    pub probable_root_cause: Option<String>,
}

/// Input for an error code definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewErrorCode {
    /// Owning organization; `None` defines a global code
    pub organization_id: Option<String>,
    /// DTC; normalized on write
    pub code: String,
    /// Human-readable meaning
    pub description: String,
    /// Subsystem the code belongs to
    pub subsystem: Option<String>,
    /// Severity
    pub severity: Severity,
    /// Known causes
    pub possible_causes: Vec<String>,
    /// Make-specific definition, if any
    pub vehicle_make: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> StructuredFailureCard {
        let now = Utc::now();
        StructuredFailureCard {
            failure_card_id: "fc_1".to_string(),
            knowledge_id: None,
            scope: Scope::Global,
            title: "BMS imbalance".to_string(),
            subsystem: "battery".to_string(),
            vehicle_make: None,
            vehicle_model: None,
            vehicle_category: None,
            symptom_cluster: vec!["no charge".to_string()],
            dtc_codes: vec![],
            probable_root_cause: "cell imbalance".to_string(),
            verified_fix: "replace BMS".to_string(),
            fix_steps: vec![],
            parts_required: vec!["BMS module".to_string()],
            historical_success_rate: DEFAULT_SUCCESS_RATE,
            outcomes_recorded: 0,
            recurrence_counter: 0,
            usage_count: 0,
            approval_status: ApprovalStatus::Draft,
            source: CardSource::Manual,
            version: 1,
            created_by: "eng".to_string(),
            review: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn review_transitions() {
        assert!(ApprovalStatus::Draft.can_transition_to(ApprovalStatus::Pending));
        assert!(ApprovalStatus::Pending.can_transition_to(ApprovalStatus::Approved));
        assert!(!ApprovalStatus::Approved.can_transition_to(ApprovalStatus::Rejected));
        assert!(!ApprovalStatus::Rejected.can_transition_to(ApprovalStatus::Approved));
        assert!(!ApprovalStatus::Pending.can_transition_to(ApprovalStatus::Draft));
    }

    #[test]
    fn outcome_moves_rate_halfway_first() {
        let mut c = card();
        c.record_outcome(1.0, Utc::now());
        assert!((c.historical_success_rate - 0.75).abs() < 1e-9);
        assert_eq!(c.outcomes_recorded, 1);

        c.record_outcome(0.0, Utc::now());
        assert!((c.historical_success_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn update_merges_without_duplicates() {
        let mut c = card();
        c.apply_update(
            &CardUpdate {
                additional_parts: vec!["bms module".to_string(), "Fuse 40A".to_string()],
                verified_fix: Some("replace BMS and fuse".to_string()),
                ..CardUpdate::default()
            },
            Utc::now(),
        );
        assert_eq!(c.parts_required, vec!["BMS module", "Fuse 40A"]);
        assert_eq!(c.verified_fix, "replace BMS and fuse");
        assert_eq!(c.recurrence_counter, 1);
        assert_eq!(c.version, 2);
    }

    #[test]
    fn card_round_trips_with_flat_scope() {
        let mut c = card();
        c.scope = Scope::tenant("org-1");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["scope"], "tenant");
        assert_eq!(json["organization_id"], "org-1");
        assert_eq!(json["source"]["kind"], "manual");

        let back: StructuredFailureCard = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }
}
