//! Learning events, risk alerts and review types

use chrono::{DateTime, Utc};
use efi_store::Document;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the repair went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepairOutcome {
    /// Fault fixed
    #[default]
    Success,
    /// Fault reduced but not gone
    Partial,
    /// Fault still present
    Failure,
}

impl RepairOutcome {
    /// Score folded into a card's success rate
    #[must_use]
    pub fn score(self) -> f64 {
        match self {
            Self::Success => 1.0,
            Self::Partial => 0.5,
            Self::Failure => 0.0,
        }
    }

    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for RepairOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket closure payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosureData {
    /// Diagnostic session used on the ticket, if any
    pub session_id: Option<String>,
    /// Failure card that guided the repair, if any
    pub failure_card_id: Option<String>,
    /// Vehicle manufacturer
    pub vehicle_make: Option<String>,
    /// Vehicle model; closures without one never form a pattern
    pub vehicle_model: Option<String>,
    /// Vehicle category (scooter, three-wheeler, ...)
    pub vehicle_category: Option<String>,
    /// Required
    pub subsystem: String,
    /// Symptoms observed on the vehicle
    pub symptoms: Vec<String>,
    /// Diagnostic trouble codes read from the vehicle
    pub dtc_codes: Vec<String>,
    /// Root cause the technician found
    pub actual_root_cause: String,
    /// Parts swapped during the repair
    pub parts_replaced: Vec<String>,
    /// Repair steps performed
    pub repair_actions: Vec<String>,
    /// Where the technician departed from the suggested fix
    pub deviation_notes: String,
    /// How the repair went
    pub outcome: RepairOutcome,
    /// Whether the top ranked cause was right
    pub ai_was_correct: Option<bool>,
    /// Technician reported an unsafe condition
    pub unsafe_incident: bool,
    /// Technician who closed the ticket
    pub technician_id: Option<String>,
}

/// Review state of a learning event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStatus {
    /// Waiting for a reviewer
    PendingReview,
    /// Claimed by a reviewer whose decision is being applied
    InReview,
    /// Decision recorded
    Reviewed,
}

/// Reviewer decision on a learning event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    /// Approve the drafted card, or create and approve one
    CreateCard,
    /// Fold the outcome into the guiding card; reject the draft
    UpdateCard,
    /// Reject the draft, nothing else
    Dismiss,
}

impl ReviewAction {
    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateCard => "create_card",
            Self::UpdateCard => "update_card",
            Self::Dismiss => "dismiss",
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded reviewer decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningReview {
    /// Decision taken
    pub action: ReviewAction,
    /// Who decided
    pub reviewer: String,
    /// Free-form reviewer notes
    pub notes: Option<String>,
    /// Card created or updated by the decision
    pub failure_card_id: Option<String>,
    /// When the decision was recorded
    pub reviewed_at: DateTime<Utc>,
}

/// Outcome of one closed ticket, queued for review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningEvent {
    /// Unique id (`le_` prefix)
    pub event_id: String,
    /// Owning tenant
    pub organization_id: String,
    /// Closed ticket
    pub ticket_id: String,
    /// Diagnostic session used on the ticket
    pub session_id: Option<String>,
    /// Guiding failure card, always visible to the owning tenant
    pub failure_card_id: Option<String>,
    /// Vehicle manufacturer
    pub vehicle_make: Option<String>,
    /// Vehicle model as reported
    pub vehicle_model: Option<String>,
    /// Vehicle category
    pub vehicle_category: Option<String>,
    /// Subsystem repaired
    pub subsystem: String,
    /// Normalized symptoms
    pub symptoms: Vec<String>,
    /// Normalized DTC codes
    pub dtc_codes: Vec<String>,
    /// Root cause the technician found
    pub actual_root_cause: String,
    /// Parts swapped during the repair
    pub actual_parts_used: Vec<String>,
    /// Repair steps performed
    pub repair_actions: Vec<String>,
    /// Where the technician departed from the suggested fix
    pub deviation_notes: String,
    /// How the repair went
    pub outcome: RepairOutcome,
    /// Whether the top ranked cause was right
    pub ai_was_correct: Option<bool>,
    /// Technician reported an unsafe condition
    pub unsafe_incident: bool,
    /// Technician who closed the ticket
    pub technician_id: Option<String>,
    /// Review state
    pub status: LearningStatus,
    /// Set when the event warrants new knowledge
    pub suggest_new_card: bool,
    /// Enrichment has run
    pub processed: bool,
    /// Draft card proposed from this event
    pub draft_card_id: Option<String>,
    /// Reviewer decision, once made
    pub review: Option<LearningReview>,
    /// Capture time
    pub created_at: DateTime<Utc>,
}

impl LearningEvent {
    /// Closure departs from guidance enough to draft a card
    #[must_use]
    pub fn warrants_draft_card(&self) -> bool {
        !self.deviation_notes.trim().is_empty()
            || self.outcome != RepairOutcome::Success
            || !self.actual_parts_used.is_empty()
            || self.ai_was_correct == Some(false)
    }

    /// Check if still awaiting a reviewer
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == LearningStatus::PendingReview
    }
}

impl Document for LearningEvent {
    const COLLECTION: &'static str = "learning_events";

    fn id(&self) -> &str {
        &self.event_id
    }
}

/// Alert lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Raised, nobody has looked yet
    Active,
    /// Seen by the organization, still collecting tickets
    Acknowledged,
    /// Closed out; terminal
    Resolved,
}

impl AlertStatus {
    /// Active and acknowledged alerts still collect occurrences
    #[inline]
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::Acknowledged)
    }
}

/// Recurring failure pattern on one vehicle model and subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRiskAlert {
    /// Unique id (`mra_` prefix)
    pub alert_id: String,
    /// Owning tenant
    pub organization_id: String,
    /// Vehicle manufacturer of the triggering ticket
    pub vehicle_make: Option<String>,
    /// Vehicle model the pattern was seen on
    pub vehicle_model: String,
    /// Failing subsystem
    pub subsystem: String,
    /// Distinct tickets on the alert
    pub occurrence_count: u32,
    /// Oldest matching closure
    pub first_occurrence: DateTime<Utc>,
    /// Newest matching closure
    pub last_occurrence: DateTime<Utc>,
    /// Tickets counted, each once
    pub affected_ticket_ids: Vec<String>,
    /// Lifecycle state
    pub status: AlertStatus,
    /// Who acknowledged
    pub acknowledged_by: Option<String>,
    /// When it was acknowledged
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Notes given on resolution
    pub resolution_notes: Option<String>,
    /// When it was resolved
    pub resolved_at: Option<DateTime<Utc>>,
    /// When it was raised
    pub created_at: DateTime<Utc>,
}

impl Document for ModelRiskAlert {
    const COLLECTION: &'static str = "model_risk_alerts";

    fn id(&self) -> &str {
        &self.alert_id
    }
}

/// What pattern detection did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertAction {
    /// A new alert was raised
    CreatedNew,
    /// An open alert absorbed the ticket
    UpdatedExisting,
}

impl AlertAction {
    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatedNew => "created_new",
            Self::UpdatedExisting => "updated_existing",
        }
    }
}

impl fmt::Display for AlertAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pattern that fired for an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternResult {
    /// What happened to the alert
    pub action: AlertAction,
    /// Alert after the change
    pub alert: ModelRiskAlert,
}

/// Result of capturing a ticket closure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureReceipt {
    /// Stored learning event
    pub event_id: String,
    /// Pattern that fired, if any
    pub pattern: Option<PatternResult>,
    /// Draft card proposed, if any
    pub draft_card_id: Option<String>,
}

/// Result of a reviewer decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    /// Event after the review
    pub event: LearningEvent,
    /// Card approved or updated by the decision
    pub failure_card_id: Option<String>,
}

/// Result of one batch drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Events enriched by this batch
    pub processed: usize,
    /// Events another worker claimed first
    pub skipped: usize,
    /// New alerts raised
    pub alerts_created: usize,
    /// Open alerts that absorbed a ticket
    pub alerts_updated: usize,
    /// Draft cards proposed
    pub drafts_created: usize,
}

/// Learning dashboard counters for one tenant
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningStats {
    /// All captured events
    pub total_events: usize,
    /// Events waiting for a reviewer
    pub pending_review: usize,
    /// Events with a recorded decision
    pub reviewed: usize,
    /// Events not yet enriched
    pub unprocessed: usize,
    /// Events that proposed a draft card
    pub draft_cards: usize,
    /// Closures reporting an unsafe condition
    pub unsafe_incidents: usize,
    /// Closures with a successful outcome
    pub successful_repairs: usize,
    /// Share of events with `ai_was_correct = true` among those that say
    pub ai_accuracy: Option<f64>,
    /// Alerts in `active`
    pub active_alerts: usize,
    /// Alerts in `acknowledged`
    pub acknowledged_alerts: usize,
    /// Alerts in `resolved`
    pub resolved_alerts: usize,
}
