//! Decision tree and session types

use chrono::{DateTime, Utc};
use efi_store::Document;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// What happens after a step is answered
///
/// Serializes as `{"action": "jump_to", "target": "s4"}`. Deserialization
/// also accepts the flat strings `next`, `skip_to:<step_id>` and
/// `resolution:<resolution_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "action", content = "target", rename_all = "snake_case")]
pub enum StepAction {
    /// Continue with the step of next-higher order
    Next,
    /// Continue with a specific step
    JumpTo(String),
    /// Finish the session with a resolution
    Resolve(String),
}

impl Default for StepAction {
    fn default() -> Self {
        Self::Next
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next => f.write_str("next"),
            Self::JumpTo(step) => write!(f, "skip_to:{step}"),
            Self::Resolve(resolution) => write!(f, "resolution:{resolution}"),
        }
    }
}

/// Error parsing a flat action string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized step action: {0:?}")]
pub struct ParseStepActionError(String);

impl FromStr for StepAction {
    type Err = ParseStepActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("next") {
            return Ok(Self::Next);
        }
        let target = |prefix: &str| {
            s.strip_prefix(prefix)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        };
        if let Some(step) = target("skip_to:") {
            return Ok(Self::JumpTo(step));
        }
        if let Some(resolution) = target("resolution:") {
            return Ok(Self::Resolve(resolution));
        }
        Err(ParseStepActionError(s.to_string()))
    }
}

#[derive(Deserialize)]
#[serde(tag = "action", content = "target", rename_all = "snake_case")]
enum TaggedStepAction {
    Next,
    JumpTo(String),
    Resolve(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StepActionRepr {
    Flat(String),
    Tagged(TaggedStepAction),
}

impl<'de> Deserialize<'de> for StepAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        StepActionRepr::deserialize(deserializer)?
            .try_into()
            .map_err(serde::de::Error::custom)
    }
}

impl TryFrom<StepActionRepr> for StepAction {
    type Error = ParseStepActionError;

    fn try_from(repr: StepActionRepr) -> Result<Self, Self::Error> {
        match repr {
            StepActionRepr::Flat(s) => s.parse(),
            StepActionRepr::Tagged(TaggedStepAction::Next) => Ok(Self::Next),
            StepActionRepr::Tagged(TaggedStepAction::JumpTo(step)) => Ok(Self::JumpTo(step)),
            StepActionRepr::Tagged(TaggedStepAction::Resolve(id)) => Ok(Self::Resolve(id)),
        }
    }
}

/// One diagnostic instruction with PASS/FAIL branches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DiagnosticStep {
    /// Unique within the tree
    pub step_id: String,
    /// Display order
    pub order: u32,
    /// What the technician does
    pub instruction: String,
    /// Reading that counts as a pass
    pub expected_measurement: Option<String>,
    /// Tools needed for the step
    pub tools_required: Vec<String>,
    /// Warnings shown before the step
    pub safety_notes: Option<String>,
    /// Where a pass leads
    pub pass_action: StepAction,
    /// Where a fail leads
    pub fail_action: StepAction,
    /// Explicit PASS target; overrides `pass_action` unless it resolves
    pub pass_next_step: Option<String>,
    /// Explicit FAIL target; overrides `fail_action` unless it resolves
    pub fail_next_step: Option<String>,
}

impl DiagnosticStep {
    /// Action and explicit target for an outcome
    #[must_use]
    pub fn branch_for(&self, outcome: Outcome) -> (&StepAction, Option<&str>) {
        match outcome {
            Outcome::Pass => (&self.pass_action, self.pass_next_step.as_deref()),
            Outcome::Fail => (&self.fail_action, self.fail_next_step.as_deref()),
        }
    }
}

/// Part line on a resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartLine {
    /// Part name
    pub name: String,
    #[serde(default)]
    pub part_number: Option<String>,
    /// Unit price
    pub price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// Terminal node of a tree: the fix and what it costs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ResolutionNode {
    /// Unique within the tree
    pub resolution_id: String,
    /// Repair summary
    pub title: String,
    /// Parts with prices
    pub parts_required: Vec<PartLine>,
    /// Estimated labor
    pub labor_hours: f64,
    /// Hourly labor rate
    pub labor_rate: f64,
    /// Expected repair time
    pub expected_time_minutes: u32,
    /// Observed success rate in [0, 1]
    pub success_rate: f64,
}

/// Published, immutable decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Stable tree id
    pub tree_id: String,
    /// Card the tree diagnoses
    pub failure_card_id: String,
    /// Monotonic per failure card, starting at 1
    pub version: u32,
    /// Display title
    pub title: String,
    /// Diagnostic steps
    pub steps: Vec<DiagnosticStep>,
    /// Terminal repairs
    pub resolutions: Vec<ResolutionNode>,
    /// First step of every session
    pub entry_step_id: String,
    /// Publication time
    pub published_at: DateTime<Utc>,
}

impl DecisionTree {
    /// Find a step by id
    #[must_use]
    pub fn step(&self, step_id: &str) -> Option<&DiagnosticStep> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    /// Find a resolution by id
    #[must_use]
    pub fn resolution(&self, resolution_id: &str) -> Option<&ResolutionNode> {
        self.resolutions
            .iter()
            .find(|r| r.resolution_id == resolution_id)
    }

    /// Step with the smallest order strictly greater than `order`
    #[must_use]
    pub fn step_after(&self, order: u32) -> Option<&DiagnosticStep> {
        self.steps
            .iter()
            .filter(|s| s.order > order)
            .min_by_key(|s| s.order)
    }
}

impl Document for DecisionTree {
    const COLLECTION: &'static str = "decision_trees";

    fn id(&self) -> &str {
        &self.tree_id
    }
}

/// Tree submitted for publishing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeDraft {
    /// Card the tree diagnoses
    pub failure_card_id: String,
    /// Display title
    pub title: String,
    /// Diagnostic steps
    pub steps: Vec<DiagnosticStep>,
    /// Terminal repairs
    pub resolutions: Vec<ResolutionNode>,
    /// Defaults to the lowest-order step
    pub entry_step_id: Option<String>,
}

/// Result of a diagnostic step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Measurement matched
    Pass,
    /// Measurement did not match
    Fail,
}

impl Outcome {
    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded answer to one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Step that was performed
    pub step_id: String,
    /// Pass or fail
    pub outcome: Outcome,
    /// Reading taken
    pub actual_measurement: Option<String>,
    /// Technician notes
    pub notes: Option<String>,
    /// Time spent on the step
    pub time_taken_seconds: u32,
    /// When the outcome was recorded
    pub completed_at: DateTime<Utc>,
}

/// Step answer as submitted by a technician
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Step that was performed
    pub step_id: String,
    /// Pass or fail
    pub outcome: Outcome,
    #[serde(default)]
    pub actual_measurement: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub time_taken_seconds: u32,
}

impl StepReport {
    /// Bare report for a step
    #[inline]
    #[must_use]
    pub fn new(step_id: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            step_id: step_id.into(),
            outcome,
            actual_measurement: None,
            notes: None,
            time_taken_seconds: 0,
        }
    }

    /// Attach a measured value
    #[inline]
    #[must_use]
    pub fn with_measurement(mut self, measurement: impl Into<String>) -> Self {
        self.actual_measurement = Some(measurement.into());
        self
    }

    /// Attach technician notes
    #[inline]
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Set elapsed time
    #[inline]
    #[must_use]
    pub fn with_elapsed(mut self, seconds: u32) -> Self {
        self.time_taken_seconds = seconds;
        self
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Steps still being recorded
    Active,
    /// Reached a resolution
    Completed,
    /// Stopped before a resolution
    Abandoned,
}

impl SessionStatus {
    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A technician walking one tree for one ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfiSession {
    /// Stable session id
    pub session_id: String,
    /// Service ticket being diagnosed
    pub ticket_id: String,
    /// Owning organization
    pub organization_id: String,
    /// Tree being walked
    pub tree_id: String,
    /// Card behind the tree
    pub failure_card_id: String,
    /// `None` once the session is no longer active
    pub current_step_id: Option<String>,
    /// Append-only
    pub completed_steps: Vec<StepOutcome>,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Resolution reached, once completed
    pub selected_resolution_id: Option<String>,
    /// Technician running the session
    pub technician_id: String,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// Completion or abandonment time
    pub completed_at: Option<DateTime<Utc>>,
}

impl EfiSession {
    /// Check if the session still accepts step outcomes
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

impl Document for EfiSession {
    const COLLECTION: &'static str = "efi_sessions";

    fn id(&self) -> &str {
        &self.session_id
    }
}

/// Session plus the node the technician is looking at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    /// Session state after the call
    pub session: EfiSession,
    /// Step to perform next, while active
    pub current_step: Option<DiagnosticStep>,
    /// Selected resolution, once completed
    pub resolution: Option<ResolutionNode>,
}

impl SessionView {
    pub(crate) fn for_session(session: EfiSession, tree: &DecisionTree) -> Self {
        let current_step = session
            .current_step_id
            .as_deref()
            .and_then(|id| tree.step(id))
            .cloned();
        let resolution = session
            .selected_resolution_id
            .as_deref()
            .and_then(|id| tree.resolution(id))
            .cloned();
        Self {
            session,
            current_step,
            resolution,
        }
    }
}

/// Suggested cost estimate for a completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Resolution being priced
    pub resolution_id: String,
    /// Sum of part prices
    pub parts_total: f64,
    /// Labor hours times rate
    pub labor_total: f64,
    /// Parts plus labor
    pub subtotal: f64,
    /// GST rate applied
    pub gst_rate: f64,
    /// GST on the subtotal
    pub gst_amount: f64,
    /// Subtotal plus GST
    pub grand_total: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_action_strings_parse() {
        assert_eq!("next".parse::<StepAction>().unwrap(), StepAction::Next);
        assert_eq!(
            "skip_to:s4".parse::<StepAction>().unwrap(),
            StepAction::JumpTo("s4".to_string())
        );
        assert_eq!(
            "resolution:r1".parse::<StepAction>().unwrap(),
            StepAction::Resolve("r1".to_string())
        );
        assert!("skip_to:".parse::<StepAction>().is_err());
        assert!("teleport".parse::<StepAction>().is_err());
    }

    #[test]
    fn action_display_matches_flat_form() {
        for raw in ["next", "skip_to:s2", "resolution:r9"] {
            let action: StepAction = raw.parse().unwrap();
            assert_eq!(action.to_string(), raw);
        }
    }

    #[test]
    fn action_deserializes_from_both_forms() {
        let flat: StepAction = serde_json::from_str("\"resolution:r1\"").unwrap();
        assert_eq!(flat, StepAction::Resolve("r1".to_string()));

        let tagged: StepAction =
            serde_json::from_str(r#"{"action":"jump_to","target":"s3"}"#).unwrap();
        assert_eq!(tagged, StepAction::JumpTo("s3".to_string()));

        let json = serde_json::to_string(&StepAction::Resolve("r2".to_string())).unwrap();
        assert_eq!(json, r#"{"action":"resolve","target":"r2"}"#);

        let unit = serde_json::to_string(&StepAction::Next).unwrap();
        assert_eq!(unit, r#"{"action":"next"}"#);
        assert_eq!(serde_json::from_str::<StepAction>(&unit).unwrap(), StepAction::Next);
    }

    #[test]
    fn step_after_skips_gaps() {
        let step = |id: &str, order| DiagnosticStep {
            step_id: id.to_string(),
            order,
            ..DiagnosticStep::default()
        };
        let tree = DecisionTree {
            tree_id: "dt".to_string(),
            failure_card_id: "fc".to_string(),
            version: 1,
            title: String::new(),
            steps: vec![step("a", 1), step("c", 7), step("b", 4)],
            resolutions: vec![],
            entry_step_id: "a".to_string(),
            published_at: Utc::now(),
        };
        assert_eq!(tree.step_after(1).unwrap().step_id, "b");
        assert_eq!(tree.step_after(4).unwrap().step_id, "c");
        assert!(tree.step_after(7).is_none());
    }
}
