//! Session lifecycle and step branching

use crate::types::{DecisionTree, DiagnosticStep, Outcome, SessionStatus, StepAction};

/// Statuses reachable from `from`
#[must_use]
pub fn allowed_transitions(from: SessionStatus) -> &'static [SessionStatus] {
    use SessionStatus::{Abandoned, Active, Completed};
    match from {
        Active => &[Active, Completed, Abandoned],
        Completed | Abandoned => &[],
    }
}

/// Check a status transition against the lifecycle table
#[must_use]
pub fn can_transition(from: SessionStatus, to: SessionStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Where a session goes after a step is answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Branch {
    /// Continue at this step
    Step(String),
    /// Complete with this resolution
    Resolve(String),
}

impl Branch {
    /// Status the session ends up in
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Step(_) => SessionStatus::Active,
            Self::Resolve(_) => SessionStatus::Completed,
        }
    }
}

/// Resolve the branch for an answered step.
///
/// `Resolve` always completes. For `Next` and `JumpTo` the explicit
/// `pass_next_step`/`fail_next_step` wins, then the jump target, then the
/// next step by order. A target that does not exist falls back to the first
/// resolution; `None` only if the tree has no resolutions at all.
#[must_use]
pub fn branch(tree: &DecisionTree, step: &DiagnosticStep, outcome: Outcome) -> Option<Branch> {
    let (action, explicit) = step.branch_for(outcome);

    let target = match action {
        StepAction::Resolve(resolution_id) => return Some(Branch::Resolve(resolution_id.clone())),
        StepAction::JumpTo(target) => Some(explicit.unwrap_or(target.as_str())),
        StepAction::Next => {
            explicit.or_else(|| tree.step_after(step.order).map(|s| s.step_id.as_str()))
        }
    };

    target
        .filter(|id| tree.step(id).is_some())
        .map(|id| Branch::Step(id.to_string()))
        .or_else(|| {
            tree.resolutions
                .first()
                .map(|r| Branch::Resolve(r.resolution_id.clone()))
        })
}
