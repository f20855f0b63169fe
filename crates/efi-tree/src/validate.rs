//! Tree draft validation

use crate::error::TreeError;
use crate::types::{DiagnosticStep, StepAction, TreeDraft};
use std::collections::HashSet;

/// Check a draft before publishing and return its entry step id.
///
/// # Errors
/// `TreeError::Validation` naming the first problem found
pub fn validate_draft(draft: &TreeDraft) -> Result<String, TreeError> {
    let fail = |msg: String| Err(TreeError::Validation(msg));

    if draft.failure_card_id.trim().is_empty() {
        return fail("tree must reference a failure card".into());
    }
    if draft.steps.is_empty() {
        return fail("tree has no steps".into());
    }
    if draft.resolutions.is_empty() {
        return fail("tree has no resolutions".into());
    }

    let mut step_ids = HashSet::new();
    let mut orders = HashSet::new();
    for step in &draft.steps {
        if step.step_id.trim().is_empty() {
            return fail("step id must not be blank".into());
        }
        if !step_ids.insert(step.step_id.as_str()) {
            return fail(format!("duplicate step id {}", step.step_id));
        }
        if !orders.insert(step.order) {
            return fail(format!("duplicate step order {}", step.order));
        }
    }

    let mut resolution_ids = HashSet::new();
    for resolution in &draft.resolutions {
        if !resolution_ids.insert(resolution.resolution_id.as_str()) {
            return fail(format!("duplicate resolution id {}", resolution.resolution_id));
        }
        if resolution.labor_hours < 0.0 || resolution.labor_rate < 0.0 {
            return fail(format!("negative labor on {}", resolution.resolution_id));
        }
        for part in &resolution.parts_required {
            if part.price < 0.0 || part.quantity == 0 {
                return fail(format!(
                    "invalid part line {} on {}",
                    part.name, resolution.resolution_id
                ));
            }
        }
    }

    for step in &draft.steps {
        check_targets(step, &step_ids, &resolution_ids)?;
    }

    let entry = match &draft.entry_step_id {
        Some(entry) if step_ids.contains(entry.as_str()) => entry.clone(),
        Some(entry) => return fail(format!("entry step {entry} does not exist")),
        None => draft
            .steps
            .iter()
            .min_by_key(|s| s.order)
            .map(|s| s.step_id.clone())
            .ok_or_else(|| TreeError::Validation("tree has no steps".into()))?,
    };
    Ok(entry)
}

fn check_targets(
    step: &DiagnosticStep,
    step_ids: &HashSet<&str>,
    resolution_ids: &HashSet<&str>,
) -> Result<(), TreeError> {
    for action in [&step.pass_action, &step.fail_action] {
        match action {
            StepAction::Next => {}
            StepAction::JumpTo(target) if !step_ids.contains(target.as_str()) => {
                return Err(TreeError::Validation(format!(
                    "step {} jumps to unknown step {target}",
                    step.step_id
                )));
            }
            StepAction::Resolve(target) if !resolution_ids.contains(target.as_str()) => {
                return Err(TreeError::Validation(format!(
                    "step {} resolves to unknown resolution {target}",
                    step.step_id
                )));
            }
            StepAction::JumpTo(_) | StepAction::Resolve(_) => {}
        }
    }
    for target in [&step.pass_next_step, &step.fail_next_step].into_iter().flatten() {
        if !step_ids.contains(target.as_str()) {
            return Err(TreeError::Validation(format!(
                "step {} names unknown next step {target}",
                step.step_id
            )));
        }
    }
    Ok(())
}
