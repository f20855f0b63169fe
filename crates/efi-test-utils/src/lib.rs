//! Testing utilities for the EFI workspace
//!
//! Shared clocks, fixtures and store builders.

#![allow(missing_docs)]

use chrono::{DateTime, TimeZone, Utc};
use efi_knowledge::{KnowledgeError, KnowledgeStore, NewFailureCard, StructuredFailureCard};
use efi_learning::{ClosureData, RepairOutcome};
use efi_store::{ManualClock, SharedClock};
use efi_tree::{DiagnosticStep, PartLine, ResolutionNode, StepAction, TreeDraft};
use std::sync::Arc;

pub const ORG: &str = "org-ola-service";
pub const OTHER_ORG: &str = "org-other";
pub const REVIEWER: &str = "reviewer-1";

/// Fixed start instant for manual clocks
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Manual clock at [`epoch`], plus the same clock as a `SharedClock`
pub fn manual_clock() -> (Arc<ManualClock>, SharedClock) {
    let clock = Arc::new(ManualClock::new(epoch()));
    let shared: SharedClock = clock.clone();
    (clock, shared)
}

pub fn knowledge_store() -> (Arc<ManualClock>, KnowledgeStore) {
    let (clock, shared) = manual_clock();
    (clock, KnowledgeStore::in_memory(shared))
}

/// Global battery card for the Ola S1 Pro
pub fn battery_card() -> NewFailureCard {
    NewFailureCard {
        organization_id: None,
        title: "BMS cell imbalance".to_string(),
        subsystem: "battery".to_string(),
        vehicle_make: Some("Ola".to_string()),
        vehicle_model: Some("S1 Pro".to_string()),
        symptom_cluster: vec![
            "Not charging".to_string(),
            "Range drop".to_string(),
        ],
        dtc_codes: vec!["P0A80".to_string()],
        probable_root_cause: "Cell imbalance in module 3".to_string(),
        verified_fix: "Rebalance pack and replace BMS board".to_string(),
        fix_steps: vec![
            "Isolate HV pack".to_string(),
            "Replace BMS board".to_string(),
        ],
        parts_required: vec!["BMS board".to_string()],
        created_by: "knowledge-eng".to_string(),
        ..NewFailureCard::default()
    }
}

/// Tenant-scoped motor card
pub fn motor_card(organization_id: &str) -> NewFailureCard {
    NewFailureCard {
        organization_id: Some(organization_id.to_string()),
        title: "Hall sensor failure".to_string(),
        subsystem: "motor".to_string(),
        vehicle_make: Some("Ola".to_string()),
        vehicle_model: Some("S1 Air".to_string()),
        symptom_cluster: vec!["Jerky acceleration".to_string()],
        dtc_codes: vec!["P0C14".to_string()],
        probable_root_cause: "Hall sensor connector corrosion".to_string(),
        verified_fix: "Clean connector and replace hall sensor".to_string(),
        created_by: "knowledge-eng".to_string(),
        ..NewFailureCard::default()
    }
}

/// Create a card and approve it
pub async fn approved_card(
    store: &KnowledgeStore,
    input: NewFailureCard,
) -> Result<StructuredFailureCard, KnowledgeError> {
    let card = store.create_failure_card(input).await?;
    store.approve_knowledge(&card.failure_card_id, REVIEWER).await?;
    Ok(store
        .get_failure_card(&card.failure_card_id, card.scope.organization_id())
        .await?
        .unwrap_or(card))
}

/// Two-step battery tree: voltage check, then cell delta
pub fn sample_tree_draft(failure_card_id: &str) -> TreeDraft {
    TreeDraft {
        failure_card_id: failure_card_id.to_string(),
        title: "Battery not charging".to_string(),
        steps: vec![
            DiagnosticStep {
                step_id: "check_voltage".to_string(),
                order: 1,
                instruction: "Measure pack voltage at the main connector".to_string(),
                expected_measurement: Some("> 48V".to_string()),
                tools_required: vec!["Multimeter".to_string()],
                safety_notes: Some("Wear insulated gloves".to_string()),
                pass_action: StepAction::Next,
                fail_action: StepAction::Resolve("replace_pack".to_string()),
                ..DiagnosticStep::default()
            },
            DiagnosticStep {
                step_id: "check_cells".to_string(),
                order: 2,
                instruction: "Read cell delta from the BMS".to_string(),
                expected_measurement: Some("< 50mV".to_string()),
                pass_action: StepAction::Resolve("replace_charger".to_string()),
                fail_action: StepAction::Resolve("replace_bms".to_string()),
                ..DiagnosticStep::default()
            },
        ],
        resolutions: vec![
            ResolutionNode {
                resolution_id: "replace_bms".to_string(),
                title: "Replace BMS board".to_string(),
                parts_required: vec![PartLine {
                    name: "BMS board".to_string(),
                    part_number: Some("BMS-S1P-02".to_string()),
                    price: 4500.0,
                    quantity: 1,
                }],
                labor_hours: 1.5,
                labor_rate: 600.0,
                expected_time_minutes: 90,
                success_rate: 0.9,
            },
            ResolutionNode {
                resolution_id: "replace_pack".to_string(),
                title: "Replace battery pack".to_string(),
                labor_hours: 3.0,
                labor_rate: 600.0,
                expected_time_minutes: 180,
                success_rate: 0.95,
                ..ResolutionNode::default()
            },
            ResolutionNode {
                resolution_id: "replace_charger".to_string(),
                title: "Replace onboard charger".to_string(),
                labor_hours: 1.0,
                labor_rate: 600.0,
                ..ResolutionNode::default()
            },
        ],
        entry_step_id: None,
    }
}

/// Successful S1 Pro battery repair that deviated from the card
pub fn s1_pro_closure() -> ClosureData {
    ClosureData {
        vehicle_make: Some("Ola".to_string()),
        vehicle_model: Some("S1 Pro".to_string()),
        subsystem: "battery".to_string(),
        symptoms: vec!["Not charging".to_string()],
        dtc_codes: vec!["P0A80".to_string()],
        actual_root_cause: "Corroded charge port pins".to_string(),
        parts_replaced: vec!["Charge port".to_string()],
        repair_actions: vec!["Replaced charge port".to_string()],
        deviation_notes: "Card pointed at BMS; port was the fault".to_string(),
        outcome: RepairOutcome::Success,
        ai_was_correct: Some(false),
        technician_id: Some("tech-7".to_string()),
        ..ClosureData::default()
    }
}
