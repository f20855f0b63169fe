use efi_test_utils::{manual_clock, sample_tree_draft, ORG, OTHER_ORG};
use efi_tree::{
    DecisionTreeEngine, Outcome, SessionStatus, StartSession, StepAction, StepReport, TreeError,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn start(card: &str) -> StartSession<'_> {
    StartSession {
        ticket_id: "T-2041",
        failure_card_id: card,
        organization_id: ORG,
        technician_id: "tech-7",
    }
}

async fn engine_with_tree() -> DecisionTreeEngine {
    let (_clock, shared) = manual_clock();
    let engine = DecisionTreeEngine::in_memory(shared);
    engine.publish_tree(sample_tree_draft("fc_battery")).await.unwrap();
    engine
}

#[tokio::test]
async fn walk_to_bms_resolution_with_gst_estimate() {
    let engine = engine_with_tree().await;
    let view = engine.start_session(start("fc_battery")).await.unwrap();
    let id = view.session.session_id.clone();
    assert_eq!(view.current_step.unwrap().step_id, "check_voltage");

    let view = engine
        .record_step_outcome(&id, ORG, StepReport::new("check_voltage", Outcome::Pass).with_measurement("52.1V"))
        .await
        .unwrap();
    assert_eq!(view.session.completed_steps.len(), 1);
    assert_eq!(view.current_step.unwrap().step_id, "check_cells");
    assert!(view.resolution.is_none());

    let view = engine
        .record_step_outcome(&id, ORG, StepReport::new("check_cells", Outcome::Fail).with_elapsed(240))
        .await
        .unwrap();
    assert_eq!(view.session.status, SessionStatus::Completed);
    assert_eq!(view.session.completed_steps.len(), 2);
    assert_eq!(view.session.selected_resolution_id.as_deref(), Some("replace_bms"));
    assert!(view.current_step.is_none());
    assert_eq!(view.resolution.unwrap().title, "Replace BMS board");

    let estimate = engine.get_suggested_estimate(&id, ORG).await.unwrap().unwrap();
    assert_eq!(estimate.resolution_id, "replace_bms");
    assert!((estimate.parts_total - 4500.0).abs() < 1e-9);
    assert!((estimate.labor_total - 900.0).abs() < 1e-9);
    assert!((estimate.subtotal - 5400.0).abs() < 1e-9);
    assert!((estimate.gst_amount - 972.0).abs() < 1e-9);
    assert!((estimate.grand_total - 6372.0).abs() < 1e-9);
}

#[tokio::test]
async fn completed_session_refuses_more_steps() {
    let engine = engine_with_tree().await;
    let id = engine.start_session(start("fc_battery")).await.unwrap().session.session_id;

    engine
        .record_step_outcome(&id, ORG, StepReport::new("check_voltage", Outcome::Fail))
        .await
        .unwrap();
    let err = engine
        .record_step_outcome(&id, ORG, StepReport::new("check_cells", Outcome::Pass))
        .await
        .unwrap_err();
    assert!(err.is_invalid_state());

    let session = engine.get_session(&id, ORG).await.unwrap();
    assert_eq!(session.completed_steps.len(), 1);
    assert_eq!(session.selected_resolution_id.as_deref(), Some("replace_pack"));
}

#[tokio::test]
async fn out_of_order_and_unknown_steps_are_rejected() {
    let engine = engine_with_tree().await;
    let id = engine.start_session(start("fc_battery")).await.unwrap().session.session_id;

    let err = engine
        .record_step_outcome(&id, ORG, StepReport::new("check_cells", Outcome::Pass))
        .await
        .unwrap_err();
    assert!(err.is_invalid_state());

    let err = engine
        .record_step_outcome(&id, ORG, StepReport::new("no_such_step", Outcome::Pass))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn sessions_are_private_to_their_tenant() {
    let engine = engine_with_tree().await;
    let id = engine.start_session(start("fc_battery")).await.unwrap().session.session_id;

    assert!(engine.get_session(&id, OTHER_ORG).await.unwrap_err().is_not_found());
    let err = engine
        .record_step_outcome(&id, OTHER_ORG, StepReport::new("check_voltage", Outcome::Pass))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(engine
        .sessions_for_ticket("T-2041", OTHER_ORG)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(engine.sessions_for_ticket("T-2041", ORG).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_records_on_one_step_have_one_winner() {
    let engine = engine_with_tree().await;
    let id = engine.start_session(start("fc_battery")).await.unwrap().session.session_id;

    let (a, b) = tokio::join!(
        engine.record_step_outcome(&id, ORG, StepReport::new("check_voltage", Outcome::Pass)),
        engine.record_step_outcome(&id, ORG, StepReport::new("check_voltage", Outcome::Fail)),
    );
    assert_eq!(u8::from(a.is_ok()) + u8::from(b.is_ok()), 1);
    let loser = a.err().or(b.err()).unwrap();
    assert!(loser.is_invalid_state());

    let session = engine.get_session(&id, ORG).await.unwrap();
    assert_eq!(session.completed_steps.len(), 1);
}

#[tokio::test]
async fn abandon_then_audit_chain_verifies() {
    let engine = engine_with_tree().await;
    let id = engine.start_session(start("fc_battery")).await.unwrap().session.session_id;

    engine
        .record_step_outcome(&id, ORG, StepReport::new("check_voltage", Outcome::Pass))
        .await
        .unwrap();
    let abandoned = engine.abandon_session(&id, ORG, Some("customer left")).await.unwrap();
    assert_eq!(abandoned.status, SessionStatus::Abandoned);
    assert!(abandoned.current_step_id.is_none());

    let err = engine.abandon_session(&id, ORG, None).await.unwrap_err();
    assert!(matches!(err, TreeError::InvalidState { .. }));
    assert!(engine.get_suggested_estimate(&id, ORG).await.unwrap().is_none());

    let log = engine.audit_log();
    assert_eq!(log.entries_for_session(&id).await.unwrap().len(), 2);
    log.verify_integrity().await.unwrap();
}

#[tokio::test]
async fn dangling_targets_fail_publication() {
    let (_clock, shared) = manual_clock();
    let engine = DecisionTreeEngine::in_memory(shared);
    let mut draft = sample_tree_draft("fc_battery");
    draft.steps[0].fail_action = StepAction::Resolve("replace_motor".to_string());

    let err = engine.publish_tree(draft).await.unwrap_err();
    assert!(matches!(err, TreeError::Validation(_)));
    assert!(engine.tree_for_card("fc_battery").await.unwrap().is_none());
}

#[tokio::test]
async fn new_sessions_use_the_latest_version() {
    let engine = engine_with_tree().await;
    let mut draft = sample_tree_draft("fc_battery");
    draft.title = "Battery not charging (rev 2)".to_string();
    let v2 = engine.publish_tree(draft).await.unwrap();
    assert_eq!(v2.version, 2);

    let view = engine.start_session(start("fc_battery")).await.unwrap();
    assert_eq!(view.session.tree_id, v2.tree_id);
}

proptest! {
    #[test]
    fn prop_step_action_text_form_parses_back(target in "[a-z][a-z0-9_]{0,12}", kind in 0u8..3) {
        let action = match kind {
            0 => StepAction::Next,
            1 => StepAction::JumpTo(target),
            _ => StepAction::Resolve(target),
        };
        let parsed: StepAction = action.to_string().parse().unwrap();
        prop_assert_eq!(parsed, action);
    }
}
