use chrono::Duration;
use efi_knowledge::{ApprovalStatus, CardSource, KnowledgeStore};
use efi_learning::{
    AlertAction, AlertStatus, ClosureData, LearningCollections, LearningConfig, LearningEvent,
    LearningPipeline, LearningStatus, RepairOutcome, ReviewAction,
};
use efi_store::{Clock, ManualClock};
use efi_test_utils::{
    approved_card, battery_card, manual_clock, motor_card, s1_pro_closure, ORG, OTHER_ORG,
    REVIEWER,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

struct Harness {
    clock: Arc<ManualClock>,
    knowledge: KnowledgeStore,
    collections: LearningCollections,
    pipeline: LearningPipeline,
}

fn harness() -> Harness {
    let (clock, shared) = manual_clock();
    let knowledge = KnowledgeStore::in_memory(shared.clone());
    let collections = LearningCollections::in_memory();
    let pipeline = LearningPipeline::new(
        knowledge.clone(),
        collections.clone(),
        shared,
        LearningConfig::default(),
    );
    Harness {
        clock,
        knowledge,
        collections,
        pipeline,
    }
}

fn clean_closure() -> ClosureData {
    ClosureData {
        deviation_notes: String::new(),
        parts_replaced: vec![],
        ai_was_correct: Some(true),
        ..s1_pro_closure()
    }
}

#[tokio::test]
async fn third_s1_pro_ticket_raises_a_risk_alert() {
    let h = harness();

    for ticket in ["T-1", "T-2"] {
        let receipt = h
            .pipeline
            .capture_ticket_closure(ticket, ORG, s1_pro_closure())
            .await
            .unwrap();
        assert!(receipt.pattern.is_none());
        h.clock.advance(Duration::days(1));
    }

    let receipt = h
        .pipeline
        .capture_ticket_closure("T-3", ORG, s1_pro_closure())
        .await
        .unwrap();
    let pattern = receipt.pattern.unwrap();
    assert_eq!(pattern.action, AlertAction::CreatedNew);
    assert_eq!(pattern.alert.occurrence_count, 3);
    assert_eq!(pattern.alert.affected_ticket_ids, vec!["T-1", "T-2", "T-3"]);
    assert_eq!(pattern.alert.vehicle_model, "S1 Pro");
    assert_eq!(pattern.alert.status, AlertStatus::Active);

    h.clock.advance(Duration::days(1));
    let receipt = h
        .pipeline
        .capture_ticket_closure("T-4", ORG, s1_pro_closure())
        .await
        .unwrap();
    let pattern = receipt.pattern.unwrap();
    assert_eq!(pattern.action, AlertAction::UpdatedExisting);
    assert_eq!(pattern.alert.occurrence_count, 4);

    let alerts = h.pipeline.list_alerts(ORG, None).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(h.pipeline.list_alerts(OTHER_ORG, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn a_ticket_closed_twice_counts_once() {
    let h = harness();
    for ticket in ["T-1", "T-1", "T-2"] {
        let receipt = h
            .pipeline
            .capture_ticket_closure(ticket, ORG, s1_pro_closure())
            .await
            .unwrap();
        assert!(receipt.pattern.is_none());
        h.clock.advance(Duration::hours(2));
    }

    let receipt = h
        .pipeline
        .capture_ticket_closure("T-3", ORG, s1_pro_closure())
        .await
        .unwrap();
    let pattern = receipt.pattern.unwrap();
    assert_eq!(pattern.action, AlertAction::CreatedNew);
    assert_eq!(pattern.alert.occurrence_count, 3);
    assert_eq!(pattern.alert.affected_ticket_ids, vec!["T-1", "T-2", "T-3"]);

    // Reopened and closed again: the alert already has it
    let receipt = h
        .pipeline
        .capture_ticket_closure("T-3", ORG, s1_pro_closure())
        .await
        .unwrap();
    let pattern = receipt.pattern.unwrap();
    assert_eq!(pattern.action, AlertAction::UpdatedExisting);
    assert_eq!(pattern.alert.occurrence_count, 3);
    assert_eq!(pattern.alert.affected_ticket_ids.len(), 3);
}

#[tokio::test]
async fn old_tickets_fall_out_of_the_window() {
    let h = harness();
    h.pipeline.capture_ticket_closure("T-1", ORG, s1_pro_closure()).await.unwrap();
    h.pipeline.capture_ticket_closure("T-2", ORG, s1_pro_closure()).await.unwrap();

    h.clock.advance(Duration::days(31));
    let receipt = h
        .pipeline
        .capture_ticket_closure("T-3", ORG, s1_pro_closure())
        .await
        .unwrap();
    assert!(receipt.pattern.is_none());
}

#[tokio::test]
async fn other_tenants_and_models_do_not_count() {
    let h = harness();
    h.pipeline.capture_ticket_closure("T-1", ORG, s1_pro_closure()).await.unwrap();
    h.pipeline.capture_ticket_closure("T-2", OTHER_ORG, s1_pro_closure()).await.unwrap();
    let air = ClosureData {
        vehicle_model: Some("S1 Air".to_string()),
        ..s1_pro_closure()
    };
    h.pipeline.capture_ticket_closure("T-3", ORG, air).await.unwrap();
    let no_model = ClosureData {
        vehicle_model: None,
        ..s1_pro_closure()
    };
    let receipt = h.pipeline.capture_ticket_closure("T-4", ORG, no_model).await.unwrap();
    assert!(receipt.pattern.is_none());

    let receipt = h
        .pipeline
        .capture_ticket_closure("T-5", ORG, ClosureData {
            vehicle_model: Some("  s1 pro ".to_string()),
            subsystem: "BATTERY".to_string(),
            ..s1_pro_closure()
        })
        .await
        .unwrap();
    assert!(receipt.pattern.is_none());
    assert!(h.pipeline.list_alerts(ORG, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn deviations_propose_tenant_draft_cards() {
    let h = harness();
    let receipt = h
        .pipeline
        .capture_ticket_closure("T-1", ORG, s1_pro_closure())
        .await
        .unwrap();
    let draft_id = receipt.draft_card_id.unwrap();

    let draft = h.knowledge.get_failure_card(&draft_id, Some(ORG)).await.unwrap().unwrap();
    assert_eq!(draft.approval_status, ApprovalStatus::Draft);
    assert_eq!(draft.probable_root_cause, "Corroded charge port pins");
    assert_eq!(draft.parts_required, vec!["Charge port"]);
    assert_eq!(
        draft.source,
        CardSource::Learning {
            event_id: receipt.event_id.clone()
        }
    );
    assert!(h.knowledge.get_failure_card(&draft_id, Some(OTHER_ORG)).await.unwrap().is_none());

    let event = h.pipeline.get_event(&receipt.event_id, ORG).await.unwrap().unwrap();
    assert!(event.suggest_new_card);
    assert_eq!(event.draft_card_id.as_deref(), Some(draft_id.as_str()));

    let clean = h
        .pipeline
        .capture_ticket_closure("T-2", ORG, clean_closure())
        .await
        .unwrap();
    assert!(clean.draft_card_id.is_none());
}

#[tokio::test]
async fn guiding_card_learns_from_the_outcome() {
    let h = harness();
    let card = approved_card(&h.knowledge, battery_card()).await.unwrap();

    let closure = ClosureData {
        failure_card_id: Some(card.failure_card_id.clone()),
        outcome: RepairOutcome::Failure,
        ..clean_closure()
    };
    h.pipeline.capture_ticket_closure("T-1", ORG, closure).await.unwrap();

    let card = h
        .knowledge
        .get_failure_card(&card.failure_card_id, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(card.outcomes_recorded, 1);
    assert!((card.historical_success_rate - 0.25).abs() < 1e-9);
}

#[tokio::test]
async fn foreign_guiding_card_is_dropped_on_capture() {
    let h = harness();
    let private = approved_card(&h.knowledge, motor_card(ORG)).await.unwrap();

    let closure = ClosureData {
        failure_card_id: Some(private.failure_card_id.clone()),
        outcome: RepairOutcome::Failure,
        ..clean_closure()
    };
    let receipt = h
        .pipeline
        .capture_ticket_closure("T-X", OTHER_ORG, closure)
        .await
        .unwrap();

    let event = h.pipeline.get_event(&receipt.event_id, OTHER_ORG).await.unwrap().unwrap();
    assert!(event.failure_card_id.is_none());

    let card = h
        .knowledge
        .get_failure_card(&private.failure_card_id, Some(ORG))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(card.outcomes_recorded, 0);
    assert!((card.historical_success_rate - private.historical_success_rate).abs() < 1e-9);

    let err = h
        .pipeline
        .approve_learning_item(&receipt.event_id, ReviewAction::UpdateCard, REVIEWER, None)
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn update_review_never_touches_a_foreign_card() {
    let h = harness();
    let private = approved_card(&h.knowledge, motor_card(OTHER_ORG)).await.unwrap();

    // Imported straight into the store, bypassing capture
    let mut event = unprocessed("T-9", h.clock.now());
    event.failure_card_id = Some(private.failure_card_id.clone());
    h.collections.events.insert(event).await.unwrap();

    let err = h
        .pipeline
        .approve_learning_item("le_T-9", ReviewAction::UpdateCard, REVIEWER, None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let card = h
        .knowledge
        .get_failure_card(&private.failure_card_id, Some(OTHER_ORG))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(card.version, private.version);
    assert_eq!(card.parts_required, private.parts_required);

    // The failed review gives the event back to the queue
    let event = h.pipeline.get_event("le_T-9", ORG).await.unwrap().unwrap();
    assert_eq!(event.status, LearningStatus::PendingReview);
    assert!(event.review.is_none());
}

#[tokio::test]
async fn concurrent_reviews_have_one_winner() {
    let h = harness();
    let receipt = h
        .pipeline
        .capture_ticket_closure("T-1", ORG, clean_closure())
        .await
        .unwrap();
    assert!(receipt.draft_card_id.is_none());

    let (a, b) = tokio::join!(
        h.pipeline
            .approve_learning_item(&receipt.event_id, ReviewAction::CreateCard, REVIEWER, None),
        h.pipeline
            .approve_learning_item(&receipt.event_id, ReviewAction::CreateCard, "lead-2", None),
    );
    assert!(a.is_ok() != b.is_ok());
    let loser = a.as_ref().err().or(b.as_ref().err()).unwrap();
    assert!(loser.is_invalid_state());

    let from_event: Vec<_> = h
        .knowledge
        .approved_cards(Some(ORG), None)
        .await
        .unwrap()
        .into_iter()
        .filter(|c| {
            c.source
                == CardSource::Learning {
                    event_id: receipt.event_id.clone(),
                }
        })
        .collect();
    assert_eq!(from_event.len(), 1);

    let event = h.pipeline.get_event(&receipt.event_id, ORG).await.unwrap().unwrap();
    assert_eq!(event.status, LearningStatus::Reviewed);
    assert_eq!(
        event.review.unwrap().failure_card_id.as_deref(),
        Some(from_event[0].failure_card_id.as_str())
    );
}

#[tokio::test]
async fn create_card_review_approves_the_draft() {
    let h = harness();
    let receipt = h
        .pipeline
        .capture_ticket_closure("T-1", ORG, s1_pro_closure())
        .await
        .unwrap();

    let outcome = h
        .pipeline
        .approve_learning_item(
            &receipt.event_id,
            ReviewAction::CreateCard,
            REVIEWER,
            Some("good catch"),
        )
        .await
        .unwrap();
    assert_eq!(outcome.failure_card_id, receipt.draft_card_id);
    assert_eq!(outcome.event.status, LearningStatus::Reviewed);
    assert_eq!(outcome.event.review.as_ref().unwrap().action, ReviewAction::CreateCard);

    let card_id = outcome.failure_card_id.unwrap();
    let card = h.knowledge.get_failure_card(&card_id, Some(ORG)).await.unwrap().unwrap();
    assert_eq!(card.approval_status, ApprovalStatus::Approved);

    let err = h
        .pipeline
        .approve_learning_item(&receipt.event_id, ReviewAction::Dismiss, REVIEWER, None)
        .await
        .unwrap_err();
    assert!(err.is_invalid_state());
}

#[tokio::test]
async fn update_card_review_folds_into_guiding_card() {
    let h = harness();
    let card = approved_card(&h.knowledge, battery_card()).await.unwrap();
    let receipt = h
        .pipeline
        .capture_ticket_closure(
            "T-1",
            ORG,
            ClosureData {
                failure_card_id: Some(card.failure_card_id.clone()),
                ..s1_pro_closure()
            },
        )
        .await
        .unwrap();
    let draft_id = receipt.draft_card_id.clone().unwrap();

    let outcome = h
        .pipeline
        .approve_learning_item(&receipt.event_id, ReviewAction::UpdateCard, REVIEWER, None)
        .await
        .unwrap();
    assert_eq!(outcome.failure_card_id.as_deref(), Some(card.failure_card_id.as_str()));

    let updated = h
        .knowledge
        .get_failure_card(&card.failure_card_id, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.parts_required, vec!["BMS board", "Charge port"]);
    assert_eq!(updated.recurrence_counter, 1);
    assert_eq!(updated.version, 2);

    let draft = h.knowledge.get_failure_card(&draft_id, Some(ORG)).await.unwrap().unwrap();
    assert_eq!(draft.approval_status, ApprovalStatus::Rejected);
}

#[tokio::test]
async fn review_errors_are_categorized() {
    let h = harness();
    let err = h
        .pipeline
        .approve_learning_item("le_missing", ReviewAction::Dismiss, REVIEWER, None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let receipt = h
        .pipeline
        .capture_ticket_closure("T-1", ORG, s1_pro_closure())
        .await
        .unwrap();
    let err = h
        .pipeline
        .approve_learning_item(&receipt.event_id, ReviewAction::UpdateCard, REVIEWER, None)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let event = h.pipeline.get_event(&receipt.event_id, ORG).await.unwrap().unwrap();
    assert!(event.is_pending());

    let err = h
        .pipeline
        .approve_learning_item(&receipt.event_id, ReviewAction::Dismiss, "  ", None)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let no_cause = h
        .pipeline
        .capture_ticket_closure(
            "T-2",
            ORG,
            ClosureData {
                actual_root_cause: String::new(),
                ..s1_pro_closure()
            },
        )
        .await
        .unwrap();
    assert!(no_cause.draft_card_id.is_none());
    let err = h
        .pipeline
        .approve_learning_item(&no_cause.event_id, ReviewAction::CreateCard, REVIEWER, None)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    let event = h.pipeline.get_event(&no_cause.event_id, ORG).await.unwrap().unwrap();
    assert_eq!(event.status, LearningStatus::PendingReview);

    let outcome = h
        .pipeline
        .approve_learning_item(&receipt.event_id, ReviewAction::Dismiss, REVIEWER, Some("noise"))
        .await
        .unwrap();
    assert!(outcome.failure_card_id.is_none());
    let draft_id = receipt.draft_card_id.unwrap();
    let draft = h.knowledge.get_failure_card(&draft_id, Some(ORG)).await.unwrap().unwrap();
    assert_eq!(draft.approval_status, ApprovalStatus::Rejected);
}

#[tokio::test]
async fn alert_lifecycle() {
    let h = harness();
    for ticket in ["T-1", "T-2", "T-3"] {
        h.pipeline.capture_ticket_closure(ticket, ORG, s1_pro_closure()).await.unwrap();
    }
    let alert = h.pipeline.list_alerts(ORG, Some(AlertStatus::Active)).await.unwrap().remove(0);

    assert!(!h.pipeline.acknowledge_alert(&alert.alert_id, OTHER_ORG, "lead").await.unwrap());
    assert!(h.pipeline.acknowledge_alert(&alert.alert_id, ORG, "lead").await.unwrap());
    assert!(!h.pipeline.acknowledge_alert(&alert.alert_id, ORG, "lead").await.unwrap());
    assert!(h
        .pipeline
        .resolve_alert(&alert.alert_id, ORG, "supplier batch recalled")
        .await
        .unwrap());
    assert!(!h.pipeline.resolve_alert(&alert.alert_id, ORG, "again").await.unwrap());

    // A resolved alert does not absorb new tickets
    let receipt = h
        .pipeline
        .capture_ticket_closure("T-4", ORG, s1_pro_closure())
        .await
        .unwrap();
    assert_eq!(receipt.pattern.unwrap().action, AlertAction::CreatedNew);

    let stats = h.pipeline.learning_stats(ORG).await.unwrap();
    assert_eq!(stats.total_events, 4);
    assert_eq!(stats.active_alerts, 1);
    assert_eq!(stats.resolved_alerts, 1);
    assert_eq!(stats.ai_accuracy, Some(0.0));
}

fn unprocessed(ticket: &str, at: chrono::DateTime<chrono::Utc>) -> LearningEvent {
    let closure = s1_pro_closure();
    LearningEvent {
        event_id: format!("le_{ticket}"),
        organization_id: ORG.to_string(),
        ticket_id: ticket.to_string(),
        session_id: None,
        failure_card_id: None,
        vehicle_make: closure.vehicle_make,
        vehicle_model: closure.vehicle_model,
        vehicle_category: None,
        subsystem: closure.subsystem,
        symptoms: vec!["not charging".to_string()],
        dtc_codes: vec!["P0A80".to_string()],
        actual_root_cause: closure.actual_root_cause,
        actual_parts_used: closure.parts_replaced,
        repair_actions: closure.repair_actions,
        deviation_notes: closure.deviation_notes,
        outcome: closure.outcome,
        ai_was_correct: closure.ai_was_correct,
        unsafe_incident: false,
        technician_id: closure.technician_id,
        status: LearningStatus::PendingReview,
        suggest_new_card: false,
        processed: false,
        draft_card_id: None,
        review: None,
        created_at: at,
    }
}

#[tokio::test]
async fn batches_process_each_event_once() {
    let h = harness();
    let start = h.clock.now();
    for (i, ticket) in ["T-1", "T-2", "T-3", "T-4"].into_iter().enumerate() {
        let at = start + Duration::hours(i64::try_from(i).unwrap());
        h.collections.events.insert(unprocessed(ticket, at)).await.unwrap();
    }

    let first = h.pipeline.process_pending_events(3).await.unwrap();
    assert_eq!(first.processed, 3);
    assert_eq!(first.alerts_created, 1);
    assert_eq!(first.drafts_created, 3);

    let second = h.pipeline.process_pending_events(10).await.unwrap();
    assert_eq!(second.processed, 1);
    assert_eq!(second.alerts_updated, 1);

    let third = h.pipeline.process_pending_events(10).await.unwrap();
    assert_eq!(third.processed, 0);
    assert_eq!(h.pipeline.learning_stats(ORG).await.unwrap().unprocessed, 0);

    let alert = h.pipeline.list_alerts(ORG, None).await.unwrap().remove(0);
    assert_eq!(alert.occurrence_count, 4);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_alert_exists_from_the_third_ticket(tickets in 1usize..7) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let (alerts, last_count) = runtime.block_on(async {
            let h = harness();
            for i in 0..tickets {
                h.pipeline
                    .capture_ticket_closure(&format!("T-{i}"), ORG, s1_pro_closure())
                    .await
                    .unwrap();
                h.clock.advance(Duration::hours(6));
            }
            let alerts = h.pipeline.list_alerts(ORG, None).await.unwrap();
            let count = alerts.first().map_or(0, |a| a.occurrence_count);
            (alerts.len(), count)
        });

        if tickets >= 3 {
            prop_assert_eq!(alerts, 1);
            prop_assert_eq!(last_count as usize, tickets);
        } else {
            prop_assert_eq!(alerts, 0);
        }
    }
}
