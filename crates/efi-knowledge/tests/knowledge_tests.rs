use efi_knowledge::{
    ApprovalStatus, CardSource, KnowledgeType, MatchKind, NewFailureCard, NewKnowledgeArticle,
    SearchQuery, TicketResolution,
};
use efi_store::Scope;
use efi_test_utils::{approved_card, battery_card, knowledge_store, motor_card, ORG, OTHER_ORG, REVIEWER};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn tenant_cards_never_leak_to_other_tenants() {
    let (_clock, store) = knowledge_store();
    let global = approved_card(&store, battery_card()).await.unwrap();
    let private = approved_card(&store, motor_card(ORG)).await.unwrap();

    let own: Vec<String> = store
        .search(&SearchQuery::default().for_organization(ORG))
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.document.id().to_string())
        .collect();
    assert!(own.contains(&global.failure_card_id));
    assert!(own.contains(&private.failure_card_id));

    let other: Vec<String> = store
        .search(&SearchQuery::default().for_organization(OTHER_ORG))
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.document.id().to_string())
        .collect();
    assert_eq!(other, vec![global.failure_card_id.clone()]);

    let anonymous = store.search(&SearchQuery::default()).await.unwrap();
    assert_eq!(anonymous.len(), 1);

    assert!(store
        .get_failure_card(&private.failure_card_id, Some(OTHER_ORG))
        .await
        .unwrap()
        .is_none());
    assert!(store
        .get_failure_card(&private.failure_card_id, None)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn dtc_beats_symptom_beats_text() {
    let (_clock, store) = knowledge_store();
    let by_dtc = approved_card(&store, battery_card()).await.unwrap();
    let by_symptom = approved_card(
        &store,
        NewFailureCard {
            subsystem: "charger".to_string(),
            symptom_cluster: vec!["not charging".to_string()],
            probable_root_cause: "Onboard charger relay stuck".to_string(),
            verified_fix: "Replace relay".to_string(),
            ..NewFailureCard::default()
        },
    )
    .await
    .unwrap();
    let by_text = approved_card(
        &store,
        NewFailureCard {
            subsystem: "electrical".to_string(),
            symptom_cluster: vec!["dash flicker".to_string()],
            probable_root_cause: "Loose charging harness ground".to_string(),
            verified_fix: "Re-crimp ground lug".to_string(),
            ..NewFailureCard::default()
        },
    )
    .await
    .unwrap();

    let hits = store
        .search(
            &SearchQuery::new("charging")
                .with_dtc_codes(["p0a80"])
                .with_symptoms(["Not Charging"]),
        )
        .await
        .unwrap();

    let order: Vec<(&str, MatchKind)> = hits.iter().map(|h| (h.document.id(), h.matched_on)).collect();
    assert_eq!(
        order,
        vec![
            (by_dtc.failure_card_id.as_str(), MatchKind::DtcCode),
            (by_symptom.failure_card_id.as_str(), MatchKind::Symptom),
            (by_text.failure_card_id.as_str(), MatchKind::Text),
        ]
    );
    assert!((hits[0].relevance_score - 0.95).abs() < 1e-9);
    assert!((hits[1].relevance_score - 0.85).abs() < 1e-9);
    assert!((hits[2].relevance_score - 0.35).abs() < 1e-9);
}

#[tokio::test]
async fn drafts_and_pending_stay_out_of_search() {
    let (_clock, store) = knowledge_store();
    let card = store.create_failure_card(battery_card()).await.unwrap();
    let query = SearchQuery::default().with_dtc_codes(["P0A80"]);

    assert!(store.search(&query).await.unwrap().is_empty());
    assert!(store.submit_for_review(&card.failure_card_id).await.unwrap());
    assert!(store.search(&query).await.unwrap().is_empty());
    assert!(store.approve_knowledge(&card.failure_card_id, REVIEWER).await.unwrap());
    assert_eq!(store.search(&query).await.unwrap().len(), 1);
}

#[tokio::test]
async fn approving_an_article_approves_its_cards() {
    let (_clock, store) = knowledge_store();
    let article = store
        .create_knowledge_article(NewKnowledgeArticle {
            knowledge_type: KnowledgeType::DiagnosticGuide,
            title: "S1 Pro charging faults".to_string(),
            content: "Check the charge port before the BMS.".to_string(),
            created_by: "knowledge-eng".to_string(),
            ..NewKnowledgeArticle::default()
        })
        .await
        .unwrap();

    let linked = store
        .create_failure_card(NewFailureCard {
            knowledge_id: Some(article.knowledge_id.clone()),
            ..battery_card()
        })
        .await
        .unwrap();
    let rejected = store
        .create_failure_card(NewFailureCard {
            knowledge_id: Some(article.knowledge_id.clone()),
            ..battery_card()
        })
        .await
        .unwrap();
    assert!(store
        .reject_knowledge(&rejected.failure_card_id, REVIEWER, "duplicate")
        .await
        .unwrap());

    assert!(store.approve_knowledge(&article.knowledge_id, REVIEWER).await.unwrap());

    let linked = store.get_failure_card(&linked.failure_card_id, None).await.unwrap().unwrap();
    assert_eq!(linked.approval_status, ApprovalStatus::Approved);
    let rejected = store.get_failure_card(&rejected.failure_card_id, None).await.unwrap().unwrap();
    assert_eq!(rejected.approval_status, ApprovalStatus::Rejected);
    assert_eq!(rejected.review.unwrap().notes.as_deref(), Some("duplicate"));
}

#[tokio::test]
async fn stats_follow_caller_visibility() {
    let (_clock, store) = knowledge_store();
    approved_card(&store, battery_card()).await.unwrap();
    approved_card(&store, motor_card(ORG)).await.unwrap();
    let pending = store.create_failure_card(motor_card(ORG)).await.unwrap();
    store.submit_for_review(&pending.failure_card_id).await.unwrap();

    let own = store.get_stats(Some(ORG)).await.unwrap();
    assert_eq!(own.failure_cards.approved, 2);
    assert_eq!(own.failure_cards.pending, 1);
    assert_eq!(own.failure_cards.total, 3);

    let other = store.get_stats(Some(OTHER_ORG)).await.unwrap();
    assert_eq!(other.failure_cards.total, 1);
    assert_eq!(other.articles.total, 0);
}

#[tokio::test]
async fn ticket_cards_are_tenant_drafts() {
    let (_clock, store) = knowledge_store();
    let card = store
        .create_failure_card_from_ticket(TicketResolution {
            ticket_id: "T-881".to_string(),
            organization_id: ORG.to_string(),
            subsystem: "Brakes".to_string(),
            root_cause: "Worn regen brake sensor".to_string(),
            fix_description: "Replace sensor".to_string(),
            parts_used: vec!["Brake sensor".to_string()],
            created_by: "tech-3".to_string(),
            ..TicketResolution::default()
        })
        .await
        .unwrap();

    assert_eq!(card.scope, Scope::tenant(ORG));
    assert_eq!(card.approval_status, ApprovalStatus::Draft);
    assert_eq!(card.title, "brakes: Worn regen brake sensor");
    assert_eq!(
        card.source,
        CardSource::Ticket {
            ticket_id: "T-881".to_string()
        }
    );

    let err = store
        .create_failure_card_from_ticket(TicketResolution::default())
        .await
        .unwrap_err();
    assert!(matches!(err, efi_knowledge::KnowledgeError::Validation(_)));
}

#[tokio::test]
async fn search_limit_is_respected() {
    let (_clock, store) = knowledge_store();
    for _ in 0..4 {
        approved_card(&store, battery_card()).await.unwrap();
    }
    let hits = store
        .search(&SearchQuery::default().with_dtc_codes(["P0A80"]).with_limit(2))
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].document.id() < hits[1].document.id());
}
