//! Behaviour every `TenderStore` backend must share, checked against the in-memory store and
//! SQLite side by side.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use tender_core::adjustment::{AdjustmentService, ApplySuggestion, Resolution};
use tender_core::audit::{AuditContext, InMemoryAuditSink};
use tender_core::domain::brand::{BrandProposal, BrandProposalId, ProposalStatus};
use tender_core::domain::item::{ItemStatus, ProductId, RequestedItem, UnitClass, UnitOfMeasure};
use tender_core::domain::offer::{ActingParty, Offer, OfferId, Packaging};
use tender_core::domain::quotation::{
    BuyerId, Quotation, QuotationId, QuotationStatus, ShoppingListId,
};
use tender_core::domain::supplier::SupplierId;
use tender_core::domain::variation::{
    QuantityVariationRecord, ResolutionPath, ResolutionStatus, Suggestion, SuggestionKind,
    SuggestionSet, VariationClass, VariationRecordId,
};
use tender_core::lifecycle::{
    CloseOutcome, DeadlineSweeper, LifecycleService, NewItem, NewQuotation,
};
use tender_core::notify::RecordingNotificationSink;
use tender_core::observer::NoopObserver;
use tender_core::offers::{OfferDraft, OfferService};
use tender_core::store::{
    CommitOutcome, InMemoryTenderStore, OfferStore, ProposalDecision, QuotationStore,
    ResolutionCommit, StoreError,
    TenderStore,
};
use tender_db::{connect_with_settings, migrations, SqlTenderStore};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, hour, minute, 0).single().expect("valid instant")
}

async fn sql_store() -> SqlTenderStore {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("pool");
    migrations::run_pending(&pool).await.expect("migrations");
    SqlTenderStore::new(pool)
}

async fn backends() -> Vec<(&'static str, Arc<dyn TenderStore>)> {
    vec![
        ("memory", Arc::new(InMemoryTenderStore::new()) as Arc<dyn TenderStore>),
        ("sqlite", Arc::new(sql_store().await) as Arc<dyn TenderStore>),
    ]
}

fn quotation(id: &str, deadline: DateTime<Utc>) -> Quotation {
    Quotation {
        id: QuotationId::new(id),
        name: format!("List {id}"),
        status: QuotationStatus::Open,
        deadline,
        counter_proposal_window_minutes: 15,
        counter_proposal_reminder_percent: 67,
        invited_suppliers: vec![SupplierId::new("SP-1"), SupplierId::new("SP-2")],
        shopping_list_id: ShoppingListId::new("SL-1"),
        buyer_id: BuyerId::new("BY-1"),
        created_at: at(8, 0),
        updated_at: at(8, 0),
    }
}

fn item(quotation_id: &str, product_id: &str, status: ItemStatus) -> RequestedItem {
    RequestedItem {
        product_id: ProductId::new(product_id),
        quotation_id: QuotationId::new(quotation_id),
        name: product_id.to_owned(),
        unit: UnitOfMeasure::Kilogram,
        requested_quantity: Decimal::from(90),
        preferred_brands: Vec::new(),
        status,
    }
}

fn offer(id: &str, quotation_id: &str, packages: u32) -> Offer {
    Offer::new(
        OfferId::new(id),
        QuotationId::new(quotation_id),
        ProductId::new("PR-TOMATO"),
        SupplierId::new("SP-1"),
        "Roma",
        UnitClass::WeightOrVolume,
        Packaging::new(packages, Decimal::from(30), Decimal::from(60)),
        at(9, 5),
    )
}

fn suggestion(packages: u32) -> Suggestion {
    let total = Decimal::from(packages) * Decimal::from(30);
    Suggestion {
        packages,
        total_quantity: total,
        variation: total - Decimal::from(90),
        total_price: Decimal::from(packages) * Decimal::from(60),
    }
}

fn variation(id: &str, offer_id: &str, quotation_id: &str) -> QuantityVariationRecord {
    QuantityVariationRecord {
        id: VariationRecordId::new(id),
        offer_id: OfferId::new(offer_id),
        quotation_id: QuotationId::new(quotation_id),
        product_id: ProductId::new("PR-TOMATO"),
        supplier_id: SupplierId::new("SP-1"),
        requested_quantity: Decimal::from(90),
        offered_quantity: Decimal::from(60),
        variation: Decimal::from(-30),
        variation_percent: Decimal::new(-3333, 2),
        classification: VariationClass::Insufficient,
        suggestions: SuggestionSet {
            floor: Some(suggestion(3)),
            ceil: Some(suggestion(3)),
            offered: suggestion(2),
        },
        status: ResolutionStatus::Unresolved,
        applied_packages: None,
        resolution_path: None,
        resolved_by: None,
        created_at: at(9, 5),
        resolved_at: None,
    }
}

fn proposal(id: &str, quotation_id: &str) -> BrandProposal {
    BrandProposal {
        id: BrandProposalId::new(id),
        quotation_id: QuotationId::new(quotation_id),
        product_id: ProductId::new("PR-TOMATO"),
        supplier_id: SupplierId::new("SP-2"),
        brand: "Carmem".to_owned(),
        packaging: Packaging::new(3, Decimal::from(30), Decimal::from(55)),
        status: ProposalStatus::Pending,
        offer_id: None,
        created_at: at(9, 10),
        decided_at: None,
    }
}

async fn seed_quotation(store: &Arc<dyn TenderStore>, id: &str, deadline: DateTime<Utc>) {
    store.save_quotation(quotation(id, deadline)).await.expect("save quotation");
    store.save_item(item(id, "PR-TOMATO", ItemStatus::Pending)).await.expect("save item");
    store.save_item(item(id, "PR-ONION", ItemStatus::Pending)).await.expect("save item");
    store.save_item(item(id, "PR-GARLIC", ItemStatus::Cancelled)).await.expect("save item");
}

#[tokio::test]
async fn list_expired_returns_open_quotations_by_deadline() {
    for (backend, store) in backends().await {
        seed_quotation(&store, "QT-LATE", at(10, 0)).await;
        seed_quotation(&store, "QT-EARLY", at(9, 0)).await;
        seed_quotation(&store, "QT-FUTURE", at(12, 0)).await;
        let mut paused = quotation("QT-PAUSED", at(8, 30));
        paused.status = QuotationStatus::Paused;
        store.save_quotation(paused).await.expect("save paused");

        let expired: Vec<String> = store
            .list_expired(at(10, 0))
            .await
            .expect("list expired")
            .into_iter()
            .map(|quotation| quotation.id.0)
            .collect();
        assert_eq!(expired, vec!["QT-EARLY", "QT-LATE"], "{backend}");
    }
}

#[tokio::test]
async fn close_is_won_by_exactly_one_caller() {
    for (backend, store) in backends().await {
        seed_quotation(&store, "QT-1", at(9, 0)).await;
        let id = QuotationId::new("QT-1");

        let (first, second) = tokio::join!(
            store.close_quotation(&id, QuotationStatus::Open, Some(at(9, 1)), at(9, 1)),
            store.close_quotation(&id, QuotationStatus::Open, Some(at(9, 1)), at(9, 1)),
        );
        let outcomes = [first.expect("first close"), second.expect("second close")];
        let winners: Vec<u32> = outcomes.iter().flatten().copied().collect();
        assert_eq!(winners, vec![2], "{backend}: one winner closing both pending items");

        let stored = store.find_quotation(&id).await.expect("find").expect("exists");
        assert_eq!(stored.status, QuotationStatus::Closed, "{backend}");
        let statuses: Vec<ItemStatus> = store
            .find_items(&id)
            .await
            .expect("items")
            .into_iter()
            .map(|item| item.status)
            .collect();
        assert_eq!(
            statuses,
            vec![ItemStatus::Cancelled, ItemStatus::Closed, ItemStatus::Closed],
            "{backend}: items are ordered by product id and cancelled ones are untouched"
        );
    }
}

#[tokio::test]
async fn status_compare_and_set_rejects_stale_expectations() {
    for (backend, store) in backends().await {
        seed_quotation(&store, "QT-1", at(10, 0)).await;
        let id = QuotationId::new("QT-1");
        let update = tender_core::store::StatusUpdate {
            status: QuotationStatus::Paused,
            deadline: at(10, 0),
            updated_at: at(9, 30),
        };

        assert!(store
            .compare_and_set_status(&id, QuotationStatus::Open, update.clone())
            .await
            .expect("pause"));
        assert!(!store
            .compare_and_set_status(&id, QuotationStatus::Open, update)
            .await
            .expect("stale pause"), "{backend}");
        assert_eq!(
            store
                .close_quotation(&id, QuotationStatus::Open, None, at(9, 31))
                .await
                .expect("close"),
            None,
            "{backend}: a paused quotation is not closed by an Open expectation"
        );
    }
}

#[tokio::test]
async fn deadline_close_leaves_a_resumed_quotation_open() {
    for (backend, store) in backends().await {
        seed_quotation(&store, "QT-1", at(9, 0)).await;
        let id = QuotationId::new("QT-1");

        // Paused and resumed with a later deadline after a client saw it expire.
        let resumed = tender_core::store::StatusUpdate {
            status: QuotationStatus::Open,
            deadline: at(12, 0),
            updated_at: at(9, 20),
        };
        assert!(store
            .compare_and_set_status(&id, QuotationStatus::Open, resumed)
            .await
            .expect("resume"));

        let stale = store
            .close_quotation(&id, QuotationStatus::Open, Some(at(9, 30)), at(9, 30))
            .await
            .expect("deadline close");
        assert_eq!(stale, None, "{backend}: new deadline has not passed");
        let stored = store.find_quotation(&id).await.expect("find").expect("exists");
        assert_eq!(stored.status, QuotationStatus::Open, "{backend}");

        let at_deadline = store
            .close_quotation(&id, QuotationStatus::Open, Some(at(12, 0)), at(12, 0))
            .await
            .expect("deadline close at the new deadline");
        assert_eq!(at_deadline, Some(2), "{backend}");
    }
}

#[tokio::test]
async fn variation_records_are_created_once_per_offer() {
    for (backend, store) in backends().await {
        seed_quotation(&store, "QT-1", at(12, 0)).await;
        store.save_offer(offer("OF-1", "QT-1", 2)).await.expect("save offer");

        let first = store
            .create_variation_if_absent(variation("QV-1", "OF-1", "QT-1"))
            .await
            .expect("first insert");
        assert!(first.created, "{backend}");

        let second = store
            .create_variation_if_absent(variation("QV-2", "OF-1", "QT-1"))
            .await
            .expect("second insert");
        assert!(!second.created, "{backend}");
        assert_eq!(second.record.id, VariationRecordId::new("QV-1"), "{backend}");
        assert_eq!(second.record, first.record, "{backend}");

        let stored = store.variations_for_quotation(&QuotationId::new("QT-1")).await.expect("list");
        assert_eq!(stored.len(), 1, "{backend}");
    }
}

#[tokio::test]
async fn resolution_commit_applies_once_with_the_offer() {
    for (backend, store) in backends().await {
        seed_quotation(&store, "QT-1", at(12, 0)).await;
        store.save_offer(offer("OF-1", "QT-1", 2)).await.expect("save offer");
        store
            .create_variation_if_absent(variation("QV-1", "OF-1", "QT-1"))
            .await
            .expect("insert variation");

        let adjusted = offer("OF-1", "QT-1", 3);
        let commit = ResolutionCommit {
            record_id: VariationRecordId::new("QV-1"),
            applied_packages: 3,
            path: ResolutionPath::AcceptSuggestion,
            resolved_by: ActingParty::Buyer,
            resolved_at: at(9, 20),
            offer: Some(adjusted.clone()),
            observed_offer_at: Some(at(9, 5)),
        };

        assert_eq!(
            store.commit_resolution(commit.clone()).await.expect("commit"),
            CommitOutcome::Applied,
            "{backend}"
        );
        assert_eq!(
            store.commit_resolution(commit.clone()).await.expect("recommit"),
            CommitOutcome::AlreadyApplied,
            "{backend}"
        );

        let record = store
            .find_variation(&VariationRecordId::new("QV-1"))
            .await
            .expect("find")
            .expect("record");
        assert_eq!(record.status, ResolutionStatus::Applied, "{backend}");
        assert_eq!(record.applied_packages, Some(3), "{backend}");
        assert_eq!(record.resolution_path, Some(ResolutionPath::AcceptSuggestion), "{backend}");
        assert_eq!(record.resolved_at, Some(at(9, 20)), "{backend}");

        let stored = store.find_offer(&OfferId::new("OF-1")).await.expect("find").expect("offer");
        assert_eq!(stored.packaging.package_count, 3, "{backend}");
        assert_eq!(stored.total_quantity, Decimal::from(90), "{backend}");

        let missing = store
            .commit_resolution(ResolutionCommit {
                record_id: VariationRecordId::new("QV-404"),
                ..commit
            })
            .await
            .expect_err("missing record");
        assert!(matches!(missing, StoreError::Conflict(_)), "{backend}");
    }
}

#[tokio::test]
async fn resolution_commit_does_not_overwrite_a_newer_offer() {
    for (backend, store) in backends().await {
        seed_quotation(&store, "QT-1", at(12, 0)).await;
        store.save_offer(offer("OF-1", "QT-1", 2)).await.expect("save offer");
        store
            .create_variation_if_absent(variation("QV-1", "OF-1", "QT-1"))
            .await
            .expect("insert variation");

        // The supplier saves new content after the buyer's read at 09:05.
        let mut edited = offer("OF-1", "QT-1", 2);
        edited.packaging = Packaging::new(2, Decimal::from(35), Decimal::from(60));
        edited.recompute_derived();
        edited.updated_at = at(9, 15);
        store.save_offer(edited).await.expect("supplier edit");

        let outcome = store
            .commit_resolution(ResolutionCommit {
                record_id: VariationRecordId::new("QV-1"),
                applied_packages: 3,
                path: ResolutionPath::AcceptSuggestion,
                resolved_by: ActingParty::Buyer,
                resolved_at: at(9, 20),
                offer: Some(offer("OF-1", "QT-1", 3)),
                observed_offer_at: Some(at(9, 5)),
            })
            .await
            .expect("commit");
        assert_eq!(outcome, CommitOutcome::OfferChanged, "{backend}");

        let record = store
            .find_variation(&VariationRecordId::new("QV-1"))
            .await
            .expect("find")
            .expect("record");
        assert_eq!(record.status, ResolutionStatus::Unresolved, "{backend}: nothing written");
        let stored = store.find_offer(&OfferId::new("OF-1")).await.expect("find").expect("offer");
        assert_eq!(stored.packaging.content_per_package, Decimal::from(35), "{backend}");
        assert_eq!(stored.total_quantity, Decimal::from(70), "{backend}");
    }
}

#[tokio::test]
async fn proposal_decisions_are_final() {
    for (backend, store) in backends().await {
        seed_quotation(&store, "QT-1", at(12, 0)).await;
        store.save_proposal(proposal("BP-1", "QT-1")).await.expect("save proposal");

        let approved_offer = offer("OF-BP-1", "QT-1", 3);
        let approval = ProposalDecision {
            proposal_id: BrandProposalId::new("BP-1"),
            status: ProposalStatus::Approved,
            decided_at: at(9, 30),
            offer: Some(approved_offer.clone()),
        };
        assert!(store.decide_proposal(approval).await.expect("approve"), "{backend}");

        let rejection = ProposalDecision {
            proposal_id: BrandProposalId::new("BP-1"),
            status: ProposalStatus::Rejected,
            decided_at: at(9, 31),
            offer: None,
        };
        assert!(!store.decide_proposal(rejection.clone()).await.expect("reject"), "{backend}");

        let stored = store
            .find_proposal(&BrandProposalId::new("BP-1"))
            .await
            .expect("find")
            .expect("proposal");
        assert_eq!(stored.status, ProposalStatus::Approved, "{backend}");
        assert_eq!(stored.offer_id, Some(approved_offer.id.clone()), "{backend}");
        assert_eq!(stored.decided_at, Some(at(9, 30)), "{backend}");
        assert!(store.find_offer(&approved_offer.id).await.expect("find offer").is_some());

        let missing = store
            .decide_proposal(ProposalDecision {
                proposal_id: BrandProposalId::new("BP-404"),
                ..rejection
            })
            .await
            .expect_err("missing proposal");
        assert!(matches!(missing, StoreError::Conflict(_)), "{backend}");
    }
}

#[tokio::test]
async fn offers_keep_submission_order() {
    for (backend, store) in backends().await {
        seed_quotation(&store, "QT-1", at(12, 0)).await;
        for id in ["OF-C", "OF-A", "OF-B"] {
            store.save_offer(offer(id, "QT-1", 2)).await.expect("save offer");
        }
        store.save_offer(offer("OF-A", "QT-1", 3)).await.expect("resubmit");

        let ids: Vec<String> = store
            .offers_for_item(&QuotationId::new("QT-1"), &ProductId::new("PR-TOMATO"))
            .await
            .expect("offers")
            .into_iter()
            .map(|offer| offer.id.0)
            .collect();
        assert_eq!(ids, vec!["OF-C", "OF-A", "OF-B"], "{backend}");
    }
}

#[tokio::test]
async fn file_backed_close_has_one_winner_across_connections() {
    let directory = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}?mode=rwc", directory.path().join("tender.db").display());
    let pool = connect_with_settings(&url, 4, 30).await.expect("pool");
    migrations::run_pending(&pool).await.expect("migrations");
    let store: Arc<dyn TenderStore> = Arc::new(SqlTenderStore::new(pool.clone()));
    seed_quotation(&store, "QT-1", at(9, 0)).await;

    let id = QuotationId::new("QT-1");
    let contenders = (0..4).map(|_| {
        let store = store.clone();
        let id = id.clone();
        tokio::spawn(async move {
            store.close_quotation(&id, QuotationStatus::Open, Some(at(9, 1)), at(9, 1)).await
        })
    });
    let mut winners = 0;
    for contender in contenders.collect::<Vec<_>>() {
        if contender.await.expect("join").expect("close").is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    pool.close().await;
}

#[tokio::test]
async fn sql_backed_workflow_reconciles_adjusts_and_closes() {
    let store = Arc::new(sql_store().await);
    let notifications = RecordingNotificationSink::default();
    let audit = InMemoryAuditSink::default();
    let lifecycle = Arc::new(LifecycleService::new(
        store.clone(),
        Arc::new(notifications.clone()),
        Arc::new(NoopObserver),
        Arc::new(audit.clone()),
    ));
    let offers = OfferService::new(
        store.clone(),
        Arc::new(notifications.clone()),
        Arc::new(NoopObserver),
        Arc::new(audit.clone()),
    );
    let adjustments =
        AdjustmentService::new(store.clone(), Arc::new(notifications.clone()), Arc::new(audit));
    let buyer = AuditContext::new("req-buyer", "buyer:BY-1");

    let quotation = lifecycle
        .start(
            NewQuotation {
                name: "Weekly produce".to_owned(),
                buyer_id: BuyerId::new("BY-1"),
                shopping_list_id: ShoppingListId::new("SL-1"),
                deadline: at(13, 0),
                invited_suppliers: vec![SupplierId::new("SP-1")],
                counter_proposal_window_minutes: None,
                counter_proposal_reminder_percent: None,
                items: vec![NewItem {
                    product_id: ProductId::new("PR-TOMATO"),
                    name: "Tomatoes".to_owned(),
                    unit: UnitOfMeasure::Kilogram,
                    requested_quantity: Decimal::from(90),
                    preferred_brands: Vec::new(),
                }],
            },
            at(9, 0),
            &buyer,
        )
        .await
        .expect("start");

    let submitted = offers
        .submit_offer(
            OfferDraft {
                quotation_id: quotation.id.clone(),
                product_id: ProductId::new("PR-TOMATO"),
                supplier_id: SupplierId::new("SP-1"),
                offer_id: None,
                brand: "Roma".to_owned(),
                packaging: Packaging::new(2, Decimal::from(30), Decimal::from(60)),
            },
            at(9, 5),
            &AuditContext::new("req-sp-1", "supplier:SP-1"),
        )
        .await
        .expect("submit");
    let record = submitted.variation.expect("variation record");
    assert_eq!(record.classification, VariationClass::Insufficient);

    let adjusted = adjustments
        .apply_suggestion(
            ApplySuggestion {
                record_id: record.id.clone(),
                resolution: Resolution::AcceptSuggestion { suggestion: SuggestionKind::Ceil },
                acting_party: ActingParty::Buyer,
            },
            at(9, 10),
            &buyer,
        )
        .await
        .expect("apply ceil");
    assert_eq!(adjusted.offer.packaging.package_count, 3);

    let reloaded = store.find_offer(&submitted.offer.id).await.expect("find").expect("offer");
    assert_eq!(reloaded, adjusted.offer);
    assert_eq!(reloaded.adjustment_history.len(), 1);

    let sweeper = DeadlineSweeper::new(store.clone(), lifecycle.clone());
    let early = sweeper.sweep(at(12, 59)).await.expect("early sweep");
    assert_eq!(early.closed, 0);
    let report = sweeper.sweep(at(13, 0)).await.expect("sweep");
    assert_eq!(report.closed, 1);
    assert_eq!(report.items_closed, 1);

    let again = lifecycle.close(&quotation.id, at(13, 1), &buyer).await.expect("manual close");
    assert_eq!(again, CloseOutcome::AlreadyClosed);
    let closed = store.find_quotation(&quotation.id).await.expect("find").expect("quotation");
    assert_eq!(closed.status, QuotationStatus::Closed);
    assert!(notifications.event_types().contains(&"quotation_closed"));
}
