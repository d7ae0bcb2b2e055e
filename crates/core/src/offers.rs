use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{aggregate, detect_outbid, Outbid, PriceBoard};
use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::counter_proposal::{self, plan_reminder, CounterProposalStatus};
use crate::domain::item::{ProductId, RequestedItem};
use crate::domain::offer::{Offer, OfferId, Packaging};
use crate::domain::quotation::{Quotation, QuotationId};
use crate::domain::supplier::SupplierId;
use crate::domain::variation::{QuantityVariationRecord, ResolutionStatus, VariationRecordId};
use crate::errors::{ApplicationError, DomainError};
use crate::notify::{notify_best_effort, NotificationSink, TenderEvent};
use crate::observer::{OutbidNotice, QuotationObserver, ReminderNotice};
use crate::reconcile::{preview_correction, reconcile, CorrectionPreview, Reconciliation};
use crate::store::TenderStore;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferDraft {
    pub quotation_id: QuotationId,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    /// Set to update an existing offer of the same supplier.
    pub offer_id: Option<OfferId>,
    pub brand: String,
    pub packaging: Packaging,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub offer: Offer,
    pub reconciliation: Reconciliation,
    /// The offer's variation record, whether created now or by an earlier submission.
    pub variation: Option<QuantityVariationRecord>,
    pub variation_created: bool,
    pub board: PriceBoard,
    pub outbid: Option<Outbid>,
}

pub struct OfferService {
    store: Arc<dyn TenderStore>,
    notifications: Arc<dyn NotificationSink>,
    observer: Arc<dyn QuotationObserver>,
    audit: Arc<dyn AuditSink>,
}

impl OfferService {
    pub fn new(
        store: Arc<dyn TenderStore>,
        notifications: Arc<dyn NotificationSink>,
        observer: Arc<dyn QuotationObserver>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { store, notifications, observer, audit }
    }

    pub async fn submit_offer(
        &self,
        draft: OfferDraft,
        now: DateTime<Utc>,
        audit: &AuditContext,
    ) -> Result<SubmissionOutcome, ApplicationError> {
        let quotation = self.load_quotation(&draft.quotation_id).await?;
        if !quotation.is_accepting_offers(now) {
            return Err(DomainError::QuotationNotOpen {
                quotation_id: quotation.id.clone(),
                status: quotation.status,
            }
            .into());
        }
        if !quotation.invited_suppliers.is_empty()
            && !quotation.invited_suppliers.contains(&draft.supplier_id)
        {
            return Err(DomainError::InvalidInput(format!(
                "supplier `{}` is not invited to quotation `{}`",
                draft.supplier_id, quotation.id
            ))
            .into());
        }
        let item = self.load_item(&draft.quotation_id, &draft.product_id).await?;
        validate_draft(&draft)?;

        let offers_before = self.store.offers_for_item(&quotation.id, &item.product_id).await?;
        let board_before = aggregate(&offers_before);

        let offer = match &draft.offer_id {
            Some(offer_id) => {
                let mut existing = offers_before
                    .iter()
                    .find(|offer| offer.id == *offer_id && offer.supplier_id == draft.supplier_id)
                    .cloned()
                    .ok_or_else(|| DomainError::OfferNotFound { offer_id: offer_id.clone() })?;
                existing.brand = draft.brand.trim().to_owned();
                existing.packaging = draft.packaging;
                existing.recompute_derived();
                existing.updated_at = now;
                existing
            }
            None => Offer::new(
                OfferId::generate(),
                quotation.id.clone(),
                item.product_id.clone(),
                draft.supplier_id.clone(),
                draft.brand.trim(),
                item.unit_class(),
                draft.packaging,
                now,
            ),
        };
        self.store.save_offer(offer.clone()).await?;

        let reconciliation = reconcile(item.requested_quantity, item.unit_class(), &offer.packaging);
        let (variation, variation_created) = self
            .record_variation(&quotation, &item, &offer, &reconciliation, now, audit)
            .await?;

        let offers_after = self.store.offers_for_item(&quotation.id, &item.product_id).await?;
        let board = aggregate(&offers_after);
        let outbid = detect_outbid(&item.product_id, &board_before, &board);

        info!(
            event_name = "offer.submitted",
            correlation_id = %audit.correlation_id,
            quotation_id = %quotation.id,
            product_id = %item.product_id,
            supplier_id = %offer.supplier_id,
            offer_id = %offer.id,
            classification = reconciliation.assessment.classification.as_str(),
            outbid = outbid.is_some(),
            "offer submitted"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(quotation.id.clone()),
                audit,
                "offer.submitted",
                AuditCategory::Offer,
                AuditOutcome::Success,
            )
            .with_metadata("offer_id", offer.id.to_string())
            .with_metadata("supplier_id", offer.supplier_id.to_string())
            .with_metadata("total_quantity", offer.total_quantity.to_string())
            .with_metadata("classification", reconciliation.assessment.classification.as_str()),
        );

        if let Some(outbid) = &outbid {
            self.publish_outbid(&quotation, &item, outbid, audit).await;
        }
        notify_best_effort(
            self.notifications.as_ref(),
            TenderEvent::OfferReceived {
                quotation_id: quotation.id.clone(),
                product_id: item.product_id.clone(),
                supplier_id: offer.supplier_id.clone(),
                brand: offer.brand.clone(),
            },
            &audit.correlation_id,
        )
        .await;

        Ok(SubmissionOutcome { offer, reconciliation, variation, variation_created, board, outbid })
    }

    /// Live recomputation for a typing-error correction. Writes nothing.
    pub async fn preview_correction(
        &self,
        quotation_id: &QuotationId,
        product_id: &ProductId,
        corrected: Packaging,
    ) -> Result<CorrectionPreview, ApplicationError> {
        let item = self.load_item(quotation_id, product_id).await?;
        Ok(preview_correction(item.requested_quantity, item.unit_class(), corrected))
    }

    pub async fn price_board(
        &self,
        quotation_id: &QuotationId,
        product_id: &ProductId,
    ) -> Result<PriceBoard, ApplicationError> {
        let offers = self.store.offers_for_item(quotation_id, product_id).await?;
        Ok(aggregate(&offers))
    }

    pub async fn counter_proposal_status(
        &self,
        quotation_id: &QuotationId,
        product_id: &ProductId,
        supplier_id: &SupplierId,
        now: DateTime<Utc>,
    ) -> Result<CounterProposalStatus, ApplicationError> {
        let quotation = self.load_quotation(quotation_id).await?;
        let offers = self.store.offers_for_item(quotation_id, product_id).await?;
        Ok(counter_proposal::evaluate(&quotation, supplier_id, &offers, now))
    }

    /// Reminders still to be sent to an outbid supplier, one per product.
    pub async fn pending_reminders(
        &self,
        quotation_id: &QuotationId,
        supplier_id: &SupplierId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReminderNotice>, ApplicationError> {
        let quotation = self.load_quotation(quotation_id).await?;
        let mut reminders = Vec::new();
        for item in self.store.find_items(quotation_id).await? {
            let offers = self.store.offers_for_item(quotation_id, &item.product_id).await?;
            let status = counter_proposal::evaluate(&quotation, supplier_id, &offers, now);
            let Some(counter) = status.counter_proposal else {
                continue;
            };
            if counter.is_expired(now) {
                continue;
            }
            if let Some(plan) =
                plan_reminder(&counter, quotation.counter_proposal_reminder_percent, now)
            {
                reminders.push(ReminderNotice {
                    supplier_id: supplier_id.clone(),
                    product_name: item.name.clone(),
                    brand: counter.own_brand.clone(),
                    plan,
                });
            }
        }
        Ok(reminders)
    }

    /// Hands due reminders to the observer; returns how many were sent.
    pub async fn send_due_reminders(
        &self,
        quotation_id: &QuotationId,
        supplier_id: &SupplierId,
        now: DateTime<Utc>,
    ) -> Result<usize, ApplicationError> {
        let quotation = self.load_quotation(quotation_id).await?;
        let reminders = self.pending_reminders(quotation_id, supplier_id, now).await?;
        for reminder in &reminders {
            self.observer.counter_proposal_reminder(&quotation, reminder).await;
        }
        Ok(reminders.len())
    }

    /// Creates the offer's variation record on its first non-exact reconciliation.
    pub(crate) async fn record_variation(
        &self,
        quotation: &Quotation,
        item: &RequestedItem,
        offer: &Offer,
        reconciliation: &Reconciliation,
        now: DateTime<Utc>,
        audit: &AuditContext,
    ) -> Result<(Option<QuantityVariationRecord>, bool), ApplicationError> {
        let Some(suggestions) = reconciliation.suggestions else {
            let existing = self.store.variation_for_offer(&offer.id).await?;
            return Ok((existing, false));
        };

        let assessment = reconciliation.assessment;
        let record = QuantityVariationRecord {
            id: VariationRecordId::generate(),
            offer_id: offer.id.clone(),
            quotation_id: quotation.id.clone(),
            product_id: item.product_id.clone(),
            supplier_id: offer.supplier_id.clone(),
            requested_quantity: assessment.requested,
            offered_quantity: assessment.offered,
            variation: assessment.variation,
            variation_percent: assessment.variation_percent,
            classification: assessment.classification,
            suggestions,
            status: ResolutionStatus::Unresolved,
            applied_packages: None,
            resolution_path: None,
            resolved_by: None,
            created_at: now,
            resolved_at: None,
        };
        let inserted = self.store.create_variation_if_absent(record).await?;

        if inserted.created {
            info!(
                event_name = "offer.variation_detected",
                correlation_id = %audit.correlation_id,
                quotation_id = %quotation.id,
                offer_id = %offer.id,
                record_id = %inserted.record.id,
                classification = assessment.classification.as_str(),
                "quantity variation recorded"
            );
            notify_best_effort(
                self.notifications.as_ref(),
                TenderEvent::QuantityVariationDetected {
                    quotation_id: quotation.id.clone(),
                    product_id: item.product_id.clone(),
                    supplier_id: offer.supplier_id.clone(),
                    record_id: inserted.record.id.clone(),
                    classification: assessment.classification,
                    requested_quantity: assessment.requested,
                    offered_quantity: assessment.offered,
                },
                &audit.correlation_id,
            )
            .await;
        }
        Ok((Some(inserted.record), inserted.created))
    }

    async fn publish_outbid(
        &self,
        quotation: &Quotation,
        item: &RequestedItem,
        outbid: &Outbid,
        audit: &AuditContext,
    ) {
        notify_best_effort(
            self.notifications.as_ref(),
            TenderEvent::OfferOutbid {
                quotation_id: quotation.id.clone(),
                product_id: item.product_id.clone(),
                supplier_id: outbid.previous.supplier_id.clone(),
                winning_supplier_id: outbid.current.supplier_id.clone(),
                price_per_unit: outbid.current.price_per_unit,
            },
            &audit.correlation_id,
        )
        .await;

        let notice = OutbidNotice {
            product_id: item.product_id.clone(),
            product_name: item.name.clone(),
            unit: item.unit,
            outbid_supplier_id: outbid.previous.supplier_id.clone(),
            winning_supplier_id: outbid.current.supplier_id.clone(),
            winning_brand: outbid.current.brand.clone(),
            price_per_unit: outbid.current.price_per_unit,
            window_minutes: quotation.counter_proposal_window_minutes,
        };
        self.observer.offer_outbid(quotation, &notice).await;
    }

    async fn load_quotation(&self, quotation_id: &QuotationId) -> Result<Quotation, ApplicationError> {
        self.store
            .find_quotation(quotation_id)
            .await?
            .ok_or_else(|| DomainError::QuotationNotFound(quotation_id.clone()).into())
    }

    async fn load_item(
        &self,
        quotation_id: &QuotationId,
        product_id: &ProductId,
    ) -> Result<RequestedItem, ApplicationError> {
        self.store.find_item(quotation_id, product_id).await?.ok_or_else(|| {
            DomainError::InvalidInput(format!(
                "product `{product_id}` is not requested in quotation `{quotation_id}`"
            ))
            .into()
        })
    }
}

fn validate_draft(draft: &OfferDraft) -> Result<(), DomainError> {
    if draft.brand.trim().is_empty() {
        return Err(DomainError::InvalidInput("brand must not be empty".to_owned()));
    }
    if draft.packaging.content_per_package < Decimal::ZERO {
        return Err(DomainError::InvalidInput(
            "content per package must not be negative".to_owned(),
        ));
    }
    if draft.packaging.price_per_package < Decimal::ZERO {
        return Err(DomainError::InvalidInput("price per package must not be negative".to_owned()));
    }
    Ok(())
}
