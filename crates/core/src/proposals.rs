//! Supplier-proposed brands that the buyer did not list.
//!
//! Pending → Approved | Rejected, both terminal. Approval atomically turns the proposal into a
//! regular offer and runs it through the same reconciliation as any submitted offer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::brand::{BrandProposal, BrandProposalId, ProposalStatus};
use crate::domain::item::ProductId;
use crate::domain::offer::{Offer, OfferId, Packaging};
use crate::domain::quotation::QuotationId;
use crate::domain::supplier::SupplierId;
use crate::domain::variation::QuantityVariationRecord;
use crate::errors::{ApplicationError, DomainError};
use crate::notify::{notify_best_effort, NotificationSink, TenderEvent};
use crate::offers::OfferService;
use crate::reconcile::{reconcile, Reconciliation};
use crate::store::{ProposalDecision, TenderStore};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub quotation_id: QuotationId,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub brand: String,
    pub packaging: Packaging,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub proposal: BrandProposal,
    pub offer: Offer,
    pub reconciliation: Reconciliation,
    pub variation: Option<QuantityVariationRecord>,
}

pub struct ProposalService {
    store: Arc<dyn TenderStore>,
    offers: Arc<OfferService>,
    notifications: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditSink>,
}

impl ProposalService {
    pub fn new(
        store: Arc<dyn TenderStore>,
        offers: Arc<OfferService>,
        notifications: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { store, offers, notifications, audit }
    }

    pub async fn submit(
        &self,
        draft: ProposalDraft,
        now: DateTime<Utc>,
        audit: &AuditContext,
    ) -> Result<BrandProposal, ApplicationError> {
        let quotation = self
            .store
            .find_quotation(&draft.quotation_id)
            .await?
            .ok_or_else(|| DomainError::QuotationNotFound(draft.quotation_id.clone()))?;
        if !quotation.is_accepting_offers(now) {
            return Err(DomainError::QuotationNotOpen {
                quotation_id: quotation.id.clone(),
                status: quotation.status,
            }
            .into());
        }
        let item = self
            .store
            .find_item(&draft.quotation_id, &draft.product_id)
            .await?
            .ok_or_else(|| {
                DomainError::InvalidInput(format!(
                    "product `{}` is not requested in quotation `{}`",
                    draft.product_id, draft.quotation_id
                ))
            })?;

        let brand = draft.brand.trim();
        if brand.is_empty() {
            return Err(DomainError::InvalidInput("brand must not be empty".to_owned()).into());
        }
        if item.prefers_brand(brand) {
            return Err(DomainError::InvalidInput(format!(
                "brand `{brand}` is already requested; submit an offer instead"
            ))
            .into());
        }
        if draft.packaging.package_count == 0 {
            return Err(DomainError::InvalidInput("package count must be positive".to_owned()).into());
        }
        if draft.packaging.price_per_package <= Decimal::ZERO
            || draft.packaging.content_per_package < Decimal::ZERO
        {
            return Err(DomainError::InvalidInput(
                "price per package must be positive and content must not be negative".to_owned(),
            )
            .into());
        }

        let proposal = BrandProposal {
            id: BrandProposalId::generate(),
            quotation_id: quotation.id.clone(),
            product_id: item.product_id.clone(),
            supplier_id: draft.supplier_id,
            brand: brand.to_owned(),
            packaging: draft.packaging,
            status: ProposalStatus::Pending,
            offer_id: None,
            created_at: now,
            decided_at: None,
        };
        self.store.save_proposal(proposal.clone()).await?;

        info!(
            event_name = "proposal.submitted",
            correlation_id = %audit.correlation_id,
            quotation_id = %proposal.quotation_id,
            proposal_id = %proposal.id,
            supplier_id = %proposal.supplier_id,
            "brand proposal submitted"
        );
        self.record(&proposal, "proposal.submitted", AuditOutcome::Success, audit);
        notify_best_effort(
            self.notifications.as_ref(),
            TenderEvent::BrandApprovalPending {
                quotation_id: proposal.quotation_id.clone(),
                product_id: proposal.product_id.clone(),
                supplier_id: proposal.supplier_id.clone(),
                proposal_id: proposal.id.clone(),
                brand: proposal.brand.clone(),
            },
            &audit.correlation_id,
        )
        .await;
        Ok(proposal)
    }

    pub async fn approve(
        &self,
        proposal_id: &BrandProposalId,
        now: DateTime<Utc>,
        audit: &AuditContext,
    ) -> Result<ApprovalOutcome, ApplicationError> {
        let proposal = self.load_pending(proposal_id).await?;
        let quotation = self
            .store
            .find_quotation(&proposal.quotation_id)
            .await?
            .ok_or_else(|| DomainError::QuotationNotFound(proposal.quotation_id.clone()))?;
        if quotation.status.is_terminal_for_bidding() {
            return Err(DomainError::QuotationNotOpen {
                quotation_id: quotation.id.clone(),
                status: quotation.status,
            }
            .into());
        }
        let item = self
            .store
            .find_item(&proposal.quotation_id, &proposal.product_id)
            .await?
            .ok_or_else(|| {
                DomainError::InvalidInput(format!(
                    "product `{}` is no longer requested in quotation `{}`",
                    proposal.product_id, proposal.quotation_id
                ))
            })?;

        let offer = Offer::new(
            OfferId::generate(),
            proposal.quotation_id.clone(),
            proposal.product_id.clone(),
            proposal.supplier_id.clone(),
            proposal.brand.clone(),
            item.unit_class(),
            proposal.packaging,
            now,
        );
        let decision = ProposalDecision {
            proposal_id: proposal.id.clone(),
            status: ProposalStatus::Approved,
            decided_at: now,
            offer: Some(offer.clone()),
        };
        if !self.store.decide_proposal(decision).await? {
            return Err(self.lost_decision(proposal_id).await);
        }

        let mut approved = proposal;
        approved.status = ProposalStatus::Approved;
        approved.decided_at = Some(now);
        approved.offer_id = Some(offer.id.clone());

        let reconciliation = reconcile(item.requested_quantity, item.unit_class(), &offer.packaging);
        let (variation, _) = self
            .offers
            .record_variation(&quotation, &item, &offer, &reconciliation, now, audit)
            .await?;

        info!(
            event_name = "proposal.approved",
            correlation_id = %audit.correlation_id,
            quotation_id = %approved.quotation_id,
            proposal_id = %approved.id,
            offer_id = %offer.id,
            classification = reconciliation.assessment.classification.as_str(),
            "brand proposal approved"
        );
        self.record(&approved, "proposal.approved", AuditOutcome::Success, audit);
        notify_best_effort(
            self.notifications.as_ref(),
            TenderEvent::BrandApprovalApproved {
                quotation_id: approved.quotation_id.clone(),
                product_id: approved.product_id.clone(),
                supplier_id: approved.supplier_id.clone(),
                proposal_id: approved.id.clone(),
                brand: approved.brand.clone(),
            },
            &audit.correlation_id,
        )
        .await;

        Ok(ApprovalOutcome { proposal: approved, offer, reconciliation, variation })
    }

    pub async fn reject(
        &self,
        proposal_id: &BrandProposalId,
        now: DateTime<Utc>,
        audit: &AuditContext,
    ) -> Result<BrandProposal, ApplicationError> {
        let proposal = self.load_pending(proposal_id).await?;
        let decision = ProposalDecision {
            proposal_id: proposal.id.clone(),
            status: ProposalStatus::Rejected,
            decided_at: now,
            offer: None,
        };
        if !self.store.decide_proposal(decision).await? {
            return Err(self.lost_decision(proposal_id).await);
        }

        let mut rejected = proposal;
        rejected.status = ProposalStatus::Rejected;
        rejected.decided_at = Some(now);

        info!(
            event_name = "proposal.rejected",
            correlation_id = %audit.correlation_id,
            quotation_id = %rejected.quotation_id,
            proposal_id = %rejected.id,
            "brand proposal rejected"
        );
        self.record(&rejected, "proposal.rejected", AuditOutcome::Success, audit);
        notify_best_effort(
            self.notifications.as_ref(),
            TenderEvent::BrandApprovalRejected {
                quotation_id: rejected.quotation_id.clone(),
                product_id: rejected.product_id.clone(),
                supplier_id: rejected.supplier_id.clone(),
                proposal_id: rejected.id.clone(),
                brand: rejected.brand.clone(),
            },
            &audit.correlation_id,
        )
        .await;
        Ok(rejected)
    }

    pub async fn pending_for_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<BrandProposal>, ApplicationError> {
        let proposals = self.store.proposals_for_quotation(quotation_id).await?;
        Ok(proposals
            .into_iter()
            .filter(|proposal| proposal.status == ProposalStatus::Pending)
            .collect())
    }

    async fn load_pending(
        &self,
        proposal_id: &BrandProposalId,
    ) -> Result<BrandProposal, ApplicationError> {
        let proposal = self
            .store
            .find_proposal(proposal_id)
            .await?
            .ok_or_else(|| DomainError::ProposalNotFound(proposal_id.clone()))?;
        if proposal.status.is_terminal() {
            return Err(DomainError::InvalidProposalState {
                proposal_id: proposal.id.clone(),
                status: proposal.status,
            }
            .into());
        }
        Ok(proposal)
    }

    /// Another caller decided the proposal between our read and our write.
    async fn lost_decision(&self, proposal_id: &BrandProposalId) -> ApplicationError {
        match self.store.find_proposal(proposal_id).await {
            Ok(Some(current)) => DomainError::InvalidProposalState {
                proposal_id: current.id,
                status: current.status,
            }
            .into(),
            Ok(None) => DomainError::ProposalNotFound(proposal_id.clone()).into(),
            Err(error) => error.into(),
        }
    }

    fn record(
        &self,
        proposal: &BrandProposal,
        event_type: &str,
        outcome: AuditOutcome,
        audit: &AuditContext,
    ) {
        self.audit.emit(
            AuditEvent::new(
                Some(proposal.quotation_id.clone()),
                audit,
                event_type,
                AuditCategory::Proposal,
                outcome,
            )
            .with_metadata("proposal_id", proposal.id.to_string())
            .with_metadata("supplier_id", proposal.supplier_id.to_string())
            .with_metadata("brand", proposal.brand.clone())
            .with_metadata("status", proposal.status.as_str()),
        );
    }
}
