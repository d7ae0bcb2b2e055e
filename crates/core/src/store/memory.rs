use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::brand::{BrandProposal, BrandProposalId, ProposalStatus};
use crate::domain::item::{ItemStatus, ProductId, RequestedItem};
use crate::domain::offer::{Offer, OfferId};
use crate::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use crate::domain::variation::{QuantityVariationRecord, ResolutionStatus, VariationRecordId};
use crate::notify::{NotificationId, NotificationRecord};

use super::{
    CommitOutcome, NotificationStore, OfferStore, ProposalDecision, ProposalStore, QuotationStore,
    ResolutionCommit, StatusUpdate, StoreError, VariationInsert, VariationStore,
};

#[derive(Default)]
struct MemoryState {
    quotations: HashMap<String, Quotation>,
    /// Keyed by (quotation id, product id).
    items: HashMap<(String, String), RequestedItem>,
    /// Insertion order is submission order.
    offers: Vec<Offer>,
    variations: Vec<QuantityVariationRecord>,
    proposals: Vec<BrandProposal>,
    notifications: Vec<NotificationRecord>,
}

impl MemoryState {
    fn upsert_offer(&mut self, offer: Offer) {
        match self.offers.iter_mut().find(|current| current.id == offer.id) {
            Some(current) => *current = offer,
            None => self.offers.push(offer),
        }
    }
}

/// Process-local store. Every conditional operation runs under a single write lock, which gives
/// the same atomicity the SQL store gets from transactions.
#[derive(Default)]
pub struct InMemoryTenderStore {
    state: RwLock<MemoryState>,
}

impl InMemoryTenderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotationStore for InMemoryTenderStore {
    async fn find_quotation(&self, id: &QuotationId) -> Result<Option<Quotation>, StoreError> {
        let state = self.state.read().await;
        Ok(state.quotations.get(&id.0).cloned())
    }

    async fn save_quotation(&self, quotation: Quotation) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.quotations.insert(quotation.id.0.clone(), quotation);
        Ok(())
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Quotation>, StoreError> {
        let state = self.state.read().await;
        let mut expired: Vec<Quotation> = state
            .quotations
            .values()
            .filter(|quotation| quotation.status == QuotationStatus::Open && quotation.deadline <= now)
            .cloned()
            .collect();
        expired.sort_by(|left, right| {
            left.deadline.cmp(&right.deadline).then_with(|| left.id.cmp(&right.id))
        });
        Ok(expired)
    }

    async fn compare_and_set_status(
        &self,
        id: &QuotationId,
        expected: QuotationStatus,
        update: StatusUpdate,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let Some(quotation) = state.quotations.get_mut(&id.0) else {
            return Ok(false);
        };
        if quotation.status != expected {
            return Ok(false);
        }
        quotation.status = update.status;
        quotation.deadline = update.deadline;
        quotation.updated_at = update.updated_at;
        Ok(true)
    }

    async fn close_quotation(
        &self,
        id: &QuotationId,
        expected: QuotationStatus,
        expired_by: Option<DateTime<Utc>>,
        closed_at: DateTime<Utc>,
    ) -> Result<Option<u32>, StoreError> {
        let mut state = self.state.write().await;
        let Some(quotation) = state.quotations.get_mut(&id.0) else {
            return Ok(None);
        };
        if quotation.status != expected {
            return Ok(None);
        }
        if expired_by.is_some_and(|now| quotation.deadline > now) {
            return Ok(None);
        }
        quotation.status = QuotationStatus::Closed;
        quotation.updated_at = closed_at;

        let mut closed = 0_u32;
        for ((quotation_id, _), item) in state.items.iter_mut() {
            if quotation_id == &id.0 && item.status == ItemStatus::Pending {
                item.status = ItemStatus::Closed;
                closed = closed.saturating_add(1);
            }
        }
        Ok(Some(closed))
    }

    async fn find_items(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<RequestedItem>, StoreError> {
        let state = self.state.read().await;
        let mut items: Vec<RequestedItem> = state
            .items
            .values()
            .filter(|item| item.quotation_id == *quotation_id)
            .cloned()
            .collect();
        items.sort_by(|left, right| left.product_id.cmp(&right.product_id));
        Ok(items)
    }

    async fn find_item(
        &self,
        quotation_id: &QuotationId,
        product_id: &ProductId,
    ) -> Result<Option<RequestedItem>, StoreError> {
        let state = self.state.read().await;
        Ok(state.items.get(&(quotation_id.0.clone(), product_id.0.clone())).cloned())
    }

    async fn save_item(&self, item: RequestedItem) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.items.insert((item.quotation_id.0.clone(), item.product_id.0.clone()), item);
        Ok(())
    }
}

#[async_trait]
impl OfferStore for InMemoryTenderStore {
    async fn find_offer(&self, id: &OfferId) -> Result<Option<Offer>, StoreError> {
        let state = self.state.read().await;
        Ok(state.offers.iter().find(|offer| offer.id == *id).cloned())
    }

    async fn offers_for_item(
        &self,
        quotation_id: &QuotationId,
        product_id: &ProductId,
    ) -> Result<Vec<Offer>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .offers
            .iter()
            .filter(|offer| offer.quotation_id == *quotation_id && offer.product_id == *product_id)
            .cloned()
            .collect())
    }

    async fn offers_for_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<Offer>, StoreError> {
        let state = self.state.read().await;
        Ok(state.offers.iter().filter(|offer| offer.quotation_id == *quotation_id).cloned().collect())
    }

    async fn save_offer(&self, offer: Offer) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.upsert_offer(offer);
        Ok(())
    }
}

#[async_trait]
impl VariationStore for InMemoryTenderStore {
    async fn find_variation(
        &self,
        id: &VariationRecordId,
    ) -> Result<Option<QuantityVariationRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state.variations.iter().find(|record| record.id == *id).cloned())
    }

    async fn variation_for_offer(
        &self,
        offer_id: &OfferId,
    ) -> Result<Option<QuantityVariationRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state.variations.iter().find(|record| record.offer_id == *offer_id).cloned())
    }

    async fn variations_for_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<QuantityVariationRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .variations
            .iter()
            .filter(|record| record.quotation_id == *quotation_id)
            .cloned()
            .collect())
    }

    async fn create_variation_if_absent(
        &self,
        record: QuantityVariationRecord,
    ) -> Result<VariationInsert, StoreError> {
        let mut state = self.state.write().await;
        if let Some(existing) =
            state.variations.iter().find(|current| current.offer_id == record.offer_id)
        {
            return Ok(VariationInsert { record: existing.clone(), created: false });
        }
        state.variations.push(record.clone());
        Ok(VariationInsert { record, created: true })
    }

    async fn commit_resolution(
        &self,
        commit: ResolutionCommit,
    ) -> Result<CommitOutcome, StoreError> {
        let mut state = self.state.write().await;
        let Some(index) =
            state.variations.iter().position(|record| record.id == commit.record_id)
        else {
            return Err(StoreError::Conflict(format!(
                "variation record `{}` does not exist",
                commit.record_id
            )));
        };
        if state.variations[index].status == ResolutionStatus::Applied {
            return Ok(CommitOutcome::AlreadyApplied);
        }
        if let (Some(offer), Some(observed)) = (&commit.offer, commit.observed_offer_at) {
            let stored = state
                .offers
                .iter()
                .find(|current| current.id == offer.id)
                .map(|current| current.updated_at);
            if stored != Some(observed) {
                return Ok(CommitOutcome::OfferChanged);
            }
        }

        let record = &mut state.variations[index];
        record.status = ResolutionStatus::Applied;
        record.applied_packages = Some(commit.applied_packages);
        record.resolution_path = Some(commit.path);
        record.resolved_by = Some(commit.resolved_by);
        record.resolved_at = Some(commit.resolved_at);

        if let Some(offer) = commit.offer {
            state.upsert_offer(offer);
        }
        Ok(CommitOutcome::Applied)
    }
}

#[async_trait]
impl ProposalStore for InMemoryTenderStore {
    async fn find_proposal(
        &self,
        id: &BrandProposalId,
    ) -> Result<Option<BrandProposal>, StoreError> {
        let state = self.state.read().await;
        Ok(state.proposals.iter().find(|proposal| proposal.id == *id).cloned())
    }

    async fn save_proposal(&self, proposal: BrandProposal) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        match state.proposals.iter_mut().find(|current| current.id == proposal.id) {
            Some(current) => *current = proposal,
            None => state.proposals.push(proposal),
        }
        Ok(())
    }

    async fn proposals_for_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<BrandProposal>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .proposals
            .iter()
            .filter(|proposal| proposal.quotation_id == *quotation_id)
            .cloned()
            .collect())
    }

    async fn decide_proposal(&self, decision: ProposalDecision) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let Some(proposal) =
            state.proposals.iter_mut().find(|proposal| proposal.id == decision.proposal_id)
        else {
            return Err(StoreError::Conflict(format!(
                "brand proposal `{}` does not exist",
                decision.proposal_id
            )));
        };
        if proposal.status != ProposalStatus::Pending {
            return Ok(false);
        }
        proposal.status = decision.status;
        proposal.decided_at = Some(decision.decided_at);
        proposal.offer_id = decision.offer.as_ref().map(|offer| offer.id.clone());

        if let Some(offer) = decision.offer {
            state.upsert_offer(offer);
        }
        Ok(true)
    }
}

#[async_trait]
impl NotificationStore for InMemoryTenderStore {
    async fn append_notification(&self, record: NotificationRecord) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.notifications.push(record);
        Ok(())
    }

    async fn notifications_for_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .filter(|record| record.quotation_id.as_ref() == Some(quotation_id))
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, id: &NotificationId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.notifications.iter_mut().find(|record| record.id == *id) {
            Some(record) if !record.read => {
                record.read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
