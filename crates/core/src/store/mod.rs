//! Storage ports consumed by the workflow services.
//!
//! The conditional operations (`compare_and_set_status`, `close_quotation`, `commit_resolution`,
//! `decide_proposal`, `create_variation_if_absent`) must be atomic in the backing store: they are
//! the only guard against duplicate closes and double-applied resolutions when several processes
//! act on the same quotation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::brand::{BrandProposal, BrandProposalId, ProposalStatus};
use crate::domain::item::{ProductId, RequestedItem};
use crate::domain::offer::{ActingParty, Offer, OfferId};
use crate::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use crate::domain::variation::{QuantityVariationRecord, ResolutionPath, VariationRecordId};
use crate::notify::{NotificationId, NotificationRecord};

pub mod memory;

pub use memory::InMemoryTenderStore;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored data could not be decoded: {0}")]
    Decode(String),
    #[error("conflicting write: {0}")]
    Conflict(String),
}

/// Conditional status write; applied only when the stored status still matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: QuotationStatus,
    pub deadline: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariationInsert {
    pub record: QuantityVariationRecord,
    /// False when a record for the same offer already existed and was returned instead.
    pub created: bool,
}

/// Terminal write of a resolution, optionally together with the corrected offer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionCommit {
    pub record_id: VariationRecordId,
    pub applied_packages: u32,
    pub path: ResolutionPath,
    pub resolved_by: ActingParty,
    pub resolved_at: DateTime<Utc>,
    pub offer: Option<Offer>,
    /// `updated_at` of the offer as it was read. The offer is only written while the stored
    /// copy still carries this value.
    pub observed_offer_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    /// The record was already Applied; nothing was written.
    AlreadyApplied,
    /// The offer was saved again after it was read; nothing was written.
    OfferChanged,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposalDecision {
    pub proposal_id: BrandProposalId,
    pub status: ProposalStatus,
    pub decided_at: DateTime<Utc>,
    /// Inserted in the same write when the decision is an approval.
    pub offer: Option<Offer>,
}

#[async_trait]
pub trait QuotationStore: Send + Sync {
    async fn find_quotation(&self, id: &QuotationId) -> Result<Option<Quotation>, StoreError>;
    async fn save_quotation(&self, quotation: Quotation) -> Result<(), StoreError>;

    /// Open quotations whose deadline is at or before `now`.
    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Quotation>, StoreError>;

    /// Returns `false` without writing when the stored status differs from `expected`.
    async fn compare_and_set_status(
        &self,
        id: &QuotationId,
        expected: QuotationStatus,
        update: StatusUpdate,
    ) -> Result<bool, StoreError>;

    /// Moves the quotation from `expected` to Closed and every Pending item to Closed in one
    /// atomic write. With `expired_by`, the stored deadline must also be at or before that
    /// instant, so a quotation resumed with a later deadline is left alone. Returns the number of
    /// items closed, or `None` when the condition no longer holds.
    async fn close_quotation(
        &self,
        id: &QuotationId,
        expected: QuotationStatus,
        expired_by: Option<DateTime<Utc>>,
        closed_at: DateTime<Utc>,
    ) -> Result<Option<u32>, StoreError>;

    async fn find_items(&self, quotation_id: &QuotationId)
        -> Result<Vec<RequestedItem>, StoreError>;
    async fn find_item(
        &self,
        quotation_id: &QuotationId,
        product_id: &ProductId,
    ) -> Result<Option<RequestedItem>, StoreError>;
    async fn save_item(&self, item: RequestedItem) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OfferStore: Send + Sync {
    async fn find_offer(&self, id: &OfferId) -> Result<Option<Offer>, StoreError>;

    /// Offers for one requested item in first-submitted order.
    async fn offers_for_item(
        &self,
        quotation_id: &QuotationId,
        product_id: &ProductId,
    ) -> Result<Vec<Offer>, StoreError>;

    async fn offers_for_quotation(&self, quotation_id: &QuotationId)
        -> Result<Vec<Offer>, StoreError>;

    /// Upsert; an existing offer keeps its submission position.
    async fn save_offer(&self, offer: Offer) -> Result<(), StoreError>;
}

#[async_trait]
pub trait VariationStore: Send + Sync {
    async fn find_variation(
        &self,
        id: &VariationRecordId,
    ) -> Result<Option<QuantityVariationRecord>, StoreError>;

    async fn variation_for_offer(
        &self,
        offer_id: &OfferId,
    ) -> Result<Option<QuantityVariationRecord>, StoreError>;

    async fn variations_for_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<QuantityVariationRecord>, StoreError>;

    /// Inserts the record unless one already exists for the same offer.
    async fn create_variation_if_absent(
        &self,
        record: QuantityVariationRecord,
    ) -> Result<VariationInsert, StoreError>;

    /// Applies the commit only while the record is still Unresolved and the offer is unchanged
    /// since it was read. Either both writes land or neither does.
    async fn commit_resolution(
        &self,
        commit: ResolutionCommit,
    ) -> Result<CommitOutcome, StoreError>;
}

#[async_trait]
pub trait ProposalStore: Send + Sync {
    async fn find_proposal(
        &self,
        id: &BrandProposalId,
    ) -> Result<Option<BrandProposal>, StoreError>;
    async fn save_proposal(&self, proposal: BrandProposal) -> Result<(), StoreError>;
    async fn proposals_for_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<BrandProposal>, StoreError>;

    /// Pending to `decision.status`, only while the proposal is still Pending.
    async fn decide_proposal(&self, decision: ProposalDecision) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn append_notification(&self, record: NotificationRecord) -> Result<(), StoreError>;
    async fn notifications_for_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<NotificationRecord>, StoreError>;
    async fn mark_notification_read(&self, id: &NotificationId) -> Result<bool, StoreError>;
}

/// Everything the workflow services need from one backing store.
pub trait TenderStore:
    QuotationStore + OfferStore + VariationStore + ProposalStore + NotificationStore
{
}

impl<T> TenderStore for T where
    T: QuotationStore + OfferStore + VariationStore + ProposalStore + NotificationStore
{
}
