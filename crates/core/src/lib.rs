pub mod adjustment;
pub mod aggregate;
pub mod audit;
pub mod config;
pub mod counter_proposal;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod notify;
pub mod observer;
pub mod offers;
pub mod packaging;
pub mod proposals;
pub mod reconcile;
pub mod store;

pub use adjustment::{AdjustmentOutcome, AdjustmentService, ApplySuggestion, Resolution};
pub use aggregate::{aggregate, detect_outbid, Outbid, PriceBoard, RankedOffer};
pub use audit::{
    AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, NoopAuditSink, TracingAuditSink,
};
pub use directory::{CachedSupplierDirectory, InMemorySupplierDirectory, SupplierDirectory};
pub use domain::brand::{BrandProposal, BrandProposalId, ProposalStatus};
pub use domain::item::{ItemStatus, ProductId, RequestedItem, UnitClass, UnitOfMeasure};
pub use domain::offer::{ActingParty, Offer, OfferId, Packaging};
pub use domain::quotation::{BuyerId, Quotation, QuotationId, QuotationStatus, ShoppingListId};
pub use domain::supplier::{SupplierContact, SupplierId};
pub use domain::variation::{
    QuantityVariationRecord, ResolutionPath, ResolutionStatus, SuggestionKind, VariationClass,
    VariationRecordId,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use lifecycle::{CloseOutcome, DeadlineSweeper, LifecycleService, SweepReport};
pub use notify::{NotificationRecord, NotificationSink, TenderEvent};
pub use observer::{NoopObserver, OutbidNotice, QuotationObserver, ReminderNotice};
pub use offers::{OfferDraft, OfferService, SubmissionOutcome};
pub use proposals::{ApprovalOutcome, ProposalDraft, ProposalService};
pub use reconcile::{reconcile, Reconciliation, VariationAssessment};
pub use store::{InMemoryTenderStore, StoreError, TenderStore};
