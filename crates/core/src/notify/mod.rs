//! Domain events addressed to buyers and suppliers, and the sink they are emitted through.
//!
//! Every event is a variant of [`TenderEvent`] with its own required fields; the router in
//! [`router`] matches on it exhaustively to build a stored [`NotificationRecord`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::brand::BrandProposalId;
use crate::domain::item::ProductId;
use crate::domain::quotation::QuotationId;
use crate::domain::string_id;
use crate::domain::supplier::SupplierId;
use crate::domain::variation::{VariationClass, VariationRecordId};
use crate::store::StoreError;

pub mod router;
pub mod sinks;

pub use router::NotificationRouter;
pub use sinks::{FailingNotificationSink, RecordingNotificationSink, StoredNotificationSink};

string_id!(NotificationId, "NT");

/// Which side of the auction sees a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationContext {
    Buyer,
    Supplier,
    Both,
}

impl NotificationContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Supplier => "supplier",
            Self::Both => "both",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "buyer" => Some(Self::Buyer),
            "supplier" => Some(Self::Supplier),
            "both" => Some(Self::Both),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Summary of the figures an adjustment committed the offer to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedFigures {
    pub packages: u32,
    pub total_quantity: Decimal,
    pub total_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TenderEvent {
    BrandApprovalPending {
        quotation_id: QuotationId,
        product_id: ProductId,
        supplier_id: SupplierId,
        proposal_id: BrandProposalId,
        brand: String,
    },
    BrandApprovalApproved {
        quotation_id: QuotationId,
        product_id: ProductId,
        supplier_id: SupplierId,
        proposal_id: BrandProposalId,
        brand: String,
    },
    BrandApprovalRejected {
        quotation_id: QuotationId,
        product_id: ProductId,
        supplier_id: SupplierId,
        proposal_id: BrandProposalId,
        brand: String,
    },
    QuantityVariationDetected {
        quotation_id: QuotationId,
        product_id: ProductId,
        supplier_id: SupplierId,
        record_id: VariationRecordId,
        classification: VariationClass,
        requested_quantity: Decimal,
        offered_quantity: Decimal,
    },
    /// The buyer resolved a variation; addressed to the supplier.
    BuyerAdjustmentApplied {
        quotation_id: QuotationId,
        product_id: ProductId,
        supplier_id: SupplierId,
        record_id: VariationRecordId,
        committed: CommittedFigures,
    },
    /// The supplier resolved a variation; addressed to the buyer.
    QuantityAdjustmentApproved {
        quotation_id: QuotationId,
        product_id: ProductId,
        supplier_id: SupplierId,
        record_id: VariationRecordId,
        committed: CommittedFigures,
    },
    QuotationStarted {
        quotation_id: QuotationId,
        deadline: DateTime<Utc>,
    },
    QuotationClosed {
        quotation_id: QuotationId,
        items_closed: u32,
    },
    OfferReceived {
        quotation_id: QuotationId,
        product_id: ProductId,
        supplier_id: SupplierId,
        brand: String,
    },
    OfferOutbid {
        quotation_id: QuotationId,
        product_id: ProductId,
        supplier_id: SupplierId,
        winning_supplier_id: SupplierId,
        price_per_unit: Decimal,
    },
}

impl TenderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::BrandApprovalPending { .. } => "brand_approval_pending",
            Self::BrandApprovalApproved { .. } => "brand_approval_approved",
            Self::BrandApprovalRejected { .. } => "brand_approval_rejected",
            Self::QuantityVariationDetected { .. } => "quantity_variation_detected",
            Self::BuyerAdjustmentApplied { .. } => "buyer_adjustment_applied",
            Self::QuantityAdjustmentApproved { .. } => "quantity_adjustment_approved",
            Self::QuotationStarted { .. } => "quotation_started",
            Self::QuotationClosed { .. } => "quotation_closed",
            Self::OfferReceived { .. } => "offer_received",
            Self::OfferOutbid { .. } => "offer_outbid",
        }
    }

    pub fn quotation_id(&self) -> &QuotationId {
        match self {
            Self::BrandApprovalPending { quotation_id, .. }
            | Self::BrandApprovalApproved { quotation_id, .. }
            | Self::BrandApprovalRejected { quotation_id, .. }
            | Self::QuantityVariationDetected { quotation_id, .. }
            | Self::BuyerAdjustmentApplied { quotation_id, .. }
            | Self::QuantityAdjustmentApproved { quotation_id, .. }
            | Self::QuotationStarted { quotation_id, .. }
            | Self::QuotationClosed { quotation_id, .. }
            | Self::OfferReceived { quotation_id, .. }
            | Self::OfferOutbid { quotation_id, .. } => quotation_id,
        }
    }

    pub fn product_id(&self) -> Option<&ProductId> {
        match self {
            Self::BrandApprovalPending { product_id, .. }
            | Self::BrandApprovalApproved { product_id, .. }
            | Self::BrandApprovalRejected { product_id, .. }
            | Self::QuantityVariationDetected { product_id, .. }
            | Self::BuyerAdjustmentApplied { product_id, .. }
            | Self::QuantityAdjustmentApproved { product_id, .. }
            | Self::OfferReceived { product_id, .. }
            | Self::OfferOutbid { product_id, .. } => Some(product_id),
            Self::QuotationStarted { .. } | Self::QuotationClosed { .. } => None,
        }
    }

    pub fn supplier_id(&self) -> Option<&SupplierId> {
        match self {
            Self::BrandApprovalPending { supplier_id, .. }
            | Self::BrandApprovalApproved { supplier_id, .. }
            | Self::BrandApprovalRejected { supplier_id, .. }
            | Self::QuantityVariationDetected { supplier_id, .. }
            | Self::BuyerAdjustmentApplied { supplier_id, .. }
            | Self::QuantityAdjustmentApproved { supplier_id, .. }
            | Self::OfferReceived { supplier_id, .. }
            | Self::OfferOutbid { supplier_id, .. } => Some(supplier_id),
            Self::QuotationStarted { .. } | Self::QuotationClosed { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub context: NotificationContext,
    pub event_type: String,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub action_url: Option<String>,
    pub quotation_id: Option<QuotationId>,
    pub product_id: Option<ProductId>,
    pub supplier_id: Option<SupplierId>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification store failed: {0}")]
    Store(#[from] StoreError),
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, event: TenderEvent) -> Result<(), NotificationError>;
}

/// Emits `event` and logs instead of failing. Returns whether the sink accepted it.
pub async fn notify_best_effort(
    sink: &dyn NotificationSink,
    event: TenderEvent,
    correlation_id: &str,
) -> bool {
    let event_type = event.event_type();
    let quotation_id = event.quotation_id().clone();
    match sink.emit(event).await {
        Ok(()) => true,
        Err(error) => {
            warn!(
                event_name = "notify.emit.failed",
                correlation_id = %correlation_id,
                quotation_id = %quotation_id,
                notification_type = event_type,
                error = %error,
                "notification could not be emitted; continuing"
            );
            false
        }
    }
}
