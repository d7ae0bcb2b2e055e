use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::string_id;
use crate::domain::item::ProductId;
use crate::domain::offer::{OfferId, Packaging};
use crate::domain::quotation::QuotationId;
use crate::domain::supplier::SupplierId;

string_id!(BrandProposalId, "BP");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A supplier's request to quote a brand the buyer did not list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandProposal {
    pub id: BrandProposalId,
    pub quotation_id: QuotationId,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub brand: String,
    pub packaging: Packaging,
    pub status: ProposalStatus,
    /// Set once an approval has produced a first-class offer.
    pub offer_id: Option<OfferId>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}
