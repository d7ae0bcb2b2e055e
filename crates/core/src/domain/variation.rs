use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::string_id;
use crate::domain::item::ProductId;
use crate::domain::offer::{ActingParty, OfferId};
use crate::domain::quotation::QuotationId;
use crate::domain::supplier::SupplierId;

string_id!(VariationRecordId, "QV");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariationClass {
    Exact,
    Insufficient,
    VeryInsufficient,
    Excess,
}

impl VariationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Insufficient => "insufficient",
            Self::VeryInsufficient => "very_insufficient",
            Self::Excess => "excess",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exact" => Some(Self::Exact),
            "insufficient" => Some(Self::Insufficient),
            "very_insufficient" => Some(Self::VeryInsufficient),
            "excess" => Some(Self::Excess),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPath {
    /// Accept the shortfall as offered; the offer is not touched.
    StockShortage,
    /// The party re-enters packaging figures that were typed wrong.
    TypingError,
    /// The buyer explicitly approves receiving more than requested.
    BuyerApprovalExcess,
    /// Accept one of the stored package-count suggestions.
    AcceptSuggestion,
}

impl ResolutionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StockShortage => "stock_shortage",
            Self::TypingError => "typing_error",
            Self::BuyerApprovalExcess => "buyer_approval_excess",
            Self::AcceptSuggestion => "accept_suggestion",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stock_shortage" => Some(Self::StockShortage),
            "typing_error" => Some(Self::TypingError),
            "buyer_approval_excess" => Some(Self::BuyerApprovalExcess),
            "accept_suggestion" => Some(Self::AcceptSuggestion),
            _ => None,
        }
    }
}

/// One candidate package count and what it would commit to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Suggestion {
    pub packages: u32,
    pub total_quantity: Decimal,
    pub variation: Decimal,
    pub total_price: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Floor,
    Ceil,
    Offered,
}

impl SuggestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Offered => "offered",
        }
    }
}

/// `floor` and `ceil` are absent when content per package is zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuggestionSet {
    pub floor: Option<Suggestion>,
    pub ceil: Option<Suggestion>,
    pub offered: Suggestion,
}

impl SuggestionSet {
    pub fn get(&self, kind: SuggestionKind) -> Option<Suggestion> {
        match kind {
            SuggestionKind::Floor => self.floor,
            SuggestionKind::Ceil => self.ceil,
            SuggestionKind::Offered => Some(self.offered),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Unresolved,
    Applied,
}

impl ResolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::Applied => "applied",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unresolved" => Some(Self::Unresolved),
            "applied" => Some(Self::Applied),
            _ => None,
        }
    }
}

/// Append-only annotation on an offer whose quantity did not match the request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityVariationRecord {
    pub id: VariationRecordId,
    pub offer_id: OfferId,
    pub quotation_id: QuotationId,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub requested_quantity: Decimal,
    pub offered_quantity: Decimal,
    pub variation: Decimal,
    pub variation_percent: Decimal,
    pub classification: VariationClass,
    pub suggestions: SuggestionSet,
    pub status: ResolutionStatus,
    pub applied_packages: Option<u32>,
    pub resolution_path: Option<ResolutionPath>,
    pub resolved_by: Option<ActingParty>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl QuantityVariationRecord {
    pub fn is_applied(&self) -> bool {
        self.status == ResolutionStatus::Applied
    }
}
