use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::string_id;
use crate::domain::supplier::SupplierId;
use crate::errors::DomainError;

string_id!(QuotationId, "QT");
string_id!(BuyerId, "BY");
string_id!(ShoppingListId, "SL");

/// Default counter-proposal window when a quotation does not configure one.
pub const DEFAULT_COUNTER_PROPOSAL_MINUTES: u32 = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Open,
    Paused,
    Closed,
    Completed,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Paused => "paused",
            Self::Closed => "closed",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "paused" => Some(Self::Paused),
            "closed" => Some(Self::Closed),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Closed and Completed quotations no longer accept offers or resolutions.
    pub fn is_terminal_for_bidding(&self) -> bool {
        matches!(self, Self::Closed | Self::Completed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub name: String,
    pub status: QuotationStatus,
    /// Only enforced while the status is Open; kept unchanged while Paused.
    pub deadline: DateTime<Utc>,
    pub counter_proposal_window_minutes: u32,
    pub counter_proposal_reminder_percent: u8,
    pub invited_suppliers: Vec<SupplierId>,
    pub shopping_list_id: ShoppingListId,
    pub buyer_id: BuyerId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn is_accepting_offers(&self, now: DateTime<Utc>) -> bool {
        self.status == QuotationStatus::Open && now < self.deadline
    }

    pub fn can_transition_to(&self, next: QuotationStatus) -> bool {
        matches!(
            (self.status, next),
            (QuotationStatus::Open, QuotationStatus::Paused)
                | (QuotationStatus::Paused, QuotationStatus::Open)
                | (QuotationStatus::Open, QuotationStatus::Closed)
                | (QuotationStatus::Paused, QuotationStatus::Closed)
                | (QuotationStatus::Closed, QuotationStatus::Completed)
        )
    }

    pub fn transition_to(&mut self, next: QuotationStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidQuotationTransition { from: self.status, to: next })
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.counter_proposal_window_minutes == 0 {
            return Err(DomainError::InvalidInput(
                "counter_proposal_window_minutes must be greater than zero".to_owned(),
            ));
        }
        if self.counter_proposal_reminder_percent > 100 {
            return Err(DomainError::InvalidInput(
                "counter_proposal_reminder_percent must be within 0..=100".to_owned(),
            ));
        }
        Ok(())
    }
}
