//! Hooks for outbound messaging around lifecycle and bidding events.
//!
//! Observers are fire-and-forget: they return nothing, and implementations log their own
//! failures. They are only invoked by the caller that actually performed the state change.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::counter_proposal::ReminderPlan;
use crate::domain::item::{ProductId, UnitOfMeasure};
use crate::domain::quotation::Quotation;
use crate::domain::supplier::SupplierId;

/// Published when the overall best price for a product moves to another supplier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutbidNotice {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit: UnitOfMeasure,
    pub outbid_supplier_id: SupplierId,
    pub winning_supplier_id: SupplierId,
    pub winning_brand: String,
    pub price_per_unit: Decimal,
    pub window_minutes: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderNotice {
    pub supplier_id: SupplierId,
    pub product_name: String,
    pub brand: String,
    pub plan: ReminderPlan,
}

#[async_trait]
pub trait QuotationObserver: Send + Sync {
    async fn quotation_started(&self, _quotation: &Quotation) {}
    async fn quotation_closed(&self, _quotation: &Quotation, _items_closed: u32) {}
    async fn offer_outbid(&self, _quotation: &Quotation, _notice: &OutbidNotice) {}
    async fn counter_proposal_reminder(&self, _quotation: &Quotation, _notice: &ReminderNotice) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl QuotationObserver for NoopObserver {}
