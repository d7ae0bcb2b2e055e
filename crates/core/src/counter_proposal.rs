//! Counter-proposal window for outbid suppliers.
//!
//! Once another supplier beats a supplier's best price on a product, the beaten supplier has the
//! quotation's counter-proposal window, counted from the winning offer's last update, to respond.
//! When that window has run out, the quotation is no longer accepting offers and there is real
//! competition, the supplier is locked out of the product.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{aggregate, PriceBoard};
use crate::domain::offer::{Offer, OfferId};
use crate::domain::quotation::Quotation;
use crate::domain::supplier::SupplierId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterProposal {
    pub deadline: DateTime<Utc>,
    /// When the winning offer was last updated; the window opens here.
    pub outbid_at: DateTime<Utc>,
    pub winning_offer_id: OfferId,
    pub winning_brand: String,
    pub own_brand: String,
}

impl CounterProposal {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterProposalStatus {
    pub counter_proposal: Option<CounterProposal>,
    pub locked_out: bool,
}

/// Counter-proposal state of `supplier_id` against the offers for one product.
pub fn evaluate(
    quotation: &Quotation,
    supplier_id: &SupplierId,
    offers: &[Offer],
    now: DateTime<Utc>,
) -> CounterProposalStatus {
    let Some(own_best) = PriceBoard::supplier_best(offers, supplier_id) else {
        return CounterProposalStatus::default();
    };
    let Some(own_price) = own_best.price_per_unit else {
        return CounterProposalStatus::default();
    };
    let Some(best) = aggregate(offers).best else {
        return CounterProposalStatus::default();
    };
    if own_price <= best.price_per_unit {
        return CounterProposalStatus::default();
    }

    // Several rivals may sit at the best price; the most recent update sets the window.
    let Some(winner) = offers
        .iter()
        .filter(|offer| {
            offer.supplier_id != *supplier_id
                && offer.is_priced()
                && offer.price_per_unit == Some(best.price_per_unit)
        })
        .max_by_key(|offer| offer.updated_at)
    else {
        return CounterProposalStatus::default();
    };

    let window = Duration::minutes(i64::from(quotation.counter_proposal_window_minutes));
    let deadline = winner.updated_at.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC);
    let counter_proposal = CounterProposal {
        deadline,
        outbid_at: winner.updated_at,
        winning_offer_id: winner.id.clone(),
        winning_brand: winner.brand.clone(),
        own_brand: own_best.brand.clone(),
    };

    let locked_out = counter_proposal.is_expired(now)
        && competing_suppliers(offers) > 1
        && !quotation.is_accepting_offers(now);

    CounterProposalStatus { counter_proposal: Some(counter_proposal), locked_out }
}

fn competing_suppliers(offers: &[Offer]) -> usize {
    let mut suppliers: Vec<&SupplierId> =
        offers.iter().filter(|offer| offer.is_priced()).map(|offer| &offer.supplier_id).collect();
    suppliers.sort();
    suppliers.dedup();
    suppliers.len()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPlan {
    pub remind_at: DateTime<Utc>,
    /// Whole minutes between the reminder and the counter-proposal deadline.
    pub minutes_left: i64,
}

/// When to remind an outbid supplier, as a share of the window already elapsed.
///
/// No reminder is planned at 0% or 100%, or once the reminder instant is in the past.
pub fn plan_reminder(
    counter_proposal: &CounterProposal,
    reminder_percent: u8,
    now: DateTime<Utc>,
) -> Option<ReminderPlan> {
    if reminder_percent == 0 || reminder_percent >= 100 {
        return None;
    }

    let window_ms = (counter_proposal.deadline - counter_proposal.outbid_at).num_milliseconds();
    if window_ms <= 0 {
        return None;
    }
    let offset_ms = window_ms.checked_mul(i64::from(reminder_percent))? / 100;
    let remind_at = counter_proposal.outbid_at + Duration::milliseconds(offset_ms);
    if remind_at <= now {
        return None;
    }

    let left_ms = window_ms - offset_ms;
    let minutes_left = (left_ms + 30_000) / 60_000;
    Some(ReminderPlan { remind_at, minutes_left })
}

/// Inputs deciding whether a supplier's offer row can still be edited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingConditions {
    pub quotation_ended: bool,
    pub locked_out: bool,
    pub stopped_quoting: bool,
    pub counter_proposal_expired: bool,
    pub offer_saved: bool,
    pub in_edit_mode: bool,
    pub saving: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingRules {
    pub offer_disabled: bool,
    pub brand_field_disabled: bool,
    pub buttons_disabled: bool,
    pub badges_disabled: bool,
}

pub fn blocking_rules(conditions: BlockingConditions, suggested_brand: bool) -> BlockingRules {
    let blocked = conditions.quotation_ended
        || conditions.locked_out
        || conditions.stopped_quoting
        || conditions.counter_proposal_expired;
    let offer_disabled = blocked || (conditions.offer_saved && !conditions.in_edit_mode);

    BlockingRules {
        offer_disabled,
        brand_field_disabled: offer_disabled || suggested_brand,
        buttons_disabled: conditions.saving || blocked,
        badges_disabled: blocked,
    }
}
