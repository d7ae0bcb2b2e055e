//! Plain-text message bodies sent through the messaging bridge.

use tender_core::domain::quotation::Quotation;
use tender_core::domain::supplier::SupplierContact;
use tender_core::observer::{OutbidNotice, ReminderNotice};

const DEADLINE_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Portal path a supplier follows to quote, prefixed with the portal base when configured.
pub fn quotation_link(portal_base_url: Option<&str>, quotation: &Quotation) -> String {
    let path = format!("/quotations/{}", quotation.id);
    match portal_base_url {
        Some(base) => format!("{}{path}", base.trim_end_matches('/')),
        None => path,
    }
}

pub fn invitation(contact: &SupplierContact, quotation: &Quotation, link: &str) -> String {
    format!(
        "Hello {}, you are invited to quote on \"{}\". Offers are accepted until {}. {link}",
        contact.greeting_name(),
        quotation.name,
        quotation.deadline.format(DEADLINE_FORMAT),
    )
}

pub fn supplier_closure(contact: &SupplierContact, quotation: &Quotation) -> String {
    format!(
        "Hello {}, quotation \"{}\" is now closed and no longer accepts offers. Thank you for taking part.",
        contact.greeting_name(),
        quotation.name,
    )
}

pub fn buyer_closure(quotation: &Quotation, items_closed: u32) -> String {
    let noun = if items_closed == 1 { "item" } else { "items" };
    format!(
        "Quotation \"{}\" has closed. {items_closed} requested {noun} moved to review.",
        quotation.name,
    )
}

pub fn outbid(contact: &SupplierContact, notice: &OutbidNotice, winner_name: &str) -> String {
    format!(
        "Hello {}, your offer for {} was beaten by {} ({}) at {:.2} per {}. \
         You have {} minutes to send a counter-proposal.",
        contact.greeting_name(),
        notice.product_name,
        winner_name,
        notice.winning_brand,
        notice.price_per_unit,
        notice.unit.abbreviation(),
        notice.window_minutes,
    )
}

pub fn reminder(contact: &SupplierContact, notice: &ReminderNotice) -> String {
    let minutes = notice.plan.minutes_left;
    let noun = if minutes == 1 { "minute" } else { "minutes" };
    format!(
        "Hello {}, {minutes} {noun} left to improve your {} offer for {}.",
        contact.greeting_name(),
        notice.brand,
        notice.product_name,
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use tender_core::counter_proposal::ReminderPlan;
    use tender_core::domain::item::{ProductId, UnitOfMeasure};
    use tender_core::domain::quotation::{
        BuyerId, Quotation, QuotationId, QuotationStatus, ShoppingListId,
    };
    use tender_core::domain::supplier::{SupplierContact, SupplierId};
    use tender_core::observer::{OutbidNotice, ReminderNotice};

    fn quotation() -> Quotation {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 18, 30, 0).single().expect("valid timestamp");
        Quotation {
            id: QuotationId::new("QT-7"),
            name: "Weekly produce".to_owned(),
            status: QuotationStatus::Open,
            deadline: at,
            counter_proposal_window_minutes: 15,
            counter_proposal_reminder_percent: 67,
            invited_suppliers: vec![SupplierId::new("SP-1")],
            shopping_list_id: ShoppingListId::new("SL-1"),
            buyer_id: BuyerId::new("BY-1"),
            created_at: at,
            updated_at: at,
        }
    }

    fn contact() -> SupplierContact {
        SupplierContact {
            id: SupplierId::new("SP-1"),
            company_name: "Hortifruti Central".to_owned(),
            contact_name: Some("Marta".to_owned()),
            phone: Some("5550100".to_owned()),
        }
    }

    #[test]
    fn invitation_carries_deadline_and_link() {
        let quotation = quotation();
        let link = super::quotation_link(Some("https://portal.example/"), &quotation);
        assert_eq!(link, "https://portal.example/quotations/QT-7");

        let text = super::invitation(&contact(), &quotation, &link);
        assert!(text.starts_with("Hello Marta,"));
        assert!(text.contains("2026-03-02 18:30 UTC"));
        assert!(text.ends_with(&link));
        assert_eq!(super::quotation_link(None, &quotation), "/quotations/QT-7");
    }

    #[test]
    fn buyer_closure_pluralizes_item_count() {
        assert!(super::buyer_closure(&quotation(), 1).contains("1 requested item moved"));
        assert!(super::buyer_closure(&quotation(), 3).contains("3 requested items moved"));
    }

    #[test]
    fn outbid_mentions_price_per_unit_and_window() {
        let notice = OutbidNotice {
            product_id: ProductId::new("PR-TOMATO"),
            product_name: "Tomato".to_owned(),
            unit: UnitOfMeasure::Kilogram,
            outbid_supplier_id: SupplierId::new("SP-1"),
            winning_supplier_id: SupplierId::new("SP-2"),
            winning_brand: "Vermelho".to_owned(),
            price_per_unit: Decimal::new(9, 1),
            window_minutes: 15,
        };
        let text = super::outbid(&contact(), &notice, "Verde Ltda");
        assert!(text.contains("beaten by Verde Ltda (Vermelho) at 0.90 per kg"));
        assert!(text.contains("15 minutes"));
    }

    #[test]
    fn reminder_reports_minutes_left() {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).single().expect("valid timestamp");
        let notice = ReminderNotice {
            supplier_id: SupplierId::new("SP-1"),
            product_name: "Tomato".to_owned(),
            brand: "Rubi".to_owned(),
            plan: ReminderPlan { remind_at: at, minutes_left: 1 },
        };
        assert_eq!(
            super::reminder(&contact(), &notice),
            "Hello Marta, 1 minute left to improve your Rubi offer for Tomato."
        );
    }
}
