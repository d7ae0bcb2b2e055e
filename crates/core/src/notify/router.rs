use chrono::{DateTime, Utc};

use super::{
    NotificationContext, NotificationId, NotificationPriority, NotificationRecord, TenderEvent,
};

/// Static routing data for one event type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteTemplate {
    pub context: NotificationContext,
    pub priority: NotificationPriority,
    pub title: &'static str,
    /// Deep link with `{quotationId}`, `{productId}` and `{supplierId}` placeholders.
    pub url: &'static str,
}

pub fn route_template(event: &TenderEvent) -> RouteTemplate {
    use NotificationContext::{Both, Buyer, Supplier};
    use NotificationPriority::{High, Low, Medium};

    let (context, priority, title, url) = match event {
        TenderEvent::BrandApprovalPending { .. } => (
            Buyer,
            High,
            "Brand approval pending",
            "/quotations/{quotationId}?tab=brand-approvals",
        ),
        TenderEvent::BrandApprovalApproved { .. } => {
            (Supplier, Medium, "Brand approved", "/portal/{supplierId}/quote/{quotationId}")
        }
        TenderEvent::BrandApprovalRejected { .. } => {
            (Supplier, Low, "Brand rejected", "/portal/{supplierId}/quote/{quotationId}")
        }
        TenderEvent::QuantityVariationDetected { .. } => (
            Buyer,
            High,
            "Quantity variation detected",
            "/quotations/{quotationId}?tab=quantity-approvals&product={productId}",
        ),
        TenderEvent::BuyerAdjustmentApplied { .. } => (
            Supplier,
            Medium,
            "Offer adjusted by the buyer",
            "/portal/{supplierId}/quote/{quotationId}",
        ),
        TenderEvent::QuantityAdjustmentApproved { .. } => (
            Buyer,
            High,
            "Quantity adjustment approved",
            "/quotations/{quotationId}?tab=quantity-approvals&product={productId}",
        ),
        TenderEvent::QuotationStarted { .. } => {
            (Buyer, High, "Quotation started", "/quotations/{quotationId}")
        }
        TenderEvent::QuotationClosed { .. } => {
            (Both, High, "Quotation closed", "/quotations/{quotationId}")
        }
        TenderEvent::OfferReceived { .. } => {
            (Buyer, Medium, "Offer received", "/quotations/{quotationId}?product={productId}")
        }
        TenderEvent::OfferOutbid { .. } => {
            (Buyer, Medium, "Offer outbid", "/quotations/{quotationId}?product={productId}")
        }
    };

    RouteTemplate { context, priority, title, url }
}

fn message(event: &TenderEvent) -> String {
    match event {
        TenderEvent::BrandApprovalPending { brand, supplier_id, .. } => {
            format!("Supplier {supplier_id} proposed the brand \"{brand}\" and awaits your approval.")
        }
        TenderEvent::BrandApprovalApproved { brand, .. } => {
            format!("Your proposed brand \"{brand}\" was approved and is now an offer.")
        }
        TenderEvent::BrandApprovalRejected { brand, .. } => {
            format!("Your proposed brand \"{brand}\" was rejected by the buyer.")
        }
        TenderEvent::QuantityVariationDetected {
            supplier_id,
            classification,
            requested_quantity,
            offered_quantity,
            ..
        } => format!(
            "Supplier {supplier_id} offered {} against {} requested ({}).",
            offered_quantity.normalize(),
            requested_quantity.normalize(),
            classification.as_str().replace('_', " ")
        ),
        TenderEvent::BuyerAdjustmentApplied { committed, .. } => format!(
            "The buyer adjusted your offer to {} packages: {} in total for {}.",
            committed.packages,
            committed.total_quantity.normalize(),
            committed.total_price.round_dp(2)
        ),
        TenderEvent::QuantityAdjustmentApproved { supplier_id, committed, .. } => format!(
            "Supplier {supplier_id} adjusted the offer to {} packages: {} in total for {}.",
            committed.packages,
            committed.total_quantity.normalize(),
            committed.total_price.round_dp(2)
        ),
        TenderEvent::QuotationStarted { deadline, .. } => {
            format!("The quotation was sent to suppliers and accepts offers until {}.", deadline.to_rfc3339())
        }
        TenderEvent::QuotationClosed { items_closed, .. } => {
            format!("The quotation no longer accepts offers; {items_closed} pending items were closed.")
        }
        TenderEvent::OfferReceived { supplier_id, brand, .. } => {
            format!("Supplier {supplier_id} submitted an offer for \"{brand}\".")
        }
        TenderEvent::OfferOutbid { supplier_id, winning_supplier_id, price_per_unit, .. } => format!(
            "Supplier {winning_supplier_id} beat supplier {supplier_id} with {} per unit.",
            price_per_unit.round_dp(4).normalize()
        ),
    }
}

/// Replaces known placeholders, then removes any placeholder left unresolved.
pub fn render_url(
    template: &str,
    quotation_id: Option<&str>,
    product_id: Option<&str>,
    supplier_id: Option<&str>,
) -> String {
    let mut url = template.to_owned();
    for (placeholder, value) in [
        ("{quotationId}", quotation_id),
        ("{productId}", product_id),
        ("{supplierId}", supplier_id),
    ] {
        if let Some(value) = value {
            url = url.replace(placeholder, value);
        }
    }
    strip_placeholders(&url)
}

fn strip_placeholders(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find('{') {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        output.push_str(&rest[..start]);
        rest = &rest[start + end + 1..];
    }
    output.push_str(rest);
    output
}

/// Turns domain events into stored notification records.
#[derive(Clone, Debug, Default)]
pub struct NotificationRouter {
    portal_base_url: Option<String>,
}

impl NotificationRouter {
    pub fn new(portal_base_url: Option<String>) -> Self {
        let portal_base_url = portal_base_url
            .map(|base| base.trim().trim_end_matches('/').to_owned())
            .filter(|base| !base.is_empty());
        Self { portal_base_url }
    }

    pub fn route(&self, event: &TenderEvent, now: DateTime<Utc>) -> NotificationRecord {
        let template = route_template(event);
        let quotation_id = event.quotation_id();
        let product_id = event.product_id();
        let supplier_id = event.supplier_id();

        let path = render_url(
            template.url,
            Some(quotation_id.as_str()),
            product_id.map(|id| id.as_str()),
            supplier_id.map(|id| id.as_str()),
        );
        let action_url = match &self.portal_base_url {
            Some(base) => format!("{base}{path}"),
            None => path,
        };

        NotificationRecord {
            id: NotificationId::generate(),
            context: template.context,
            event_type: event.event_type().to_owned(),
            title: template.title.to_owned(),
            message: message(event),
            priority: template.priority,
            action_url: Some(action_url),
            quotation_id: Some(quotation_id.clone()),
            product_id: product_id.cloned(),
            supplier_id: supplier_id.cloned(),
            read: false,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{render_url, NotificationRouter};
    use crate::domain::item::ProductId;
    use crate::domain::quotation::QuotationId;
    use crate::domain::supplier::SupplierId;
    use crate::domain::variation::{VariationClass, VariationRecordId};
    use crate::notify::{CommittedFigures, NotificationContext, NotificationPriority, TenderEvent};

    #[test]
    fn unresolved_placeholders_are_stripped() {
        assert_eq!(
            render_url("/portal/{supplierId}/quote/{quotationId}", Some("QT-1"), None, None),
            "/portal//quote/QT-1"
        );
        assert_eq!(
            render_url("/quotations/{quotationId}?x={unknown}", Some("QT-9"), None, None),
            "/quotations/QT-9?x="
        );
        assert_eq!(render_url("/broken/{quotationId", None, None, None), "/broken/{quotationId");
    }

    #[test]
    fn variation_routes_to_buyer_with_product_link() {
        let router = NotificationRouter::new(Some("https://tender.example/".to_owned()));
        let event = TenderEvent::QuantityVariationDetected {
            quotation_id: QuotationId::new("QT-1"),
            product_id: ProductId::new("PR-7"),
            supplier_id: SupplierId::new("SP-3"),
            record_id: VariationRecordId::new("QV-1"),
            classification: VariationClass::Insufficient,
            requested_quantity: Decimal::from(90),
            offered_quantity: Decimal::from(60),
        };

        let record = router.route(&event, Utc::now());
        assert_eq!(record.context, NotificationContext::Buyer);
        assert_eq!(record.priority, NotificationPriority::High);
        assert_eq!(record.event_type, "quantity_variation_detected");
        assert_eq!(
            record.action_url.as_deref(),
            Some("https://tender.example/quotations/QT-1?tab=quantity-approvals&product=PR-7")
        );
        assert!(record.message.contains("offered 60 against 90 requested (insufficient)"));
        assert!(!record.read);
    }

    #[test]
    fn supplier_adjustment_notice_links_to_portal() {
        let router = NotificationRouter::default();
        let event = TenderEvent::BuyerAdjustmentApplied {
            quotation_id: QuotationId::new("QT-1"),
            product_id: ProductId::new("PR-7"),
            supplier_id: SupplierId::new("SP-3"),
            record_id: VariationRecordId::new("QV-1"),
            committed: CommittedFigures {
                packages: 3,
                total_quantity: Decimal::from(90),
                total_price: Decimal::from(225),
            },
        };

        let record = router.route(&event, Utc::now());
        assert_eq!(record.context, NotificationContext::Supplier);
        assert_eq!(record.action_url.as_deref(), Some("/portal/SP-3/quote/QT-1"));
        assert!(record.message.contains("3 packages: 90 in total for 225"));
    }
}
