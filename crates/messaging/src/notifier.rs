use std::sync::Arc;

use async_trait::async_trait;
use tender_core::directory::SupplierDirectory;
use tender_core::domain::quotation::Quotation;
use tender_core::domain::supplier::{SupplierContact, SupplierId};
use tender_core::observer::{OutbidNotice, QuotationObserver, ReminderNotice};
use tracing::{debug, warn};

use crate::bridge::{deliver_best_effort, MessagingBridge, OutboundMessage};
use crate::templates;

/// Sends chat messages to suppliers and buyers as a quotation moves through its lifecycle.
pub struct TenderNotifier<D> {
    bridge: Arc<dyn MessagingBridge>,
    directory: D,
    portal_base_url: Option<String>,
}

impl<D: SupplierDirectory> TenderNotifier<D> {
    pub fn new(bridge: Arc<dyn MessagingBridge>, directory: D) -> Self {
        Self { bridge, directory, portal_base_url: None }
    }

    pub fn with_portal_base_url(mut self, portal_base_url: Option<String>) -> Self {
        self.portal_base_url = portal_base_url;
        self
    }

    /// Reminds an outbid supplier that their counter-proposal window is running out.
    pub async fn remind(&self, quotation: &Quotation, notice: &ReminderNotice) {
        if let Some(contact) = self.contact(&notice.supplier_id).await {
            let text = templates::reminder(&contact, notice);
            self.send(&contact, quotation, text).await;
        }
    }

    async fn contact(&self, supplier_id: &SupplierId) -> Option<SupplierContact> {
        match self.directory.find(supplier_id).await {
            Ok(Some(contact)) => Some(contact),
            Ok(None) => {
                warn!(
                    event_name = "messaging.notifier.unknown_supplier",
                    supplier_id = %supplier_id,
                    "supplier has no directory entry; message skipped"
                );
                None
            }
            Err(error) => {
                warn!(
                    event_name = "messaging.notifier.directory_failed",
                    supplier_id = %supplier_id,
                    error = %error,
                    "supplier lookup failed; message skipped"
                );
                None
            }
        }
    }

    async fn send(&self, contact: &SupplierContact, quotation: &Quotation, text: String) {
        let Some(phone) = contact.phone.as_deref() else {
            debug!(
                event_name = "messaging.notifier.no_phone",
                supplier_id = %contact.id,
                "supplier has no messaging address"
            );
            return;
        };
        self.send_to(phone, quotation, text).await;
    }

    async fn send_to(&self, phone: &str, quotation: &Quotation, text: String) {
        match OutboundMessage::new(phone, text, Some(quotation.id.to_string())) {
            Some(message) => deliver_best_effort(self.bridge.as_ref(), message).await,
            None => warn!(
                event_name = "messaging.notifier.invalid_recipient",
                quotation_id = %quotation.id,
                "recipient has no digits after normalization; message skipped"
            ),
        }
    }
}

#[async_trait]
impl<D: SupplierDirectory> QuotationObserver for TenderNotifier<D> {
    async fn quotation_started(&self, quotation: &Quotation) {
        let link = templates::quotation_link(self.portal_base_url.as_deref(), quotation);
        for supplier_id in &quotation.invited_suppliers {
            if let Some(contact) = self.contact(supplier_id).await {
                let text = templates::invitation(&contact, quotation, &link);
                self.send(&contact, quotation, text).await;
            }
        }
    }

    async fn quotation_closed(&self, quotation: &Quotation, items_closed: u32) {
        for supplier_id in &quotation.invited_suppliers {
            if let Some(contact) = self.contact(supplier_id).await {
                let text = templates::supplier_closure(&contact, quotation);
                self.send(&contact, quotation, text).await;
            }
        }

        match self.directory.buyer_phone(&quotation.buyer_id).await {
            Ok(Some(phone)) => {
                let text = templates::buyer_closure(quotation, items_closed);
                self.send_to(&phone, quotation, text).await;
            }
            Ok(None) => debug!(
                event_name = "messaging.notifier.no_buyer_phone",
                quotation_id = %quotation.id,
                "buyer has no messaging address"
            ),
            Err(error) => warn!(
                event_name = "messaging.notifier.directory_failed",
                quotation_id = %quotation.id,
                error = %error,
                "buyer lookup failed; closure message skipped"
            ),
        }
    }

    async fn offer_outbid(&self, quotation: &Quotation, notice: &OutbidNotice) {
        let Some(contact) = self.contact(&notice.outbid_supplier_id).await else {
            return;
        };
        let winner_name = match self.directory.find(&notice.winning_supplier_id).await {
            Ok(Some(winner)) => winner.company_name,
            _ => notice.winning_supplier_id.to_string(),
        };
        let text = templates::outbid(&contact, notice, &winner_name);
        self.send(&contact, quotation, text).await;
    }

    async fn counter_proposal_reminder(&self, quotation: &Quotation, notice: &ReminderNotice) {
        self.remind(quotation, notice).await;
    }
}
