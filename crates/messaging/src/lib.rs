//! Outbound chat messaging for quotation participants.
//!
//! - **Bridges** (`bridge`) - the `MessagingBridge` port plus noop and recording implementations
//! - **Webhook** (`webhook`) - HTTP delivery with bearer auth and exponential retry
//! - **Templates** (`templates`) - message bodies for invitations, closures, outbids and reminders
//! - **Notifier** (`notifier`) - lifecycle observer that resolves contacts and delivers messages
//!
//! Delivery is fire-and-forget from the engine's point of view: failures are logged, never
//! propagated back into a committed state change.

pub mod bridge;
pub mod notifier;
pub mod templates;
pub mod webhook;

use std::sync::Arc;

use tender_core::config::MessagingConfig;

pub use bridge::{
    deliver_best_effort, normalize_phone, BridgeError, MessagingBridge, NoopBridge, OutboundMessage,
    RecordingBridge,
};
pub use notifier::TenderNotifier;
pub use webhook::{DeliveryPolicy, WebhookBridge};

/// Builds the bridge described by configuration; a disabled bridge becomes a no-op.
pub fn bridge_from_config(
    config: &MessagingConfig,
) -> Result<Arc<dyn MessagingBridge>, BridgeError> {
    match WebhookBridge::from_config(config)? {
        Some(webhook) => Ok(Arc::new(webhook)),
        None => Ok(Arc::new(NoopBridge)),
    }
}
