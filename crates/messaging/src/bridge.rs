use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("messaging bridge is misconfigured: {0}")]
    Configuration(String),
    #[error("message delivery failed: {0}")]
    Transport(String),
    #[error("messaging endpoint rejected the message with status {status}")]
    Rejected { status: u16 },
    #[error("message could not be queued: {0}")]
    Queue(String),
}

/// A single chat message addressed to a normalized phone number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub recipient: String,
    pub text: String,
    /// Correlates the message with the quotation it is about.
    pub reference: Option<String>,
}

impl OutboundMessage {
    /// Returns `None` when the recipient holds no digits at all.
    pub fn new(
        recipient: &str,
        text: impl Into<String>,
        reference: Option<String>,
    ) -> Option<Self> {
        let recipient = normalize_phone(recipient);
        if recipient.is_empty() {
            return None;
        }
        Some(Self { recipient, text: text.into(), reference })
    }
}

/// Strips formatting from a phone-like address, keeping digits only.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

#[async_trait]
pub trait MessagingBridge: Send + Sync {
    async fn deliver(&self, message: OutboundMessage) -> Result<(), BridgeError>;
}

/// Delivers and logs; a failed delivery never reaches the caller.
pub async fn deliver_best_effort(bridge: &dyn MessagingBridge, message: OutboundMessage) {
    let recipient = message.recipient.clone();
    let reference = message.reference.clone();
    if let Err(error) = bridge.deliver(message).await {
        warn!(
            event_name = "messaging.bridge.delivery_failed",
            recipient = %recipient,
            reference = reference.as_deref().unwrap_or(""),
            error = %error,
            "outbound message was not delivered"
        );
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopBridge;

#[async_trait]
impl MessagingBridge for NoopBridge {
    async fn deliver(&self, _message: OutboundMessage) -> Result<(), BridgeError> {
        Ok(())
    }
}

/// Keeps every delivered message in memory.
#[derive(Default)]
pub struct RecordingBridge {
    messages: Mutex<Vec<OutboundMessage>>,
    failing: bool,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bridge whose deliveries always fail with a transport error.
    pub fn failing() -> Self {
        Self { messages: Mutex::new(Vec::new()), failing: true }
    }

    pub async fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().await.clone()
    }

    pub async fn messages_to(&self, recipient: &str) -> Vec<OutboundMessage> {
        let recipient = normalize_phone(recipient);
        self.messages
            .lock()
            .await
            .iter()
            .filter(|message| message.recipient == recipient)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MessagingBridge for RecordingBridge {
    async fn deliver(&self, message: OutboundMessage) -> Result<(), BridgeError> {
        if self.failing {
            return Err(BridgeError::Transport("recording bridge configured to fail".to_owned()));
        }
        self.messages.lock().await.push(message);
        Ok(())
    }
}
