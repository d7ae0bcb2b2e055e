use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tender_core::config::MessagingConfig;
use tracing::{debug, info, warn};

use crate::bridge::{BridgeError, MessagingBridge, OutboundMessage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl DeliveryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    to: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<&'a str>,
}

/// Posts each message as JSON to a chat gateway.
pub struct WebhookBridge {
    client: Client,
    url: String,
    auth_token: Option<SecretString>,
    policy: DeliveryPolicy,
}

impl WebhookBridge {
    pub fn new(
        url: impl Into<String>,
        auth_token: Option<SecretString>,
        timeout: Duration,
        policy: DeliveryPolicy,
    ) -> Result<Self, BridgeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| BridgeError::Configuration(error.to_string()))?;
        Ok(Self { client, url: url.into(), auth_token, policy })
    }

    /// `None` when messaging is disabled.
    pub fn from_config(config: &MessagingConfig) -> Result<Option<Self>, BridgeError> {
        if !config.enabled {
            return Ok(None);
        }
        let url = config.webhook_url.clone().ok_or_else(|| {
            BridgeError::Configuration("messaging.webhook_url is required".to_owned())
        })?;
        let policy = DeliveryPolicy {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        };
        Self::new(url, config.auth_token.clone(), Duration::from_secs(config.timeout_secs), policy)
            .map(Some)
    }

    async fn attempt(&self, message: &OutboundMessage) -> Result<(), BridgeError> {
        let payload = WebhookPayload {
            to: &message.recipient,
            text: &message.text,
            reference: message.reference.as_deref(),
        };
        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| BridgeError::Transport(error.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BridgeError::Rejected { status: status.as_u16() })
        }
    }
}

fn is_retryable(error: &BridgeError) -> bool {
    match error {
        BridgeError::Transport(_) => true,
        BridgeError::Rejected { status } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
        }
        BridgeError::Configuration(_) | BridgeError::Queue(_) => false,
    }
}

#[async_trait]
impl MessagingBridge for WebhookBridge {
    async fn deliver(&self, message: OutboundMessage) -> Result<(), BridgeError> {
        let mut attempt = 0_u32;
        loop {
            match self.attempt(&message).await {
                Ok(()) => {
                    info!(
                        event_name = "messaging.webhook.delivered",
                        recipient = %message.recipient,
                        attempt,
                        "message delivered"
                    );
                    return Ok(());
                }
                Err(error) if is_retryable(&error) && attempt < self.policy.max_retries => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        event_name = "messaging.webhook.retry",
                        recipient = %message.recipient,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "message delivery failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    debug!(
                        event_name = "messaging.webhook.gave_up",
                        recipient = %message.recipient,
                        attempt,
                        "message delivery abandoned"
                    );
                    return Err(error);
                }
            }
        }
    }
}
