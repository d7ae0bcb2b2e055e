//! Durable queue for outbound chat messages.
//!
//! `OutboxBridge` only records a `pending` row, so delivering a message never blocks or fails a
//! lifecycle change. `relay_pending` later drains the queue through a delivering bridge.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};
use tender_messaging::{BridgeError, MessagingBridge, OutboundMessage};
use tracing::{info, warn};
use uuid::Uuid;

use crate::repositories::{
    format_timestamp, parse_enum, parse_timestamp, parse_u32, RepositoryError,
};
use crate::DbPool;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Sent,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: String,
    pub recipient: String,
    pub body: String,
    pub reference: Option<String>,
    pub status: OutboxStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutboxMessage {
    pub fn to_outbound(&self) -> OutboundMessage {
        OutboundMessage {
            recipient: self.recipient.clone(),
            text: self.body.clone(),
            reference: self.reference.clone(),
        }
    }
}

pub struct SqlOutboxRepository {
    pool: DbPool,
}

impl SqlOutboxRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(
        &self,
        message: &OutboundMessage,
        now: DateTime<Utc>,
    ) -> Result<OutboxMessage, RepositoryError> {
        let queued = OutboxMessage {
            id: format!("OM-{}", Uuid::new_v4().simple()),
            recipient: message.recipient.clone(),
            body: message.text.clone(),
            reference: message.reference.clone(),
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO outbound_message (
                id, recipient, body, reference, status, attempts, last_error, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&queued.id)
        .bind(&queued.recipient)
        .bind(&queued.body)
        .bind(queued.reference.as_deref())
        .bind(queued.status.as_str())
        .bind(i64::from(queued.attempts))
        .bind(queued.last_error.as_deref())
        .bind(format_timestamp(&queued.created_at))
        .bind(format_timestamp(&queued.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(queued)
    }

    /// Oldest pending messages first.
    pub async fn pending(&self, limit: u32) -> Result<Vec<OutboxMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, recipient, body, reference, status, attempts, last_error, created_at,
                    updated_at
             FROM outbound_message
             WHERE status = ?
             ORDER BY created_at ASC, rowid ASC
             LIMIT ?",
        )
        .bind(OutboxStatus::Pending.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(outbox_from_row).collect()
    }

    pub async fn find(&self, id: &str) -> Result<Option<OutboxMessage>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, recipient, body, reference, status, attempts, last_error, created_at,
                    updated_at
             FROM outbound_message
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(outbox_from_row).transpose()
    }

    pub async fn mark_sent(&self, id: &str, now: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE outbound_message
             SET status = ?, attempts = attempts + 1, last_error = NULL, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(OutboxStatus::Sent.as_str())
        .bind(format_timestamp(&now))
        .bind(id)
        .bind(OutboxStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Records a failed attempt; the message stays pending until `max_attempts` is reached.
    pub async fn mark_failed(
        &self,
        id: &str,
        error: &str,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<OutboxStatus>, RepositoryError> {
        let result = sqlx::query(
            "UPDATE outbound_message
             SET attempts = attempts + 1,
                 status = CASE WHEN attempts + 1 >= ? THEN ? ELSE ? END,
                 last_error = ?,
                 updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(i64::from(max_attempts))
        .bind(OutboxStatus::Failed.as_str())
        .bind(OutboxStatus::Pending.as_str())
        .bind(error)
        .bind(format_timestamp(&now))
        .bind(id)
        .bind(OutboxStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(self.find(id).await?.map(|message| message.status))
    }
}

fn outbox_from_row(row: SqliteRow) -> Result<OutboxMessage, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;

    Ok(OutboxMessage {
        id: row.try_get("id")?,
        recipient: row.try_get("recipient")?,
        body: row.try_get("body")?,
        reference: row.try_get("reference")?,
        status: parse_enum("outbox status", &status_raw, OutboxStatus::parse)?,
        attempts: parse_u32("attempts", row.try_get("attempts")?)?,
        last_error: row.try_get("last_error")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

/// Messaging bridge that queues instead of delivering.
pub struct OutboxBridge {
    repository: SqlOutboxRepository,
}

impl OutboxBridge {
    pub fn new(pool: DbPool) -> Self {
        Self { repository: SqlOutboxRepository::new(pool) }
    }
}

#[async_trait]
impl MessagingBridge for OutboxBridge {
    async fn deliver(&self, message: OutboundMessage) -> Result<(), BridgeError> {
        let queued = self
            .repository
            .enqueue(&message, Utc::now())
            .await
            .map_err(|error| BridgeError::Queue(error.to_string()))?;
        info!(
            event_name = "messaging.outbox.enqueued",
            message_id = %queued.id,
            reference = queued.reference.as_deref().unwrap_or(""),
            "outbound message queued"
        );
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RelayReport {
    pub attempted: u32,
    pub sent: u32,
    pub retrying: u32,
    pub failed: u32,
}

/// Hands up to `limit` pending messages to `bridge`, recording each outcome.
pub async fn relay_pending(
    repository: &SqlOutboxRepository,
    bridge: &dyn MessagingBridge,
    limit: u32,
    max_attempts: u32,
    now: DateTime<Utc>,
) -> Result<RelayReport, RepositoryError> {
    let mut report = RelayReport::default();
    for message in repository.pending(limit).await? {
        report.attempted += 1;
        match bridge.deliver(message.to_outbound()).await {
            Ok(()) => {
                if repository.mark_sent(&message.id, now).await? {
                    report.sent += 1;
                }
            }
            Err(error) => {
                let status = repository
                    .mark_failed(&message.id, &error.to_string(), max_attempts, now)
                    .await?;
                warn!(
                    event_name = "messaging.outbox.delivery_failed",
                    message_id = %message.id,
                    attempts = message.attempts + 1,
                    error = %error,
                    "queued message delivery failed"
                );
                match status {
                    Some(OutboxStatus::Failed) => report.failed += 1,
                    Some(_) => report.retrying += 1,
                    None => {}
                }
            }
        }
    }
    Ok(report)
}
