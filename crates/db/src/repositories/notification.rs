use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};
use tender_core::domain::item::ProductId;
use tender_core::domain::quotation::QuotationId;
use tender_core::domain::supplier::SupplierId;
use tender_core::notify::{
    NotificationContext, NotificationId, NotificationPriority, NotificationRecord,
};
use tender_core::store::{NotificationStore, StoreError};

use super::{format_timestamp, parse_enum, parse_timestamp, RepositoryError, SqlTenderStore};

#[async_trait]
impl NotificationStore for SqlTenderStore {
    async fn append_notification(&self, record: NotificationRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO notification (
                id, context, event_type, title, message, priority, action_url, quotation_id,
                product_id, supplier_id, read, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id.0)
        .bind(record.context.as_str())
        .bind(&record.event_type)
        .bind(&record.title)
        .bind(&record.message)
        .bind(record.priority.as_str())
        .bind(record.action_url.as_deref())
        .bind(record.quotation_id.as_ref().map(|id| id.0.as_str()))
        .bind(record.product_id.as_ref().map(|id| id.0.as_str()))
        .bind(record.supplier_id.as_ref().map(|id| id.0.as_str()))
        .bind(record.read)
        .bind(format_timestamp(&record.created_at))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn notifications_for_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, context, event_type, title, message, priority, action_url, quotation_id,
                    product_id, supplier_id, read, created_at
             FROM notification
             WHERE quotation_id = ?
             ORDER BY rowid ASC",
        )
        .bind(&quotation_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(notification_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn mark_notification_read(&self, id: &NotificationId) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE notification SET read = 1 WHERE id = ? AND read = 0")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(result.rows_affected() == 1)
    }
}

fn notification_from_row(row: SqliteRow) -> Result<NotificationRecord, RepositoryError> {
    let context_raw = row.try_get::<String, _>("context")?;
    let priority_raw = row.try_get::<String, _>("priority")?;

    Ok(NotificationRecord {
        id: NotificationId(row.try_get("id")?),
        context: parse_enum("notification context", &context_raw, NotificationContext::parse)?,
        event_type: row.try_get("event_type")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        priority: parse_enum("notification priority", &priority_raw, NotificationPriority::parse)?,
        action_url: row.try_get("action_url")?,
        quotation_id: row.try_get::<Option<String>, _>("quotation_id")?.map(QuotationId),
        product_id: row.try_get::<Option<String>, _>("product_id")?.map(ProductId),
        supplier_id: row.try_get::<Option<String>, _>("supplier_id")?.map(SupplierId),
        read: row.try_get("read")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
