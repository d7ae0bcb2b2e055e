use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tender_core::domain::item::{ItemStatus, ProductId, RequestedItem, UnitOfMeasure};
use tender_core::domain::quotation::{
    BuyerId, Quotation, QuotationId, QuotationStatus, ShoppingListId,
};
use tender_core::domain::supplier::SupplierId;
use tender_core::store::{QuotationStore, StatusUpdate, StoreError};

use super::{
    affected_count, format_optional_timestamp, format_timestamp, from_json, parse_decimal,
    parse_enum, parse_timestamp, parse_u32, parse_u8, to_json, RepositoryError, SqlTenderStore,
};

const QUOTATION_COLUMNS: &str = "id, name, status, deadline, counter_proposal_window_minutes,
    counter_proposal_reminder_percent, invited_suppliers_json, shopping_list_id, buyer_id,
    created_at, updated_at";

#[async_trait]
impl QuotationStore for SqlTenderStore {
    async fn find_quotation(&self, id: &QuotationId) -> Result<Option<Quotation>, StoreError> {
        let row = sqlx::query(&format!("SELECT {QUOTATION_COLUMNS} FROM quotation WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(quotation_from_row).transpose()?)
    }

    async fn save_quotation(&self, quotation: Quotation) -> Result<(), StoreError> {
        let invited = to_json("invited_suppliers_json", &quotation.invited_suppliers)?;
        sqlx::query(
            "INSERT INTO quotation (
                id, name, status, deadline, counter_proposal_window_minutes,
                counter_proposal_reminder_percent, invited_suppliers_json, shopping_list_id,
                buyer_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                status = excluded.status,
                deadline = excluded.deadline,
                counter_proposal_window_minutes = excluded.counter_proposal_window_minutes,
                counter_proposal_reminder_percent = excluded.counter_proposal_reminder_percent,
                invited_suppliers_json = excluded.invited_suppliers_json,
                shopping_list_id = excluded.shopping_list_id,
                buyer_id = excluded.buyer_id,
                updated_at = excluded.updated_at",
        )
        .bind(&quotation.id.0)
        .bind(&quotation.name)
        .bind(quotation.status.as_str())
        .bind(format_timestamp(&quotation.deadline))
        .bind(i64::from(quotation.counter_proposal_window_minutes))
        .bind(i64::from(quotation.counter_proposal_reminder_percent))
        .bind(invited)
        .bind(&quotation.shopping_list_id.0)
        .bind(&quotation.buyer_id.0)
        .bind(format_timestamp(&quotation.created_at))
        .bind(format_timestamp(&quotation.updated_at))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Quotation>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotation
             WHERE status = ? AND deadline <= ?
             ORDER BY deadline ASC, id ASC"
        ))
        .bind(QuotationStatus::Open.as_str())
        .bind(format_timestamp(&now))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(quotation_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn compare_and_set_status(
        &self,
        id: &QuotationId,
        expected: QuotationStatus,
        update: StatusUpdate,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE quotation
             SET status = ?, deadline = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(update.status.as_str())
        .bind(format_timestamp(&update.deadline))
        .bind(format_timestamp(&update.updated_at))
        .bind(&id.0)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn close_quotation(
        &self,
        id: &QuotationId,
        expected: QuotationStatus,
        expired_by: Option<DateTime<Utc>>,
        closed_at: DateTime<Utc>,
    ) -> Result<Option<u32>, StoreError> {
        let expired_by = format_optional_timestamp(expired_by.as_ref());
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let closed = sqlx::query(
            "UPDATE quotation SET status = ?, updated_at = ?
             WHERE id = ? AND status = ? AND (? IS NULL OR deadline <= ?)",
        )
        .bind(QuotationStatus::Closed.as_str())
        .bind(format_timestamp(&closed_at))
        .bind(&id.0)
        .bind(expected.as_str())
        .bind(expired_by.as_deref())
        .bind(expired_by.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        if closed.rows_affected() == 0 {
            tx.rollback().await.map_err(RepositoryError::from)?;
            return Ok(None);
        }

        let items = sqlx::query(
            "UPDATE requested_item SET status = ? WHERE quotation_id = ? AND status = ?",
        )
        .bind(ItemStatus::Closed.as_str())
        .bind(&id.0)
        .bind(ItemStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(Some(affected_count(items.rows_affected())))
    }

    async fn find_items(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<RequestedItem>, StoreError> {
        let rows = sqlx::query(
            "SELECT quotation_id, product_id, name, unit, requested_quantity,
                    preferred_brands_json, status
             FROM requested_item
             WHERE quotation_id = ?
             ORDER BY product_id ASC",
        )
        .bind(&quotation_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(item_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_item(
        &self,
        quotation_id: &QuotationId,
        product_id: &ProductId,
    ) -> Result<Option<RequestedItem>, StoreError> {
        let row = sqlx::query(
            "SELECT quotation_id, product_id, name, unit, requested_quantity,
                    preferred_brands_json, status
             FROM requested_item
             WHERE quotation_id = ? AND product_id = ?",
        )
        .bind(&quotation_id.0)
        .bind(&product_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(item_from_row).transpose()?)
    }

    async fn save_item(&self, item: RequestedItem) -> Result<(), StoreError> {
        let brands = to_json("preferred_brands_json", &item.preferred_brands)?;
        sqlx::query(
            "INSERT INTO requested_item (
                quotation_id, product_id, name, unit, requested_quantity,
                preferred_brands_json, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(quotation_id, product_id) DO UPDATE SET
                name = excluded.name,
                unit = excluded.unit,
                requested_quantity = excluded.requested_quantity,
                preferred_brands_json = excluded.preferred_brands_json,
                status = excluded.status",
        )
        .bind(&item.quotation_id.0)
        .bind(&item.product_id.0)
        .bind(&item.name)
        .bind(item.unit.as_str())
        .bind(item.requested_quantity.to_string())
        .bind(brands)
        .bind(item.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }
}

fn quotation_from_row(row: SqliteRow) -> Result<Quotation, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = parse_enum("quotation status", &status_raw, QuotationStatus::parse)?;
    let invited_raw = row.try_get::<String, _>("invited_suppliers_json")?;
    let invited_suppliers: Vec<SupplierId> = from_json("invited_suppliers_json", &invited_raw)?;

    Ok(Quotation {
        id: QuotationId(row.try_get("id")?),
        name: row.try_get("name")?,
        status,
        deadline: parse_timestamp("deadline", row.try_get("deadline")?)?,
        counter_proposal_window_minutes: parse_u32(
            "counter_proposal_window_minutes",
            row.try_get("counter_proposal_window_minutes")?,
        )?,
        counter_proposal_reminder_percent: parse_u8(
            "counter_proposal_reminder_percent",
            row.try_get("counter_proposal_reminder_percent")?,
        )?,
        invited_suppliers,
        shopping_list_id: ShoppingListId(row.try_get("shopping_list_id")?),
        buyer_id: BuyerId(row.try_get("buyer_id")?),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn item_from_row(row: SqliteRow) -> Result<RequestedItem, RepositoryError> {
    let unit_raw = row.try_get::<String, _>("unit")?;
    let status_raw = row.try_get::<String, _>("status")?;
    let brands_raw = row.try_get::<String, _>("preferred_brands_json")?;

    Ok(RequestedItem {
        product_id: ProductId(row.try_get("product_id")?),
        quotation_id: QuotationId(row.try_get("quotation_id")?),
        name: row.try_get("name")?,
        unit: parse_enum("unit of measure", &unit_raw, UnitOfMeasure::parse)?,
        requested_quantity: parse_decimal("requested_quantity", row.try_get("requested_quantity")?)?,
        preferred_brands: from_json("preferred_brands_json", &brands_raw)?,
        status: parse_enum("item status", &status_raw, ItemStatus::parse)?,
    })
}
