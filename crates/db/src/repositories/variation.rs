use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};
use tender_core::domain::item::ProductId;
use tender_core::domain::offer::{ActingParty, OfferId};
use tender_core::domain::quotation::QuotationId;
use tender_core::domain::supplier::SupplierId;
use tender_core::domain::variation::{
    QuantityVariationRecord, ResolutionPath, ResolutionStatus, SuggestionSet, VariationClass,
    VariationRecordId,
};
use tender_core::store::{
    CommitOutcome, ResolutionCommit, StoreError, VariationInsert, VariationStore,
};

use super::offer::upsert_offer;
use super::{
    format_optional_timestamp, format_timestamp, from_json, parse_decimal, parse_enum,
    parse_optional_timestamp, parse_timestamp, parse_u32, to_json, RepositoryError,
    SqlTenderStore,
};

const VARIATION_COLUMNS: &str = "id, offer_id, quotation_id, product_id, supplier_id,
    requested_quantity, offered_quantity, variation, variation_percent, classification,
    suggestions_json, status, applied_packages, resolution_path, resolved_by, created_at,
    resolved_at";

#[async_trait]
impl VariationStore for SqlTenderStore {
    async fn find_variation(
        &self,
        id: &VariationRecordId,
    ) -> Result<Option<QuantityVariationRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {VARIATION_COLUMNS} FROM quantity_variation WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(variation_from_row).transpose()?)
    }

    async fn variation_for_offer(
        &self,
        offer_id: &OfferId,
    ) -> Result<Option<QuantityVariationRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {VARIATION_COLUMNS} FROM quantity_variation WHERE offer_id = ?"
        ))
        .bind(&offer_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(variation_from_row).transpose()?)
    }

    async fn variations_for_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<QuantityVariationRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {VARIATION_COLUMNS} FROM quantity_variation
             WHERE quotation_id = ?
             ORDER BY rowid ASC"
        ))
        .bind(&quotation_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(variation_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn create_variation_if_absent(
        &self,
        record: QuantityVariationRecord,
    ) -> Result<VariationInsert, StoreError> {
        let suggestions = to_json("suggestions_json", &record.suggestions)?;
        let inserted = sqlx::query(
            "INSERT INTO quantity_variation (
                id, offer_id, quotation_id, product_id, supplier_id, requested_quantity,
                offered_quantity, variation, variation_percent, classification, suggestions_json,
                status, applied_packages, resolution_path, resolved_by, created_at, resolved_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(offer_id) DO NOTHING",
        )
        .bind(&record.id.0)
        .bind(&record.offer_id.0)
        .bind(&record.quotation_id.0)
        .bind(&record.product_id.0)
        .bind(&record.supplier_id.0)
        .bind(record.requested_quantity.to_string())
        .bind(record.offered_quantity.to_string())
        .bind(record.variation.to_string())
        .bind(record.variation_percent.to_string())
        .bind(record.classification.as_str())
        .bind(suggestions)
        .bind(record.status.as_str())
        .bind(record.applied_packages.map(i64::from))
        .bind(record.resolution_path.map(|path| path.as_str()))
        .bind(record.resolved_by.map(|party| party.as_str()))
        .bind(format_timestamp(&record.created_at))
        .bind(format_optional_timestamp(record.resolved_at.as_ref()))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if inserted.rows_affected() == 1 {
            return Ok(VariationInsert { record, created: true });
        }

        let existing = self.variation_for_offer(&record.offer_id).await?.ok_or_else(|| {
            StoreError::Conflict(format!(
                "variation for offer `{}` was neither inserted nor found",
                record.offer_id
            ))
        })?;
        Ok(VariationInsert { record: existing, created: false })
    }

    async fn commit_resolution(
        &self,
        commit: ResolutionCommit,
    ) -> Result<CommitOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let applied = sqlx::query(
            "UPDATE quantity_variation
             SET status = ?, applied_packages = ?, resolution_path = ?, resolved_by = ?,
                 resolved_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(ResolutionStatus::Applied.as_str())
        .bind(i64::from(commit.applied_packages))
        .bind(commit.path.as_str())
        .bind(commit.resolved_by.as_str())
        .bind(format_timestamp(&commit.resolved_at))
        .bind(&commit.record_id.0)
        .bind(ResolutionStatus::Unresolved.as_str())
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        if applied.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 AS found FROM quantity_variation WHERE id = ?")
                .bind(&commit.record_id.0)
                .fetch_optional(&mut *tx)
                .await
                .map_err(RepositoryError::from)?;
            tx.rollback().await.map_err(RepositoryError::from)?;
            return match exists {
                Some(_) => Ok(CommitOutcome::AlreadyApplied),
                None => Err(StoreError::Conflict(format!(
                    "variation record `{}` does not exist",
                    commit.record_id
                ))),
            };
        }

        if let Some(offer) = &commit.offer {
            if let Some(observed) = &commit.observed_offer_at {
                let stored: Option<String> =
                    sqlx::query_scalar("SELECT updated_at FROM offer WHERE id = ?")
                        .bind(&offer.id.0)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(RepositoryError::from)?;
                if stored.as_deref() != Some(format_timestamp(observed).as_str()) {
                    tx.rollback().await.map_err(RepositoryError::from)?;
                    return Ok(CommitOutcome::OfferChanged);
                }
            }
            upsert_offer(&mut *tx, offer).await?;
        }

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(CommitOutcome::Applied)
    }
}

fn variation_from_row(row: SqliteRow) -> Result<QuantityVariationRecord, RepositoryError> {
    let classification_raw = row.try_get::<String, _>("classification")?;
    let status_raw = row.try_get::<String, _>("status")?;
    let suggestions_raw = row.try_get::<String, _>("suggestions_json")?;
    let suggestions: SuggestionSet = from_json("suggestions_json", &suggestions_raw)?;

    let resolution_path = row
        .try_get::<Option<String>, _>("resolution_path")?
        .map(|raw| parse_enum("resolution path", &raw, ResolutionPath::parse))
        .transpose()?;
    let resolved_by = row
        .try_get::<Option<String>, _>("resolved_by")?
        .map(|raw| parse_enum("acting party", &raw, ActingParty::parse))
        .transpose()?;
    let applied_packages = row
        .try_get::<Option<i64>, _>("applied_packages")?
        .map(|value| parse_u32("applied_packages", value))
        .transpose()?;

    Ok(QuantityVariationRecord {
        id: VariationRecordId(row.try_get("id")?),
        offer_id: OfferId(row.try_get("offer_id")?),
        quotation_id: QuotationId(row.try_get("quotation_id")?),
        product_id: ProductId(row.try_get("product_id")?),
        supplier_id: SupplierId(row.try_get("supplier_id")?),
        requested_quantity: parse_decimal("requested_quantity", row.try_get("requested_quantity")?)?,
        offered_quantity: parse_decimal("offered_quantity", row.try_get("offered_quantity")?)?,
        variation: parse_decimal("variation", row.try_get("variation")?)?,
        variation_percent: parse_decimal("variation_percent", row.try_get("variation_percent")?)?,
        classification: parse_enum("classification", &classification_raw, VariationClass::parse)?,
        suggestions,
        status: parse_enum("resolution status", &status_raw, ResolutionStatus::parse)?,
        applied_packages,
        resolution_path,
        resolved_by,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        resolved_at: parse_optional_timestamp("resolved_at", row.try_get("resolved_at")?)?,
    })
}
