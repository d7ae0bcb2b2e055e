use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};
use tender_core::domain::brand::{BrandProposal, BrandProposalId, ProposalStatus};
use tender_core::domain::item::ProductId;
use tender_core::domain::offer::{OfferId, Packaging};
use tender_core::domain::quotation::QuotationId;
use tender_core::domain::supplier::SupplierId;
use tender_core::store::{ProposalDecision, ProposalStore, StoreError};

use super::offer::upsert_offer;
use super::{
    format_optional_timestamp, format_timestamp, parse_decimal, parse_enum,
    parse_optional_timestamp, parse_timestamp, parse_u32, RepositoryError, SqlTenderStore,
};

const PROPOSAL_COLUMNS: &str = "id, quotation_id, product_id, supplier_id, brand, package_count,
    content_per_package, price_per_package, status, offer_id, created_at, decided_at";

#[async_trait]
impl ProposalStore for SqlTenderStore {
    async fn find_proposal(
        &self,
        id: &BrandProposalId,
    ) -> Result<Option<BrandProposal>, StoreError> {
        let row =
            sqlx::query(&format!("SELECT {PROPOSAL_COLUMNS} FROM brand_proposal WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

        Ok(row.map(proposal_from_row).transpose()?)
    }

    async fn save_proposal(&self, proposal: BrandProposal) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO brand_proposal (
                id, quotation_id, product_id, supplier_id, brand, package_count,
                content_per_package, price_per_package, status, offer_id, created_at, decided_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                brand = excluded.brand,
                package_count = excluded.package_count,
                content_per_package = excluded.content_per_package,
                price_per_package = excluded.price_per_package,
                status = excluded.status,
                offer_id = excluded.offer_id,
                decided_at = excluded.decided_at",
        )
        .bind(&proposal.id.0)
        .bind(&proposal.quotation_id.0)
        .bind(&proposal.product_id.0)
        .bind(&proposal.supplier_id.0)
        .bind(&proposal.brand)
        .bind(i64::from(proposal.packaging.package_count))
        .bind(proposal.packaging.content_per_package.to_string())
        .bind(proposal.packaging.price_per_package.to_string())
        .bind(proposal.status.as_str())
        .bind(proposal.offer_id.as_ref().map(|id| id.0.clone()))
        .bind(format_timestamp(&proposal.created_at))
        .bind(format_optional_timestamp(proposal.decided_at.as_ref()))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn proposals_for_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<BrandProposal>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM brand_proposal
             WHERE quotation_id = ?
             ORDER BY rowid ASC"
        ))
        .bind(&quotation_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(proposal_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn decide_proposal(&self, decision: ProposalDecision) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let decided = sqlx::query(
            "UPDATE brand_proposal
             SET status = ?, decided_at = ?, offer_id = ?
             WHERE id = ? AND status = ?",
        )
        .bind(decision.status.as_str())
        .bind(format_timestamp(&decision.decided_at))
        .bind(decision.offer.as_ref().map(|offer| offer.id.0.clone()))
        .bind(&decision.proposal_id.0)
        .bind(ProposalStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        if decided.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 AS found FROM brand_proposal WHERE id = ?")
                .bind(&decision.proposal_id.0)
                .fetch_optional(&mut *tx)
                .await
                .map_err(RepositoryError::from)?;
            tx.rollback().await.map_err(RepositoryError::from)?;
            return match exists {
                Some(_) => Ok(false),
                None => Err(StoreError::Conflict(format!(
                    "brand proposal `{}` does not exist",
                    decision.proposal_id
                ))),
            };
        }

        if let Some(offer) = &decision.offer {
            upsert_offer(&mut *tx, offer).await?;
        }

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(true)
    }
}

fn proposal_from_row(row: SqliteRow) -> Result<BrandProposal, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;

    Ok(BrandProposal {
        id: BrandProposalId(row.try_get("id")?),
        quotation_id: QuotationId(row.try_get("quotation_id")?),
        product_id: ProductId(row.try_get("product_id")?),
        supplier_id: SupplierId(row.try_get("supplier_id")?),
        brand: row.try_get("brand")?,
        packaging: Packaging {
            package_count: parse_u32("package_count", row.try_get("package_count")?)?,
            content_per_package: parse_decimal(
                "content_per_package",
                row.try_get("content_per_package")?,
            )?,
            price_per_package: parse_decimal("price_per_package", row.try_get("price_per_package")?)?,
        },
        status: parse_enum("proposal status", &status_raw, ProposalStatus::parse)?,
        offer_id: row.try_get::<Option<String>, _>("offer_id")?.map(OfferId),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        decided_at: parse_optional_timestamp("decided_at", row.try_get("decided_at")?)?,
    })
}
