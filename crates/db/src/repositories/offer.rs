use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, Sqlite};
use tender_core::domain::item::{ProductId, UnitClass};
use tender_core::domain::offer::{AdjustmentEntry, Offer, OfferId, Packaging};
use tender_core::domain::quotation::QuotationId;
use tender_core::domain::supplier::SupplierId;
use tender_core::store::{OfferStore, StoreError};

use super::{
    format_timestamp, from_json, parse_decimal, parse_enum, parse_optional_decimal,
    parse_timestamp, parse_u32, to_json, RepositoryError, SqlTenderStore,
};

const OFFER_COLUMNS: &str = "id, quotation_id, product_id, supplier_id, brand, unit_class,
    package_count, content_per_package, price_per_package, total_quantity, price_per_unit,
    adjustment_history_json, created_at, updated_at";

#[async_trait]
impl OfferStore for SqlTenderStore {
    async fn find_offer(&self, id: &OfferId) -> Result<Option<Offer>, StoreError> {
        let row = sqlx::query(&format!("SELECT {OFFER_COLUMNS} FROM offer WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(offer_from_row).transpose()?)
    }

    async fn offers_for_item(
        &self,
        quotation_id: &QuotationId,
        product_id: &ProductId,
    ) -> Result<Vec<Offer>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM offer
             WHERE quotation_id = ? AND product_id = ?
             ORDER BY seq ASC"
        ))
        .bind(&quotation_id.0)
        .bind(&product_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(offer_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn offers_for_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<Offer>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM offer WHERE quotation_id = ? ORDER BY seq ASC"
        ))
        .bind(&quotation_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(offer_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn save_offer(&self, offer: Offer) -> Result<(), StoreError> {
        upsert_offer(&self.pool, &offer).await?;
        Ok(())
    }
}

/// Upsert keyed on the offer id; the `seq` of an existing row is kept, so resubmissions do not
/// change submission order.
pub(crate) async fn upsert_offer<'e, E>(executor: E, offer: &Offer) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let history = to_json("adjustment_history_json", &offer.adjustment_history)?;
    sqlx::query(
        "INSERT INTO offer (
            id, quotation_id, product_id, supplier_id, brand, unit_class, package_count,
            content_per_package, price_per_package, total_quantity, price_per_unit,
            adjustment_history_json, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            brand = excluded.brand,
            unit_class = excluded.unit_class,
            package_count = excluded.package_count,
            content_per_package = excluded.content_per_package,
            price_per_package = excluded.price_per_package,
            total_quantity = excluded.total_quantity,
            price_per_unit = excluded.price_per_unit,
            adjustment_history_json = excluded.adjustment_history_json,
            updated_at = excluded.updated_at",
    )
    .bind(&offer.id.0)
    .bind(&offer.quotation_id.0)
    .bind(&offer.product_id.0)
    .bind(&offer.supplier_id.0)
    .bind(&offer.brand)
    .bind(offer.unit_class.as_str())
    .bind(i64::from(offer.packaging.package_count))
    .bind(offer.packaging.content_per_package.to_string())
    .bind(offer.packaging.price_per_package.to_string())
    .bind(offer.total_quantity.to_string())
    .bind(offer.price_per_unit.map(|price| price.to_string()))
    .bind(history)
    .bind(format_timestamp(&offer.created_at))
    .bind(format_timestamp(&offer.updated_at))
    .execute(executor)
    .await?;

    Ok(())
}

fn offer_from_row(row: SqliteRow) -> Result<Offer, RepositoryError> {
    let unit_class_raw = row.try_get::<String, _>("unit_class")?;
    let history_raw = row.try_get::<String, _>("adjustment_history_json")?;
    let adjustment_history: Vec<AdjustmentEntry> =
        from_json("adjustment_history_json", &history_raw)?;

    Ok(Offer {
        id: OfferId(row.try_get("id")?),
        quotation_id: QuotationId(row.try_get("quotation_id")?),
        product_id: ProductId(row.try_get("product_id")?),
        supplier_id: SupplierId(row.try_get("supplier_id")?),
        brand: row.try_get("brand")?,
        unit_class: parse_enum("unit class", &unit_class_raw, UnitClass::parse)?,
        packaging: Packaging {
            package_count: parse_u32("package_count", row.try_get("package_count")?)?,
            content_per_package: parse_decimal(
                "content_per_package",
                row.try_get("content_per_package")?,
            )?,
            price_per_package: parse_decimal("price_per_package", row.try_get("price_per_package")?)?,
        },
        total_quantity: parse_decimal("total_quantity", row.try_get("total_quantity")?)?,
        price_per_unit: parse_optional_decimal("price_per_unit", row.try_get("price_per_unit")?)?,
        adjustment_history,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use tender_core::domain::item::{ProductId, UnitClass};
    use tender_core::domain::offer::{ActingParty, AdjustmentEntry, Offer, OfferId, Packaging};
    use tender_core::domain::quotation::{
        BuyerId, Quotation, QuotationId, QuotationStatus, ShoppingListId,
    };
    use tender_core::domain::supplier::SupplierId;
    use tender_core::domain::variation::ResolutionPath;
    use tender_core::store::{OfferStore, QuotationStore};

    use crate::repositories::test_support::{parse_ts, setup_pool};
    use crate::repositories::SqlTenderStore;

    async fn seeded_store() -> SqlTenderStore {
        let store = SqlTenderStore::new(setup_pool().await);
        let at = parse_ts("2026-03-02T08:00:00Z");
        store
            .save_quotation(Quotation {
                id: QuotationId::new("QT-1"),
                name: "Weekly produce".to_owned(),
                status: QuotationStatus::Open,
                deadline: parse_ts("2026-03-02T18:00:00Z"),
                counter_proposal_window_minutes: 15,
                counter_proposal_reminder_percent: 67,
                invited_suppliers: Vec::new(),
                shopping_list_id: ShoppingListId::new("SL-1"),
                buyer_id: BuyerId::new("BY-1"),
                created_at: at,
                updated_at: at,
            })
            .await
            .expect("save quotation");
        store
    }

    fn offer(id: &str, supplier: &str, content: Decimal) -> Offer {
        Offer::new(
            OfferId::new(id),
            QuotationId::new("QT-1"),
            ProductId::new("PR-TOMATO"),
            SupplierId::new(supplier),
            "Rubi",
            UnitClass::WeightOrVolume,
            Packaging::new(2, content, Decimal::from(60)),
            parse_ts("2026-03-02T09:00:00Z"),
        )
    }

    #[tokio::test]
    async fn offers_keep_submission_order_across_updates() {
        let store = seeded_store().await;
        store.save_offer(offer("OF-1", "SP-1", Decimal::from(30))).await.expect("save");
        store.save_offer(offer("OF-2", "SP-2", Decimal::from(45))).await.expect("save");

        let mut updated = offer("OF-1", "SP-1", Decimal::from(30));
        updated.packaging.package_count = 3;
        updated.recompute_derived();
        updated.adjustment_history.push(AdjustmentEntry {
            previous_packages: 2,
            new_packages: 3,
            path: ResolutionPath::AcceptSuggestion,
            acting_party: ActingParty::Buyer,
            adjusted_at: parse_ts("2026-03-02T09:30:00Z"),
        });
        updated.updated_at = parse_ts("2026-03-02T09:30:00Z");
        store.save_offer(updated.clone()).await.expect("update");

        let offers = store
            .offers_for_item(&QuotationId::new("QT-1"), &ProductId::new("PR-TOMATO"))
            .await
            .expect("offers");
        let ids: Vec<&str> = offers.iter().map(|offer| offer.id.as_str()).collect();
        assert_eq!(ids, vec!["OF-1", "OF-2"]);
        assert_eq!(offers[0], updated);
        assert_eq!(offers[0].total_quantity, Decimal::from(90));
    }

    #[tokio::test]
    async fn zero_content_offer_has_no_price_per_unit() {
        let store = seeded_store().await;
        store.save_offer(offer("OF-0", "SP-1", Decimal::ZERO)).await.expect("save");

        let stored = store.find_offer(&OfferId::new("OF-0")).await.expect("find").expect("exists");
        assert_eq!(stored.price_per_unit, None);
        assert_eq!(stored.total_quantity, Decimal::ZERO);
        assert_eq!(
            store.offers_for_quotation(&QuotationId::new("QT-1")).await.expect("offers").len(),
            1
        );
    }
}
